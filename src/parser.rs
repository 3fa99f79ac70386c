use std::collections::BTreeMap;

/// Marker text the unsealing controller logs when a secret was decrypted.
pub const UNSEAL_MARKER: &str = "unsealed successfully";

/// Extract the attribute block from one controller log line.
///
/// The upstream controller emits events as
/// `... {Name:"db-creds", Namespace:"sealedsecrets"} ...`: a single
/// brace-delimited, comma-space-separated list of `key:"value"` pairs.
/// Returns `None` when the line does not carry a well-formed block; callers
/// skip such lines.
pub fn parse_event_attrs(line: &str) -> Option<BTreeMap<String, String>> {
    let open = line.find('{')?;
    let rest = &line[open + 1..];
    let block = &rest[..rest.find('}')?];

    let mut attrs = BTreeMap::new();
    for pair in block.split(", ") {
        let (key, value) = pair.split_once(':')?;
        attrs.insert(key.trim().to_string(), value.trim_matches('"').to_string());
    }
    Some(attrs)
}
