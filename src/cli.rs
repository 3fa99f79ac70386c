use clap::Parser;

#[derive(Parser)]
#[command(name = "sealed-secrets-mirror", version)]
#[command(about = "Mirror unsealed secrets across namespaces with drift auditing")]
pub struct Cli {
    /// Name of the unsealing controller deployment to follow
    #[arg(long, default_value = "sealed-secrets-controller")]
    pub controller: String,

    /// Namespace the controller and the source secrets live in
    #[arg(short = 's', long, default_value = "sealedsecrets")]
    pub source_namespace: String,

    /// Fallback namespace for mirrored secrets without a TargetNamespace label
    #[arg(short = 'd', long, default_value = "default")]
    pub destination_namespace: String,

    /// Container to read controller logs from (defaults to the controller name)
    #[arg(short = 'c', long)]
    pub container: Option<String>,

    /// Seconds between pod discovery polls
    #[arg(long, default_value_t = 1)]
    pub poll_interval: u64,

    /// Seconds between drift validation passes
    #[arg(long, default_value_t = 60)]
    pub validate_interval: u64,

    /// Seconds to wait for log stream teardown on shutdown
    #[arg(long, default_value_t = 3)]
    pub drain_grace: u64,

    /// Port the health probe endpoint listens on
    #[arg(long, default_value_t = 8081)]
    pub probe_port: u16,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
