//! targetd Provisioner
//!
//! Command-line front end for the targetd iSCSI provisioner. Each subcommand
//! runs one operation: requests and descriptors are exchanged as JSON, read
//! from a file or stdin and written to stdout. Logs go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use targetd_client::{TargetdClient, TargetdConfig};
use targetd_provisioner::metrics;
use targetd_provisioner::{
    ExportPolicy, IscsiProvisioner, PROVISIONER_NAME, ProvisionRequest, Provisioner,
    VolumeDescriptor,
};

/// CLI arguments for the provisioner
#[derive(Parser, Debug)]
#[command(name = "targetd-provisioner")]
#[command(about = "A dynamic iSCSI volume provisioner using targetd")]
#[command(version)]
struct Args {
    /// URL of the targetd API (e.g. https://storage:18700/targetrpc)
    #[arg(long, env = "TARGETD_PROVISIONER_URL")]
    targetd_url: String,

    /// targetd API username
    #[arg(long, env = "TARGETD_PROVISIONER_API_USERNAME")]
    targetd_username: Option<String>,

    /// targetd API password
    #[arg(long, env = "TARGETD_PROVISIONER_API_PASSWORD", hide_env_values = true)]
    targetd_password: Option<String>,

    /// Skip TLS certificate verification of the targetd API
    #[arg(long, env = "TARGETD_PROVISIONER_API_INSECURE_SKIP_VERIFY")]
    insecure_skip_verify: bool,

    /// targetd request timeout in seconds
    #[arg(long, env = "TARGETD_PROVISIONER_TIMEOUT_SECS", default_value = "30")]
    timeout_secs: u64,

    /// Provisioner name StorageClasses refer to
    #[arg(long, env = "TARGETD_PROVISIONER_NAME", default_value = PROVISIONER_NAME)]
    provisioner_name: String,

    /// Handling of exports left by an earlier attempt (reuse, strict)
    #[arg(long, env = "TARGETD_PROVISIONER_EXPORT_POLICY", default_value = "reuse")]
    export_policy: ExportPolicy,

    /// Prometheus metrics HTTP address (e.g., 0.0.0.0:9091)
    /// If not set, metrics endpoint is disabled
    #[arg(long, env = "TARGETD_PROVISIONER_METRICS_ADDR")]
    metrics_addr: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TARGETD_PROVISIONER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "TARGETD_PROVISIONER_LOG_FORMAT", default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Provision a volume from a JSON request and print its descriptor
    Provision {
        /// Request file, or '-' for stdin
        #[arg(long, default_value = "-")]
        request: PathBuf,
    },
    /// Delete the volume described by a JSON descriptor
    Delete {
        /// Descriptor file, or '-' for stdin
        #[arg(long, default_value = "-")]
        volume: PathBuf,
    },
    /// Grow the volume described by a JSON descriptor
    Resize {
        /// Descriptor file, or '-' for stdin
        #[arg(long, default_value = "-")]
        volume: PathBuf,

        /// New size in bytes
        #[arg(long)]
        size: u64,
    },
    /// Print the provisioner name
    Name,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    init_tracing(&args.log_level, &args.log_format)?;

    if let Some(ref addr_str) = args.metrics_addr {
        let addr = addr_str
            .parse()
            .map_err(|e| format!("Invalid metrics address '{}': {}", addr_str, e))?;
        if let Err(e) = metrics::init_metrics(addr) {
            return Err(format!("Failed to initialize metrics: {}", e).into());
        }
    }

    let config = TargetdConfig {
        url: args.targetd_url.clone(),
        username: args.targetd_username.clone(),
        password: args.targetd_password.clone(),
        insecure_skip_verify: args.insecure_skip_verify,
        timeout: Duration::from_secs(args.timeout_secs),
    };
    let client = TargetdClient::new(config)?;

    info!(
        provisioner = %args.provisioner_name,
        targetd_url = %client.url(),
        export_policy = %args.export_policy,
        "Starting targetd provisioner"
    );

    let provisioner = IscsiProvisioner::new(Arc::new(client))
        .with_name(args.provisioner_name.clone())
        .with_export_policy(args.export_policy);

    match args.command {
        Command::Provision { request } => {
            let request: ProvisionRequest = serde_json::from_str(&read_input(&request).await?)?;
            let volume = provisioner.provision(&request).await?;
            println!("{}", serde_json::to_string_pretty(&volume)?);
        }
        Command::Delete { volume } => {
            let volume: VolumeDescriptor = serde_json::from_str(&read_input(&volume).await?)?;
            provisioner.delete(&volume).await?;
        }
        Command::Resize { volume, size } => {
            let volume: VolumeDescriptor = serde_json::from_str(&read_input(&volume).await?)?;
            provisioner.resize(&volume, size).await?;
        }
        Command::Name => {
            println!("{}", provisioner.name());
        }
    }

    Ok(())
}

/// Install the global subscriber. Logs are written to stderr so stdout only
/// carries command output.
fn init_tracing(log_level: &str, log_format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    match log_format.to_lowercase().as_str() {
        "json" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .json()
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "text" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        other => return Err(format!("unknown log format '{}': expected 'text' or 'json'", other).into()),
    }

    Ok(())
}

async fn read_input(path: &Path) -> std::io::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        Ok(buf)
    } else {
        tokio::fs::read_to_string(path).await
    }
}
