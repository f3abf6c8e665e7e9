//! riak - Command-line client for Riak
//!
//! Runs one operation against a node or cluster and prints the result.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use riak_client::{AuthConfig, ClusterConfig, NodeConfig, RiakClient};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "riak")]
#[command(about = "Command-line client for Riak KV and Riak TS")]
#[command(version)]
struct Cli {
    /// Cluster configuration file (YAML)
    #[arg(short, long, env = "RIAK_CONFIG")]
    config: Option<PathBuf>,

    /// Node host, used when no configuration file is given
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Node port
    #[arg(short, long, default_value_t = riak_protocol::DEFAULT_PORT)]
    port: u16,

    /// Connections kept per node (0 opens one per operation)
    #[arg(long, default_value_t = 1)]
    pool_size: usize,

    // ===== Security Options =====
    /// User to authenticate as (enables StartTLS)
    #[arg(short, long, env = "RIAK_USERNAME")]
    username: Option<String>,

    /// Password for --username
    #[arg(long, env = "RIAK_PASSWORD", default_value = "")]
    password: String,

    /// Path to CA certificate for server verification
    #[arg(long, env = "RIAK_CA_CERT")]
    ca_cert: Option<PathBuf>,

    /// Path to client certificate
    #[arg(long, env = "RIAK_CLIENT_CERT")]
    client_cert: Option<PathBuf>,

    /// Path to client private key
    #[arg(long, env = "RIAK_CLIENT_KEY")]
    client_key: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ping the cluster
    Ping,

    /// Get server info
    Info,

    /// List buckets
    ListBuckets {
        /// Bucket type
        #[arg(short = 't', long)]
        bucket_type: Option<String>,
    },

    /// List the keys of a bucket
    ListKeys {
        /// Bucket name
        bucket: String,

        /// Bucket type
        #[arg(short = 't', long)]
        bucket_type: Option<String>,

        /// Print keys as pages arrive
        #[arg(short, long)]
        stream: bool,
    },

    /// Fetch a time series row
    TsGet {
        /// Table name
        table: String,

        /// Key cells as a JSON array, e.g. '["family1", "series1", 1443806900000]'
        key: String,
    },

    /// Write time series rows
    TsPut {
        /// Table name
        table: String,

        /// Rows as a JSON array of arrays (or @file.json to read from file)
        rows: String,
    },

    /// Delete a time series row
    TsDelete {
        /// Table name
        table: String,

        /// Key cells as a JSON array
        key: String,
    },

    /// Run a time series query
    TsQuery {
        /// Query text
        query: String,
    },

    /// List the keys of a time series table
    TsListKeys {
        /// Table name
        table: String,
    },
}

impl Cli {
    fn cluster_config(&self) -> Result<ClusterConfig, Box<dyn std::error::Error>> {
        if let Some(path) = &self.config {
            return Ok(ClusterConfig::from_file(path)?);
        }

        let node = NodeConfig::new(&self.host, self.port).with_pool_size(self.pool_size);
        let mut config = ClusterConfig::single(node);
        if let Some(username) = &self.username {
            let mut auth = AuthConfig::new(username, &self.password);
            if let Some(ca_cert) = &self.ca_cert {
                auth = auth.with_ca_cert(ca_cert);
            }
            if let (Some(cert), Some(key)) = (&self.client_cert, &self.client_key) {
                auth = auth.with_client_cert(cert, key);
            }
            config = config.with_auth(auth);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = cli.cluster_config().map_err(|e| {
        eprintln!("{}: {}", "Configuration error".red(), e);
        e
    })?;
    let client = RiakClient::new(config)?;

    let result = commands::execute(&client, cli.command).await;
    client.shutdown();

    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }
}
