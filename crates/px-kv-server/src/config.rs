//! Command line and topology file handling

use anyhow::{Context, Result};
use clap::Parser;
use px_kv::StoreSpec;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "px-kvstore")]
#[command(about = "Sharded, cached, persistent key-value store over HTTP")]
pub struct Args {
    /// Port to listen on (overrides the port in --bind)
    pub port: Option<u16>,

    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Store topology file (.yaml, .yml or .json); defaults to a sharded
    /// store over file_store.json and a cached in-memory store
    #[arg(short, long)]
    pub topology: Option<PathBuf>,

    /// Directory that relative snapshot paths are resolved against
    #[arg(short, long, default_value = ".")]
    pub data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: Level,
}

impl Args {
    /// Address to listen on, with the positional port applied
    pub fn listen_addr(&self) -> SocketAddr {
        let mut addr = self.bind;
        if let Some(port) = self.port {
            addr.set_port(port);
        }
        addr
    }
}

/// Load the store topology from `path`, or the default topology if `None`
pub fn load_topology(path: Option<&Path>) -> Result<StoreSpec> {
    let Some(path) = path else {
        return Ok(StoreSpec::default());
    };

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read topology file {}", path.display()))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let spec = if is_json {
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid JSON topology in {}", path.display()))?
    } else {
        serde_yaml::from_str(&text)
            .with_context(|| format!("Invalid YAML topology in {}", path.display()))?
    };
    Ok(spec)
}
