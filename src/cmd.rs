//! Command-line arguments for the `geochunkd` binary.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use geochunk_server::ServerConfig;

#[derive(Clone, Debug, Parser)]
#[command(name = "geochunkd", about = "Streaming ingest and retrieval service for large XML documents")]
pub struct GeochunkArgs {
    #[arg(long, default_value = "0.0.0.0", env = "GEOCHUNK_HOST")]
    pub host: IpAddr,

    #[arg(long, short, default_value_t = 8080, env = "GEOCHUNK_PORT")]
    pub port: u16,

    /// Directory chunks are written under.
    #[arg(long, default_value = "./geochunk-data", env = "GEOCHUNK_STORE_ROOT")]
    pub store_root: PathBuf,

    /// Origins allowed to call the API; repeat for multiple. Omit to disable CORS.
    #[arg(long = "allow-origin", env = "GEOCHUNK_ALLOW_ORIGIN")]
    pub allowed_origins: Vec<String>,

    #[arg(long, help = "don't print anything on startup")]
    pub silent: bool,
}

impl GeochunkArgs {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn into_server_config(self) -> ServerConfig {
        ServerConfig {
            store_root: self.store_root,
            allowed_origins: if self.allowed_origins.is_empty() { None } else { Some(self.allowed_origins) },
        }
    }
}

impl Default for GeochunkArgs {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            store_root: PathBuf::from("./geochunk-data"),
            allowed_origins: Vec::new(),
            silent: false,
        }
    }
}
