//! Server configuration.

use std::path::PathBuf;

/// Storage root and CORS policy for one server instance. The bind address is
/// passed to [`crate::serve`] separately, the way a listening socket is a
/// property of a run rather than of the service's own configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory `FsStore` writes chunks under.
    pub store_root: PathBuf,
    /// `None` disables CORS entirely; `Some(origins)` allows exactly those.
    pub allowed_origins: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { store_root: PathBuf::from("./geochunk-data"), allowed_origins: None }
    }
}
