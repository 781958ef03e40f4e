//! The `geochunkd` cli.

mod cmd;
mod shutdown;

use std::sync::Arc;

use clap::Parser;
use cmd::GeochunkArgs;
use geochunk_store::FsStore;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = GeochunkArgs::parse();
    init_tracing(args.silent);

    let addr = args.socket_addr();
    let store_root = args.store_root.clone();
    let config = args.clone().into_server_config();

    let store = Arc::new(FsStore::open(&store_root).await?);

    let (signal, shutdown) = shutdown::signal();
    let signal = std::sync::Mutex::new(Some(signal));
    ctrlc::set_handler(move || {
        // `Fn` must be callable more than once; only the first Ctrl-C
        // actually has a `Signal` left to fire.
        if let Some(signal) = signal.lock().unwrap().take() {
            let _ = signal.fire();
        }
    })?;

    info!(target: "geochunkd", %addr, store_root = %store_root.display(), "starting server");

    let server = geochunk_server::serve(addr, config, store);
    tokio::select! {
        res = server => res?,
        _ = shutdown => warn!(target: "geochunkd", "received shutdown signal"),
    }

    Ok(())
}

fn init_tracing(silent: bool) {
    use tracing_subscriber::prelude::*;

    if silent {
        return;
    }
    tracing_subscriber::Registry::default()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "geochunkd=info,geochunk_server=info,geochunk_core=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
