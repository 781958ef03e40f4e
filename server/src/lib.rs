//! Bootstraps the HTTP front end: one route to ingest a streaming XML
//! document, one to retrieve a previously stored chunk.

pub mod config;
pub mod driver;
pub mod error;
pub mod handler;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Extension, Router, Server};
use geochunk_store::Store;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use driver::{IngestAck, IngestDriver};

/// Builds and serves the router against `addr` until the returned future is
/// dropped or the server errors.
pub fn serve<S>(
    addr: SocketAddr,
    config: ServerConfig,
    store: Arc<S>,
) -> impl Future<Output = hyper::Result<()>>
where
    S: Store,
{
    let driver = IngestDriver::new(store.clone());

    let router = Router::new()
        .route("/store", post(handler::ingest_handler::<S>))
        .route("/store/:name", get(handler::retrieve_handler::<S>))
        .layer(Extension(driver))
        .layer(Extension(store))
        // request bodies are streamed in fixed-size frames rather than
        // buffered whole, so the framework's default cap would reject
        // exactly the large documents this service exists to accept.
        .layer(DefaultBodyLimit::disable())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    let router = match config.allowed_origins {
        Some(origins) => {
            let values: Vec<HeaderValue> =
                origins.iter().filter_map(|o| o.parse().ok()).collect();
            router.layer(
                CorsLayer::new()
                    .allow_origin(values)
                    .allow_headers(vec![header::CONTENT_TYPE])
                    .allow_methods(vec![Method::GET, Method::POST]),
            )
        }
        None => router,
    };

    Server::bind(&addr).serve(router.into_make_service())
}
