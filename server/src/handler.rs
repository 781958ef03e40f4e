//! HTTP handlers: one route to ingest a document, one to retrieve a chunk.

use std::sync::Arc;

use axum::body::StreamBody;
use axum::extract::{BodyStream, Extension, Path};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use geochunk_store::Store;
use tracing::{error, info};

use crate::driver::IngestDriver;

/// `POST /store` — consumes the request body as a streaming XML document.
pub async fn ingest_handler<S: Store>(
    Extension(driver): Extension<IngestDriver<S>>,
    body: BodyStream,
) -> Response {
    let inbound = body.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
    match driver.ingest(inbound).await {
        Ok(ack) => {
            info!(target: "ingest", chunks = ack.chunks, "ingest accepted");
            (StatusCode::ACCEPTED, "Accepted file - indexing in progress").into_response()
        }
        Err(e) if e.is_client_fault() => {
            (e.status_code(), format!("Could not parse XML: {e}")).into_response()
        }
        Err(e) => {
            error!(target: "ingest", error = %e, "ingest failed");
            (e.status_code(), "Internal error processing upload").into_response()
        }
    }
}

/// `GET /store/:name` — streams a previously stored chunk back out.
pub async fn retrieve_handler<S: Store>(
    Extension(store): Extension<Arc<S>>,
    Path(name): Path<String>,
) -> Response {
    match store.get(&name).await {
        Ok((stream, len)) => {
            let mut response = StreamBody::new(stream).into_response();
            response
                .headers_mut()
                .insert(header::CONTENT_LENGTH, HeaderValue::from_str(&len.to_string()).unwrap());
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/xml"));
            response
        }
        Err(e) if e.is_not_found() => (StatusCode::NOT_FOUND, "No such chunk").into_response(),
        Err(e) => {
            error!(target: "retrieve", name = %name, error = %e, "retrieve failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error retrieving chunk").into_response()
        }
    }
}
