//! Orchestrates one ingest: reads inbound bytes, feeds the parser, drains
//! tokens into the splitter, and hands finished chunks to the store under
//! backpressure.

use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use geochunk_core::{AsyncParser, Drain, FirstLevelSplitter, TokenEvent, Window};
use geochunk_store::Store;
use tracing::{debug, trace, warn};

use crate::error::IngestError;

/// Outcome of a successful ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestAck {
    /// Number of chunks stored, in document order.
    pub chunks: u64,
}

/// Drives one streaming ingest against a [`Store`].
///
/// Not shared across threads: a fresh [`Window`], [`AsyncParser`] and
/// [`FirstLevelSplitter`] are constructed per call to [`IngestDriver::ingest`]
/// and dropped when it returns, on every exit path (success, parse error,
/// store error, cancellation).
pub struct IngestDriver<S> {
    store: Arc<S>,
}

impl<S> Clone for IngestDriver<S> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone() }
    }
}

impl<S: Store> IngestDriver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Consumes `inbound` to completion, splitting it into chunks and
    /// storing each one before resuming consumption — at most one
    /// `store.add` is ever in flight at a time.
    pub async fn ingest<B, E>(&self, mut inbound: B) -> Result<IngestAck, IngestError>
    where
        B: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let mut window = Window::new();
        let mut parser = AsyncParser::new();
        let mut splitter = FirstLevelSplitter::new();
        let mut chunks = 0u64;

        let result = self.run(&mut window, &mut parser, &mut splitter, &mut inbound, &mut chunks).await;

        // Parser close failures are logged and swallowed, never propagated:
        // they can't change the outcome of an ingest that already finished
        // (or failed) upstream of this point.
        if let Err(e) = parser.close() {
            warn!(target: "ingest", error = %e, "parser close failed");
        }

        result.map(|()| IngestAck { chunks })
    }

    async fn run<B, E>(
        &self,
        window: &mut Window,
        parser: &mut AsyncParser,
        splitter: &mut FirstLevelSplitter,
        inbound: &mut B,
        chunks: &mut u64,
    ) -> Result<(), IngestError>
    where
        B: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        loop {
            // Inbound is implicitly "paused" between iterations: we only
            // ever hold one outstanding `.next()` call, and we don't issue
            // the next one until the drain loop below has fully caught up
            // (including any in-flight `store.add`).
            match inbound.next().await {
                Some(Ok(bytes)) => {
                    window.append(&bytes);
                    parser.feed(&bytes);
                    self.drain(window, parser, splitter, chunks).await?;
                }
                Some(Err(e)) => return Err(IngestError::Io(e.to_string())),
                None => {
                    parser.end_of_input();
                    self.drain(window, parser, splitter, chunks).await?;
                    return Ok(());
                }
            }
        }
    }

    /// Pulls tokens until the parser runs dry (`Incomplete`) or the
    /// document ends. Suspends only while awaiting a `store.add`
    /// acknowledgement — the one external await inside this loop.
    async fn drain(
        &self,
        window: &mut Window,
        parser: &mut AsyncParser,
        splitter: &mut FirstLevelSplitter,
        chunks: &mut u64,
    ) -> Result<(), IngestError> {
        loop {
            match parser.next()? {
                Drain::Incomplete => return Ok(()),
                Drain::Token(token) => {
                    trace!(target: "ingest", offset = token.offset, "drained token");
                    let at_eof = matches!(token.event, TokenEvent::EndDocument);

                    if let Some(chunk) = splitter.on_event(&token.event, token.offset, window)? {
                        let name =
                            self.store.add(chunk.into_string()).await.map_err(IngestError::Store)?;
                        *chunks += 1;
                        debug!(target: "ingest", name = %name, chunks = *chunks, "chunk stored");
                        window.advance(token.offset)?;
                    }

                    if at_eof {
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use geochunk_store::{ChunkName, ChunkStream, StoreError};
    use std::sync::Mutex;
    use tokio::time::{sleep, Duration};

    #[derive(Default)]
    struct FakeStore {
        added: Mutex<Vec<String>>,
        delay: Option<Duration>,
        fail: bool,
    }

    #[async_trait]
    impl Store for FakeStore {
        async fn add(&self, chunk: String) -> Result<ChunkName, StoreError> {
            if let Some(d) = self.delay {
                sleep(d).await;
            }
            if self.fail {
                return Err(StoreError::Transient("induced failure".into()));
            }
            let name = format!("chunk-{}", self.added.lock().unwrap().len());
            self.added.lock().unwrap().push(chunk);
            Ok(name)
        }

        async fn get(&self, _name: &str) -> Result<(ChunkStream, u64), StoreError> {
            unimplemented!("not exercised by driver tests")
        }
    }

    fn byte_stream(bytes: &[u8]) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Unpin {
        let chunks: Vec<Result<Bytes, std::io::Error>> =
            bytes.iter().map(|b| Ok(Bytes::copy_from_slice(&[*b]))).collect();
        stream::iter(chunks)
    }

    #[tokio::test]
    async fn ingests_two_children_in_order() {
        let store = Arc::new(FakeStore::default());
        let driver = IngestDriver::new(store.clone());
        let ack = driver.ingest(byte_stream(b"<r><a/><b>y</b></r>")).await.unwrap();
        assert_eq!(ack.chunks, 2);
        let added = store.added.lock().unwrap().clone();
        assert_eq!(added, vec!["<?xml version=\"1.0\"?>\n<r>\n<a/>\n</r>\n", "<?xml version=\"1.0\"?>\n<r>\n<b>y</b>\n</r>\n"]);
    }

    #[tokio::test]
    async fn empty_root_succeeds_with_no_chunks() {
        let store = Arc::new(FakeStore::default());
        let driver = IngestDriver::new(store);
        let ack = driver.ingest(byte_stream(b"<r/>")).await.unwrap();
        assert_eq!(ack.chunks, 0);
    }

    #[tokio::test]
    async fn malformed_xml_fails_the_ingest() {
        let store = Arc::new(FakeStore::default());
        let driver = IngestDriver::new(store);
        let err = driver.ingest(byte_stream(b"<r><a></b></r>")).await.unwrap_err();
        assert!(err.is_client_fault());
    }

    #[tokio::test]
    async fn store_failure_aborts_ingest() {
        let store = Arc::new(FakeStore { fail: true, ..Default::default() });
        let driver = IngestDriver::new(store);
        let err = driver.ingest(byte_stream(b"<r><a/></r>")).await.unwrap_err();
        assert!(!err.is_client_fault());
    }

    #[tokio::test]
    async fn backpressure_holds_inbound_during_slow_add() {
        // A slow `add` should not prevent the ingest from completing, and
        // chunks still land in document order.
        let store = Arc::new(FakeStore { delay: Some(Duration::from_millis(5)), ..Default::default() });
        let driver = IngestDriver::new(store.clone());
        let ack = driver.ingest(byte_stream(b"<r><a/><b/><c/></r>")).await.unwrap();
        assert_eq!(ack.chunks, 3);
        assert_eq!(store.added.lock().unwrap().len(), 3);
    }
}
