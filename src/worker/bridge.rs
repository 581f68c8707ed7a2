//! Worker bridge: hosts a decode session behind a message channel

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use super::protocol::{Envelope, READY_ID, Request, Response};
use crate::Result;
use crate::engine::DecodeEngine;
use crate::session::DecodeSession;
use crate::sources::BufferedSource;

/// Result of spawning a worker
pub struct BridgeChannels {
    /// Sender for requests to the worker
    pub requests: mpsc::Sender<Envelope<Request>>,
    /// Receiver for worker responses, starting with [`Response::Ready`]
    pub responses: mpsc::Receiver<Envelope<Response>>,
    /// Cancellation token for tearing the worker down
    pub cancel: CancellationToken,
    /// The worker task
    pub handle: JoinHandle<()>,
}

/// Spawns and runs decode workers
///
/// A worker loads the engine context once, announces itself with
/// [`Response::Ready`], then answers requests until cancelled or until every
/// request sender is dropped. Each request runs on its own task so that
/// different operations interleave and rely on the session lock for
/// exclusion.
pub struct WorkerBridge;

impl WorkerBridge {
    /// Spawn a worker whose engine context comes from `load_context`.
    pub fn spawn<E, F>(load_context: F, capacity: usize) -> BridgeChannels
    where
        E: DecodeEngine,
        F: Future<Output = Result<E::Context>> + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel(capacity);
        let (response_tx, response_rx) = mpsc::channel(capacity);
        let cancel = CancellationToken::new();

        let cancel_worker = cancel.clone();
        let handle = tokio::spawn(async move {
            Self::worker_task::<E, F>(load_context, request_rx, response_tx, cancel_worker).await;
        });

        BridgeChannels { requests: request_tx, responses: response_rx, cancel, handle }
    }

    async fn worker_task<E, F>(
        load_context: F,
        mut requests: mpsc::Receiver<Envelope<Request>>,
        responses: mpsc::Sender<Envelope<Response>>,
        cancel: CancellationToken,
    ) where
        E: DecodeEngine,
        F: Future<Output = Result<E::Context>> + Send + 'static,
    {
        info!("Decode worker starting");

        let loaded = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Decode worker cancelled while loading engine context");
                return;
            }
            loaded = load_context => loaded,
        };
        let context = match loaded {
            Ok(context) => Arc::new(context),
            Err(e) => {
                error!("Failed to load engine context: {}", e);
                return;
            }
        };

        let session = Arc::new(DecodeSession::<E>::new(context));
        if responses.send(Envelope::new(READY_ID, Response::Ready)).await.is_err() {
            debug!("Player dropped before worker became ready");
            return;
        }

        let mut handled = 0u64;
        let mut tasks = JoinSet::new();
        loop {
            let Envelope { id, message: request } = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Decode worker cancelled");
                    break;
                }
                request = requests.recv() => match request {
                    Some(request) => request,
                    None => {
                        debug!("Request channel closed");
                        break;
                    }
                },
            };

            handled += 1;
            trace!("Request {} (#{}): {:?}", id, handled, request);

            let session = Arc::clone(&session);
            let responses = responses.clone();
            tasks.spawn(async move {
                let response = Self::handle(&session, request).await;
                if responses.send(Envelope::new(id, response)).await.is_err() {
                    debug!("Response receiver dropped");
                }
            });

            while tasks.try_join_next().is_some() {}
        }

        // Handlers may hold the session lock inside an engine call, so abort
        // them before freeing
        session.cancel_source();
        tasks.shutdown().await;
        session.free().await;
        info!("Decode worker stopped after {} requests", handled);
    }

    async fn handle<E: DecodeEngine>(session: &DecodeSession<E>, request: Request) -> Response {
        match request {
            Request::InitWithBytes { bytes, max_chunk_size, chunk_count } => {
                let source = match max_chunk_size {
                    Some(max) if max > 0 => BufferedSource::new(bytes, Some(max)),
                    _ => BufferedSource::with_chunk_count(bytes, chunk_count),
                };
                Response::InitWithBytes(session.init(Box::new(source)).await)
            }
            Request::InitWithStream { source } => {
                Response::InitWithStream(session.init(Box::new(source)).await)
            }
            Request::GetHeader => Response::GetHeader(session.fetch_header().await),
            Request::GetNextFrame => Response::GetNextFrame(session.fetch_next_frame().await),
            Request::GetTotalFrames => Response::GetTotalFrames(session.get_total_frames()),
            Request::GetLoadProgress => Response::GetLoadProgress(session.get_load_progress()),
            Request::GetMetadata => Response::GetMetadata(session.get_metadata().await),
            Request::HasStreamError => Response::HasStreamError(session.has_stream_error().await),
            Request::GetStreamError => Response::GetStreamError(session.stream_error().await),
            Request::GetState => Response::GetState(session.state().await),
            Request::Free => {
                session.free().await;
                Response::Free
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CptvError;
    use crate::test_utils::{FakeEngine, FakeScript, StallGate, init_tracing};
    use bytes::Bytes;
    use std::time::Duration;

    fn spawn(script: FakeScript) -> BridgeChannels {
        init_tracing();
        WorkerBridge::spawn::<FakeEngine, _>(async move { Ok(script) }, 8)
    }

    async fn send(channels: &BridgeChannels, id: u64, request: Request) {
        channels.requests.send(Envelope::new(id, request)).await.unwrap();
    }

    async fn recv(channels: &mut BridgeChannels) -> Option<Response> {
        channels.responses.recv().await.map(|envelope| envelope.message)
    }

    #[tokio::test]
    async fn ready_precedes_every_response() {
        let mut channels = spawn(FakeScript::with_frames(1));
        send(&channels, 1, Request::HasStreamError).await;

        let ready = channels.responses.recv().await.unwrap();
        assert_eq!(ready.id, READY_ID);
        assert!(matches!(ready.message, Response::Ready));

        let reply = channels.responses.recv().await.unwrap();
        assert_eq!(reply.id, 1);
        assert!(matches!(reply.message, Response::HasStreamError(false)));
    }

    #[tokio::test]
    async fn init_and_read_through_messages() {
        let mut channels = spawn(FakeScript::with_frames(2));
        assert!(matches!(recv(&mut channels).await, Some(Response::Ready)));

        let bytes = Bytes::from(vec![0u8; 1000]);
        let request = Request::InitWithBytes { bytes, max_chunk_size: Some(100), chunk_count: 5 };
        send(&channels, 1, request).await;
        assert!(matches!(recv(&mut channels).await, Some(Response::InitWithBytes(Ok(())))));

        send(&channels, 2, Request::GetLoadProgress).await;
        match recv(&mut channels).await {
            Some(Response::GetLoadProgress(Some(progress))) => assert!((progress - 0.1).abs() < 1e-9),
            other => panic!("unexpected response: {other:?}"),
        }

        send(&channels, 3, Request::GetNextFrame).await;
        let reply = channels.responses.recv().await.unwrap();
        assert_eq!(reply.id, 3);
        assert!(matches!(reply.message, Response::GetNextFrame(Some(_))));
    }

    #[tokio::test]
    async fn failed_context_load_never_signals_ready() {
        init_tracing();
        let mut channels = WorkerBridge::spawn::<FakeEngine, _>(
            async { Err(CptvError::decode_init("decoder module missing")) },
            8,
        );

        assert!(channels.responses.recv().await.is_none());
        channels.handle.await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_stops_the_worker() {
        let mut channels = spawn(FakeScript::with_frames(1));
        assert!(matches!(recv(&mut channels).await, Some(Response::Ready)));

        channels.cancel.cancel();
        channels.handle.await.unwrap();
        assert!(channels.requests.send(Envelope::new(1, Request::Free)).await.is_err());
    }

    #[tokio::test]
    async fn cancellation_aborts_a_handler_inside_the_engine() {
        let gate = StallGate::default();
        let mut channels = spawn(FakeScript::with_frames(2).with_gate(gate.clone()));
        assert!(matches!(recv(&mut channels).await, Some(Response::Ready)));

        let bytes = Bytes::from(vec![0u8; 100]);
        send(&channels, 1, Request::InitWithBytes { bytes, max_chunk_size: None, chunk_count: 5 })
            .await;
        assert!(matches!(recv(&mut channels).await, Some(Response::InitWithBytes(Ok(())))));

        send(&channels, 2, Request::GetNextFrame).await;
        gate.entered.notified().await;

        channels.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), channels.handle)
            .await
            .expect("worker should stop while a frame fetch is stalled")
            .unwrap();
    }

    #[tokio::test]
    async fn dropping_the_sender_ends_the_worker() {
        let channels = spawn(FakeScript::with_frames(1));
        drop(channels.requests);
        channels.handle.await.unwrap();
    }
}
