//! Host-side proxy for a decode worker

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::bridge::WorkerBridge;
use super::protocol::{Envelope, OpTag, READY_ID, Request, RequestId, Response};
use crate::config::DecoderConfig;
use crate::engine::DecodeEngine;
use crate::session::SessionState;
use crate::sources::StreamedSource;
use crate::types::{Frame, Header, Metadata};
use crate::{CptvError, Result};

/// Caller-facing handle to a decode worker.
///
/// Each method sends one request under a fresh id and waits for the reply
/// carrying that id. Calls with the same [`OpTag`] queue behind each other;
/// calls with different tags run concurrently and are serialised by the
/// worker's session. A reply to a call whose future was dropped is discarded
/// by the next call with that tag.
///
/// The worker lives until [`terminate`](Self::terminate) is called. Reuse one
/// player across recordings with [`free`](Self::free) and the `init_*`
/// methods rather than spawning a new one per recording.
pub struct CptvPlayer {
    requests: mpsc::Sender<Envelope<Request>>,
    next_id: AtomicU64,

    /// Per-tag reply channels; holding the lock marks the tag as in flight
    replies: HashMap<OpTag, Mutex<mpsc::UnboundedReceiver<Envelope<Response>>>>,

    config: DecoderConfig,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
    router: JoinHandle<()>,
}

impl CptvPlayer {
    /// Spawn a worker and wait for its ready signal.
    ///
    /// `load_context` runs once inside the worker; if it fails, or the worker
    /// does not become ready within the configured timeout, spawning fails.
    pub async fn spawn<E, F>(load_context: F, config: DecoderConfig) -> Result<Self>
    where
        E: DecodeEngine,
        F: Future<Output = Result<E::Context>> + Send + 'static,
    {
        config.validate()?;
        let channels = WorkerBridge::spawn::<E, F>(load_context, config.request_capacity);

        let mut routes = HashMap::new();
        let mut replies = HashMap::new();
        for tag in OpTag::ALL {
            let (tx, rx) = mpsc::unbounded_channel();
            routes.insert(tag, tx);
            replies.insert(tag, Mutex::new(rx));
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let router = tokio::spawn(route_responses(channels.responses, routes, ready_tx));

        let player = Self {
            requests: channels.requests,
            next_id: AtomicU64::new(READY_ID + 1),
            replies,
            config,
            cancel: channels.cancel,
            worker: channels.handle,
            router,
        };

        let timeout = player.config.ready_timeout();
        match tokio::time::timeout(timeout, ready_rx).await {
            Ok(Ok(())) => {
                info!("Decode worker ready");
                Ok(player)
            }
            Ok(Err(_)) => {
                player.terminate().await;
                Err(CptvError::worker_unavailable("worker exited before becoming ready"))
            }
            Err(_) => {
                warn!("Timeout waiting for decode worker after {:?}", timeout);
                player.terminate().await;
                Err(CptvError::Timeout { duration: timeout })
            }
        }
    }

    async fn call(&self, request: Request) -> Result<Response> {
        let tag = request.tag();
        let reply = self
            .replies
            .get(&tag)
            .ok_or_else(|| CptvError::worker_unavailable(format!("no reply route for {tag:?}")))?;
        let mut reply = reply.lock().await;
        let id: RequestId = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.requests
            .send(Envelope::new(id, request))
            .await
            .map_err(|_| CptvError::worker_unavailable("request channel closed"))?;

        loop {
            let envelope =
                reply.recv().await.ok_or_else(|| CptvError::worker_unavailable("worker stopped"))?;
            if envelope.id == id {
                return Ok(envelope.message);
            }
            // Answer to an earlier call whose caller stopped waiting
            debug!("Discarding {:?} reply {} while waiting for {}", tag, envelope.id, id);
        }
    }

    /// Start decoding a resident recording, freeing any previous one.
    pub async fn init_with_bytes(&self, bytes: impl Into<Bytes>) -> Result<()> {
        let request = Request::InitWithBytes {
            bytes: bytes.into(),
            max_chunk_size: self.config.max_chunk_size,
            chunk_count: self.config.default_chunk_count,
        };
        match self.call(request).await? {
            Response::InitWithBytes(result) => result,
            other => Err(unexpected(OpTag::InitWithBytes, other)),
        }
    }

    /// Start decoding a live stream, freeing any previous recording.
    pub async fn init_with_stream(&self, source: StreamedSource) -> Result<()> {
        match self.call(Request::InitWithStream { source }).await? {
            Response::InitWithStream(result) => result,
            other => Err(unexpected(OpTag::InitWithStream, other)),
        }
    }

    /// Convenience for [`init_with_stream`](Self::init_with_stream) over any
    /// byte stream, e.g. an HTTP body with its Content-Length.
    pub async fn init_with_byte_stream<S>(&self, stream: S, expected_len: Option<u64>) -> Result<()>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        self.init_with_stream(StreamedSource::new(stream, expected_len)).await
    }

    pub async fn get_header(&self) -> Result<Header> {
        match self.call(Request::GetHeader).await? {
            Response::GetHeader(result) => result,
            other => Err(unexpected(OpTag::GetHeader, other)),
        }
    }

    /// Next distinct frame; see
    /// [`DecodeSession::fetch_next_frame`](crate::session::DecodeSession::fetch_next_frame).
    pub async fn get_next_frame(&self) -> Result<Option<Frame>> {
        match self.call(Request::GetNextFrame).await? {
            Response::GetNextFrame(frame) => Ok(frame),
            other => Err(unexpected(OpTag::GetNextFrame, other)),
        }
    }

    pub async fn get_total_frames(&self) -> Result<Option<u32>> {
        match self.call(Request::GetTotalFrames).await? {
            Response::GetTotalFrames(total) => Ok(total),
            other => Err(unexpected(OpTag::GetTotalFrames, other)),
        }
    }

    pub async fn get_load_progress(&self) -> Result<Option<f64>> {
        match self.call(Request::GetLoadProgress).await? {
            Response::GetLoadProgress(progress) => Ok(progress),
            other => Err(unexpected(OpTag::GetLoadProgress, other)),
        }
    }

    pub async fn get_metadata(&self) -> Result<Metadata> {
        match self.call(Request::GetMetadata).await? {
            Response::GetMetadata(result) => result,
            other => Err(unexpected(OpTag::GetMetadata, other)),
        }
    }

    pub async fn has_stream_error(&self) -> Result<bool> {
        match self.call(Request::HasStreamError).await? {
            Response::HasStreamError(has_error) => Ok(has_error),
            other => Err(unexpected(OpTag::HasStreamError, other)),
        }
    }

    pub async fn get_stream_error(&self) -> Result<Option<CptvError>> {
        match self.call(Request::GetStreamError).await? {
            Response::GetStreamError(error) => Ok(error),
            other => Err(unexpected(OpTag::GetStreamError, other)),
        }
    }

    pub async fn get_state(&self) -> Result<SessionState> {
        match self.call(Request::GetState).await? {
            Response::GetState(state) => Ok(state),
            other => Err(unexpected(OpTag::GetState, other)),
        }
    }

    /// Release the current recording; the worker stays up.
    pub async fn free(&self) -> Result<()> {
        match self.call(Request::Free).await? {
            Response::Free => Ok(()),
            other => Err(unexpected(OpTag::Free, other)),
        }
    }

    /// Stream every remaining distinct frame.
    ///
    /// Ends when the session stops being readable: exhausted, consumed by a
    /// frame count, errored, or freed. Repeated frames are skipped.
    pub fn frames(&self) -> impl Stream<Item = Frame> + '_ {
        futures::stream::unfold(self, |player| async move {
            loop {
                match player.get_next_frame().await {
                    Ok(Some(frame)) => return Some((frame, player)),
                    Ok(None) => match player.get_state().await {
                        Ok(SessionState::Ready | SessionState::Reading) => continue,
                        _ => return None,
                    },
                    Err(e) => {
                        warn!("Frame stream ended: {}", e);
                        return None;
                    }
                }
            }
        })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Stop the worker and wait for it to exit.
    pub async fn terminate(self) {
        debug!("Terminating decode worker");
        self.cancel.cancel();
        if let Err(e) = self.worker.await {
            warn!("Decode worker task failed: {}", e);
        }
        if let Err(e) = self.router.await {
            warn!("Response router task failed: {}", e);
        }
        info!("Decode worker terminated");
    }
}

fn unexpected(expected: OpTag, response: Response) -> CptvError {
    CptvError::worker_unavailable(format!(
        "expected {:?} reply, got {:?}",
        expected,
        response.tag()
    ))
}

/// Forward worker responses to the reply channel of their tag.
async fn route_responses(
    mut responses: mpsc::Receiver<Envelope<Response>>,
    routes: HashMap<OpTag, mpsc::UnboundedSender<Envelope<Response>>>,
    ready: oneshot::Sender<()>,
) {
    let mut ready = Some(ready);
    while let Some(envelope) = responses.recv().await {
        let Some(tag) = envelope.message.tag() else {
            match ready.take() {
                Some(ready) => {
                    let _ = ready.send(());
                }
                None => warn!("Duplicate ready signal from decode worker"),
            }
            continue;
        };

        match routes.get(&tag) {
            Some(route) => {
                if route.send(envelope).is_err() {
                    warn!("Dropping {:?} reply after the player closed", tag);
                }
            }
            None => warn!("No route for {:?} reply", tag),
        }
    }
    debug!("Response router stopped");
}
