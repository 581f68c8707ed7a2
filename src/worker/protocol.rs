//! Messages exchanged between a player and its decode worker
//!
//! Requests and responses are closed enums, so each operation's payload and
//! result shape is fixed by the type system. Every message travels in an
//! [`Envelope`]: the player routes a reply by its [`OpTag`] and accepts it
//! only if the envelope id matches the request it is waiting on.

use std::fmt;

use bytes::Bytes;

use crate::session::SessionState;
use crate::sources::StreamedSource;
use crate::types::{Frame, Header, Metadata};
use crate::{CptvError, Result};

/// Identifies one request and the reply to it.
pub type RequestId = u64;

/// Id carried by [`Response::Ready`], which answers no request.
pub const READY_ID: RequestId = 0;

/// A message tagged with the id of the request it belongs to.
#[derive(Debug)]
pub struct Envelope<T> {
    pub id: RequestId,
    pub message: T,
}

impl<T> Envelope<T> {
    pub fn new(id: RequestId, message: T) -> Self {
        Self { id, message }
    }
}

/// Operation identifier shared by a request and its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpTag {
    InitWithBytes,
    InitWithStream,
    GetHeader,
    GetNextFrame,
    GetTotalFrames,
    GetLoadProgress,
    GetMetadata,
    HasStreamError,
    GetStreamError,
    GetState,
    Free,
}

impl OpTag {
    pub const ALL: [OpTag; 11] = [
        OpTag::InitWithBytes,
        OpTag::InitWithStream,
        OpTag::GetHeader,
        OpTag::GetNextFrame,
        OpTag::GetTotalFrames,
        OpTag::GetLoadProgress,
        OpTag::GetMetadata,
        OpTag::HasStreamError,
        OpTag::GetStreamError,
        OpTag::GetState,
        OpTag::Free,
    ];
}

/// Player to worker.
pub enum Request {
    /// Decode a resident buffer
    InitWithBytes { bytes: Bytes, max_chunk_size: Option<usize>, chunk_count: usize },
    /// Decode a live byte stream
    InitWithStream { source: StreamedSource },
    GetHeader,
    GetNextFrame,
    GetTotalFrames,
    GetLoadProgress,
    GetMetadata,
    HasStreamError,
    GetStreamError,
    GetState,
    Free,
}

impl Request {
    pub fn tag(&self) -> OpTag {
        match self {
            Request::InitWithBytes { .. } => OpTag::InitWithBytes,
            Request::InitWithStream { .. } => OpTag::InitWithStream,
            Request::GetHeader => OpTag::GetHeader,
            Request::GetNextFrame => OpTag::GetNextFrame,
            Request::GetTotalFrames => OpTag::GetTotalFrames,
            Request::GetLoadProgress => OpTag::GetLoadProgress,
            Request::GetMetadata => OpTag::GetMetadata,
            Request::HasStreamError => OpTag::HasStreamError,
            Request::GetStreamError => OpTag::GetStreamError,
            Request::GetState => OpTag::GetState,
            Request::Free => OpTag::Free,
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::InitWithBytes { bytes, max_chunk_size, chunk_count } => f
                .debug_struct("InitWithBytes")
                .field("len", &bytes.len())
                .field("max_chunk_size", max_chunk_size)
                .field("chunk_count", chunk_count)
                .finish(),
            other => write!(f, "{:?}", other.tag()),
        }
    }
}

/// Worker to player.
#[derive(Debug)]
pub enum Response {
    /// Sent once, before any request is answered
    Ready,
    InitWithBytes(Result<()>),
    InitWithStream(Result<()>),
    GetHeader(Result<Header>),
    GetNextFrame(Option<Frame>),
    GetTotalFrames(Option<u32>),
    GetLoadProgress(Option<f64>),
    GetMetadata(Result<Metadata>),
    HasStreamError(bool),
    GetStreamError(Option<CptvError>),
    GetState(SessionState),
    Free,
}

impl Response {
    /// Tag of the request this answers; `None` for [`Response::Ready`].
    pub fn tag(&self) -> Option<OpTag> {
        let tag = match self {
            Response::Ready => return None,
            Response::InitWithBytes(_) => OpTag::InitWithBytes,
            Response::InitWithStream(_) => OpTag::InitWithStream,
            Response::GetHeader(_) => OpTag::GetHeader,
            Response::GetNextFrame(_) => OpTag::GetNextFrame,
            Response::GetTotalFrames(_) => OpTag::GetTotalFrames,
            Response::GetLoadProgress(_) => OpTag::GetLoadProgress,
            Response::GetMetadata(_) => OpTag::GetMetadata,
            Response::HasStreamError(_) => OpTag::HasStreamError,
            Response::GetStreamError(_) => OpTag::GetStreamError,
            Response::GetState(_) => OpTag::GetState,
            Response::Free => OpTag::Free,
        };
        Some(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tag_is_listed_once() {
        let unique: std::collections::HashSet<_> = OpTag::ALL.iter().collect();
        assert_eq!(unique.len(), OpTag::ALL.len());
    }

    #[test]
    fn request_and_response_tags_agree() {
        let pairs = [
            (Request::GetHeader.tag(), Response::GetHeader(Err(CptvError::HeaderParse)).tag()),
            (Request::GetNextFrame.tag(), Response::GetNextFrame(None).tag()),
            (Request::GetTotalFrames.tag(), Response::GetTotalFrames(None).tag()),
            (Request::GetState.tag(), Response::GetState(SessionState::Empty).tag()),
            (Request::Free.tag(), Response::Free.tag()),
        ];
        for (request, response) in pairs {
            assert_eq!(Some(request), response);
        }
        assert_eq!(Response::Ready.tag(), None);
    }

    #[test]
    fn init_request_debug_omits_payload() {
        let request = Request::InitWithBytes {
            bytes: Bytes::from(vec![0u8; 1024]),
            max_chunk_size: None,
            chunk_count: 5,
        };
        let rendered = format!("{request:?}");
        assert!(rendered.contains("len: 1024"));
    }
}
