//! Decode worker and the proxy that drives it.
//!
//! The worker owns a [`DecodeSession`](crate::session::DecodeSession) on its
//! own task. A [`CptvPlayer`] talks to it over channels using the closed
//! [`Request`]/[`Response`] vocabulary.

pub mod bridge;
pub mod protocol;
pub mod proxy;

#[cfg(test)]
mod tests;

pub use bridge::{BridgeChannels, WorkerBridge};
pub use protocol::{Envelope, OpTag, READY_ID, Request, RequestId, Response};
pub use proxy::CptvPlayer;
