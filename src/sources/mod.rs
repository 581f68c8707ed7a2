//! Byte source implementations

pub mod buffered;
pub mod streamed;

pub use buffered::{BufferedSource, DEFAULT_CHUNK_COUNT};
pub use streamed::StreamedSource;
