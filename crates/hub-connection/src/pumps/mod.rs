//! Background tasks driving one WebSocket connection.
//!
//! The write pump owns the sink, the read pump owns the stream and feeds
//! the correlator, and the ping pump keeps the connection alive. All three
//! stop on the shared cancellation token.

mod ping;
mod read;
mod write;

pub(crate) use ping::ping_pump;
pub(crate) use read::read_pump;
pub(crate) use write::write_pump;
