// src/decoder/control.rs

use std::time::Duration;

/// Commands the decoder thread handles between packets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecoderCmd {
    /// Jump to an absolute media position.
    Seek(Duration),
    /// Leave the decode loop; the session is being torn down.
    Stop,
}
