//! Raw capture samples.

/// One BGR24 frame with its capture timestamp (seconds since the epoch).
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub captured_at: f64,
}

impl Frame {
    pub fn new(data: Vec<u8>, captured_at: f64) -> Self {
        Self { data, captured_at }
    }

    /// Byte length of one frame at the given resolution.
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }
}

/// One PCM chunk (signed 16-bit little-endian) with its capture timestamp.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub data: Vec<u8>,
    pub captured_at: f64,
}

impl AudioChunk {
    pub fn new(data: Vec<u8>, captured_at: f64) -> Self {
        Self { data, captured_at }
    }
}
