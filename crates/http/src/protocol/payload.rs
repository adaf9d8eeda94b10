/// Represents the size information of an HTTP request payload.
///
/// The host pipeline uses it to drain request bodies that handlers never read:
/// - Known length: skip exactly that many bytes
/// - Chunked: not supported, the connection is answered and closed
/// - Empty: nothing to skip
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Payload with known length in bytes
    Length(u64),
    /// Payload using chunked transfer encoding
    Chunked,
    /// Empty payload (no body)
    Empty,
}

impl PayloadSize {
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty | PayloadSize::Length(0))
    }
}
