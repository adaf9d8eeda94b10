use std::time::Duration;

const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Per-connection limits and timeouts.
///
/// ```
/// use micro_ws::WsConfig;
/// use std::time::Duration;
///
/// let config = WsConfig::new().max_message_size(1024 * 1024).idle_timeout(Duration::from_secs(60));
/// assert_eq!(config.get_max_message_size(), 1024 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct WsConfig {
    max_frame_size: usize,
    max_message_size: usize,
    close_timeout: Duration,
    idle_timeout: Option<Duration>,
    read_buffer_size: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            idle_timeout: None,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl WsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inbound frames with a larger payload fail the connection with 1009.
    #[must_use]
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Reassembled messages beyond this size fail the connection with 1009.
    #[must_use]
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// How long the peer has to answer a local close.
    #[must_use]
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Closes the connection with 1001 after this long without a complete inbound frame.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    pub fn get_max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    pub fn get_max_message_size(&self) -> usize {
        self.max_message_size
    }

    pub fn get_close_timeout(&self) -> Duration {
        self.close_timeout
    }

    pub fn get_idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    pub fn get_read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }
}
