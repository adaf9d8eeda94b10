/// Where a connection is in its lifecycle.
///
/// ```text
/// Connected --close()--> ClosingLocal --peer close / timeout--> Closed
///     |                                                           ^
///     +------------- peer close / protocol error / io error ------+
/// ```
///
/// `Closed` is terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    ClosingLocal,
    Closed,
}

impl ConnectionState {
    #[inline]
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}
