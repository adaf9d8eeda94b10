//! Shared inputs for the micro-ws benchmarks.

/// A named benchmark input.
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    payload: TestPayload,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, payload: TestPayload) -> Self {
        Self { name, group, payload }
    }

    pub fn small(name: &'static str, payload: TestPayload) -> Self {
        Self::new(name, TestGroup::Small, payload)
    }

    pub fn normal(name: &'static str, payload: TestPayload) -> Self {
        Self::new(name, TestGroup::Normal, payload)
    }

    pub fn large(name: &'static str, payload: TestPayload) -> Self {
        Self::new(name, TestGroup::Large, payload)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn payload(&self) -> &TestPayload {
        &self.payload
    }

    /// The payload bytes, `len` of them, filled with a repeating pattern.
    pub fn bytes(&self) -> Vec<u8> {
        (0..self.payload.len).map(|i| (i % 251) as u8).collect()
    }
}

/// Payload size and the frame length encoding it exercises.
#[derive(Debug, Copy, Clone)]
pub struct TestPayload {
    len: usize,
}

impl TestPayload {
    /// Fits the 7-bit length field.
    pub const SHORT: TestPayload = TestPayload::new(100);
    /// Needs the 16-bit extended length.
    pub const MEDIUM: TestPayload = TestPayload::new(16 * 1024);
    /// Needs the 64-bit extended length.
    pub const LONG: TestPayload = TestPayload::new(1024 * 1024);

    pub const fn new(len: usize) -> Self {
        Self { len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

pub fn frame_cases() -> Vec<TestCase> {
    vec![
        TestCase::small("short_frame", TestPayload::SHORT),
        TestCase::normal("medium_frame", TestPayload::MEDIUM),
        TestCase::large("long_frame", TestPayload::LONG),
    ]
}

/// A typical browser upgrade request head.
pub const UPGRADE_REQUEST: &str = "GET /chat HTTP/1.1\r\n\
Host: server.example.com\r\n\
User-Agent: Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0\r\n\
Accept: */*\r\n\
Accept-Language: en-US,en;q=0.5\r\n\
Accept-Encoding: gzip, deflate, br\r\n\
Sec-WebSocket-Version: 13\r\n\
Origin: http://server.example.com\r\n\
Sec-WebSocket-Extensions: permessage-deflate\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
Connection: keep-alive, Upgrade\r\n\
Pragma: no-cache\r\n\
Cache-Control: no-cache\r\n\
Upgrade: websocket\r\n\
\r\n";
