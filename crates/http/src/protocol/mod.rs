//! Core HTTP protocol abstractions for the host pipeline.
//!
//! - [`RequestHeader`]: request head wrapper with token-list helpers
//! - [`PayloadSize`]: how much request body follows a head
//! - [`Reply`], [`Upgrade`], [`UpgradedIo`]: what a handler returns and how a
//!   connection leaves HTTP processing
//! - [`HttpError`], [`ParseError`], [`SendError`]: error types

mod payload;
pub use payload::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::BoxedReader;
pub use response::BoxedWriter;
pub use response::Reply;
pub use response::Upgrade;
pub use response::UpgradedIo;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
