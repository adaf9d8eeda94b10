use std::error::Error;
use std::future::Future;

use crate::protocol::{Reply, RequestHeader};

/// Answers one request head with a [`Reply`].
///
/// The connection loop awaits the returned future before reading the next request,
/// so one connection never runs two calls at the same time.
#[trait_variant::make(Handler: Send)]
pub trait LocalHandler {
    type Error: Into<Box<dyn Error + Send + Sync>>;

    async fn call(&self, req: RequestHeader) -> Result<Reply, Self::Error>;
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F, Fut, Err> Handler for HandlerFn<F>
where
    F: Fn(RequestHeader) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Reply, Err>> + Send,
    Err: Into<Box<dyn Error + Send + Sync>>,
{
    type Error = Err;

    async fn call(&self, req: RequestHeader) -> Result<Reply, Self::Error> {
        (self.f)(req).await
    }
}

pub fn make_handler<F, Fut, Err>(f: F) -> HandlerFn<F>
where
    F: Fn(RequestHeader) -> Fut,
    Fut: Future<Output = Result<Reply, Err>>,
    Err: Into<Box<dyn Error + Send + Sync>>,
{
    HandlerFn { f }
}
