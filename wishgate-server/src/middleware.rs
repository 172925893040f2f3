//! Per-session handlers and the middleware that wraps them.
//!
//! A [`Middleware`] takes the next [`Handler`] and returns a new one that
//! adds behaviour before and/or after calling it. [`compose`] folds a list of
//! middleware around a terminal handler so that the **first** entry is the
//! outermost wrapper: its code before `next(..)` runs first and its code after
//! `next(..)` runs last.

pub mod elapsed;
pub mod logging;
pub mod welcome;

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::state::session::Session;

pub type Handler = Arc<dyn Fn(Session) -> BoxFuture<'static, ()> + Send + Sync>;

pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Wraps an async fn as a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Session) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |session| Box::pin(f(session)))
}

/// Wraps a `Handler -> Handler` function as a [`Middleware`].
pub fn middleware<F>(f: F) -> Middleware
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn noop_handler() -> Handler {
    Arc::new(|_| Box::pin(async {}))
}

pub fn compose(middlewares: &[Middleware], terminal: Handler) -> Handler {
    middlewares
        .iter()
        .rev()
        .fold(terminal, |next, mw| mw(next))
}

/// Welcome line, elapsed time, request log, then nothing.
pub fn default_chain(welcome: impl Into<String>) -> Vec<Middleware> {
    vec![
        welcome::middleware(welcome),
        elapsed::middleware(),
        logging::middleware(),
    ]
}
