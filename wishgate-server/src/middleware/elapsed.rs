use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::middleware::{Middleware, handler, middleware as wrap};
use crate::state::session::{Session, print};

/// `%v` is replaced by the elapsed duration.
pub const DEFAULT_FORMAT: &str = "elapsed time: %v\n";

/// Reports how long the rest of the chain took, to the client and to the log.
pub fn middleware() -> Middleware {
    middleware_with_format(DEFAULT_FORMAT)
}

pub fn middleware_with_format(format: impl Into<String>) -> Middleware {
    let format: Arc<str> = format.into().into();
    middleware_with_report(move |session: Session, elapsed| {
        let format = format.clone();
        async move {
            tracing::info!(
                session = %session.id(),
                user = %session.user(),
                elapsed = ?elapsed,
                "session finished"
            );
            print(&session, render(&format, elapsed)).await;
        }
    })
}

/// Times everything wrapped by this middleware and passes the duration to `report`.
pub fn middleware_with_report<F, Fut>(report: F) -> Middleware
where
    F: Fn(Session, Duration) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let report = Arc::new(report);
    wrap(move |next| {
        let report = report.clone();
        handler(move |session| {
            let next = next.clone();
            let report = report.clone();
            async move {
                let start = Instant::now();
                next(session.clone()).await;
                report(session, start.elapsed()).await;
            }
        })
    })
}

pub fn render(format: &str, elapsed: Duration) -> String {
    format.replace("%v", &format!("{elapsed:?}"))
}
