use std::sync::Arc;

use crate::middleware::{Middleware, handler, middleware as wrap};
use crate::state::session::print;

/// Writes `message` verbatim, then hands over to the rest of the chain.
pub fn middleware(message: impl Into<String>) -> Middleware {
    let message: Arc<str> = message.into().into();
    wrap(move |next| {
        let message = message.clone();
        handler(move |session| {
            let next = next.clone();
            let message = message.clone();
            async move {
                print(&session, &*message).await;
                next(session).await;
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crate::middleware::{compose, noop_handler};
    use crate::net::output::OutFrame;
    use crate::state::session::tests::{drain, test_session};

    #[tokio::test]
    async fn writes_message_before_next() {
        let inner = handler(|session| async move {
            crate::state::session::print(&session, "inner").await;
        });
        let chain = compose(&[middleware("Welcome you are in the system.")], inner);

        let (sess, mut rx) = test_session("alice");
        chain(sess).await;

        assert_eq!(
            drain(&mut rx),
            vec![
                OutFrame::Data(Bytes::from("Welcome you are in the system.")),
                OutFrame::Data(Bytes::from("inner")),
            ]
        );
    }

    #[tokio::test]
    async fn closed_session_still_runs_next() {
        let chain = compose(&[middleware("hi")], noop_handler());
        let (sess, mut rx) = test_session("alice");
        sess.mark_closed();

        chain(sess).await;
        assert!(drain(&mut rx).is_empty());
    }
}
