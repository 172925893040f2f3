use std::time::Instant;

use crate::middleware::{Middleware, handler, middleware as wrap};
use crate::state::session::Session;

/// Logs a request summary when the session starts and its duration when it ends.
pub fn middleware() -> Middleware {
    wrap(move |next| {
        handler(move |session| {
            let next = next.clone();
            async move {
                let start = Instant::now();
                log_connect(&session);
                next(session.clone()).await;
                tracing::info!(
                    session = %session.id(),
                    peer = ?session.remote_addr(),
                    duration = ?start.elapsed(),
                    "disconnect"
                );
            }
        })
    })
}

fn log_connect(session: &Session) {
    let window = session.window();
    let term = term_of(session);
    tracing::info!(
        session = %session.id(),
        user = %session.user(),
        peer = ?session.remote_addr(),
        pty = session.pty().is_some(),
        command = ?session.command(),
        term,
        width = window.width,
        height = window.height,
        "connect"
    );
}

/// TERM from the pty request, else from the client's environment.
fn term_of(session: &Session) -> &str {
    session
        .pty()
        .map(|p| p.term.as_str())
        .or_else(|| session.get_env("TERM"))
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use crate::middleware::compose;
    use crate::state::session::tests::{drain, test_session};

    #[tokio::test]
    async fn passes_through_and_writes_nothing() {
        let ran = Arc::new(Mutex::new(false));
        let inner = {
            let ran = ran.clone();
            handler(move |_| {
                let ran = ran.clone();
                async move { *ran.lock() = true }
            })
        };

        let (sess, mut rx) = test_session("alice");
        compose(&[middleware()], inner)(sess).await;

        assert!(*ran.lock());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn term_falls_back_to_the_environment() {
        use crate::net::output::OutputHandle;
        use crate::state::session::{Pty, SessionContext, Window};
        let (tx, _rx) = tokio::sync::mpsc::channel(1);

        let (plain, _rx2) = test_session("alice");
        assert_eq!(term_of(&plain), "");

        let mut ctx = SessionContext::new("alice", None);
        ctx.env.insert("TERM".into(), "vt100".into());
        let from_env = Session::new(ctx.clone(), OutputHandle::new(tx.clone()));
        assert_eq!(term_of(&from_env), "vt100");

        ctx.pty = Some(Pty { term: "xterm".into(), window: Window::default() });
        let from_pty = Session::new(ctx, OutputHandle::new(tx));
        assert_eq!(term_of(&from_pty), "xterm");
    }
}
