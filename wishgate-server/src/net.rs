use std::sync::Arc;
use crate::middleware::Handler;
use crate::services::PasswordAuth;
use crate::state::registry::Registry;

pub mod output;
pub mod sink;
pub mod ssh;

/// Shared by every connection the listener hands out.
#[derive(Clone)]
pub(crate) struct AppCtx {
    pub auth: Arc<PasswordAuth>,
    /// The composed middleware chain
    pub app: Handler,
    pub registry: Arc<Registry>,
}
