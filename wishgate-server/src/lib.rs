pub mod banner;
pub mod cli;
pub mod config;
pub mod error;
pub mod hostkey;
pub mod middleware;
pub mod net;
pub mod server;
pub mod services;
pub mod signal;
pub mod state;
pub mod util;

// Convenient re-exports (so call sites can do `wishgate_server::Server`, etc.)
pub use config::Config;
pub use error::{ServerError, ServerResult};
pub use middleware::{Handler, Middleware};
pub use server::{RunningServer, Server};
pub use state::{
    registry::Registry,
    session::{Session, SessionContext},
};
