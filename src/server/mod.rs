//! HTTP server
//!
//! Binds the listener up front so startup failures surface before the
//! server loop runs, then serves until the shutdown future resolves.

pub mod errors;
pub mod routes;

use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

pub use errors::AppError;
pub use routes::{router, AppState};

pub struct HttpServer {
    state: AppState,
    listener: Option<TcpListener>,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            listener: None,
        }
    }

    /// Bind the listener, returning the actual local address
    pub async fn start(&mut self, bind: SocketAddr) -> Result<SocketAddr> {
        let listener = TcpListener::bind(bind)
            .await
            .with_context(|| format!("Failed to bind {}", bind))?;
        let addr = listener.local_addr()?;

        info!(addr = %addr, "HTTP server listening");
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Serve requests until `shutdown` completes
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = self.listener.context("Server not started")?;
        let app = router(self.state);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server error")?;

        info!("HTTP server stopped");
        Ok(())
    }
}
