//! Server core logic.
//!
//! Accepts one client at a time and serves it until the connection
//! dies, then goes back to accepting. Stopping the service tears down
//! the active session through its liveness flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use appwatch_core::{Desktop, Liveness, serve_connection};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::config::ServerConfig;

// ── AppWatchService ──────────────────────────────────────────────

/// The top-level appwatch service.
pub struct AppWatchService {
    config: ServerConfig,
    desktop: Desktop,
    running: Arc<AtomicBool>,
}

impl AppWatchService {
    /// Create a service backed by this platform's collaborators.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_desktop(config, Desktop::native())
    }

    pub fn with_desktop(config: ServerConfig, desktop: Desktop) -> Self {
        Self {
            config,
            desktop,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that can be used to stop the service from
    /// another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Bind the configured address and run until stopped.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = self.config.listen_addr();
        let listener = TcpListener::bind(addr).await?;
        info!("appwatch listening on {addr}");
        self.run_on(listener).await
    }

    /// Run the accept loop on an already-bound listener until stopped.
    pub async fn run_on(&self, listener: TcpListener) -> Result<(), Box<dyn std::error::Error>> {
        self.running.store(true, Ordering::SeqCst);

        while self.running.load(Ordering::SeqCst) {
            let accept = tokio::select! {
                result = listener.accept() => result,
                _ = Self::wait_for_stop(&self.running) => break,
            };

            let (stream, peer) = match accept {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };

            info!("client connected from {peer}");
            self.serve(stream).await;
            info!("session with {peer} ended");
        }

        self.running.store(false, Ordering::SeqCst);
        info!("appwatch service stopped");
        Ok(())
    }

    /// Signal the service to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the service is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn serve(&self, stream: TcpStream) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("set_nodelay failed: {e}");
        }
        let (reader, writer) = stream.into_split();
        let liveness = Liveness::new();

        let session = serve_connection(
            reader,
            writer,
            &self.desktop,
            self.config.refresh_interval(),
            liveness.clone(),
        );
        tokio::pin!(session);

        let finished = tokio::select! {
            result = &mut session => Some(result),
            _ = Self::wait_for_stop(&self.running) => None,
        };
        let result = match finished {
            Some(result) => result,
            None => {
                info!("stopping active session");
                liveness.mark_dead();
                session.await
            }
        };

        if let Err(e) = result {
            warn!("session failed: {e}");
        }
    }

    /// Async helper: resolves when `running` becomes false.
    async fn wait_for_stop(running: &Arc<AtomicBool>) {
        loop {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
