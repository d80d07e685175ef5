use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::command::Protocol;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::logger::Logger;
use crate::reputation::{ReputationChecker, Resolver, SystemResolver};
use crate::session::{Outcome, SmtpSession};
use crate::sink::Sink;

/// Listener plus everything a session needs, shared read-only between
/// connection tasks.
pub struct Dumptruck {
    pub config: Arc<Config>,
    pub(crate) protocol: Protocol,
    pub(crate) checker: ReputationChecker,
    pub(crate) sink: Sink,
    pub(crate) logger: Logger,
    connections: AtomicU64,
}

impl Dumptruck {
    pub fn new(config: Config, logger: Logger) -> Self {
        Self::with_resolver(config, logger, Arc::new(SystemResolver))
    }

    pub fn with_resolver(config: Config, logger: Logger, resolver: Arc<dyn Resolver>) -> Self {
        let protocol = Protocol::new(&config.hostname);
        let checker = ReputationChecker::new(&config.blocklists, resolver);
        let sink = Sink::new(config.output_dir.clone(), config.min_capture_size);
        Self {
            config: Arc::new(config),
            protocol,
            checker,
            sink,
            logger,
            connections: AtomicU64::new(0),
        }
    }

    /// Creates the output directory and binds every configured port.
    ///
    /// Runs before any runtime exists so that failures surface on the
    /// terminal, even in daemon mode.
    pub fn bind(&self) -> Result<Vec<StdTcpListener>> {
        std::fs::create_dir_all(&self.config.output_dir).map_err(|e| {
            Error::Configuration(format!(
                "cannot create output directory {:?}: {}",
                self.config.output_dir, e
            ))
        })?;

        let mut listeners = Vec::with_capacity(self.config.ports.len());
        for port in &self.config.ports {
            let addr = format!("{}:{}", self.config.address, port);
            let listener = StdTcpListener::bind(&addr)
                .map_err(|e| Error::Configuration(format!("failed to bind to {}: {}", addr, e)))?;
            listener
                .set_nonblocking(true)
                .map_err(|e| Error::Configuration(format!("failed to configure {}: {}", addr, e)))?;
            listeners.push(listener);
        }
        Ok(listeners)
    }

    /// Accepts on every listener. Only returns if an accept task panics.
    pub async fn serve(self: Arc<Self>, listeners: Vec<StdTcpListener>) -> Result<()> {
        let mut handles = vec![];

        for listener in listeners {
            let listener = TcpListener::from_std(listener)?;
            let this = self.clone();
            handles.push(tokio::spawn(async move { this.accept_loop(listener).await }));
        }

        for handle in handles {
            handle
                .await
                .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        }

        Ok(())
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        let local = listener
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "?".to_string());
        self.logger.log_server(&format!("listening on {}", local)).await;

        loop {
            match listener.accept().await {
                Ok((stream, client_addr)) => {
                    let sequence = self.connections.fetch_add(1, Ordering::Relaxed) + 1;
                    let this = self.clone();

                    tokio::spawn(async move {
                        this.handle_client(stream, client_addr, sequence).await;
                    });
                }
                Err(e) => {
                    self.logger
                        .log_server(&format!("accept error on {}: {}", local, e))
                        .await;
                }
            }
        }
    }

    /// Runs one session to completion. Errors stay inside the session.
    pub async fn handle_client<S>(&self, stream: S, client_addr: SocketAddr, sequence: u64)
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let session = SmtpSession::new(client_addr, sequence);
        match session.run(stream, self).await {
            Ok(Outcome::Blocked { .. }) => {}
            Ok(Outcome::Finished(_)) => {
                self.logger.log(&client_addr, "connection closed").await;
            }
            Err(e) => {
                self.logger
                    .log(&client_addr, &format!("session aborted: {}", e))
                    .await;
            }
        }
    }
}
