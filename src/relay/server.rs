//! Inbound HTTP listener using hyper
//!
//! Accepts connections and hands every request to the relay handler.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

use crate::config::ServerConfig;
use crate::error::{RelayError, Result};
use crate::relay::dispatch::Round;
use crate::relay::handler::RelayHandler;

/// Relay server
pub struct RelayServer<R> {
    config: ServerConfig,
    handler: Arc<RelayHandler<R>>,
}

impl<R: Round + 'static> RelayServer<R> {
    /// Create a new relay server
    pub fn new(config: ServerConfig, handler: Arc<RelayHandler<R>>) -> Self {
        Self { config, handler }
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|_| {
                RelayError::InvalidConfig(format!(
                    "Invalid listen address {}:{}",
                    self.config.host, self.config.port
                ))
            })?;

        let listener = TcpListener::bind(addr).await?;
        info!("Relay listening on {}", addr);
        Ok(listener)
    }

    /// Run the server until shutdown is signalled
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Serve connections from an already bound listener
    #[instrument(skip(self, listener, shutdown))]
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, client_addr)) => {
                            let handler = self.handler.clone();

                            tokio::spawn(async move {
                                if let Err(e) = Self::handle_connection(stream, handler).await {
                                    debug!("Connection error from {}: {}", client_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Relay server shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Handle a single connection
    async fn handle_connection(stream: TcpStream, handler: Arc<RelayHandler<R>>) -> Result<()> {
        let io = TokioIo::new(stream);

        let service = service_fn(move |req: Request<Incoming>| {
            let handler = handler.clone();
            async move { Ok::<_, Infallible>(handler.handle(req).await) }
        });

        http1::Builder::new().serve_connection(io, service).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::dispatch::{Dispatcher, DispatcherConfig};
    use crate::relay::pool::{Gate, GatePool};
    use crate::relay::retry::RetryController;
    use crate::relay::selector::AdaptiveSelector;
    use crate::relay::testutil::FakeGate;
    use hyper::StatusCode;
    use std::time::Duration;
    use url::Url;

    fn relay_handler(pool: Arc<GatePool>) -> Arc<RelayHandler<Dispatcher>> {
        let dispatcher = Dispatcher::new(
            pool.clone(),
            AdaptiveSelector::new(0.8),
            DispatcherConfig {
                fan_out: 1,
                request_timeout: Duration::from_secs(2),
                user_agents: Arc::new(Vec::new()),
            },
        );
        Arc::new(RelayHandler::new(pool, RetryController::new(dispatcher, 0)))
    }

    #[tokio::test]
    async fn test_server_relays_proxy_style_request() {
        let gate = FakeGate::good().spawn().await;
        let pool = Arc::new(GatePool::with_gates(vec![Arc::new(
            Gate::new(&gate.addr, Duration::from_secs(2)).unwrap(),
        )]));
        let handler = relay_handler(pool.clone());
        let server = RelayServer::new(
            ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            handler,
        );

        let listener = server.bind().await.unwrap();
        let relay_addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server_task = tokio::spawn(async move { server.serve(listener, shutdown_rx).await });

        // The relay itself acts as a plain HTTP proxy for the client.
        let client = Gate::new(&relay_addr.to_string(), Duration::from_secs(5)).unwrap();
        let url = Url::parse("http://target.example/index.html").unwrap();
        let response = client.client().get(&url, None).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(&response.body[..], b"<html><body>hello</body></html>");
        assert_eq!(gate.seen()[0].uri, "http://target.example/index.html");
        assert_eq!(pool.active_requests(), 0);

        shutdown_tx.send(true).unwrap();
        server_task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_request_surfaces_http_error() {
        use tokio::io::AsyncWriteExt;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"\x00\x01 garbage\r\n\r\n").await.unwrap();
            stream
        });

        let (stream, _) = listener.accept().await.unwrap();
        let handler = relay_handler(Arc::new(GatePool::new()));
        let result = RelayServer::handle_connection(stream, handler).await;
        assert!(matches!(result, Err(RelayError::Http(_))));
        drop(client.await.unwrap());
    }
}
