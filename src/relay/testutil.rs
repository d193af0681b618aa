//! In-process fake gates for tests

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{PROXY_AUTHORIZATION, USER_AGENT};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tokio::net::TcpListener;

/// What a fake gate saw
#[derive(Debug, Clone)]
pub(crate) struct SeenRequest {
    pub uri: String,
    pub user_agent: Option<String>,
    pub proxy_authorization: Option<String>,
}

/// Fake HTTP proxy that answers every request the same way
#[derive(Debug, Clone)]
pub(crate) struct FakeGate {
    status: u16,
    body: String,
    delay: Duration,
}

pub(crate) struct RunningGate {
    pub addr: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl FakeGate {
    pub fn respond(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    /// A gate that answers with a complete page
    pub fn good() -> Self {
        Self::respond(200, "<html><body>hello</body></html>")
    }

    /// A gate that never answers within any reasonable timeout
    pub fn hanging() -> Self {
        Self::respond(200, "<html><body>late</body></html>").with_delay(Duration::from_secs(60))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub async fn spawn(self) -> RunningGate {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let config = Arc::new(self);

        let task_seen = seen.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let config = config.clone();
                let seen = task_seen.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let config = config.clone();
                        let seen = seen.clone();
                        async move {
                            seen.lock().push(SeenRequest {
                                uri: req.uri().to_string(),
                                user_agent: header_value(&req, USER_AGENT),
                                proxy_authorization: header_value(&req, PROXY_AUTHORIZATION),
                            });

                            if !config.delay.is_zero() {
                                tokio::time::sleep(config.delay).await;
                            }

                            let mut response =
                                Response::new(Full::new(Bytes::from(config.body.clone())));
                            *response.status_mut() =
                                StatusCode::from_u16(config.status).unwrap();
                            Ok::<_, Infallible>(response)
                        }
                    });

                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        RunningGate { addr, seen }
    }
}

impl RunningGate {
    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().clone()
    }

    pub fn hits(&self) -> usize {
        self.seen.lock().len()
    }
}

/// An address nothing listens on
pub(crate) async fn refused_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

fn header_value(req: &Request<Incoming>, name: hyper::header::HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
