//! Inbound request handling
//!
//! Resolves the target URL of an inbound request, relays it through the gate pool, and turns the
//! result into the response written back to the client.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE, HOST};
use hyper::{Method, Request, Response, Uri};
use tracing::{error, info, instrument, Span};
use url::Url;
use uuid::Uuid;

use crate::error::{RelayError, Result};
use crate::relay::dispatch::{Dispatcher, Round};
use crate::relay::pool::GatePool;
use crate::relay::retry::RetryController;

/// Entry point used by the listener for every inbound request
pub struct RelayHandler<R = Dispatcher> {
    pool: Arc<GatePool>,
    retry: RetryController<R>,
}

impl<R: Round> RelayHandler<R> {
    pub fn new(pool: Arc<GatePool>, retry: RetryController<R>) -> Self {
        Self { pool, retry }
    }

    /// Relay `url` and return the validated body, or an explicit failure
    pub async fn relay(&self, url: &Url) -> Result<Bytes> {
        let _active = self.pool.begin_request();
        self.retry.forward(url).await
    }

    /// Handle an inbound HTTP request
    #[instrument(
        skip(self, req),
        fields(method = %req.method(), uri = %req.uri(), request_id = tracing::field::Empty)
    )]
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>> {
        let request_id = Uuid::new_v4();
        Span::current().record("request_id", tracing::field::display(request_id));

        let target = match resolve_target(&req) {
            Ok(target) => target,
            Err(e) => return error_response(&e),
        };
        drop(req);

        info!("Relaying {} [{}]", target, request_id);
        match self.relay(&target).await {
            Ok(body) => {
                let mut response = Response::new(Full::new(body));
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/html; charset=utf-8"),
                );
                response
            }
            Err(e) => {
                error!("Relay of {} failed: {}", target, e);
                error_response(&e)
            }
        }
    }
}

/// Work out the absolute target URL of an inbound request
///
/// Proxy-style requests carry an absolute URI; origin-form requests are rebuilt from `Host`.
pub fn resolve_target<B>(req: &Request<B>) -> Result<Url> {
    if req.method() == Method::CONNECT {
        return Err(RelayError::InvalidRequest(
            "CONNECT tunneling is not supported".to_string(),
        ));
    }

    let uri: &Uri = req.uri();
    let raw = if uri.scheme().is_some() && uri.authority().is_some() {
        uri.to_string()
    } else {
        let host = req
            .headers()
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                RelayError::InvalidRequest("Request has neither absolute URI nor Host".into())
            })?;
        let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        format!("http://{}{}", host, path)
    };

    let url = Url::parse(&raw)?;
    if url.scheme() != "http" {
        return Err(RelayError::InvalidRequest(format!(
            "Unsupported target scheme: {}",
            url.scheme()
        )));
    }
    Ok(url)
}

/// Create an error response
fn error_response(err: &RelayError) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(err.to_string())));
    *response.status_mut() = err.status_code();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}
