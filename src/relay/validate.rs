//! Response validation for forwarded pages and calibration probes

use std::ops::RangeInclusive;
use std::time::Duration;

use bytes::Bytes;
use hyper::StatusCode;
use thiserror::Error;

use crate::error::{RelayError, Result};
use crate::relay::client::GateResponse;

/// Margin subtracted from the operational timeout for the soft latency check
pub const SOFT_TIMEOUT_MARGIN: Duration = Duration::from_millis(100);

/// Plausible textual length of an IPv4 address
pub const PROBE_BODY_LEN: RangeInclusive<usize> = 7..=15;

const PAGE_MARKERS: [&[u8]; 2] = [b"</html>", b"</body>"];

/// Why an outcome counted as a failure for its gate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("body read failed: {0}")]
    BodyRead(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("too slow: {elapsed_ms}ms exceeds soft limit of {limit_ms}ms")]
    TooSlow { elapsed_ms: u64, limit_ms: u64 },

    #[error("empty body")]
    EmptyBody,

    #[error("incomplete page")]
    IncompletePage,

    #[error("probe body length {0} outside 7..=15")]
    ProbeLength(usize),
}

/// Validate a forwarded page; returns the body to answer the caller with
pub fn validate_page(
    outcome: &Result<GateResponse>,
    elapsed: Duration,
    request_timeout: Duration,
) -> std::result::Result<Bytes, Rejection> {
    let response = accepted_response(outcome)?;

    let limit = request_timeout.saturating_sub(SOFT_TIMEOUT_MARGIN);
    if elapsed > limit {
        return Err(Rejection::TooSlow {
            elapsed_ms: elapsed.as_millis() as u64,
            limit_ms: limit.as_millis() as u64,
        });
    }

    if response.body.trim_ascii().is_empty() {
        return Err(Rejection::EmptyBody);
    }

    if !PAGE_MARKERS
        .iter()
        .all(|marker| contains(&response.body, marker))
    {
        return Err(Rejection::IncompletePage);
    }

    Ok(response.body.clone())
}

/// Validate a calibration probe answer from the IP echo responder
pub fn validate_probe(outcome: &Result<GateResponse>) -> std::result::Result<(), Rejection> {
    let response = accepted_response(outcome)?;

    if response.body.is_empty() {
        return Err(Rejection::EmptyBody);
    }
    if !PROBE_BODY_LEN.contains(&response.body.len()) {
        return Err(Rejection::ProbeLength(response.body.len()));
    }
    Ok(())
}

fn accepted_response(
    outcome: &Result<GateResponse>,
) -> std::result::Result<&GateResponse, Rejection> {
    let response = match outcome {
        Ok(response) => response,
        Err(RelayError::BodyRead(e)) => return Err(Rejection::BodyRead(e.clone())),
        Err(e) => return Err(Rejection::Transport(e.to_string())),
    };

    if response.status != StatusCode::OK {
        return Err(Rejection::Status(response.status.as_u16()));
    }
    Ok(response)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn ok(status: u16, body: &str) -> Result<GateResponse> {
        Ok(GateResponse {
            status: StatusCode::from_u16(status).unwrap(),
            body: Bytes::from(body.to_string()),
        })
    }

    fn fast() -> Duration {
        Duration::from_millis(50)
    }

    #[test]
    fn test_complete_page_is_valid() {
        let body = "<html><body>content</body></html>";
        let validated = validate_page(&ok(200, body), fast(), TIMEOUT).unwrap();
        assert_eq!(&validated[..], body.as_bytes());
    }

    #[test]
    fn test_page_missing_body_close_is_rejected() {
        let outcome = ok(200, "<html><body>cut off</html>");
        assert_eq!(
            validate_page(&outcome, fast(), TIMEOUT),
            Err(Rejection::IncompletePage)
        );
    }

    #[test]
    fn test_page_missing_html_close_is_rejected() {
        let outcome = ok(200, "<html><body>cut off</body>");
        assert_eq!(
            validate_page(&outcome, fast(), TIMEOUT),
            Err(Rejection::IncompletePage)
        );
    }

    #[test]
    fn test_non_200_is_rejected() {
        let outcome = ok(503, "<html><body>busy</body></html>");
        assert_eq!(
            validate_page(&outcome, fast(), TIMEOUT),
            Err(Rejection::Status(503))
        );
    }

    #[test]
    fn test_whitespace_body_is_rejected() {
        assert_eq!(
            validate_page(&ok(200, " \r\n\t "), fast(), TIMEOUT),
            Err(Rejection::EmptyBody)
        );
    }

    #[test]
    fn test_slow_complete_page_is_rejected() {
        let outcome = ok(200, "<html><body>slow</body></html>");

        let at_limit = TIMEOUT - SOFT_TIMEOUT_MARGIN;
        assert!(validate_page(&outcome, at_limit, TIMEOUT).is_ok());

        let over = at_limit + Duration::from_millis(1);
        assert_eq!(
            validate_page(&outcome, over, TIMEOUT),
            Err(Rejection::TooSlow {
                elapsed_ms: 9901,
                limit_ms: 9900
            })
        );
    }

    #[test]
    fn test_transport_and_read_errors_are_rejected() {
        let outcome: Result<GateResponse> = Err(RelayError::Timeout);
        assert!(matches!(
            validate_page(&outcome, fast(), TIMEOUT),
            Err(Rejection::Transport(_))
        ));

        let outcome: Result<GateResponse> = Err(RelayError::BodyRead("reset".into()));
        assert_eq!(
            validate_page(&outcome, fast(), TIMEOUT),
            Err(Rejection::BodyRead("reset".into()))
        );
    }

    #[test]
    fn test_probe_length_bounds() {
        assert!(validate_probe(&ok(200, "1.2.3.4")).is_ok());
        assert!(validate_probe(&ok(200, "111.222.233.244")).is_ok());
        assert_eq!(
            validate_probe(&ok(200, "1.2.3.")),
            Err(Rejection::ProbeLength(6))
        );
        assert_eq!(
            validate_probe(&ok(200, "1111.222.233.244")),
            Err(Rejection::ProbeLength(16))
        );
    }

    #[test]
    fn test_probe_rejects_empty_and_bad_status() {
        assert_eq!(validate_probe(&ok(200, "")), Err(Rejection::EmptyBody));
        assert_eq!(
            validate_probe(&ok(403, "1.2.3.4")),
            Err(Rejection::Status(403))
        );
    }
}
