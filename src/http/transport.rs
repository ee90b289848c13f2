//! Deadline- and cancellation-aware wrapper around a single HTTP exchange.
//!
//! `reqwest` enforces its own per-request timeout but offers no way to abort an
//! in-flight request from the outside. [`send_with_deadline`] races the
//! request against a deadline timer and the caller's cancellation token. The
//! first of the three to finish produces the one and only [`SendOutcome`]; the
//! others are dropped, and dropping the in-flight request future aborts the
//! underlying connection.

use std::time::Duration;

use reqwest::{Client, Request, Response};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// How an exchange ended.
#[derive(Debug)]
pub enum SendOutcome {
    /// Response headers were received.
    Completed(Response),
    /// The client reported an error before a response arrived.
    Failed(reqwest::Error),
    /// The deadline elapsed first; the request was aborted.
    TimedOut,
    /// The caller cancelled first; the request was aborted.
    Cancelled,
}

/// Sends `request`, bounded by `timeout` and `cancellation`.
///
/// Cancellation wins ties, so a request whose token is already cancelled is
/// never sent.
#[instrument(level = "debug", skip_all, fields(url = %request.url(), timeout_ms = timeout.as_millis()))]
pub async fn send_with_deadline(
    client: &Client,
    request: Request,
    timeout: Duration,
    cancellation: &CancellationToken,
) -> SendOutcome {
    let in_flight = client.execute(request);

    let outcome = tokio::select! {
        biased;
        () = cancellation.cancelled() => SendOutcome::Cancelled,
        result = in_flight => match result {
            Ok(response) => SendOutcome::Completed(response),
            Err(error) => SendOutcome::Failed(error),
        },
        () = tokio::time::sleep(timeout) => SendOutcome::TimedOut,
    };

    match &outcome {
        SendOutcome::Completed(response) => {
            debug!(status = response.status().as_u16(), "response received");
        }
        SendOutcome::Failed(error) => debug!(error = %error, "request failed"),
        SendOutcome::TimedOut => debug!("deadline elapsed, request aborted"),
        SendOutcome::Cancelled => debug!("cancelled, request aborted"),
    }
    outcome
}
