use std::time::Duration;

use leadfit_core::{RequestContext, SourceError};

/// Hard timeout shared by all three source adapters (§4.3: "a 30 s hard timeout").
pub const SOURCE_HARD_TIMEOUT: Duration = Duration::from_secs(30);

/// Run `fut` under `duration`, also racing it against `ctx`'s cancellation
/// token so an exceeded request deadline or a caller abort interrupts the
/// in-flight call rather than letting it run to its own hard timeout (§5(c):
/// "an exceeded deadline interrupts in-flight HTTP work"). Dropping `fut` on
/// the cancelled branch drops the underlying `reqwest` future, which aborts
/// the connection.
pub async fn with_hard_timeout<F, T>(
    duration: Duration,
    ctx: &RequestContext,
    fut: F,
) -> Result<T, SourceError>
where
    F: std::future::Future<Output = Result<T, SourceError>>,
{
    tokio::select! {
        result = tokio::time::timeout(duration, fut) => match result {
            Ok(result) => result,
            Err(_elapsed) => Err(SourceError::Timeout),
        },
        () = ctx.token().cancelled() => Err(SourceError::Timeout),
    }
}

/// Map a `reqwest::Error` into the taxonomy used by [`SourceError`] (§7:
/// `source-transient` covers HTTP 5xx / timeout / network).
pub fn map_reqwest_error(err: &reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Transient(err.to_string())
    }
}

/// Map an HTTP response status to a `SourceError` when it isn't a plain
/// "no match" empty result. 5xx is transient/retryable; 4xx (other than 404,
/// which adapters treat as empty) is treated as transient too since none of
/// these upstream APIs are reproduced here beyond their semantic contract
/// (§6).
pub fn map_status_error(status: reqwest::StatusCode) -> SourceError {
    SourceError::Transient(format!("upstream returned status {status}"))
}
