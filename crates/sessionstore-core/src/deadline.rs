//! Deadline-bound execution of store operations.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::{SessionError, SessionResult};

/// Run `fut` until `deadline`. On expiry the future is dropped, which
/// abandons its backing-store work, and `DeadlineExceeded` is returned.
/// A deadline that has already passed never starts `fut`.
pub async fn with_deadline<T, F>(deadline: Instant, fut: F) -> SessionResult<T>
where
    F: Future<Output = SessionResult<T>>,
{
    if Instant::now() >= deadline {
        return Err(SessionError::DeadlineExceeded);
    }
    tokio::time::timeout_at(deadline, fut)
        .await
        .map_err(|_| SessionError::DeadlineExceeded)?
}

/// Like [`with_deadline`], relative to now. `None` means no limit.
pub async fn with_timeout<T, F>(timeout: Option<Duration>, fut: F) -> SessionResult<T>
where
    F: Future<Output = SessionResult<T>>,
{
    match timeout {
        Some(limit) => with_deadline(Instant::now() + limit, fut).await,
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_before_deadline() {
        let value = with_timeout(Some(Duration::from_secs(5)), async { Ok(3) })
            .await
            .unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn expired_deadline_is_not_a_domain_error() {
        let result: SessionResult<()> = with_deadline(
            Instant::now() + Duration::from_millis(10),
            std::future::pending(),
        )
        .await;
        assert!(matches!(result, Err(SessionError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn past_deadline_skips_ready_work() {
        let result = with_timeout(Some(Duration::ZERO), async { Ok(1) }).await;
        assert!(matches!(result, Err(SessionError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn inner_errors_pass_through() {
        let result: SessionResult<()> = with_timeout(None, async {
            Err(SessionError::NotFound {
                entity: "session".into(),
                id: "x".into(),
            })
        })
        .await;
        assert!(result.unwrap_err().is_not_found());
    }
}
