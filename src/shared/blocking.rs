//! Usage: Run blocking work on the tokio blocking pool with a stable label.

use crate::shared::error::{AppError, AppResult};

pub async fn run<T, E>(
    label: &'static str,
    f: impl FnOnce() -> Result<T, E> + Send + 'static,
) -> AppResult<T>
where
    T: Send + 'static,
    E: Into<AppError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(Into::into),
        Err(join_err) => {
            // Panic payloads may echo user content, so only the label is surfaced.
            if join_err.is_panic() {
                tracing::error!(label, "blocking task panicked");
                return Err(AppError::new(
                    "TASK_JOIN",
                    format!("{label}: task panicked"),
                ));
            }

            tracing::warn!(label, "blocking task cancelled");
            Err(AppError::new(
                "TASK_JOIN",
                format!("{label}: task cancelled"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_returns_closure_result() {
        let value = run("test_ok", || -> AppResult<u32> { Ok(7) }).await;
        assert_eq!(value.expect("ok"), 7);
    }

    #[tokio::test]
    async fn run_maps_string_errors() {
        let err = run("test_err", || -> Result<(), String> {
            Err("SYSTEM_ERROR: disk full".to_string())
        })
        .await
        .expect_err("should fail");
        assert_eq!(err.code(), "SYSTEM_ERROR");
    }

    #[tokio::test]
    async fn run_reports_panics_without_payload() {
        let err = run("test_panic", || -> AppResult<()> { panic!("secret payload") })
            .await
            .expect_err("should fail");
        assert_eq!(err.code(), "TASK_JOIN");
        assert!(!err.to_string().contains("secret payload"));
    }
}
