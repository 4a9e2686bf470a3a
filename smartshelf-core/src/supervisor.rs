//! Restarting wrapper for long-lived loops
//!
//! The shelf runs unattended, so no background loop is allowed to stay dead:
//! an error return or a panic is logged and the loop is started again.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::error::Result;

/// Spawn `factory()` and restart it after `restart_delay` whenever it stops
pub fn spawn_supervised<F, Fut>(name: &'static str, restart_delay: Duration, factory: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match tokio::spawn(factory()).await {
                Ok(Ok(())) => warn!("{} exited, restarting", name),
                Ok(Err(e)) => error!("{} failed: {}, restarting", name, e),
                Err(e) if e.is_panic() => error!("{} panicked, restarting", name),
                Err(e) => {
                    warn!("{} cancelled: {}", name, e);
                    return;
                }
            }
            tokio::time::sleep(restart_delay).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_restarts_after_error_and_panic() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let handle = spawn_supervised("flaky", Duration::from_millis(1), move || {
            let counter = counter.clone();
            async move {
                match counter.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(Error::Internal("first run fails".to_string())),
                    1 => panic!("second run panics"),
                    _ => std::future::pending().await,
                }
            }
        });

        for _ in 0..100 {
            if runs.load(Ordering::SeqCst) >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        handle.abort();
    }
}
