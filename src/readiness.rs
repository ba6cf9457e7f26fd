use std::{future::Future, time::Duration};

use tracing::{debug, info, warn};

use crate::backend::BackingService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready { attempts: u32 },
    TimedOut { attempts: u32 },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready { .. })
    }
}

/// Which check answered a readiness attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Listing,
    Version(String),
    Unavailable,
}

/// One readiness attempt: the listing call first, the version endpoint only if it fails.
pub async fn check_once<S>(service: &S) -> CheckOutcome
where
    S: BackingService + ?Sized,
{
    match service.list_present().await {
        Ok(_) => CheckOutcome::Listing,
        Err(list_err) => match service.version().await {
            Ok(version) => CheckOutcome::Version(version),
            Err(version_err) => {
                debug!(
                    listing = %list_err,
                    version = %version_err,
                    "backing service not answering yet"
                );
                CheckOutcome::Unavailable
            }
        },
    }
}

/// Polls `check` at a fixed interval until it succeeds or `max_attempts` are spent.
///
/// `max_attempts` of zero is treated as one attempt.
pub async fn wait_until_ready<F, Fut>(
    max_attempts: u32,
    interval: Duration,
    mut check: F,
) -> Readiness
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let max_attempts = max_attempts.max(1);

    for attempt in 1..=max_attempts {
        if check().await {
            info!(attempt, "backing service is ready");
            return Readiness::Ready { attempts: attempt };
        }
        if attempt < max_attempts {
            debug!(attempt, max_attempts, "waiting for backing service");
            tokio::time::sleep(interval).await;
        }
    }

    warn!(attempts = max_attempts, "backing service did not become ready");
    Readiness::TimedOut {
        attempts: max_attempts,
    }
}

/// `wait_until_ready` driven by [`check_once`] against a live service.
pub async fn wait_for_service<S>(service: &S, max_attempts: u32, interval: Duration) -> Readiness
where
    S: BackingService + ?Sized,
{
    wait_until_ready(max_attempts, interval, || async move {
        match check_once(service).await {
            CheckOutcome::Listing => true,
            CheckOutcome::Version(version) => {
                info!(%version, "listing unavailable, version endpoint answered");
                true
            }
            CheckOutcome::Unavailable => false,
        }
    })
    .await
}
