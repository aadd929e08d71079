use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::{
    app_error::AppError,
    use_cases::{
        activation::ActivationUseCases,
        verification::{CheckTrigger, RetryOutcome, VerificationUseCases},
    },
};

/// Records picked up per tick and per pass.
const POLL_BATCH_SIZE: i64 = 100;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    pub checked: usize,
    pub succeeded: usize,
}

pub async fn run_domain_verification_loop(
    verification: Arc<VerificationUseCases>,
    activation: Arc<ActivationUseCases>,
    poll_every: Duration,
    concurrency: usize,
) {
    let mut ticker = interval(poll_every);
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));

    info!(
        "Domain verification service started (polling every {}s)",
        poll_every.as_secs()
    );

    loop {
        ticker.tick().await;

        let verified = run_verification_pass(&verification, &permits).await;
        let activated = run_activation_pass(&activation, &permits).await;

        if verified.checked > 0 || activated.checked > 0 {
            info!(
                checked = verified.checked,
                verified = verified.succeeded,
                activation_checked = activated.checked,
                activated = activated.succeeded,
                "Verification poll finished"
            );
        }
    }
}

/// Probe every record whose cooldown has passed and that still has attempts
/// left. Background checks do not spend those attempts. Expired challenges are
/// marked expired by the check itself.
pub async fn run_verification_pass(
    verification: &Arc<VerificationUseCases>,
    permits: &Arc<Semaphore>,
) -> PassSummary {
    let now = Utc::now().naive_utc();
    let due = match verification.due_for_check(now, POLL_BATCH_SIZE).await {
        Ok(records) => records,
        Err(e) => {
            error!(error = %e, "Failed to fetch records due for check");
            return PassSummary::default();
        }
    };

    let mut set = JoinSet::new();
    for record in due {
        let verification = Arc::clone(verification);
        let permits = Arc::clone(permits);
        set.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return false;
            };
            let hostname = record.hostname.clone();
            match verification
                .check_record(record, now, CheckTrigger::Poller)
                .await
            {
                Ok(RetryOutcome::Verified(_)) => true,
                Ok(RetryOutcome::Failed(_)) => false,
                Err(AppError::ChallengeExpired { .. }) => {
                    debug!(hostname = %hostname, "Challenge expired during poll");
                    false
                }
                Err(AppError::Throttled { .. }) | Err(AppError::ConcurrentModification) => false,
                Err(e) => {
                    warn!(hostname = %hostname, error = %e, "Background DNS check failed");
                    false
                }
            }
        });
    }

    collect(set).await
}

/// Ask the provisioner about verified records that are not live yet.
pub async fn run_activation_pass(
    activation: &Arc<ActivationUseCases>,
    permits: &Arc<Semaphore>,
) -> PassSummary {
    let waiting = match activation.awaiting_activation(POLL_BATCH_SIZE).await {
        Ok(records) => records,
        Err(e) => {
            error!(error = %e, "Failed to fetch records awaiting activation");
            return PassSummary::default();
        }
    };

    let now = Utc::now().naive_utc();
    let mut set = JoinSet::new();
    for record in waiting {
        let activation = Arc::clone(activation);
        let permits = Arc::clone(permits);
        set.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return false;
            };
            let hostname = record.hostname.clone();
            match activation.try_activate(record, now).await {
                Ok(check) => check.activated,
                Err(AppError::ConcurrentModification) => false,
                Err(e) => {
                    warn!(hostname = %hostname, error = %e, "Background activation check failed");
                    false
                }
            }
        });
    }

    collect(set).await
}

async fn collect(mut set: JoinSet<bool>) -> PassSummary {
    let mut summary = PassSummary::default();
    while let Some(joined) = set.join_next().await {
        summary.checked += 1;
        match joined {
            Ok(true) => summary.succeeded += 1,
            Ok(false) => {}
            Err(e) => error!(error = %e, "Verification task panicked"),
        }
    }
    summary
}
