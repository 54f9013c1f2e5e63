use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Timelike, Utc};
use poise::async_trait;
use poise::serenity_prelude as serenity;
use tokio::sync::Mutex;
use tracing::{event, info, Level};

use sotd_common::prelude::*;
use sotd_storage::prelude::*;

pub(crate) type JobResult = anyhow::Result<()>;

#[async_trait]
pub trait Job: Send + Sync {
    async fn run(&self, args: &JobArgs) -> JobResult;
}

pub struct JobArgs {
    pub store: Arc<Mutex<Store>>,
    /// The moment this round of jobs started.
    pub run_time: DateTime<Utc>,
    pub discord_client: Arc<serenity::Http>,
    pub config: SotdConfig,
}

impl JobArgs {
    fn new(store: &Arc<Mutex<Store>>, run_time: DateTime<Utc>, discord_client: &Arc<serenity::Http>, config: SotdConfig) -> Self {
        Self { store: store.clone(), run_time, discord_client: discord_client.clone(), config }
    }
}

/// Time left until the next full minute.
pub(crate) fn until_next_minute(now: DateTime<Utc>) -> std::time::Duration {
    let into_minute = u64::from(now.second()) * 1000 + u64::from(now.timestamp_subsec_millis() % 1000);

    std::time::Duration::from_millis(60_000 - into_minute)
}

/// Run every job once per interval, starting at the next full minute.
///
/// Ticks that are missed (because the process was paused, for instance) are skipped, not caught up.
pub(crate) async fn job_scheduler(
    app_config: &SotdConfig,
    jobs: &[Box<dyn Job>],
    store: Arc<Mutex<Store>>,
    discord_client: Arc<serenity::Http>,
) -> Result<()> {
    if jobs.is_empty() {
        info!("Job queue is empty. Skipping...");
        return Ok(());
    }

    if app_config.job_interval_min != 1 {
        event!(
            Level::WARN,
            job_interval_min = app_config.job_interval_min,
            "Post times are matched per minute, any other interval will skip posts"
        );
    }

    let interval_dur = std::time::Duration::from_secs(u64::from(app_config.job_interval_min.max(1)) * 60);
    let start = tokio::time::Instant::now() + until_next_minute(Utc::now());
    let mut job_interval = tokio::time::interval_at(start, interval_dur);
    job_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        event!(Level::TRACE, "Sleeping until next interval");
        _ = job_interval.tick().await;

        let run_time = Utc::now();
        let job_args = JobArgs::new(&store, run_time, &discord_client, app_config.clone());

        let mut failed_jobs = 0;
        let mut completed_jobs = 0;

        for job in jobs {
            if let Err(e) = job.run(&job_args).await {
                event!(Level::ERROR, "Encountered an error during a background job: {:?}", e);
                failed_jobs += 1;
            } else {
                completed_jobs += 1;
            }
        }

        event!(Level::DEBUG, %run_time, "Attempted all jobs in this run. Completed: {} - Failed: {}", &completed_jobs, &failed_jobs);
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::*;

    use super::*;

    #[rstest]
    #[case(0, 0, 60_000)]
    #[case(30, 0, 30_000)]
    #[case(59, 750, 250)]
    fn waits_until_the_minute_turns(#[case] second: u32, #[case] millis: u32, #[case] expected_ms: u64) {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, second).unwrap()
            + chrono::Duration::milliseconds(millis.into());

        assert_eq!(std::time::Duration::from_millis(expected_ms), until_next_minute(now));
    }
}
