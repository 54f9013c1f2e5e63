use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use poise::async_trait;
use tracing::{debug_span, event, Instrument, Level};

use sotd_storage::prelude::*;

use crate::discord::announcement::{Delivery, PendingPost, DAILY_TITLE};
use crate::job::{Job, JobArgs, JobResult};

/// Hands out each wall clock minute once.
///
/// Ticks land on the minute boundary, so a small backwards clock step can make two ticks read
/// the same minute. Only the first one gets through, as does nothing at or before the last
/// claimed minute.
#[derive(Debug)]
pub(crate) struct MinuteGate {
    last_claimed: AtomicI64,
}

impl MinuteGate {
    pub fn new() -> Self {
        Self { last_claimed: AtomicI64::new(i64::MIN) }
    }

    /// Claim the minute `now` falls in, `false` when it was already handed out.
    pub fn claim(&self, now: &DateTime<Utc>) -> bool {
        let minute = now.timestamp().div_euclid(60);

        self.last_claimed.fetch_max(minute, Ordering::AcqRel) < minute
    }
}

struct DailySongJob {
    gate: MinuteGate,
}

/// Pick a song for every server whose post time is `now`.
pub(crate) fn due_posts(store: &Store, now: &DateTime<Utc>, apply_offset: bool) -> Vec<PendingPost> {
    let mut rng = rand::rng();

    store
        .servers()
        .filter(|(_, settings)| settings.is_due_at(now, apply_offset))
        .filter_map(|(guild_id, settings)| {
            let post = PendingPost::pick(guild_id, settings, &mut rng);
            if post.is_none() {
                event!(Level::DEBUG, guild_id, "Song list is empty, nothing to post");
            }
            post
        })
        .collect()
}

#[async_trait]
impl Job for DailySongJob {
    async fn run(&self, args: &JobArgs) -> JobResult {
        let span = debug_span!("sotd.jobs.daily_song", run_time = %args.run_time);

        async move {
            if !self.gate.claim(&args.run_time) {
                event!(Level::WARN, "This minute was already handled, skipping");
                return Ok(());
            }

            let posts = {
                let store = args.store.lock().await;
                due_posts(&store, &args.run_time, args.config.apply_timezone_offset)
            };

            event!(Level::DEBUG, "Found {} servers to post to", posts.len());

            for post in posts {
                match post.deliver(args.discord_client.as_ref(), &args.store, DAILY_TITLE).await {
                    Ok(Delivery::Sent) => {
                        event!(Level::INFO, guild_id = post.guild_id, song = %post.song.name, "Posted the song of the day");
                    }
                    Ok(Delivery::ChannelUnavailable) => {}
                    Err(error) => {
                        event!(Level::ERROR, guild_id = post.guild_id, "Error posting the song of the day: {:?}", error);
                    }
                }
            }

            Ok(())
        }
        .instrument(span)
        .await
    }
}

pub fn daily_song() -> Box<dyn Job> {
    Box::new(DailySongJob { gate: MinuteGate::new() })
}
