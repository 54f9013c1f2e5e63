use anyhow::{Context as _, Result};
use poise::async_trait;
use poise::serenity_prelude as serenity;
use rand::{seq::IndexedRandom, Rng};
use tokio::sync::Mutex;
use tracing::{event, Level};

use sotd_storage::prelude::*;

/// Discord's fuchsia
const ANNOUNCEMENT_COLOUR: u32 = 0xEB459F;

pub(crate) const DAILY_TITLE: &str = "🎶 Song of the Day!";
pub(crate) const TEST_TITLE: &str = "🎶 Test Song of the Day!";

/// Where announcements get sent.
#[async_trait]
pub(crate) trait Channels: Send + Sync {
    /// Whether the channel can be resolved at all.
    async fn reachable(&self, channel_id: u64) -> bool;

    async fn send(&self, channel_id: u64, message: serenity::CreateMessage) -> Result<()>;
}

#[async_trait]
impl Channels for serenity::Http {
    async fn reachable(&self, channel_id: u64) -> bool {
        match serenity::ChannelId::new(channel_id).to_channel(self).await {
            Ok(_) => true,
            Err(error) => {
                event!(Level::DEBUG, channel_id, %error, "Could not resolve channel");
                false
            }
        }
    }

    async fn send(&self, channel_id: u64, message: serenity::CreateMessage) -> Result<()> {
        serenity::ChannelId::new(channel_id).send_message(self, message).await?;

        Ok(())
    }
}

/// A song picked for a server, waiting to be sent to its channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingPost {
    pub guild_id: u64,
    pub channel_id: u64,
    pub mentions: Option<String>,
    pub song: Song,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Sent,
    /// The channel could not be resolved, nothing was sent or removed.
    ChannelUnavailable,
}

impl PendingPost {
    /// Pick a random song for a server, `None` without a channel or songs.
    pub fn pick(guild_id: u64, settings: &ServerSettings, rng: &mut impl Rng) -> Option<Self> {
        let channel_id = settings.post_channel?;
        let song = settings.songs.choose(rng)?.clone();

        Some(Self { guild_id, channel_id, mentions: settings.ping_mentions(), song })
    }

    pub fn announcement(&self, title: &str) -> serenity::CreateMessage {
        let embed = serenity::CreateEmbed::new()
            .title(title)
            .description(format!("**{}**", self.song.name))
            .colour(serenity::Colour::new(ANNOUNCEMENT_COLOUR));

        let message = serenity::CreateMessage::new().embed(embed);

        match &self.mentions {
            Some(mentions) => message.content(mentions),
            None => message,
        }
    }

    pub fn listen_link(&self) -> serenity::CreateMessage {
        serenity::CreateMessage::new().content(format!("🎵 [Listen on Spotify]({}) 🎵", self.song.url))
    }

    /// Send the song to its channel and take it off the server's list.
    ///
    /// The song is removed as soon as the announcement is out. A missing listen link only warns.
    pub async fn deliver(&self, channels: &dyn Channels, store: &Mutex<Store>, title: &str) -> Result<Delivery> {
        if !channels.reachable(self.channel_id).await {
            event!(Level::WARN, guild_id = self.guild_id, channel_id = self.channel_id, "Post channel unavailable, skipping");
            return Ok(Delivery::ChannelUnavailable);
        }

        channels
            .send(self.channel_id, self.announcement(title))
            .await
            .with_context(|| format!("Error sending the song of the day to channel {}", self.channel_id))?;

        let removed = store.lock().await.remove_song(self.guild_id, &self.song)?;
        if !removed {
            event!(Level::WARN, guild_id = self.guild_id, song = ?self.song, "Posted song was no longer on the list");
        }

        if let Err(error) = channels.send(self.channel_id, self.listen_link()).await {
            event!(Level::WARN, guild_id = self.guild_id, "Error sending the song link: {:?}", error);
        }

        Ok(Delivery::Sent)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::bail;
    use rand::{rngs::StdRng, SeedableRng};
    use tempfile::TempDir;

    use super::*;

    /// Accepts the first `accepted` messages, fails every later one.
    struct FakeChannels {
        reachable: bool,
        accepted: usize,
        sent: AtomicUsize,
    }

    impl FakeChannels {
        fn new(reachable: bool, accepted: usize) -> Self {
            Self { reachable, accepted, sent: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl Channels for FakeChannels {
        async fn reachable(&self, _channel_id: u64) -> bool {
            self.reachable
        }

        async fn send(&self, _channel_id: u64, _message: serenity::CreateMessage) -> Result<()> {
            if self.sent.fetch_add(1, Ordering::SeqCst) >= self.accepted {
                bail!("Missing Permissions");
            }

            Ok(())
        }
    }

    fn stored_post() -> (TempDir, Mutex<Store>, PendingPost) {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::load(dir.path().join("sotd_data.json")).unwrap();
        store.configure_schedule(1, "18:30".parse().unwrap(), 0, 9, 3).unwrap();
        store.add_songs(1, [Song::new("only", "https://x/only")]).unwrap();

        let post = PendingPost::pick(1, store.server(1).unwrap(), &mut StdRng::seed_from_u64(7)).unwrap();

        (dir, Mutex::new(store), post)
    }

    #[tokio::test]
    async fn delivered_song_leaves_the_list() {
        let (_dir, store, post) = stored_post();
        let channels = FakeChannels::new(true, 2);

        let delivery = post.deliver(&channels, &store, DAILY_TITLE).await.unwrap();

        assert_eq!(Delivery::Sent, delivery);
        assert_eq!(2, channels.sent.load(Ordering::SeqCst));
        assert!(store.lock().await.server(1).unwrap().songs.is_empty());
    }

    #[tokio::test]
    async fn failed_link_still_removes_announced_song() {
        let (_dir, store, post) = stored_post();
        let channels = FakeChannels::new(true, 1);

        let delivery = post.deliver(&channels, &store, DAILY_TITLE).await.unwrap();

        assert_eq!(Delivery::Sent, delivery);
        assert!(store.lock().await.server(1).unwrap().songs.is_empty());

        let on_disk = Store::load(store.lock().await.path()).unwrap();
        assert!(on_disk.server(1).unwrap().songs.is_empty());
    }

    #[tokio::test]
    async fn failed_announcement_keeps_the_song() {
        let (_dir, store, post) = stored_post();
        let channels = FakeChannels::new(true, 0);

        assert!(post.deliver(&channels, &store, DAILY_TITLE).await.is_err());
        assert_eq!(1, store.lock().await.server(1).unwrap().songs.len());
    }

    #[tokio::test]
    async fn unreachable_channel_sends_nothing() {
        let (_dir, store, post) = stored_post();
        let channels = FakeChannels::new(false, 2);

        let delivery = post.deliver(&channels, &store, DAILY_TITLE).await.unwrap();

        assert_eq!(Delivery::ChannelUnavailable, delivery);
        assert_eq!(0, channels.sent.load(Ordering::SeqCst));
        assert_eq!(1, store.lock().await.server(1).unwrap().songs.len());
    }

    fn settings(songs: usize, channel: Option<u64>) -> ServerSettings {
        ServerSettings {
            songs: (0..songs).map(|i| Song::new(format!("song {i}"), format!("https://x/{i}"))).collect(),
            post_channel: channel,
            ping_roles: vec![3],
            ..Default::default()
        }
    }

    #[test]
    fn picks_a_song_from_the_list() {
        let settings = settings(5, Some(9));
        let mut rng = StdRng::seed_from_u64(7);

        let post = PendingPost::pick(1, &settings, &mut rng).unwrap();

        assert_eq!(9, post.channel_id);
        assert_eq!(Some("<@&3>".to_string()), post.mentions);
        assert!(settings.songs.contains(&post.song));
    }

    #[test]
    fn nothing_to_pick_from_empty_list() {
        let mut rng = StdRng::seed_from_u64(7);

        assert!(PendingPost::pick(1, &settings(0, Some(9)), &mut rng).is_none());
    }

    #[test]
    fn nothing_to_pick_without_channel() {
        let mut rng = StdRng::seed_from_u64(7);

        assert!(PendingPost::pick(1, &settings(3, None), &mut rng).is_none());
    }

    #[test]
    fn every_song_can_be_picked() {
        let settings = settings(3, Some(9));
        let mut rng = StdRng::seed_from_u64(1);

        let picked: std::collections::HashSet<String> = (0..200)
            .filter_map(|_| PendingPost::pick(1, &settings, &mut rng))
            .map(|post| post.song.name)
            .collect();

        assert_eq!(3, picked.len());
    }
}
