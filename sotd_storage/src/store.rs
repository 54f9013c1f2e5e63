use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::*;

use crate::model::{PostTime, ServerSettings, Song};

/// Everything the bot persists, keyed by the server id as a decimal string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SongDocument {
    #[serde(default)]
    pub servers: BTreeMap<String, ServerSettings>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Error reading song store {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Error writing song store {path}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Song store {path} is not a valid song document")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Error serializing the song document")]
    Serialize(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    AlreadyEmpty,
    Cleared { removed: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninstallOutcome {
    NotInstalled,
    Uninstalled,
}

/// The songs and settings of every server, backed by a single json file.
///
/// The whole document lives in memory. Every mutating method writes the full document back
/// before returning.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    document: SongDocument,
}

fn guild_key(guild_id: u64) -> String {
    guild_id.to_string()
}

impl Store {
    /// Load the store from `path`.
    ///
    /// A missing file or a file that isn't a song document starts an empty store.
    #[instrument(level = "trace", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let document = match Self::read_document(&path) {
            Ok(Some(document)) => document,
            Ok(None) => {
                event!(Level::INFO, "No song store found, starting with an empty one");
                SongDocument::default()
            }
            Err(StoreError::Parse { source, .. }) => {
                event!(Level::WARN, error = %source, "Song store could not be parsed, starting with an empty one");
                SongDocument::default()
            }
            Err(e) => return Err(e),
        };

        event!(Level::DEBUG, servers = document.servers.len(), "Loaded song store");

        Ok(Self { path, document })
    }

    /// Read the document at `path` without falling back, `None` when there is no file.
    pub fn read_document(path: &Path) -> StoreResult<Option<SongDocument>> {
        let display = path.display().to_string();

        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Read { path: display, source }),
        };

        serde_json::from_str(&json)
            .map(Some)
            .map_err(|source| StoreError::Parse { path: display, source })
    }

    /// Write the full document back to disk.
    #[instrument(level = "trace", skip(self), fields(path = %self.path.display()))]
    pub fn save(&self) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(&self.document)?;

        fs::write(&self.path, json).map_err(|source| {
            error!(%source, "Error saving the song store");

            StoreError::Write { path: self.path.display().to_string(), source }
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &SongDocument {
        &self.document
    }

    /// The settings of a server, without creating them.
    pub fn server(&self, guild_id: u64) -> Option<&ServerSettings> {
        self.document.servers.get(&guild_key(guild_id))
    }

    /// The settings of a server, created with defaults on first access.
    pub fn server_mut(&mut self, guild_id: u64) -> &mut ServerSettings {
        self.document.servers.entry(guild_key(guild_id)).or_insert_with(|| {
            event!(Level::DEBUG, guild_id, "Creating default settings for server");
            ServerSettings::default()
        })
    }

    /// All servers whose key is a valid server id.
    pub fn servers(&self) -> impl Iterator<Item = (u64, &ServerSettings)> {
        self.document.servers.iter().filter_map(|(key, settings)| match key.parse() {
            Ok(guild_id) => Some((guild_id, settings)),
            Err(_) => {
                warn!(key, "Skipping server with an invalid id");
                None
            }
        })
    }

    /// Append songs to a server's list. No deduplication happens.
    pub fn add_songs(&mut self, guild_id: u64, songs: impl IntoIterator<Item = Song>) -> StoreResult<()> {
        let server = self.server_mut(guild_id);
        let before = server.songs.len();
        server.songs.extend(songs);

        event!(Level::DEBUG, guild_id, added = server.songs.len() - before, "Added songs");

        self.save()
    }

    /// Empty a server's song list. An already empty list isn't written.
    pub fn clear_songs(&mut self, guild_id: u64) -> StoreResult<ClearOutcome> {
        let server = self.server_mut(guild_id);

        if server.songs.is_empty() {
            return Ok(ClearOutcome::AlreadyEmpty);
        }

        let removed = server.songs.len();
        server.songs.clear();
        self.save()?;

        Ok(ClearOutcome::Cleared { removed })
    }

    /// Remove the first entry equal to `song`. Returns whether anything was removed.
    pub fn remove_song(&mut self, guild_id: u64, song: &Song) -> StoreResult<bool> {
        let Some(server) = self.document.servers.get_mut(&guild_key(guild_id)) else {
            return Ok(false);
        };

        let Some(index) = server.songs.iter().position(|s| s == song) else {
            return Ok(false);
        };

        server.songs.remove(index);
        self.save()?;

        Ok(true)
    }

    /// Replace the roles allowed to change this server's settings.
    pub fn set_config_roles(&mut self, guild_id: u64, roles: Vec<u64>) -> StoreResult<()> {
        self.server_mut(guild_id).config_roles = roles;

        self.save()
    }

    /// Configure when, where and with which role mention the daily song goes out.
    pub fn configure_schedule(
        &mut self,
        guild_id: u64,
        post_time: PostTime,
        timezone: i32,
        channel_id: u64,
        ping_role: u64,
    ) -> StoreResult<()> {
        let server = self.server_mut(guild_id);
        server.daily_time = Some(post_time.to_string());
        server.timezone = timezone;
        server.post_channel = Some(channel_id);
        server.ping_roles = vec![ping_role];

        self.save()
    }

    /// Remove every song and setting of a server.
    pub fn uninstall(&mut self, guild_id: u64) -> StoreResult<UninstallOutcome> {
        if self.document.servers.remove(&guild_key(guild_id)).is_none() {
            return Ok(UninstallOutcome::NotInstalled);
        }

        self.save()?;

        Ok(UninstallOutcome::Uninstalled)
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;
    use tempfile::TempDir;

    use super::*;

    struct TestStore {
        // kept so the directory outlives the store
        _dir: TempDir,
        path: PathBuf,
    }

    impl TestStore {
        fn open(&self) -> Store {
            Store::load(&self.path).unwrap()
        }

        fn on_disk(&self) -> SongDocument {
            Store::read_document(&self.path).unwrap().unwrap_or_default()
        }
    }

    #[fixture]
    fn test_store() -> TestStore {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sotd_data.json");

        TestStore { _dir: dir, path }
    }

    fn songs(count: usize) -> Vec<Song> {
        (0..count).map(|i| Song::new(format!("song {i}"), format!("https://open.spotify.com/track/{i}"))).collect()
    }

    #[rstest]
    fn missing_file_loads_empty(test_store: TestStore) {
        let store = test_store.open();

        assert!(store.document().servers.is_empty());
        assert!(!test_store.path.exists());
    }

    #[rstest]
    fn invalid_json_loads_empty(test_store: TestStore) {
        fs::write(&test_store.path, "{ not json").unwrap();

        let store = test_store.open();

        assert!(store.document().servers.is_empty());
    }

    #[rstest]
    fn server_mut_creates_defaults_once(test_store: TestStore) {
        let mut store = test_store.open();

        assert!(store.server(1).is_none());
        assert_eq!(&ServerSettings::default(), store.server_mut(1));

        store.server_mut(1).timezone = 3;

        assert_eq!(3, store.server_mut(1).timezone);
        assert_eq!(1, store.document().servers.len());
    }

    #[rstest]
    fn reads_the_documented_shape(test_store: TestStore) {
        fs::write(
            &test_store.path,
            r#"{"servers": {"123": {"songs": [{"name": "Song", "url": "https://x"}], "daily_time": "08:00", "timezone": -5, "post_channel": 9, "ping_roles": [4], "config_roles": []}}}"#,
        ).unwrap();

        let store = test_store.open();
        let server = store.server(123).unwrap();

        assert_eq!(vec![Song::new("Song", "https://x")], server.songs);
        assert_eq!(Some("08:00".to_string()), server.daily_time);
        assert_eq!(-5, server.timezone);
        assert_eq!(Some(9), server.post_channel);
        assert_eq!(vec![4], server.ping_roles);
    }

    #[rstest]
    fn add_songs_appends_and_persists(test_store: TestStore) {
        let mut store = test_store.open();

        store.add_songs(5, songs(2)).unwrap();
        store.add_songs(5, songs(2)).unwrap();

        let on_disk = test_store.on_disk();
        assert_eq!(4, on_disk.servers["5"].songs.len());
        assert_eq!(on_disk.servers["5"].songs[0], on_disk.servers["5"].songs[2]);
    }

    #[rstest]
    fn clearing_empty_list_does_not_write(test_store: TestStore) {
        let mut store = test_store.open();

        assert_eq!(ClearOutcome::AlreadyEmpty, store.clear_songs(5).unwrap());
        assert!(!test_store.path.exists());
    }

    #[rstest]
    fn clearing_list_empties_and_persists(test_store: TestStore) {
        let mut store = test_store.open();
        store.add_songs(5, songs(3)).unwrap();

        assert_eq!(ClearOutcome::Cleared { removed: 3 }, store.clear_songs(5).unwrap());
        assert!(test_store.on_disk().servers["5"].songs.is_empty());
    }

    #[rstest]
    fn remove_song_takes_first_match_only(test_store: TestStore) {
        let mut store = test_store.open();
        let mut list = songs(2);
        list.push(list[0].clone());
        store.add_songs(5, list).unwrap();

        assert!(store.remove_song(5, &songs(1)[0]).unwrap());

        let on_disk = test_store.on_disk();
        let remaining = &on_disk.servers["5"].songs;
        assert_eq!(2, remaining.len());
        assert_eq!(songs(2)[1], remaining[0]);
        assert_eq!(songs(1)[0], remaining[1]);
    }

    #[rstest]
    fn remove_song_missing_is_noop(test_store: TestStore) {
        let mut store = test_store.open();

        assert!(!store.remove_song(5, &songs(1)[0]).unwrap());
        assert!(!test_store.path.exists());
    }

    #[rstest]
    fn configure_schedule_sets_everything(test_store: TestStore) {
        let mut store = test_store.open();
        let time: PostTime = "7:05".parse().unwrap();

        store.configure_schedule(5, time, 2, 77, 88).unwrap();

        let on_disk = test_store.on_disk();
        let server = &on_disk.servers["5"];
        assert_eq!(Some("07:05".to_string()), server.daily_time);
        assert_eq!(2, server.timezone);
        assert_eq!(Some(77), server.post_channel);
        assert_eq!(vec![88], server.ping_roles);
    }

    #[rstest]
    fn uninstall_missing_leaves_document(test_store: TestStore) {
        let mut store = test_store.open();
        store.add_songs(5, songs(1)).unwrap();
        let before = test_store.on_disk();

        assert_eq!(UninstallOutcome::NotInstalled, store.uninstall(6).unwrap());
        assert_eq!(before, test_store.on_disk());
    }

    #[rstest]
    fn uninstall_removes_exactly_that_server(test_store: TestStore) {
        let mut store = test_store.open();
        store.add_songs(5, songs(1)).unwrap();
        store.add_songs(6, songs(1)).unwrap();

        assert_eq!(UninstallOutcome::Uninstalled, store.uninstall(5).unwrap());

        let servers: Vec<String> = test_store.on_disk().servers.into_keys().collect();
        assert_eq!(vec!["6".to_string()], servers);
    }

    #[rstest]
    fn servers_skips_invalid_keys(test_store: TestStore) {
        fs::write(&test_store.path, r#"{"servers": {"abc": {}, "12": {}}}"#).unwrap();

        let store = test_store.open();
        let ids: Vec<u64> = store.servers().map(|(id, _)| id).collect();

        assert_eq!(vec![12], ids);
    }
}
