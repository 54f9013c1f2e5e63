//! Music catalog lookups and the expansion of albums and artists into songs.

use std::{fmt, str::FromStr};

use poise::async_trait;
use tracing::{event, field, instrument, Level, Span};

use sotd_storage::prelude::Song;

pub mod spotify;

/// What kind of catalog entry a search looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Track,
    Album,
    Artist,
    Playlist,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("'{0}' is not a search type, use track, album, artist or playlist")]
pub struct InvalidSearchKind(pub String);

impl SearchKind {
    pub const ALL: [SearchKind; 4] = [Self::Track, Self::Album, Self::Artist, Self::Playlist];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Album => "album",
            Self::Artist => "artist",
            Self::Playlist => "playlist",
        }
    }
}

impl FromStr for SearchKind {
    type Err = InvalidSearchKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();

        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lower)
            .ok_or_else(|| InvalidSearchKind(s.to_string()))
    }
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog object with its id, display name and public link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Error talking to the catalog")]
    Http(#[from] reqwest::Error),
    #[error("The catalog answered {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Could not authenticate with the catalog: {0}")]
    Auth(String),
}

/// A searchable music catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// The first match for `query`, if any.
    async fn search(&self, kind: SearchKind, query: &str) -> Result<Option<CatalogItem>, CatalogError>;

    /// Every track on an album.
    async fn album_tracks(&self, album_id: &str) -> Result<Vec<CatalogItem>, CatalogError>;

    /// Every full album of an artist.
    async fn artist_albums(&self, artist_id: &str) -> Result<Vec<CatalogItem>, CatalogError>;
}

/// Look up `query` and turn the first hit into songs.
///
/// Tracks and playlists become a single song. Albums expand to their tracks and artists to the
/// tracks of all their albums, each named `<track> (from <album>)`. `None` means nothing matched.
#[instrument(level = "trace", name = "sotd.catalog.find_songs", skip(catalog), fields(item = field::Empty))]
pub async fn find_songs(
    catalog: &dyn Catalog,
    kind: SearchKind,
    query: &str,
) -> Result<Option<Vec<Song>>, CatalogError> {
    let Some(item) = catalog.search(kind, query).await? else {
        event!(Level::DEBUG, "Nothing found");
        return Ok(None);
    };

    Span::current().record("item", field::display(&item.name));

    let songs = match kind {
        SearchKind::Track | SearchKind::Playlist => vec![Song::new(item.name, item.url)],
        SearchKind::Album => album_songs(catalog, &item).await?,
        SearchKind::Artist => {
            let mut songs = Vec::new();
            for album in catalog.artist_albums(&item.id).await? {
                songs.extend(album_songs(catalog, &album).await?);
            }
            songs
        }
    };

    event!(Level::DEBUG, count = songs.len(), "Expanded search result into songs");

    Ok(Some(songs))
}

async fn album_songs(catalog: &dyn Catalog, album: &CatalogItem) -> Result<Vec<Song>, CatalogError> {
    Ok(catalog
        .album_tracks(&album.id)
        .await?
        .into_iter()
        .map(|track| Song::new(format!("{} (from {})", track.name, album.name), track.url))
        .collect())
}
