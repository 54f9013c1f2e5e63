//! Spotify Web API catalog, authenticated with the client credentials flow.

use chrono::{DateTime, Duration, Utc};
use poise::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use tokio::sync::RwLock;
use tracing::{debug, event, instrument, warn, Level};

use sotd_common::prelude::SotdConfig;

use super::{Catalog, CatalogError, CatalogItem, SearchKind};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";
/// Page size for album and track listings, the maximum the API allows.
const LISTING_LIMIT: &str = "50";
const SEARCH_LIMIT: &str = "10";

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Tokens are refreshed a minute before they actually expire.
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(60) < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    #[serde(default)]
    spotify: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyObject {
    id: String,
    name: String,
    #[serde(default)]
    external_urls: ExternalUrls,
}

impl From<SpotifyObject> for CatalogItem {
    fn from(value: SpotifyObject) -> Self {
        Self { id: value.id, name: value.name, url: value.external_urls.spotify }
    }
}

/// One page of a listing. Items can be `null` for objects that are no longer available.
#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default)]
    items: Vec<Option<SpotifyObject>>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Option<Paging>,
    albums: Option<Paging>,
    artists: Option<Paging>,
    playlists: Option<Paging>,
}

impl SearchResponse {
    fn first(self, kind: SearchKind) -> Option<CatalogItem> {
        let paging = match kind {
            SearchKind::Track => self.tracks,
            SearchKind::Album => self.albums,
            SearchKind::Artist => self.artists,
            SearchKind::Playlist => self.playlists,
        }?;

        paging.items.into_iter().flatten().next().map(CatalogItem::from)
    }
}

/// Catalog backed by the Spotify Web API.
pub struct SpotifyClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: RwLock<Option<AccessToken>>,
}

impl SpotifyClient {
    pub fn new(config: &SotdConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: config.spotify_client_id.clone(),
            client_secret: config.spotify_client_secret.clone(),
            token: RwLock::new(None),
        }
    }

    /// Make sure the client credentials are accepted.
    pub async fn check_credentials(&self) -> Result<(), CatalogError> {
        self.access_token().await.map(|_| ())
    }

    /// A valid bearer token, requesting a new one when the cached token is about to expire.
    async fn access_token(&self) -> Result<String, CatalogError> {
        {
            let token = self.token.read().await;
            if let Some(token) = token.as_ref().filter(|t| t.is_fresh(Utc::now())) {
                return Ok(token.value.clone());
            }
        }

        let mut token = self.token.write().await;
        if let Some(token) = token.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.value.clone());
        }

        let fresh = self.request_token().await?;
        let value = fresh.value.clone();
        *token = Some(fresh);

        Ok(value)
    }

    #[instrument(level = "debug", skip(self))]
    async fn request_token(&self) -> Result<AccessToken, CatalogError> {
        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(%status, body = %text, "Spotify token request failed");

            return Err(CatalogError::Auth(format!("{status}: {text}")));
        }

        let token: TokenResponse = response.json().await?;
        debug!(expires_in = token.expires_in, "Received a new Spotify access token");

        Ok(AccessToken {
            value: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T, CatalogError> {
        let token = self.access_token().await?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(%status, url, "Spotify API error");

            return Err(CatalogError::Api { status: status.as_u16(), message });
        }

        Ok(response.json().await?)
    }

    /// Fetch every page of a listing by following the `next` links.
    async fn list_all(&self, url: &str, query: &[(&str, &str)]) -> Result<Vec<CatalogItem>, CatalogError> {
        let mut page: Paging = self.get_json(url, query).await?;
        let mut items: Vec<CatalogItem> = Vec::new();

        loop {
            items.extend(page.items.into_iter().flatten().map(CatalogItem::from));

            match page.next {
                // the next link already carries the query
                Some(next) => page = self.get_json(&next, &[]).await?,
                None => break,
            }
        }

        event!(Level::TRACE, count = items.len(), url, "Fetched listing");

        Ok(items)
    }
}

#[async_trait]
impl Catalog for SpotifyClient {
    #[instrument(level = "debug", skip(self))]
    async fn search(&self, kind: SearchKind, query: &str) -> Result<Option<CatalogItem>, CatalogError> {
        let url = format!("{API_BASE}/search");
        let response: SearchResponse = self
            .get_json(&url, &[("q", query), ("type", kind.as_str()), ("limit", SEARCH_LIMIT)])
            .await?;

        Ok(response.first(kind))
    }

    async fn album_tracks(&self, album_id: &str) -> Result<Vec<CatalogItem>, CatalogError> {
        let url = format!("{API_BASE}/albums/{album_id}/tracks");

        self.list_all(&url, &[("limit", LISTING_LIMIT)]).await
    }

    async fn artist_albums(&self, artist_id: &str) -> Result<Vec<CatalogItem>, CatalogError> {
        let url = format!("{API_BASE}/artists/{artist_id}/albums");

        self.list_all(&url, &[("include_groups", "album"), ("limit", LISTING_LIMIT)]).await
    }
}
