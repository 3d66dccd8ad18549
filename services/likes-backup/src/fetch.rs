//!
//! src/fetch.rs  Andrew Belles  Oct 17th, 2026
//!
//! Defines the client for the Yandex Music endpoints that list an owner's
//! liked tracks or one of their playlists, handling retries and turning
//! the payloads into tracks
//!

use std::time::Duration;

use async_trait::async_trait;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use reqwest::{Client, header, redirect, Proxy, RequestBuilder};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::config::{HttpConfig, RetryConfig, YandexConfig};
use crate::errors::BackupError;
use crate::types::{Track, observed_now};

/// Anything that can list the owner's current tracked collection.
///
/// An empty collection is `Ok(vec![])`. An error means the collection could
/// not be retrieved at all.
#[async_trait]
pub trait TrackSource: Send + Sync {
    async fn fetch_tracks(&self, owner: &str) -> Result<Vec<Track>, BackupError>;
}

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

fn yandex_client(http: &HttpConfig, cfg: &YandexConfig) -> Result<Client, BackupError> {
    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    if let Some(token) = &cfg.token {
        let mut value = header::HeaderValue::from_str(&format!("OAuth {token}"))
            .map_err(|e| BackupError::Config(format!("invalid token header {e}")))?;
        value.set_sensitive(true);
        h.insert(header::AUTHORIZATION, value);
    }

    // only the configured proxy is used, HTTP(S)_PROXY from the env is ignored
    let builder = match &cfg.proxy {
        Some(proxy) => {
            let proxy = Proxy::all(proxy.clone())
                .map_err(|e| BackupError::Config(format!("invalid proxy {e}")))?;
            client_helper(http).default_headers(h).proxy(proxy)
        },
        None => client_helper(http).default_headers(h).no_proxy()
    };

    builder.build()
        .map_err(|e| BackupError::Config(format!("build client: {e}")))
}

/// Exponential wait for http_with_retry, optionally with random jitter
fn generate_backoff(base: Duration, attempt: u8, jitter: bool, rng: &mut SmallRng) -> Duration {
    let exp = base * (1_u32 << attempt.min(6));
    if jitter {
        exp + Duration::from_millis(rng.gen_range(50..=200))
    } else {
        exp
    }
}

async fn http_with_retry(
    request: RequestBuilder,
    retry: &RetryConfig
) -> Result<Value, BackupError> {
    let mut rng = SmallRng::from_entropy();
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1_u8;
    loop {
        let response = request.try_clone()
            .ok_or_else(|| BackupError::RemoteFetchFailed(
                "non-cloneable request".to_string()
            ))?
            .send()
            .await;
        match response {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return Ok(resp.json::<Value>().await?);
                }
                let body = resp.text().await.unwrap_or_default();
                let retryable = retry.retryable_statuses.contains(&status.as_u16());
                if !retryable || attempt >= max_attempts {
                    return Err(BackupError::RemoteFetchFailed(format!(
                        "status {status} after {attempt} attempts: {}",
                        body.chars().take(200).collect::<String>()
                    )));
                }
                let backoff = generate_backoff(
                    retry.base_backoff, attempt - 1, retry.jitter, &mut rng);
                warn!(status = %status, backoff = ?backoff.as_millis(), "http.retry");
                sleep(backoff).await;
            },
            Err(e) => {
                if attempt >= max_attempts {
                    return Err(e.into());
                }
                let backoff = generate_backoff(
                    retry.base_backoff, attempt - 1, retry.jitter, &mut rng);
                warn!(error = %e, backoff = ?backoff.as_millis(), "http.retry.error");
                sleep(backoff).await;
            }
        }
        attempt += 1;
    }
}

/// Ids come back as strings or numbers depending on the endpoint
fn id_string(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None
    }
}

/// `id[:albumId]` keys of the short track entries in a likes or playlist body
fn short_track_keys(entries: Option<&Value>) -> Vec<String> {
    let Some(entries) = entries.and_then(Value::as_array) else {
        return Vec::new();
    };

    entries.iter()
        .filter_map(|entry| {
            let id = id_string(entry.get("id"))?;
            Some(match id_string(entry.get("albumId")) {
                Some(album) => format!("{id}:{album}"),
                None => id
            })
        })
        .collect()
}

/// Pulls `id[:albumId]` keys out of a likes response.
pub fn parse_like_ids(value: &Value) -> Result<Vec<String>, BackupError> {
    let library = value.pointer("/result/library")
        .filter(|v| v.is_object())
        .ok_or_else(|| BackupError::RemoteFetchFailed(
            "likes response has no result.library".to_string()
        ))?;

    Ok(short_track_keys(library.get("tracks")))
}

/// Pulls `id[:albumId]` keys out of a playlist response. Multi-kind lookups
/// answer with a list, the first playlist is used.
pub fn parse_playlist_ids(value: &Value) -> Result<Vec<String>, BackupError> {
    let playlist = match value.get("result") {
        Some(Value::Array(list)) => list.first(),
        other => other
    };
    let playlist = playlist
        .filter(|v| v.is_object())
        .ok_or_else(|| BackupError::RemoteFetchFailed(
            "playlist response has no result".to_string()
        ))?;

    Ok(short_track_keys(playlist.get("tracks")))
}

/// Turns a /tracks response into tracks stamped with `fetched_at`.
pub fn parse_tracks(
    value: &Value,
    fetched_at: chrono::NaiveDateTime
) -> Result<Vec<Track>, BackupError> {
    let items = value.get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| BackupError::RemoteFetchFailed(
            "tracks response has no result list".to_string()
        ))?;

    let mut tracks = Vec::with_capacity(items.len());
    for item in items {
        let Some(id) = id_string(item.get("id")) else {
            warn!(item = %item, "fetch.track.missing_id");
            continue;
        };
        let artist = item.get("artists")
            .and_then(Value::as_array)
            .map(|arr| arr.iter()
                .filter_map(|a| a.get("name").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(", "))
            .unwrap_or_default();
        let title = item.get("title")
            .and_then(Value::as_str)
            .unwrap_or_default();
        // no availability flag means the service can't play it
        let available = item.get("available")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        tracks.push(Track::new(id, artist, title, fetched_at, !available));
    }
    Ok(tracks)
}

#[derive(Clone, Debug)]
pub struct YandexMusicClient {
    pub http: Client,
    pub cfg: YandexConfig,
    pub retry: RetryConfig
}

impl YandexMusicClient {
    pub fn new(http_config: &HttpConfig, cfg: &YandexConfig) -> Result<Self, BackupError> {
        let http = yandex_client(http_config, cfg)?;
        Ok( Self {
            http,
            cfg: cfg.clone(),
            retry: http_config.retry.clone()
        })
    }

    /// Appends `segments` to the api base, each one percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackupError> {
        let mut url = self.cfg.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| BackupError::Config(
                format!("api base {} cannot take a path", self.cfg.api_base)
            ))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET /users/{owner}/likes/tracks
    pub fn likes_request(&self, owner: &str) -> Result<RequestBuilder, BackupError> {
        let url = self.endpoint(&["users", owner, "likes", "tracks"])?;
        Ok(self.http.get(url))
    }

    /// GET /users/{owner}/playlists/{kind}
    pub fn playlist_request(&self, owner: &str, kind: &str) -> Result<RequestBuilder, BackupError> {
        let url = self.endpoint(&["users", owner, "playlists", kind])?;
        Ok(self.http.get(url))
    }

    /// POST /tracks  track-ids=...
    pub fn tracks_request(&self, ids: &[String]) -> Result<RequestBuilder, BackupError> {
        let url = self.endpoint(&["tracks"])?;
        Ok(self.http.post(url).form(&[
            ("track-ids", ids.join(",")),
            ("with-positions", "true".to_string())
        ]))
    }

    /// Track keys of the tracked collection, the playlist when one is set
    async fn collection_ids(&self, owner: &str) -> Result<Vec<String>, BackupError> {
        match &self.cfg.playlist {
            Some(kind) => {
                let value = http_with_retry(
                    self.playlist_request(owner, kind)?, &self.retry).await?;
                let ids = parse_playlist_ids(&value)?;
                debug!(owner, kind = %kind, count = ids.len(), "fetch.playlist");
                Ok(ids)
            },
            None => {
                let value = http_with_retry(self.likes_request(owner)?, &self.retry).await?;
                let ids = parse_like_ids(&value)?;
                debug!(owner, count = ids.len(), "fetch.likes");
                Ok(ids)
            }
        }
    }
}

#[async_trait]
impl TrackSource for YandexMusicClient {
    async fn fetch_tracks(&self, owner: &str) -> Result<Vec<Track>, BackupError> {
        let ids = self.collection_ids(owner).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let fetched_at = observed_now();
        let mut tracks = Vec::with_capacity(ids.len());
        for batch in ids.chunks(self.cfg.batch_size.max(1)) {
            let value = http_with_retry(self.tracks_request(batch)?, &self.retry).await?;
            tracks.extend(parse_tracks(&value, fetched_at)?);
        }

        debug!(owner, count = tracks.len(), "fetch.tracks");
        Ok(tracks)
    }
}
