use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, USER_AGENT};
use serde::{Deserialize, Deserializer};
use tracing::{debug, info};

use crate::fetch::{FetchError, MediaFetcher};
use crate::media::{AlbumResource, MediaDescriptor};

const API_BASE_URL: &str = "https://i.instagram.com/api/v1";

// instagrapi's default mobile user agent; the private API rejects
// requests without a plausible one.
const DEFAULT_USER_AGENT: &str =
    "Instagram 269.0.0.18.75 Android (26/8.0.0; 480dpi; 1080x1920; OnePlus; 6T Dev; devitron; qcom; en_US; 314665256)";

/// Saved session settings, instagrapi-compatible JSON produced by a prior
/// interactive login. This tool never performs username/password login.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub authorization_data: AuthorizationData,
    #[serde(default)]
    pub cookies: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationData {
    #[serde(default)]
    pub ds_user_id: Option<String>,
    #[serde(default)]
    pub sessionid: Option<String>,
}

impl SessionSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read session file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("invalid session file {}", path.display()))
    }

    /// The sessionid cookie, from authorization data or the cookie jar.
    fn session_id(&self) -> Result<&str> {
        self.authorization_data
            .sessionid
            .as_deref()
            .or_else(|| self.cookies.get("sessionid").map(String::as_str))
            .ok_or_else(|| anyhow!("session file contains no sessionid"))
    }
}

/// One saved collection as listed by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct Collection {
    pub collection_id: String,
    pub collection_name: String,
    #[serde(default)]
    pub collection_media_count: u64,
}

/// Authenticated client over the Instagram private API.
///
/// All calls are blocking from the caller's perspective: one request at a
/// time, no internal retries.
pub struct InstagramClient {
    http: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
}

impl InstagramClient {
    pub fn new(settings: &SessionSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let ua = settings.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        headers.insert(USER_AGENT, HeaderValue::from_str(ua)?);
        let cookie = format!("sessionid={}", settings.session_id()?);
        headers.insert(COOKIE, HeaderValue::from_str(&cookie)?);

        Ok(Self {
            http: reqwest::Client::new(),
            base_url: API_BASE_URL.to_string(),
            headers,
        })
    }

    pub fn from_session_file(path: &Path) -> Result<Self> {
        Self::new(&SessionSettings::load(path)?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path_and_query: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!(%url, "instagram api request");

        let response = self
            .http
            .get(&url)
            .headers(self.headers.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Instagram API error ({}): {}", status, error_text));
        }

        Ok(response.json().await?)
    }

    /// Verify the loaded session with a cheap account call.
    /// Returns the account username.
    pub async fn verify_session(&self) -> Result<String> {
        let response: CurrentUserResponse = self
            .get_json("/accounts/current_user/?edit=true")
            .await
            .context("session is invalid or expired")?;
        info!(username = %response.user.username, "session verified");
        Ok(response.user.username)
    }

    /// List all saved collections for the account.
    pub async fn collections(&self) -> Result<Vec<Collection>> {
        let response: CollectionListResponse = self
            .get_json("/collections/list/?collection_types=[\"ALL_MEDIA_AUTO_COLLECTION\",\"MEDIA\"]")
            .await?;
        info!(count = response.items.len(), "collections fetched");
        Ok(response.items)
    }

    /// Fetch every media item of one collection, following the `max_id`
    /// cursor until the feed is exhausted. Order is the API's saved order.
    pub async fn collection_media(&self, collection_id: &str) -> Result<Vec<MediaDescriptor>> {
        let mut all = Vec::new();
        let mut max_id: Option<String> = None;

        loop {
            let path = match &max_id {
                Some(cursor) => {
                    format!("/feed/collection/{}/posts/?max_id={}", collection_id, cursor)
                }
                None => format!("/feed/collection/{}/posts/", collection_id),
            };
            let page: CollectionFeedResponse = self.get_json(&path).await?;
            all.extend(page.items.into_iter().map(|i| i.media.into_descriptor()));

            match (page.more_available, page.next_max_id) {
                (true, Some(next)) => max_id = Some(next),
                _ => break,
            }
        }

        info!(collection_id, count = all.len(), "collection media fetched");
        Ok(all)
    }

    /// Resolve a direct download URL for one media item.
    async fn media_download_url(&self, pk: u64, video: bool) -> Result<String, FetchError> {
        let info: MediaInfoResponse = self
            .get_json(&format!("/media/{}/info/", pk))
            .await
            .map_err(|e| FetchError::Api(e.to_string()))?;

        let item = info
            .items
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::Api(format!("no media info for pk {pk}")))?;

        if video {
            item.video_versions
                .and_then(|mut v| if v.is_empty() { None } else { Some(v.remove(0).url) })
                .ok_or_else(|| FetchError::Api(format!("pk {pk} has no video versions")))
        } else {
            item.image_versions2
                .and_then(|iv| iv.candidates.into_iter().next())
                .map(|c| c.url)
                .ok_or_else(|| FetchError::Api(format!("pk {pk} has no image candidates")))
        }
    }

    async fn download_to(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Unexpected(e.into()))?;

        if !response.status().is_success() {
            return Err(FetchError::Api(format!(
                "download failed with status {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Unexpected(e.into()))?;
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| FetchError::Unexpected(e.into()))?;
        Ok(())
    }
}

#[async_trait]
impl MediaFetcher for InstagramClient {
    async fn fetch_photo(&self, pk: u64, folder: &Path) -> Result<PathBuf, FetchError> {
        let url = self.media_download_url(pk, false).await?;
        let dest = folder.join(format!("{pk}.jpg"));
        self.download_to(&url, &dest).await?;
        debug!(pk, path = %dest.display(), "photo downloaded");
        Ok(dest)
    }

    async fn fetch_video(&self, pk: u64, folder: &Path) -> Result<PathBuf, FetchError> {
        let url = self.media_download_url(pk, true).await?;
        let dest = folder.join(format!("{pk}.mp4"));
        self.download_to(&url, &dest).await?;
        debug!(pk, path = %dest.display(), "video downloaded");
        Ok(dest)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CurrentUserResponse {
    user: CurrentUser,
}

#[derive(Deserialize)]
struct CurrentUser {
    username: String,
}

#[derive(Deserialize)]
struct CollectionListResponse {
    #[serde(default)]
    items: Vec<Collection>,
}

#[derive(Deserialize)]
struct CollectionFeedResponse {
    #[serde(default)]
    items: Vec<FeedItem>,
    #[serde(default)]
    more_available: bool,
    #[serde(default)]
    next_max_id: Option<String>,
}

#[derive(Deserialize)]
struct FeedItem {
    media: RawMedia,
}

#[derive(Deserialize)]
struct RawMedia {
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pk: u64,
    media_type: i64,
    code: String,
    #[serde(default)]
    caption: Option<RawCaption>,
    #[serde(default)]
    product_type: Option<String>,
    #[serde(default)]
    carousel_media: Option<Vec<RawCarouselItem>>,
}

#[derive(Deserialize)]
struct RawCaption {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct RawCarouselItem {
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pk: u64,
    media_type: i64,
}

impl RawMedia {
    fn into_descriptor(self) -> MediaDescriptor {
        MediaDescriptor {
            pk: self.pk,
            media_type: self.media_type,
            code: self.code,
            caption: self.caption.and_then(|c| c.text),
            product_type: self.product_type.unwrap_or_default(),
            resources: self
                .carousel_media
                .unwrap_or_default()
                .into_iter()
                .map(|c| AlbumResource { pk: c.pk, media_type: c.media_type })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct MediaInfoResponse {
    #[serde(default)]
    items: Vec<RawMediaInfo>,
}

#[derive(Deserialize)]
struct RawMediaInfo {
    #[serde(default)]
    video_versions: Option<Vec<RawVersion>>,
    #[serde(default)]
    image_versions2: Option<RawImageVersions>,
}

#[derive(Deserialize)]
struct RawVersion {
    url: String,
}

#[derive(Deserialize)]
struct RawImageVersions {
    #[serde(default)]
    candidates: Vec<RawVersion>,
}

/// The API is inconsistent about pk: sometimes a JSON number, sometimes a
/// decimal string.
fn u64_from_number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
