use image::DynamicImage;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::constants::constants;

// --- Wire types ---

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MediaRef {
  pub url: String,
}

/// A single video entry as returned by the content API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VideoRecord {
  pub id: u64,
  pub city: String,
  #[serde(default)]
  pub description: String,
  pub thumbnail: MediaRef,
  pub poster: MediaRef,
  pub video: MediaRef,
  #[serde(default)]
  pub time_of_day: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
  pub page: u32,
  pub page_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageResponse {
  pub results: Vec<VideoRecord>,
  pub pagination: PageMeta,
}

// --- Errors ---

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("no videos match the query")]
  NotFound,

  #[error("request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("server responded with {0}")]
  Status(StatusCode),

  #[error("malformed response: {0}")]
  Decode(String),

  #[error("image decode failed: {0}")]
  Image(String),
}

impl From<serde_json::Error> for FetchError {
  fn from(e: serde_json::Error) -> Self {
    Self::Decode(e.to_string())
  }
}

impl FetchError {
  /// Message shown to the user in the player pane.
  pub fn user_message(&self) -> &'static str {
    match self {
      FetchError::NotFound => constants().not_found_message.as_str(),
      _ => constants().fetch_failed_message.as_str(),
    }
  }
}

// --- Client ---

/// Thin wrapper over `reqwest` bound to one API base.
#[derive(Debug, Clone)]
pub struct ApiClient {
  http: Client,
  base: String,
}

impl ApiClient {
  pub fn new(base: &str) -> Result<Self, FetchError> {
    let http = Client::builder().timeout(constants().request_timeout()).build()?;
    Ok(Self { http, base: base.trim_end_matches('/').to_string() })
  }

  pub fn base(&self) -> &str {
    &self.base
  }

  /// Join a record-relative path (e.g. `/uploads/x.mp4`) onto the API base.
  /// Already-absolute URLs pass through.
  pub fn absolute_url(&self, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
      path.to_string()
    } else {
      format!("{}{}", self.base, path)
    }
  }

  /// Fetch and parse one page.
  pub async fn fetch_page(&self, url: &str) -> Result<PageResponse, FetchError> {
    debug!(url = %url, "fetching page");
    let response = self.http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status(status));
    }
    let body = response.text().await?;
    let page = parse_page(&body)?;
    info!(
      page = page.pagination.page,
      page_count = page.pagination.page_count,
      results = page.results.len(),
      "page fetched"
    );
    Ok(page)
  }

  /// Like [`fetch_page`](Self::fetch_page), but an empty result set is [`FetchError::NotFound`].
  pub async fn fetch_first_page(&self, url: &str) -> Result<PageResponse, FetchError> {
    let page = self.fetch_page(url).await?;
    if page.results.is_empty() {
      return Err(FetchError::NotFound);
    }
    Ok(page)
  }

  pub async fn fetch_image(&self, path: &str) -> Result<DynamicImage, FetchError> {
    let url = self.absolute_url(path);
    let response = self.http.get(&url).send().await?;
    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status(status));
    }
    let bytes = response.bytes().await?;
    image::load_from_memory(&bytes).map_err(|e| FetchError::Image(format!("{} ({})", e, url)))
  }

  /// Fetch a poster, falling back to the card thumbnail.
  pub async fn fetch_poster(&self, poster: &str, thumbnail: &str) -> Result<DynamicImage, FetchError> {
    match self.fetch_image(poster).await {
      Ok(image) => Ok(image),
      Err(e) => {
        debug!(url = %poster, err = %e, "poster fetch failed, trying thumbnail");
        self.fetch_image(thumbnail).await
      }
    }
  }
}

pub fn parse_page(body: &str) -> Result<PageResponse, FetchError> {
  Ok(serde_json::from_str(body)?)
}
