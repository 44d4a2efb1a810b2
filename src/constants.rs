//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!`, so there is no runtime file I/O.
//! Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Content API
  pub api_base: String,
  pub page_size: u32,
  pub request_timeout_secs: u64,

  // Player
  pub loading_delay_ms: u64,
  pub media_ready_timeout_secs: u64,

  /// Time-of-day checkboxes as `(value, label)` pairs.
  pub time_slots: Vec<(String, String)>,

  pub not_found_message: String,
  pub fetch_failed_message: String,
  pub load_more_failed_message: String,
  pub playback_failed_message: String,
}

impl Constants {
  /// Minimum time a loading indicator stays on screen after the media is ready.
  pub fn loading_delay(&self) -> Duration {
    Duration::from_millis(self.loading_delay_ms)
  }

  pub fn media_ready_timeout(&self) -> Duration {
    Duration::from_secs(self.media_ready_timeout_secs)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn embedded_constants_parse() {
    let c = constants();
    assert!(c.api_base.starts_with("https://"));
    assert_eq!(c.page_size, 5);
    assert_eq!(c.loading_delay(), Duration::from_millis(1200));
  }

  #[test]
  fn time_slots_keep_file_order() {
    let values: Vec<&str> = constants().time_slots.iter().map(|(v, _)| v.as_str()).collect();
    assert_eq!(values, ["morning", "day", "evening", "night"]);
  }

  #[test]
  fn messages_match_gallery_copy() {
    assert_eq!(constants().not_found_message, "Нет подходящих видео =(");
    assert_eq!(constants().fetch_failed_message, "Ошибка получения данных :(");
  }
}
