use anyhow::Result;
use image::DynamicImage;
use ratatui::widgets::ListState;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, FetchError, PageResponse};
use crate::config::{Config, Settings};
use crate::constants::constants;
use crate::display::DisplayMode;
use crate::gallery::{Gallery, Generation, Pane};
use crate::player::{MediaSource, Readiness, VideoPlayer};
use crate::query::{SearchForm, base_endpoint, page_url};
use crate::theme::{THEMES, theme_index};

// --- Types ---

pub type PageResult = Result<PageResponse, FetchError>;
pub type PosterResult = Result<DynamicImage, FetchError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  /// Editing the search form.
  Form,
  /// Browsing cards.
  List,
}

/// In-flight async task receivers, each tagged with what it belongs to.
#[derive(Default)]
pub(crate) struct AsyncTasks {
  pub(crate) search_rx: Option<(Generation, oneshot::Receiver<PageResult>)>,
  pub(crate) more_rx: Option<(Generation, oneshot::Receiver<PageResult>)>,
  /// Keyed by switch ticket.
  pub(crate) ready_rx: Option<(u64, oneshot::Receiver<Readiness>)>,
  /// Keyed by record id.
  pub(crate) poster_rx: Option<(u64, oneshot::Receiver<PosterResult>)>,
}

/// Poster scaled to the player pane, cached across frames.
#[derive(Default)]
pub struct PosterCache {
  pub resized: Option<(u64, u16, u16, DynamicImage)>,
}

pub struct App {
  pub form: SearchForm,
  pub mode: AppMode,
  pub theme_index: usize,
  pub display_mode: DisplayMode,
  pub api: ApiClient,
  /// Unfiltered endpoint; search filters are appended to this.
  pub base_endpoint: String,
  pub gallery: Gallery,
  pub list_state: ListState,
  pub player: VideoPlayer,
  pub poster_cache: PosterCache,
  pub last_error: Option<String>,
  pub should_quit: bool,
  /// App start instant, drives the preloader spinner.
  pub started_at: Instant,
  pub(crate) tasks: AsyncTasks,
  /// Bumped on every card switch; only the latest ready wait may hide the player preloader.
  switch_ticket: u64,
  /// When the last error was set, for auto-dismiss.
  error_time: Option<Instant>,
}

impl App {
  pub fn new(settings: &Settings, config: &Config, display_mode: DisplayMode) -> Result<Self> {
    let api = ApiClient::new(&settings.api_base)?;
    let base_endpoint = base_endpoint(api.base(), settings.page_size);
    let theme_index = config.theme_name.as_deref().map(theme_index).unwrap_or(0);

    Ok(Self {
      form: SearchForm::default(),
      mode: AppMode::List,
      theme_index,
      display_mode,
      api,
      gallery: Gallery::new(base_endpoint.clone()),
      base_endpoint,
      list_state: ListState::default(),
      player: VideoPlayer::new(),
      poster_cache: PosterCache::default(),
      last_error: None,
      should_quit: false,
      started_at: Instant::now(),
      tasks: AsyncTasks::default(),
      switch_ticket: 0,
      error_time: None,
    })
  }

  pub fn theme(&self) -> &'static crate::theme::Theme {
    // Safety: theme_index is always bounded by modular arithmetic in next_theme()
    // and by theme_index() on initialization.
    &THEMES[self.theme_index]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    let mut config = Config::load();
    config.theme_name = Some(self.theme().name.to_string());
    config.save();
  }

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages after 5 seconds.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(5)
    {
      self.last_error = None;
      self.error_time = None;
    }
  }

  // --- Search ---

  /// Start a search with the current form contents. The previous search's
  /// in-flight fetches are abandoned.
  pub fn trigger_search(&mut self) {
    let criteria = self.form.criteria();
    let endpoint = criteria.build_query(&self.base_endpoint);
    info!(city = %criteria.city, slots = ?criteria.time_slots, "search triggered");

    self.clear_error();
    self.tasks.search_rx = None;
    self.tasks.more_rx = None;
    // A ready wait from the previous search must not hide the new preloaders.
    self.switch_ticket += 1;
    self.tasks.ready_rx = None;
    self.tasks.poster_rx = None;
    self.list_state.select(None);
    let generation = self.gallery.begin_search(endpoint.clone());

    let api = self.api.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(api.fetch_first_page(&page_url(&endpoint, 1)).await);
    });
    self.tasks.search_rx = Some((generation, rx));
  }

  /// Apply the first page of a search. Returns `true` when there is a first
  /// video to hand to the player.
  pub fn apply_first_page(&mut self, generation: Generation, result: PageResult) -> bool {
    if !self.gallery.is_current(generation) {
      debug!(generation, "dropping stale search result");
      return false;
    }
    match result {
      Ok(page) => {
        self.gallery.load_first_page(&self.api, page);
        self.list_state.select(Some(0));
        true
      }
      Err(e) => {
        match &e {
          FetchError::NotFound => info!("search returned no videos"),
          other => error!(err = %other, "search failed"),
        }
        self.gallery.fail_search(e.user_message());
        false
      }
    }
  }

  // --- Pagination ---

  /// Fetch the next page if the load-more control is offered and idle.
  pub fn trigger_load_more(&mut self) {
    if self.gallery.loading_more || !self.gallery.shows_load_more() {
      return;
    }
    let Some(next) = self.gallery.pagination.next_page() else { return };
    self.gallery.loading_more = true;
    let url = page_url(&self.gallery.endpoint, next);
    let generation = self.gallery.generation();
    info!(page = next, "load more triggered");

    let api = self.api.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(api.fetch_page(&url).await);
    });
    self.tasks.more_rx = Some((generation, rx));
  }

  /// Apply a next-page result. Failures keep the control so it can be retried.
  pub fn apply_next_page(&mut self, generation: Generation, result: PageResult) {
    if !self.gallery.is_current(generation) {
      debug!(generation, "dropping stale page");
      return;
    }
    match result {
      Ok(page) => self.gallery.append_page(&self.api, page),
      Err(e) => {
        warn!(err = %e, "load more failed");
        self.gallery.loading_more = false;
        self.set_error(constants().load_more_failed_message.clone());
      }
    }
  }

  // --- Switching ---

  /// Make the card of record `id` current and load its video. Shows the player
  /// preloader until the media is ready and the minimum delay has passed.
  pub async fn switch_to(&mut self, id: u64) {
    let Some(record) = self.gallery.select(id) else { return };
    let source = MediaSource::from_record(&self.api, record);
    let thumbnail =
      self.gallery.cards.iter().find(|c| c.id == id).map(|c| c.thumbnail_url.clone()).unwrap_or_default();
    self.gallery.overlays.clear_error();
    self.gallery.overlays.show_preloader(Pane::Player);
    self.switch_ticket += 1;
    info!(id = source.id, ticket = self.switch_ticket, "switching video");

    self.player.poster = None;
    self.poster_cache.resized = None;
    let api = self.api.clone();
    let poster = source.poster_url.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(api.fetch_poster(&poster, &thumbnail).await);
    });
    self.tasks.poster_rx = Some((source.id, rx));

    if let Err(e) = self.player.play(source).await {
      error!(err = %format!("{:#}", e), "player setup failed");
      self.gallery.overlays.show_error(&constants().playback_failed_message);
      self.gallery.finish_loading();
      self.tasks.ready_rx = None;
      self.set_error(format!("Ошибка воспроизведения: {:#}", e));
      return;
    }

    let waiter = self.player.ready_waiter(constants().media_ready_timeout());
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let readiness = waiter.await;
      tokio::time::sleep(constants().loading_delay()).await;
      let _ = tx.send(readiness);
    });
    self.tasks.ready_rx = Some((self.switch_ticket, rx));
  }

  /// Apply the outcome of a ready wait. A time-out is treated as ready.
  pub fn apply_readiness(&mut self, ticket: u64, readiness: Readiness) {
    if ticket != self.switch_ticket {
      debug!(ticket, "dropping stale ready signal");
      return;
    }
    match readiness {
      Readiness::Ready => info!("media ready"),
      Readiness::TimedOut => warn!("media not ready in time, continuing"),
      Readiness::Failed(msg) => {
        warn!(err = %msg, "media failed to load");
        self.gallery.overlays.show_error(&constants().playback_failed_message);
      }
    }
    self.gallery.finish_loading();
  }

  // --- Polling ---

  pub async fn check_pending(&mut self) -> Result<()> {
    if let Some((generation, mut rx)) = self.tasks.search_rx.take() {
      match rx.try_recv() {
        Ok(result) => {
          if self.apply_first_page(generation, result)
            && let Some(id) = self.gallery.cards.first().map(|c| c.id)
          {
            self.switch_to(id).await;
          }
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.search_rx = Some((generation, rx));
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.gallery.fail_search(&constants().fetch_failed_message);
        }
      }
    }

    if let Some((generation, mut rx)) = self.tasks.more_rx.take() {
      match rx.try_recv() {
        Ok(result) => self.apply_next_page(generation, result),
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.more_rx = Some((generation, rx));
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.gallery.loading_more = false;
        }
      }
    }

    if let Some((ticket, mut rx)) = self.tasks.ready_rx.take() {
      match rx.try_recv() {
        Ok(readiness) => self.apply_readiness(ticket, readiness),
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.ready_rx = Some((ticket, rx));
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.apply_readiness(ticket, Readiness::Failed("ready task failed".to_string()));
        }
      }
    }

    if let Some((id, mut rx)) = self.tasks.poster_rx.take() {
      match rx.try_recv() {
        Ok(Ok(image)) => {
          if self.player.current.as_ref().is_some_and(|s| s.id == id) {
            self.player.poster = Some((id, image));
            self.poster_cache.resized = None;
          }
        }
        Ok(Err(e)) => {
          // The player pane falls back to the text details.
          debug!(id, err = %e, "poster unavailable");
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.poster_rx = Some((id, rx));
        }
        Err(oneshot::error::TryRecvError::Closed) => {}
      }
    }

    Ok(())
  }

  /// Act on the highlighted list row: switch video, or load more.
  pub async fn activate_selected(&mut self) {
    let Some(row) = self.list_state.selected() else { return };
    if self.gallery.is_load_more_row(row) {
      self.trigger_load_more();
    } else if let Some(id) = self.gallery.cards.get(row).map(|c| c.id) {
      self.switch_to(id).await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::{MediaRef, PageMeta, VideoRecord};

  fn app() -> App {
    let settings = Settings { api_base: "https://host".to_string(), page_size: 5 };
    App::new(&settings, &Config::default(), DisplayMode::Ascii).unwrap()
  }

  fn record(id: u64) -> VideoRecord {
    VideoRecord {
      id,
      city: format!("city-{}", id),
      description: String::new(),
      thumbnail: MediaRef { url: format!("/t{}.jpg", id) },
      poster: MediaRef { url: format!("/p{}.jpg", id) },
      video: MediaRef { url: format!("/v{}.mp4", id) },
      time_of_day: "day".to_string(),
    }
  }

  fn page(ids: std::ops::Range<u64>, page: u32, page_count: u32) -> PageResult {
    Ok(PageResponse { results: ids.map(record).collect(), pagination: PageMeta { page, page_count } })
  }

  #[tokio::test]
  async fn search_builds_filtered_endpoint() {
    let mut app = app();
    app.form.city = "Москва".to_string();
    app.form.slots[1].checked = true;
    app.trigger_search();
    assert_eq!(
      app.gallery.endpoint,
      "https://host/api/videos?pagination[pageSize]=5&filters[city][$containsi]=Москва&filters[time_of_day][$eqi]=day&"
    );
    assert!(app.gallery.overlays.is_loading(Pane::Player));
    assert!(app.gallery.overlays.is_loading(Pane::List));
    assert!(app.tasks.search_rx.is_some());
  }

  #[tokio::test]
  async fn first_page_renders_cards() {
    let mut app = app();
    app.trigger_search();
    let generation = app.gallery.generation();
    assert!(app.apply_first_page(generation, page(0..5, 1, 2)));
    assert_eq!(app.gallery.cards.len(), 5);
    assert_eq!(app.list_state.selected(), Some(0));
  }

  #[tokio::test]
  async fn not_found_shows_message_and_renders_nothing() {
    let mut app = app();
    app.trigger_search();
    let generation = app.gallery.generation();
    assert!(!app.apply_first_page(generation, Err(FetchError::NotFound)));
    assert_eq!(app.gallery.overlays.error(), Some("Нет подходящих видео =("));
    assert!(app.gallery.cards.is_empty());
    assert_eq!(app.gallery.current_index(), None);
    assert!(!app.player.is_playing());
    assert!(!app.gallery.overlays.is_loading(Pane::Player));
    assert!(!app.gallery.overlays.is_loading(Pane::List));
  }

  #[tokio::test]
  async fn network_error_shows_generic_message() {
    let mut app = app();
    app.trigger_search();
    let generation = app.gallery.generation();
    app.apply_first_page(generation, Err(FetchError::Decode("eof".into())));
    assert_eq!(app.gallery.overlays.error(), Some("Ошибка получения данных :("));
    assert!(!app.gallery.overlays.is_loading(Pane::Player));
    assert!(!app.gallery.overlays.is_loading(Pane::List));
  }

  #[tokio::test]
  async fn stale_search_result_is_dropped() {
    let mut app = app();
    app.trigger_search();
    let stale = app.gallery.generation();
    app.trigger_search();
    assert!(!app.apply_first_page(stale, page(0..5, 1, 1)));
    assert!(app.gallery.cards.is_empty());
    assert!(app.gallery.overlays.is_loading(Pane::List));
  }

  #[tokio::test]
  async fn load_more_appends_and_removes_control_on_last_page() {
    let mut app = app();
    app.trigger_search();
    let generation = app.gallery.generation();
    app.apply_first_page(generation, page(0..5, 1, 2));
    app.gallery.finish_loading();
    assert!(app.gallery.shows_load_more());

    app.trigger_load_more();
    assert!(app.gallery.loading_more);
    assert!(app.tasks.more_rx.is_some());

    app.apply_next_page(generation, page(5..10, 2, 2));
    assert_eq!(app.gallery.cards.len(), 10);
    assert!(!app.gallery.shows_load_more());
    assert!(!app.gallery.loading_more);
  }

  #[tokio::test]
  async fn failed_load_more_keeps_control() {
    let mut app = app();
    app.trigger_search();
    let generation = app.gallery.generation();
    app.apply_first_page(generation, page(0..5, 1, 3));
    app.gallery.finish_loading();
    app.trigger_load_more();

    app.apply_next_page(generation, Err(FetchError::Decode("eof".into())));
    assert!(app.gallery.shows_load_more());
    assert!(!app.gallery.loading_more);
    assert_eq!(app.gallery.cards.len(), 5);
    assert_eq!(app.last_error.as_deref(), Some("Не удалось загрузить ещё"));
    assert_eq!(app.gallery.overlays.error(), None);
  }

  #[tokio::test]
  async fn stale_page_after_new_search_is_dropped() {
    let mut app = app();
    app.trigger_search();
    let old = app.gallery.generation();
    app.apply_first_page(old, page(0..5, 1, 2));
    app.trigger_search();
    app.apply_next_page(old, page(5..10, 2, 2));
    assert!(app.gallery.cards.is_empty());
  }

  #[tokio::test]
  async fn load_more_is_ignored_while_in_flight() {
    let mut app = app();
    app.trigger_search();
    let generation = app.gallery.generation();
    app.apply_first_page(generation, page(0..5, 1, 3));
    app.gallery.finish_loading();
    app.trigger_load_more();
    app.tasks.more_rx = None;
    app.trigger_load_more();
    assert!(app.tasks.more_rx.is_none());
  }

  #[tokio::test]
  async fn stale_ready_signal_keeps_preloader() {
    let mut app = app();
    app.gallery.overlays.show_preloader(Pane::Player);
    app.switch_ticket = 2;
    app.apply_readiness(1, Readiness::Ready);
    assert!(app.gallery.overlays.is_loading(Pane::Player));
    app.apply_readiness(2, Readiness::TimedOut);
    assert!(!app.gallery.overlays.is_loading(Pane::Player));
    assert_eq!(app.gallery.overlays.error(), None);
  }

  #[tokio::test]
  async fn new_search_ignores_previous_ready_wait() {
    let mut app = app();
    app.trigger_search();
    let generation = app.gallery.generation();
    app.apply_first_page(generation, page(0..5, 1, 2));
    let (tx, rx) = oneshot::channel();
    app.tasks.ready_rx = Some((app.switch_ticket, rx));

    app.trigger_search();
    app.tasks.search_rx = None;
    let _ = tx.send(Readiness::Ready);
    app.check_pending().await.unwrap();

    assert!(app.tasks.ready_rx.is_none());
    assert!(app.gallery.overlays.is_loading(Pane::Player));
    assert!(app.gallery.overlays.is_loading(Pane::List));
    assert!(app.gallery.cards.is_empty());
    assert!(!app.gallery.shows_load_more());
  }

  #[tokio::test]
  async fn ready_wait_under_old_ticket_is_dropped_after_new_search() {
    let mut app = app();
    app.trigger_search();
    let old_ticket = app.switch_ticket;
    app.trigger_search();
    let (tx, rx) = oneshot::channel();
    app.tasks.ready_rx = Some((old_ticket, rx));
    tx.send(Readiness::Ready).unwrap();
    app.tasks.search_rx = None;
    app.check_pending().await.unwrap();
    assert!(app.gallery.overlays.is_loading(Pane::Player));
    assert!(app.gallery.overlays.is_loading(Pane::List));
  }

  #[tokio::test]
  async fn failed_media_shows_playback_error() {
    let mut app = app();
    app.gallery.overlays.show_preloader(Pane::Player);
    app.apply_readiness(0, Readiness::Failed("loading failed".into()));
    assert_eq!(app.gallery.overlays.error(), Some("Не удалось воспроизвести видео"));
    assert!(!app.gallery.overlays.is_loading(Pane::Player));
  }
}
