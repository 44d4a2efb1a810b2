//! Session state for one browsing session: the fetched records, their cards,
//! which card is current, pagination, and the loading/error overlays.
//!
//! Everything here is plain data mutated by `App` on the UI task; spawned
//! fetches never touch it directly. Results carry the [`Generation`] they were
//! started in and are dropped if a newer search has begun since.

use tracing::{debug, info};

use crate::api::{ApiClient, PageMeta, PageResponse, VideoRecord};

/// Search epoch. Bumped on every new search.
pub type Generation = u64;

// --- Cards ---

/// Display form of a record in the list pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
  pub id: u64,
  pub title: String,
  pub thumbnail_url: String,
  /// Thumbnail alt text; doubles as the card's description line.
  pub alt: String,
}

/// Build one card per record, preserving order.
pub fn render_cards(api: &ApiClient, records: &[VideoRecord]) -> Vec<Card> {
  let cards: Vec<Card> = records
    .iter()
    .map(|r| Card {
      id: r.id,
      title: r.city.clone(),
      thumbnail_url: api.absolute_url(&r.thumbnail.url),
      alt: r.description.clone(),
    })
    .collect();
  debug!(count = cards.len(), "rendered cards");
  cards
}

// --- Pagination ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
  HasMore { page: u32, page_count: u32 },
  Exhausted,
}

impl Pagination {
  pub fn from_meta(meta: PageMeta) -> Self {
    if meta.page < meta.page_count {
      Pagination::HasMore { page: meta.page, page_count: meta.page_count }
    } else {
      Pagination::Exhausted
    }
  }

  pub fn has_more(self) -> bool {
    matches!(self, Pagination::HasMore { .. })
  }

  pub fn next_page(self) -> Option<u32> {
    match self {
      Pagination::HasMore { page, .. } => Some(page + 1),
      Pagination::Exhausted => None,
    }
  }
}

// --- Overlays ---

/// A screen region that can carry a preloader or an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
  Player,
  List,
}

/// Loading indicators per pane, plus the error message drawn in the player pane.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Overlays {
  player_loading: bool,
  list_loading: bool,
  error: Option<String>,
}

impl Overlays {
  fn loading_mut(&mut self, pane: Pane) -> &mut bool {
    match pane {
      Pane::Player => &mut self.player_loading,
      Pane::List => &mut self.list_loading,
    }
  }

  pub fn show_preloader(&mut self, pane: Pane) {
    *self.loading_mut(pane) = true;
    debug!(?pane, "preloader shown");
  }

  pub fn hide_preloader(&mut self, pane: Pane) {
    *self.loading_mut(pane) = false;
    debug!(?pane, "preloader hidden");
  }

  pub fn is_loading(&self, pane: Pane) -> bool {
    match pane {
      Pane::Player => self.player_loading,
      Pane::List => self.list_loading,
    }
  }

  pub fn show_error(&mut self, message: &str) {
    info!(message, "error shown");
    self.error = Some(message.to_string());
  }

  pub fn clear_error(&mut self) {
    self.error = None;
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }
}

// --- Gallery ---

#[derive(Debug)]
pub struct Gallery {
  /// Endpoint of the active search, filters included, ending with `&`.
  pub endpoint: String,
  pub items: Vec<VideoRecord>,
  pub cards: Vec<Card>,
  pub pagination: Pagination,
  /// Index of the card whose video is loaded in the player.
  current: Option<usize>,
  pub overlays: Overlays,
  generation: Generation,
  /// Whether a load-more fetch is in flight.
  pub loading_more: bool,
}

impl Gallery {
  pub fn new(endpoint: String) -> Self {
    Self {
      endpoint,
      items: Vec::new(),
      cards: Vec::new(),
      pagination: Pagination::Exhausted,
      current: None,
      overlays: Overlays::default(),
      generation: 0,
      loading_more: false,
    }
  }

  pub fn generation(&self) -> Generation {
    self.generation
  }

  pub fn is_current(&self, generation: Generation) -> bool {
    self.generation == generation
  }

  /// Start a new search: clear the list, the load-more control and any error,
  /// show both preloaders, and return the new generation.
  pub fn begin_search(&mut self, endpoint: String) -> Generation {
    self.generation += 1;
    self.endpoint = endpoint;
    self.items.clear();
    self.cards.clear();
    self.pagination = Pagination::Exhausted;
    self.current = None;
    self.loading_more = false;
    self.overlays.clear_error();
    self.overlays.show_preloader(Pane::Player);
    self.overlays.show_preloader(Pane::List);
    info!(generation = self.generation, endpoint = %self.endpoint, "search started");
    self.generation
  }

  /// Install the first page of a search. Replaces the item list wholesale.
  pub fn load_first_page(&mut self, api: &ApiClient, page: PageResponse) {
    self.cards = render_cards(api, &page.results);
    self.items = page.results;
    self.pagination = Pagination::from_meta(page.pagination);
    self.current = None;
  }

  /// Append a further page and recompute whether more remain.
  pub fn append_page(&mut self, api: &ApiClient, page: PageResponse) {
    self.loading_more = false;
    self.cards.extend(render_cards(api, &page.results));
    self.items.extend(page.results);
    self.pagination = Pagination::from_meta(page.pagination);
    info!(total = self.items.len(), has_more = self.pagination.has_more(), "page appended");
  }

  /// Show a fetch failure for the initial page and drop both preloaders.
  pub fn fail_search(&mut self, message: &str) {
    self.overlays.show_error(message);
    self.overlays.hide_preloader(Pane::Player);
    self.overlays.hide_preloader(Pane::List);
  }

  /// Drop both preloaders once the first video is ready.
  pub fn finish_loading(&mut self) {
    self.overlays.hide_preloader(Pane::Player);
    self.overlays.hide_preloader(Pane::List);
  }

  /// Mark the card of record `id` current, clearing the marker elsewhere.
  pub fn select(&mut self, id: u64) -> Option<&VideoRecord> {
    let index = self.items.iter().position(|r| r.id == id)?;
    self.current = Some(index);
    self.items.get(index)
  }

  pub fn current_index(&self) -> Option<usize> {
    self.current
  }

  pub fn current_record(&self) -> Option<&VideoRecord> {
    self.current.and_then(|i| self.items.get(i))
  }

  /// Number of selectable rows: every card, plus the load-more row when offered.
  pub fn row_count(&self) -> usize {
    self.cards.len() + usize::from(self.shows_load_more())
  }

  /// The load-more control is offered once the list has finished loading.
  pub fn shows_load_more(&self) -> bool {
    self.pagination.has_more() && !self.cards.is_empty() && !self.overlays.is_loading(Pane::List)
  }

  pub fn is_load_more_row(&self, row: usize) -> bool {
    self.shows_load_more() && row == self.cards.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::MediaRef;

  fn api() -> ApiClient {
    ApiClient::new("https://host").unwrap()
  }

  fn record(id: u64) -> VideoRecord {
    VideoRecord {
      id,
      city: format!("city-{}", id),
      description: format!("desc-{}", id),
      thumbnail: MediaRef { url: format!("/t{}.jpg", id) },
      poster: MediaRef { url: format!("/p{}.jpg", id) },
      video: MediaRef { url: format!("/v{}.mp4", id) },
      time_of_day: "day".to_string(),
    }
  }

  fn page(ids: std::ops::Range<u64>, page: u32, page_count: u32) -> PageResponse {
    PageResponse { results: ids.map(record).collect(), pagination: PageMeta { page, page_count } }
  }

  // --- render_cards ---

  #[test]
  fn one_card_per_record_in_order() {
    let records: Vec<VideoRecord> = [3, 1, 2].into_iter().map(record).collect();
    let cards = render_cards(&api(), &records);
    assert_eq!(cards.iter().map(|c| c.id).collect::<Vec<_>>(), vec![3, 1, 2]);
    assert_eq!(cards[0].title, "city-3");
    assert_eq!(cards[0].alt, "desc-3");
    assert_eq!(cards[0].thumbnail_url, "https://host/t3.jpg");
  }

  #[test]
  fn no_records_no_cards() {
    assert!(render_cards(&api(), &[]).is_empty());
  }

  // --- Pagination ---

  #[test]
  fn has_more_iff_page_below_page_count() {
    for page_count in 0..5 {
      for page in 0..5 {
        let p = Pagination::from_meta(PageMeta { page, page_count });
        assert_eq!(p.has_more(), page < page_count, "page={} page_count={}", page, page_count);
      }
    }
  }

  #[test]
  fn next_page_only_when_has_more() {
    assert_eq!(Pagination::from_meta(PageMeta { page: 1, page_count: 2 }).next_page(), Some(2));
    assert_eq!(Pagination::from_meta(PageMeta { page: 2, page_count: 2 }).next_page(), None);
  }

  // --- Gallery ---

  #[test]
  fn load_more_scenario() {
    let mut g = Gallery::new(String::new());
    g.begin_search("e?".to_string());
    g.load_first_page(&api(), page(0..5, 1, 2));
    assert_eq!(g.cards.len(), 5);
    assert!(!g.shows_load_more(), "control waits for the list preloader");
    g.finish_loading();
    assert!(g.shows_load_more());
    assert_eq!(g.row_count(), 6);
    assert!(g.is_load_more_row(5));

    g.append_page(&api(), page(5..10, 2, 2));
    assert_eq!(g.cards.len(), 10);
    assert_eq!(g.items.len(), 10);
    assert!(!g.shows_load_more());
    assert_eq!(g.row_count(), 10);
    assert!(!g.is_load_more_row(10));
  }

  #[test]
  fn select_leaves_exactly_one_current() {
    let mut g = Gallery::new(String::new());
    g.load_first_page(&api(), page(0..8, 1, 1));
    assert_eq!(g.current_index(), None);
    for i in [0, 5, 2, 7] {
      assert_eq!(g.select(i).map(|r| r.id), Some(i as u64));
      assert_eq!(g.current_index(), Some(i as usize));
    }
    assert!(g.select(99).is_none());
    assert_eq!(g.current_index(), Some(7));
    assert_eq!(g.current_record().map(|r| r.id), Some(7));
  }

  #[test]
  fn select_reaches_appended_pages() {
    let mut g = Gallery::new(String::new());
    g.load_first_page(&api(), page(0..5, 1, 2));
    g.append_page(&api(), page(5..10, 2, 2));
    assert_eq!(g.select(8).map(|r| r.video.url.as_str()), Some("/v8.mp4"));
    assert_eq!(g.cards[8].id, 8);
  }

  #[test]
  fn select_looks_up_by_id_not_position() {
    let mut g = Gallery::new(String::new());
    g.load_first_page(&api(), page(40..45, 1, 1));
    assert_eq!(g.select(42).map(|r| r.city.as_str()), Some("city-42"));
    assert_eq!(g.current_index(), Some(2));
    assert!(g.select(2).is_none());
  }

  #[test]
  fn new_search_bumps_generation_and_resets() {
    let mut g = Gallery::new(String::new());
    let first = g.begin_search("a&".to_string());
    g.load_first_page(&api(), page(0..5, 1, 3));
    g.select(1);
    g.overlays.show_error("boom");

    let second = g.begin_search("b&".to_string());
    assert!(second > first);
    assert!(!g.is_current(first));
    assert!(g.is_current(second));
    assert!(g.cards.is_empty() && g.items.is_empty());
    assert_eq!(g.current_index(), None);
    assert!(!g.shows_load_more());
    assert_eq!(g.overlays.error(), None);
    assert!(g.overlays.is_loading(Pane::Player));
    assert!(g.overlays.is_loading(Pane::List));
  }

  #[test]
  fn failed_search_shows_error_and_hides_preloaders() {
    let mut g = Gallery::new(String::new());
    g.begin_search("a&".to_string());
    g.fail_search("Ошибка получения данных :(");
    assert_eq!(g.overlays.error(), Some("Ошибка получения данных :("));
    assert!(!g.overlays.is_loading(Pane::Player));
    assert!(!g.overlays.is_loading(Pane::List));
    assert!(g.cards.is_empty());
    assert_eq!(g.current_index(), None);
  }

  #[test]
  fn overlays_are_per_pane() {
    let mut o = Overlays::default();
    o.show_preloader(Pane::List);
    assert!(o.is_loading(Pane::List));
    assert!(!o.is_loading(Pane::Player));
    o.show_error("x");
    assert_eq!(o.error(), Some("x"));
    o.clear_error();
    o.hide_preloader(Pane::List);
    assert_eq!(o, Overlays::default());
  }
}
