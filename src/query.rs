use tracing::debug;

use crate::constants::constants;

/// Filters extracted from the search form at submit time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
  pub city: String,
  /// Selected time-of-day values, in checkbox order.
  pub time_slots: Vec<String>,
}

impl SearchCriteria {
  /// Append the filter parameters to `endpoint`.
  ///
  /// `endpoint` is expected to end with `&` (see [`base_endpoint`]). Values are
  /// concatenated as-is; reqwest percent-encodes non-ASCII when the URL is parsed.
  pub fn build_query(&self, endpoint: &str) -> String {
    let mut url = endpoint.to_string();
    if !self.city.is_empty() {
      url.push_str(&format!("filters[city][$containsi]={}&", self.city));
    }
    for slot in &self.time_slots {
      url.push_str(&format!("filters[time_of_day][$eqi]={}&", slot));
    }
    debug!(url = %url, "built search query");
    url
  }
}

/// The unfiltered listing endpoint, ready for more `key=value&` pairs.
pub fn base_endpoint(api_base: &str, page_size: u32) -> String {
  format!("{}/api/videos?pagination[pageSize]={}&", api_base.trim_end_matches('/'), page_size)
}

/// URL of a specific page of a (possibly filtered) endpoint.
pub fn page_url(endpoint: &str, page: u32) -> String {
  format!("{}pagination[page]={}&", endpoint, page)
}

// --- Search form ---

/// Which form control has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormFocus {
  City,
  /// Index into [`SearchForm::slots`].
  Slot(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlot {
  pub value: String,
  pub label: String,
  pub checked: bool,
}

/// City text input plus the time-of-day checkboxes.
#[derive(Debug, Clone)]
pub struct SearchForm {
  pub city: String,
  /// Cursor position within `city` (char index).
  pub cursor: usize,
  /// Horizontal scroll offset for the city input.
  pub scroll: usize,
  pub slots: Vec<TimeSlot>,
  pub focus: FormFocus,
}

impl Default for SearchForm {
  fn default() -> Self {
    Self::with_slots(&constants().time_slots)
  }
}

impl SearchForm {
  pub fn with_slots(slots: &[(String, String)]) -> Self {
    Self {
      city: String::new(),
      cursor: 0,
      scroll: 0,
      slots: slots
        .iter()
        .map(|(value, label)| TimeSlot { value: value.clone(), label: label.clone(), checked: false })
        .collect(),
      focus: FormFocus::City,
    }
  }

  /// Extract the criteria the form currently describes.
  pub fn criteria(&self) -> SearchCriteria {
    SearchCriteria {
      city: self.city.trim().to_string(),
      time_slots: self.slots.iter().filter(|s| s.checked).map(|s| s.value.clone()).collect(),
    }
  }

  /// Toggle the focused checkbox. No-op while the city field has focus.
  pub fn toggle_focused(&mut self) {
    if let FormFocus::Slot(i) = self.focus
      && let Some(slot) = self.slots.get_mut(i)
    {
      slot.checked = !slot.checked;
    }
  }

  /// Move focus forward: city -> slot 0 -> ... -> last slot -> city.
  pub fn focus_next(&mut self) {
    self.focus = match self.focus {
      FormFocus::City if !self.slots.is_empty() => FormFocus::Slot(0),
      FormFocus::Slot(i) if i + 1 < self.slots.len() => FormFocus::Slot(i + 1),
      _ => FormFocus::City,
    };
  }

  pub fn focus_prev(&mut self) {
    self.focus = match self.focus {
      FormFocus::City if !self.slots.is_empty() => FormFocus::Slot(self.slots.len() - 1),
      FormFocus::Slot(0) | FormFocus::City => FormFocus::City,
      FormFocus::Slot(i) => FormFocus::Slot(i - 1),
    };
  }

  pub fn clear(&mut self) {
    self.city.clear();
    self.cursor = 0;
    self.scroll = 0;
    for slot in &mut self.slots {
      slot.checked = false;
    }
  }
}
