use anyhow::{Context, Result};
use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::{App, AppMode};
use crate::query::FormFocus;

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

/// Next row index, wrapping around.
fn step_down(selected: Option<usize>, count: usize) -> Option<usize> {
  (count > 0).then(|| selected.map_or(0, |i| (i + 1) % count))
}

fn step_up(selected: Option<usize>, count: usize) -> Option<usize> {
  (count > 0).then(|| selected.map_or(0, |i| if i == 0 { count - 1 } else { (i - 1).min(count - 1) }))
}

// --- Event Handling ---

pub async fn handle_key_event(app: &mut App, key: event::KeyEvent) -> Result<()> {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return Ok(());
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('t') {
    app.next_theme();
    return Ok(());
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s') {
    if app.player.is_playing() {
      app.player.stop().await.context("Failed to stop playback")?;
      app.player.poster = None;
      app.poster_cache.resized = None;
    }
    return Ok(());
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('o') {
    if let Some(ref source) = app.player.current {
      let url = source.video_url.clone();
      #[cfg(target_os = "macos")]
      let cmd = "open";
      #[cfg(not(target_os = "macos"))]
      let cmd = "xdg-open";
      match std::process::Command::new(cmd)
        .arg(&url)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
      {
        Ok(mut child) => {
          // Reap the child in a background thread to avoid zombie processes.
          std::thread::spawn(move || {
            let _ = child.wait();
          });
        }
        Err(e) => {
          app.set_error(format!("Не удалось открыть ссылку: {}", e));
        }
      }
    }
    return Ok(());
  }

  match app.mode {
    AppMode::Form => handle_form_key(app, key),
    AppMode::List => handle_list_key(app, key).await,
  }
  Ok(())
}

fn handle_form_key(app: &mut App, key: event::KeyEvent) {
  app.clear_error();
  let form = &mut app.form;
  match key.code {
    KeyCode::Enter => {
      app.trigger_search();
      app.mode = AppMode::List;
    }
    KeyCode::Tab => form.focus_next(),
    KeyCode::BackTab => form.focus_prev(),
    KeyCode::Char(' ') if form.focus != FormFocus::City => form.toggle_focused(),
    KeyCode::Char(c) if form.focus == FormFocus::City => {
      let byte_idx = char_to_byte_index(&form.city, form.cursor);
      form.city.insert(byte_idx, c);
      form.cursor += 1;
    }
    KeyCode::Backspace if form.focus == FormFocus::City => {
      if form.cursor > 0 {
        form.cursor -= 1;
        let byte_idx = char_to_byte_index(&form.city, form.cursor);
        form.city.remove(byte_idx);
      }
    }
    KeyCode::Delete if form.focus == FormFocus::City => {
      if form.cursor < form.city.chars().count() {
        let byte_idx = char_to_byte_index(&form.city, form.cursor);
        form.city.remove(byte_idx);
      }
    }
    KeyCode::Left => match form.focus {
      FormFocus::City => form.cursor = form.cursor.saturating_sub(1),
      FormFocus::Slot(_) => form.focus_prev(),
    },
    KeyCode::Right => match form.focus {
      FormFocus::City => {
        if form.cursor < form.city.chars().count() {
          form.cursor += 1;
        }
      }
      FormFocus::Slot(_) => form.focus_next(),
    },
    KeyCode::Home => form.cursor = 0,
    KeyCode::End => form.cursor = form.city.chars().count(),
    KeyCode::Esc => {
      if !form.city.is_empty() || form.slots.iter().any(|s| s.checked) {
        form.clear();
      } else {
        app.mode = AppMode::List;
      }
    }
    KeyCode::Down => app.mode = AppMode::List,
    _ => {}
  }
}

async fn handle_list_key(app: &mut App, key: event::KeyEvent) {
  let count = app.gallery.row_count();
  match key.code {
    KeyCode::Enter => app.activate_selected().await,
    KeyCode::Char(' ') => {
      if app.player.is_playing()
        && let Err(e) = app.player.toggle_pause().await
      {
        app.set_error(format!("Ошибка паузы: {}", e));
      }
    }
    KeyCode::Down | KeyCode::Char('j') => {
      app.list_state.select(step_down(app.list_state.selected(), count));
    }
    KeyCode::Up | KeyCode::Char('k') => {
      app.list_state.select(step_up(app.list_state.selected(), count));
    }
    KeyCode::Char('/') | KeyCode::Tab | KeyCode::Esc => {
      app.mode = AppMode::Form;
    }
    KeyCode::Char('q') => app.should_quit = true,
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  // --- char_to_byte_index ---

  #[test]
  fn char_to_byte_ascii() {
    assert_eq!(char_to_byte_index("hello", 0), 0);
    assert_eq!(char_to_byte_index("hello", 3), 3);
    assert_eq!(char_to_byte_index("hello", 5), 5);
  }

  #[test]
  fn char_to_byte_cyrillic() {
    let s = "Уфа"; // two bytes per char
    assert_eq!(char_to_byte_index(s, 1), 2);
    assert_eq!(char_to_byte_index(s, 3), 6);
    assert_eq!(char_to_byte_index(s, 9), 6);
  }

  // --- row stepping ---

  #[test]
  fn stepping_wraps_both_ways() {
    assert_eq!(step_down(Some(4), 5), Some(0));
    assert_eq!(step_up(Some(0), 5), Some(4));
    assert_eq!(step_down(None, 5), Some(0));
    assert_eq!(step_up(Some(2), 5), Some(1));
  }

  #[test]
  fn stepping_empty_list_clears_selection() {
    assert_eq!(step_down(Some(3), 0), None);
    assert_eq!(step_up(None, 0), None);
  }

  #[test]
  fn stepping_up_clamps_after_list_shrinks() {
    assert_eq!(step_up(Some(9), 3), Some(2));
  }
}
