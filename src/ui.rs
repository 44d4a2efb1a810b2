use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, BorderType, List, ListItem, Padding, Paragraph, Wrap},
};

use crate::app::{App, AppMode};
use crate::gallery::Pane;
use crate::graphics::{PosterWidget, fit_poster};
use crate::query::FormFocus;
use crate::theme::Theme;

const SPINNER: [&str; 8] = ["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

fn spinner(app: &App) -> &'static str {
  let tick = (app.started_at.elapsed().as_millis() / 100) as usize;
  SPINNER[tick % SPINNER.len()]
}

fn pane_block<'a>(title: Line<'a>, theme: &Theme, focused: bool) -> Block<'a> {
  let border = if focused { theme.accent } else { theme.border };
  Block::bordered()
    .title(title)
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(border))
    .padding(Padding::horizontal(1))
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();
  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, form_area, main_area, status_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Min(6),
    Constraint::Length(1),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, theme, header_area);
  render_form(frame, app, form_area);

  let [player_area, list_area] =
    Layout::horizontal([Constraint::Percentage(64), Constraint::Percentage(36)]).areas(main_area);
  render_player(frame, app, player_area);
  render_list(frame, app, list_area);

  render_status(frame, app, status_area);
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, theme: &Theme, area: Rect) {
  let left = Line::from(Span::styled(" ▶ vista ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_form(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let editing = app.mode == AppMode::Form;
  let slots_width: u16 = app.form.slots.iter().map(|s| s.label.chars().count() as u16 + 6).sum::<u16>() + 4;
  let [city_area, slots_area] =
    Layout::horizontal([Constraint::Min(16), Constraint::Length(slots_width)]).areas(area);

  // City input
  let city_focused = editing && app.form.focus == FormFocus::City;
  let block = pane_block(Line::from(" Город "), theme, city_focused);
  let inner_w = city_area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&app.form.city, app.form.cursor);
  if cursor_col < app.form.scroll {
    app.form.scroll = cursor_col;
  } else if cursor_col >= app.form.scroll + inner_w {
    app.form.scroll = cursor_col.saturating_sub(inner_w) + 1;
  }
  let scroll = app.form.scroll;
  let visible: String = app
    .form
    .city
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= scroll)
    .take_while(|(start, _, _)| *start < scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();
  frame.render_widget(Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(block), city_area);
  if city_focused {
    let cursor_x = city_area.x + 2 + (cursor_col - scroll) as u16;
    frame.set_cursor_position((cursor_x, city_area.y + 1));
  }

  // Time-of-day checkboxes
  let slots_focused = editing && matches!(app.form.focus, FormFocus::Slot(_));
  let spans: Vec<Span> = app
    .form
    .slots
    .iter()
    .enumerate()
    .flat_map(|(i, slot)| {
      let mark = if slot.checked { "[x]" } else { "[ ]" };
      let focused = editing && app.form.focus == FormFocus::Slot(i);
      let style = if focused {
        Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg)
      } else if slot.checked {
        Style::default().fg(theme.accent)
      } else {
        Style::default().fg(theme.fg)
      };
      [Span::styled(format!("{} {}", mark, slot.label), style), Span::raw("  ")]
    })
    .collect();
  let block = pane_block(Line::from(" Время суток "), theme, slots_focused);
  frame.render_widget(Paragraph::new(Line::from(spans)).block(block), slots_area);
}

fn render_player(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let title = Line::from(vec![
    Span::styled(" Сейчас играет ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    Span::styled(format!("[{}] ", app.display_mode.label().to_lowercase()), Style::default().fg(theme.muted)),
  ]);
  let block = pane_block(title, theme, false);
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let overlays = &app.gallery.overlays;
  if overlays.is_loading(Pane::Player) {
    let text = Line::from(Span::styled(format!("{} Загрузка…", spinner(app)), Style::default().fg(theme.status)));
    render_centered(frame, text, inner);
    return;
  }
  if let Some(message) = overlays.error() {
    let text = Line::from(Span::styled(message.to_string(), Style::default().fg(theme.error).bold()));
    render_centered(frame, text, inner);
    return;
  }

  let Some(source) = app.player.current.clone() else {
    let text = Line::from(Span::styled("Выберите видео и нажмите Enter.", Style::default().fg(theme.muted)));
    render_centered(frame, text, inner);
    return;
  };

  let [poster_area, info_area] = Layout::vertical([Constraint::Min(3), Constraint::Length(3)]).areas(inner);

  if let Some((ref id, ref image)) = app.player.poster {
    let needs_resize = match &app.poster_cache.resized {
      Some((cached_id, w, h, _)) => cached_id != id || *w != poster_area.width || *h != poster_area.height,
      None => true,
    };
    if needs_resize {
      let resized = fit_poster(image, poster_area.width, poster_area.height, app.display_mode);
      app.poster_cache.resized = Some((*id, poster_area.width, poster_area.height, resized));
    }
    if let Some((_, _, _, ref resized)) = app.poster_cache.resized {
      frame.render_widget(PosterWidget { image: resized, display_mode: app.display_mode }, poster_area);
    }
  }

  let inner_w = info_area.width as usize;
  let state = if app.player.paused { "⏸" } else { "▶" };
  let lines = vec![
    Line::from(vec![
      Span::styled(format!("{} ", state), Style::default().fg(theme.accent)),
      Span::styled(truncate_str(&source.title, inner_w.saturating_sub(2)), Style::default().fg(theme.fg).bold()),
    ]),
    Line::from(Span::styled(truncate_str(&source.description, inner_w), Style::default().fg(theme.muted))),
    Line::from(Span::styled(
      truncate_str(&source.video_url, inner_w),
      Style::default().fg(theme.accent).add_modifier(Modifier::UNDERLINED),
    )),
  ];
  frame.render_widget(Paragraph::new(lines), info_area);
}

fn render_centered(frame: &mut Frame, line: Line, area: Rect) {
  let y = area.y + area.height / 2;
  let row = Rect { y, height: 1.min(area.height), ..area };
  frame.render_widget(Paragraph::new(line).alignment(Alignment::Center).wrap(Wrap { trim: true }), row);
}

fn render_list(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let gallery = &app.gallery;
  let inner_w = area.width.saturating_sub(6) as usize;

  let mut items: Vec<ListItem> = gallery
    .cards
    .iter()
    .enumerate()
    .map(|(i, card)| {
      let is_current = gallery.current_index() == Some(i);
      let marker = if is_current { "● " } else { "  " };
      let bg = if i % 2 == 1 { theme.stripe_bg } else { theme.bg };
      let title_style = if is_current { Style::default().fg(theme.accent).bold() } else { Style::default().fg(theme.fg) };
      ListItem::new(vec![
        Line::from(vec![
          Span::styled(marker, Style::default().fg(theme.accent)),
          Span::styled(truncate_str(&card.title, inner_w), title_style),
        ]),
        Line::from(Span::styled(format!("  {}", truncate_str(&card.alt, inner_w)), Style::default().fg(theme.muted))),
      ])
      .bg(bg)
    })
    .collect();

  if gallery.shows_load_more() {
    let label = if gallery.loading_more { format!("{} Загрузка…", spinner(app)) } else { "↓ Показать ещё".to_string() };
    items.push(ListItem::new(Line::from(Span::styled(format!("  {}", label), Style::default().fg(theme.status)))));
  }

  let title = if gallery.overlays.is_loading(Pane::List) {
    format!(" {} Видео ", spinner(app))
  } else {
    format!(" Видео ({}) ", gallery.cards.len())
  };

  let list = List::new(items)
    .block(
      Block::bordered()
        .title(title)
        .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(if app.mode == AppMode::List { theme.accent } else { theme.border })),
    )
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else {
    match app.player.last_mpv_status() {
      Some(status) => (format!(" ♪ {}", status), Style::default().fg(theme.status)),
      None => (" Готово".to_string(), Style::default().fg(theme.muted)),
    }
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let is_playing = app.player.is_playing();
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Form => {
      let mut k = vec![("Enter", "Найти"), ("Tab", "Далее"), ("Space", "Отметить")];
      if is_playing {
        k.push(("^s", "Стоп"));
      }
      k.push(("^t", "Тема"));
      k.push(("Esc", "Сброс / Список"));
      k
    }
    AppMode::List => {
      let mut k = vec![("Enter", "Смотреть"), ("j/k", "Навигация")];
      if is_playing {
        let pause_label = if app.player.paused { "Продолжить" } else { "Пауза" };
        k.push(("Space", pause_label));
        k.push(("^s", "Стоп"));
        k.push(("^o", "Открыть"));
      }
      k.push(("/", "Поиск"));
      k.push(("^t", "Тема"));
      k.push(("q", "Выход"));
      k
    }
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{Config, Settings};
  use crate::display::DisplayMode;
  use ratatui::{Terminal, backend::TestBackend};

  fn screen_text(app: &mut App) -> String {
    let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
    terminal.draw(|frame| ui(frame, app)).unwrap();
    terminal.backend().buffer().content().iter().map(|cell| cell.symbol()).collect()
  }

  #[test]
  fn pane_labels_are_russian() {
    let settings = Settings { api_base: "https://host".to_string(), page_size: 5 };
    let mut app = App::new(&settings, &Config::default(), DisplayMode::Ascii).unwrap();
    let text = screen_text(&mut app);
    assert!(text.contains("Сейчас играет"));
    assert!(text.contains("Выберите видео"));
    assert!(text.contains("Видео (0)"));
    assert!(text.contains("Готово"));
    assert!(!text.contains("Videos"));
    assert!(!text.contains("Now Playing"));
  }

  #[test]
  fn truncate_keeps_short_strings() {
    assert_eq!(truncate_str("Сочи", 10), "Сочи");
  }

  #[test]
  fn truncate_counts_chars_not_bytes() {
    assert_eq!(truncate_str("Санкт-Петербург", 6), "Санкт…");
  }

  #[test]
  fn display_width_counts_wide_chars() {
    assert_eq!(display_width("ab", 2), 2);
    assert_eq!(display_width("日本", 2), 4);
    assert_eq!(display_width("Казань", 3), 3);
  }
}
