use ratatui::style::Color;

pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub static THEMES: [Theme; 3] = [
  Theme {
    name: "Dusk",
    bg: Color::Rgb(24, 24, 32),
    fg: Color::Rgb(220, 220, 230),
    accent: Color::Rgb(255, 170, 90),
    muted: Color::Rgb(120, 120, 140),
    border: Color::Rgb(70, 70, 90),
    highlight_fg: Color::Rgb(24, 24, 32),
    highlight_bg: Color::Rgb(255, 170, 90),
    stripe_bg: Color::Rgb(30, 30, 40),
    status: Color::Rgb(140, 200, 255),
    error: Color::Rgb(255, 110, 110),
    key_fg: Color::Rgb(24, 24, 32),
    key_bg: Color::Rgb(120, 120, 140),
  },
  Theme {
    name: "Birch",
    bg: Color::Rgb(246, 243, 236),
    fg: Color::Rgb(40, 40, 40),
    accent: Color::Rgb(0, 120, 110),
    muted: Color::Rgb(130, 125, 115),
    border: Color::Rgb(200, 195, 185),
    highlight_fg: Color::Rgb(246, 243, 236),
    highlight_bg: Color::Rgb(0, 120, 110),
    stripe_bg: Color::Rgb(238, 234, 225),
    status: Color::Rgb(30, 90, 170),
    error: Color::Rgb(190, 40, 40),
    key_fg: Color::Rgb(246, 243, 236),
    key_bg: Color::Rgb(130, 125, 115),
  },
  Theme {
    name: "Terminal",
    bg: Color::Reset,
    fg: Color::Reset,
    accent: Color::Cyan,
    muted: Color::DarkGray,
    border: Color::DarkGray,
    highlight_fg: Color::Black,
    highlight_bg: Color::Cyan,
    stripe_bg: Color::Reset,
    status: Color::Blue,
    error: Color::Red,
    key_fg: Color::Black,
    key_bg: Color::Gray,
  },
];

pub fn theme_index(name: &str) -> usize {
  THEMES.iter().position(|t| t.name.eq_ignore_ascii_case(name)).unwrap_or(0)
}
