use clap::ValueEnum;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliDisplayMode {
  Auto,
  Direct,
  Ascii,
}

/// How posters are drawn in the player pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
  /// Grayscale character ramp.
  Ascii,
  /// True-color half blocks, two pixels per cell.
  Direct,
}

impl DisplayMode {
  pub fn label(self) -> &'static str {
    match self {
      DisplayMode::Ascii => "ASCII",
      DisplayMode::Direct => "Half-block",
    }
  }
}

/// Pick half blocks when `COLORTERM` advertises true color.
fn detect_from(colorterm: &str) -> DisplayMode {
  match colorterm.to_lowercase().as_str() {
    "truecolor" | "24bit" => DisplayMode::Direct,
    _ => DisplayMode::Ascii,
  }
}

pub fn detect_display_mode() -> DisplayMode {
  detect_from(&std::env::var("COLORTERM").unwrap_or_default())
}

pub fn resolve_display_mode(cli: CliDisplayMode) -> DisplayMode {
  match cli {
    CliDisplayMode::Auto => detect_display_mode(),
    CliDisplayMode::Direct => DisplayMode::Direct,
    CliDisplayMode::Ascii => DisplayMode::Ascii,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn truecolor_selects_half_blocks() {
    assert_eq!(detect_from("truecolor"), DisplayMode::Direct);
    assert_eq!(detect_from("24BIT"), DisplayMode::Direct);
  }

  #[test]
  fn anything_else_is_ascii() {
    assert_eq!(detect_from(""), DisplayMode::Ascii);
    assert_eq!(detect_from("256color"), DisplayMode::Ascii);
  }

  #[test]
  fn explicit_modes_skip_detection() {
    assert_eq!(resolve_display_mode(CliDisplayMode::Ascii), DisplayMode::Ascii);
    assert_eq!(resolve_display_mode(CliDisplayMode::Direct), DisplayMode::Direct);
  }
}
