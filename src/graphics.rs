use image::{DynamicImage, imageops::FilterType};
use ratatui::{
  buffer::Buffer,
  layout::Rect,
  style::{Color, Style},
  widgets::Widget,
};

use crate::display::DisplayMode;

// --- Poster Widget ---

/// Draws an already-resized poster centered in its area.
pub struct PosterWidget<'a> {
  pub image: &'a DynamicImage,
  pub display_mode: DisplayMode,
}

const ASCII_RAMP: [&str; 10] = [" ", ".", ":", "-", "=", "+", "*", "#", "%", "@"];

impl Widget for PosterWidget<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    if area.is_empty() {
      return;
    }
    match self.display_mode {
      DisplayMode::Direct => render_half_blocks(self.image, area, buf),
      DisplayMode::Ascii => render_ascii(self.image, area, buf),
    }
  }
}

/// Resize a poster to fill a `cols` x `rows` cell area for the given mode.
///
/// Half blocks pack two pixel rows per cell; ASCII gets one.
pub fn fit_poster(image: &DynamicImage, cols: u16, rows: u16, mode: DisplayMode) -> DynamicImage {
  let w = u32::from(cols).max(1);
  let h = match mode {
    DisplayMode::Direct => u32::from(rows) * 2,
    DisplayMode::Ascii => u32::from(rows),
  };
  image.resize_to_fill(w, h.max(1), FilterType::Triangle)
}

fn cell(area: Rect, dx: u32, dy: u32) -> (u16, u16) {
  let x = area.x.saturating_add(dx.min(u16::MAX as u32) as u16);
  let y = area.y.saturating_add(dy.min(u16::MAX as u32) as u16);
  (x, y)
}

fn render_half_blocks(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let rgb = image.to_rgb8();
  let img_w = rgb.width().min(area.width as u32);
  let img_h = rgb.height();
  let cell_h = img_h.div_ceil(2).min(area.height as u32);
  let offset_x = (area.width as u32).saturating_sub(img_w) / 2;
  let offset_y = (area.height as u32).saturating_sub(cell_h) / 2;

  for y in 0..cell_h {
    for x in 0..img_w {
      let upper = rgb.get_pixel(x, y * 2);
      let fg = Color::Rgb(upper[0], upper[1], upper[2]);
      let bg = if y * 2 + 1 < img_h {
        let lower = rgb.get_pixel(x, y * 2 + 1);
        Color::Rgb(lower[0], lower[1], lower[2])
      } else {
        Color::Reset
      };
      let (cx, cy) = cell(area, offset_x + x, offset_y + y);
      buf.set_string(cx, cy, "▀", Style::default().fg(fg).bg(bg));
    }
  }
}

fn ramp_index(luma: u8) -> usize {
  let idx = ((luma as f32 / 255.0) * (ASCII_RAMP.len() - 1) as f32).round() as usize;
  idx.min(ASCII_RAMP.len() - 1)
}

fn render_ascii(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let gray = image.to_luma8();
  let img_w = gray.width().min(area.width as u32);
  let img_h = gray.height().min(area.height as u32);
  let offset_x = (area.width as u32).saturating_sub(img_w) / 2;
  let offset_y = (area.height as u32).saturating_sub(img_h) / 2;

  for y in 0..img_h {
    for x in 0..img_w {
      let (cx, cy) = cell(area, offset_x + x, offset_y + y);
      buf.set_string(cx, cy, ASCII_RAMP[ramp_index(gray.get_pixel(x, y)[0])], Style::default());
    }
  }
}
