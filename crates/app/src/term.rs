//! ANSI terminal rendering surface.
//!
//! Stands in for a real windowing toolkit: one character cell per pixel,
//! cursor addressing for point placement, SGR codes for the trace and accent
//! colours. Good enough to watch a waveform scroll by over SSH.

use std::io::{self, Write};

use wavescope_core::{Color, Surface};

pub struct TermSurface {
    width: u32,
    height: u32,
    out: io::Stdout,
}

impl TermSurface {
    /// Sizes the drawing area from `COLUMNS`/`LINES`, falling back to a
    /// classic 80x24 when the shell does not export them.
    pub fn from_env() -> Self {
        let width = std::env::var("COLUMNS")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(80);
        let height = std::env::var("LINES")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(24);
        let mut surface = Self {
            width,
            height,
            out: io::stdout(),
        };
        surface.erase_rows(0, height);
        surface
    }

    fn put(&mut self, x: i32, y: i32, text: &str) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        // ANSI rows and columns are 1-based.
        let _ = write!(self.out, "\x1b[{};{}H{text}", y + 1, x + 1);
        let _ = self.out.flush();
    }

    fn erase_rows(&mut self, from: u32, to: u32) {
        let blank = " ".repeat(self.width as usize);
        for row in from..to.min(self.height) {
            let _ = write!(self.out, "\x1b[{};1H{blank}", row + 1);
        }
        let _ = self.out.flush();
    }
}

impl Surface for TermSurface {
    fn set_color(&mut self, color: Color) {
        let sgr = match color {
            Color::Trace => "37",
            Color::Accent => "33",
        };
        let _ = write!(self.out, "\x1b[{sgr}m");
    }

    fn draw_point(&mut self, x: i32, y: i32) {
        self.put(x, y, "*");
    }

    fn clear(&mut self, _x: i32, y: i32, _width: u32, height: u32) {
        let from = y.max(0) as u32;
        self.erase_rows(from, from.saturating_add(height));
    }

    fn draw_label(&mut self, text: &str, x: i32, y: i32) {
        self.put(x, y, text);
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
