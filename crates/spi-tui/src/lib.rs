//! # spi-tui
//!
//! Live view for SPI Agent runs: a status table beside the scrolling tool
//! output, redrawn on every line and on a timer. [`PlainRenderer`] carries the
//! same information as plain lines when stdout is not a terminal.

mod live;
mod plain;
mod theme;
mod view;
pub mod widgets;

use std::io;

pub use live::{FRAME_INTERVAL, LiveTerminal, is_stop_key};
pub use plain::PlainRenderer;
pub use theme::{LineClass, classify, tone_color};
pub use view::{LiveView, draw};

/// Draws [`LiveView`] frames for one run.
pub trait Renderer: Send {
    /// `force` bypasses frame throttling, used for the first and last frame.
    fn render(&mut self, view: &LiveView<'_>, force: bool) -> io::Result<()>;

    /// Hands the terminal back. Called once after the last frame.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}
