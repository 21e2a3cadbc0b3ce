//! Alternate-screen rendering while a workflow streams.

use crate::Renderer;
use crate::view::{self, LiveView};
use crossterm::{
    cursor::{Hide, Show},
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{self, Stdout, stdout};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// Minimum gap between two unforced redraws.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(50);

/// Owns the terminal for the duration of a run.
///
/// Raw mode swallows Ctrl-C as a signal, so a key listener task calls
/// `on_stop` for Ctrl-C or `q` instead. The terminal is restored on
/// [`Renderer::finish`] or on drop, whichever comes first.
pub struct LiveTerminal {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    keys: JoinHandle<()>,
    last_draw: Option<Instant>,
    restored: bool,
}

impl LiveTerminal {
    /// Must be called inside a tokio runtime.
    pub fn enter<F>(on_stop: F) -> io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        enable_raw_mode()?;
        let guard = scopeguard::guard((), |()| {
            let _ = execute!(stdout(), Show, LeaveAlternateScreen);
            let _ = disable_raw_mode();
        });
        execute!(stdout(), EnterAlternateScreen, Hide)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
        terminal.clear()?;
        scopeguard::ScopeGuard::into_inner(guard);

        Ok(Self {
            terminal,
            keys: spawn_key_listener(on_stop),
            last_draw: None,
            restored: false,
        })
    }

    fn restore(&mut self) -> io::Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        self.keys.abort();
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), Show, LeaveAlternateScreen)?;
        Ok(())
    }
}

impl Renderer for LiveTerminal {
    fn render(&mut self, view: &LiveView<'_>, force: bool) -> io::Result<()> {
        if self.restored {
            return Ok(());
        }
        if !force && self.last_draw.is_some_and(|t| t.elapsed() < FRAME_INTERVAL) {
            return Ok(());
        }
        self.terminal.draw(|frame| view::draw(frame, view))?;
        self.last_draw = Some(Instant::now());
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.restore()
    }
}

impl Drop for LiveTerminal {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

fn spawn_key_listener<F>(on_stop: F) -> JoinHandle<()>
where
    F: Fn() + Send + 'static,
{
    tokio::spawn(async move {
        let mut events = EventStream::new();
        while let Some(event) = events.next().await {
            match event {
                Ok(Event::Key(key)) if is_stop_key(&key) => {
                    debug!("Stop key pressed");
                    on_stop();
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "Terminal event stream failed");
                    break;
                }
            }
        }
    })
}

/// Ctrl-C or `q`, on press only.
pub fn is_stop_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        KeyCode::Char('q') => key.modifiers.is_empty(),
        _ => false,
    }
}
