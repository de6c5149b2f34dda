//! Full-screen chart frontend.

use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::app::App;
use crate::coordinator::{Frontend, Pump};
use crate::events;
use crate::sink::ChartSink;
use crate::ui::{self, Theme};

/// Draws every host's [`ChartSink`] with ratatui and reads keys with crossterm.
///
/// Owns the terminal from [`TerminalFrontend::enter`] until it is dropped
/// (or [`TerminalFrontend::restore`] is called).
pub struct TerminalFrontend {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    app: App,
    restored: bool,
}

impl TerminalFrontend {
    /// Switch to raw mode and the alternate screen.
    ///
    /// Installs a panic hook that puts the terminal back before the panic
    /// message is printed.
    pub fn enter(host_count: usize, theme: Theme) -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        // Setup panic hook to restore terminal
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            original_hook(panic);
        }));

        Ok(Self {
            terminal,
            app: App::new(host_count, theme),
            restored: false,
        })
    }

    /// Leave the alternate screen and raw mode. Idempotent.
    pub fn restore(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }

    fn handle_events(&mut self) -> Result<()> {
        // Drain everything queued so a held key cannot lag the display
        while let Some(event) = events::poll_event(Duration::ZERO)? {
            match event {
                Event::Key(key) => events::handle_key_event(&mut self.app, key),
                Event::Resize(_, _) => {
                    // Terminal will redraw on next frame
                }
                _ => {}
            }
            if !self.app.running {
                break;
            }
        }
        Ok(())
    }
}

impl Frontend<ChartSink> for TerminalFrontend {
    fn pump(&mut self, sinks: &[ChartSink]) -> Result<Pump> {
        if self.restored {
            return Ok(Pump::Quit);
        }

        self.app.track_stalls(sinks);
        let app = &self.app;
        self.terminal.draw(|frame| ui::render(frame, app, sinks))?;

        self.handle_events()?;
        if self.app.running {
            Ok(Pump::Continue)
        } else {
            Ok(Pump::Quit)
        }
    }
}

impl Drop for TerminalFrontend {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::warn!(error = %e, "Failed to restore terminal");
        }
    }
}
