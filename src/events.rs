use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::app::{App, View};

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // Windows reports releases too
    if key.kind == KeyEventKind::Release {
        return;
    }

    // Raw mode swallows SIGINT, so Ctrl-C arrives as a key
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return;
    }

    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.quit(),

        // Esc leaves focus first, then quits
        KeyCode::Esc => match app.view {
            View::Focus => app.show_grid(),
            View::Grid => app.quit(),
        },

        KeyCode::Tab | KeyCode::Right | KeyCode::Down | KeyCode::Char('l') | KeyCode::Char('j') => {
            app.select_next()
        }
        KeyCode::BackTab | KeyCode::Left | KeyCode::Up | KeyCode::Char('h') | KeyCode::Char('k') => {
            app.select_prev()
        }

        KeyCode::Enter | KeyCode::Char('z') => app.toggle_focus(),
        KeyCode::Char('g') => app.show_grid(),

        KeyCode::Char('?') => app.toggle_help(),

        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::Theme;

    fn press(app: &mut App, code: KeyCode) {
        handle_key_event(app, KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[test]
    fn test_quit_keys() {
        let mut app = App::new(2, Theme::dark());
        press(&mut app, KeyCode::Char('q'));
        assert!(!app.running);

        let mut app = App::new(2, Theme::dark());
        handle_key_event(
            &mut app,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        );
        assert!(!app.running);
    }

    #[test]
    fn test_escape_leaves_focus_before_quitting() {
        let mut app = App::new(2, Theme::dark());
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.view, View::Focus);

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.view, View::Grid);
        assert!(app.running);

        press(&mut app, KeyCode::Esc);
        assert!(!app.running);
    }

    #[test]
    fn test_navigation_keys() {
        let mut app = App::new(3, Theme::dark());
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('l'));
        assert_eq!(app.selected, 2);
        press(&mut app, KeyCode::BackTab);
        assert_eq!(app.selected, 1);
    }

    #[test]
    fn test_help_swallows_next_key() {
        let mut app = App::new(1, Theme::dark());
        press(&mut app, KeyCode::Char('?'));
        assert!(app.show_help);

        press(&mut app, KeyCode::Char('q'));
        assert!(!app.show_help);
        assert!(app.running);
    }
}
