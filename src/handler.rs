use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, InputMode, Screen};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
            // Reconcile the in-flight send, if it has finished
            app.poll_send().await;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global quit, regardless of mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.show_responder_picker {
        handle_picker_key(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_picker_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.show_responder_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.responder_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.responder_picker_nav_up(),
        KeyCode::Enter => app.select_responder(),
        _ => {}
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    // Screen switching works on every page, like the original's nav bar
    match key.code {
        KeyCode::Char('1') => {
            app.screen = Screen::Chat;
            return;
        }
        KeyCode::Char('2') => {
            app.screen = Screen::Settings;
            return;
        }
        KeyCode::Char('3') => {
            app.screen = Screen::Info;
            return;
        }
        KeyCode::Char('q') => {
            app.should_quit = true;
            return;
        }
        _ => {}
    }

    match app.screen {
        Screen::Chat => match key.code {
            KeyCode::Char('i') | KeyCode::Enter => {
                app.input_mode = InputMode::Editing;
            }
            KeyCode::Char('r') => app.open_responder_picker(),
            KeyCode::Char('j') | KeyCode::Down => app.scroll_chat_down(),
            KeyCode::Char('k') | KeyCode::Up => app.scroll_chat_up(),
            KeyCode::Char('G') => app.scroll_chat_to_bottom(),
            _ => {}
        },
        Screen::Settings | Screen::Info => {
            if key.code == KeyCode::Esc {
                app.screen = Screen::Chat;
            }
        }
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.begin_send(),
        KeyCode::Backspace => app.composer.backspace(),
        KeyCode::Delete => app.composer.delete(),
        KeyCode::Left => app.composer.left(),
        KeyCode::Right => app.composer.right(),
        KeyCode::Home => app.composer.home(),
        KeyCode::End => app.composer.end(),
        KeyCode::Up => app.scroll_chat_up(),
        KeyCode::Down => app.scroll_chat_down(),
        KeyCode::Char(c) => app.composer.insert(c),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::BackendClient;
    use crate::config::Config;

    fn test_app() -> App {
        App::new(BackendClient::new("http://127.0.0.1:9"), &Config::new())
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn typing_feeds_the_composer() {
        let mut app = test_app();
        for c in "hi there".chars() {
            handle_key(&mut app, press(KeyCode::Char(c)));
        }
        assert_eq!(app.composer.text(), "hi there");

        handle_key(&mut app, press(KeyCode::Backspace));
        assert_eq!(app.composer.text(), "hi ther");
    }

    #[test]
    fn ctrl_c_quits_in_any_mode() {
        let mut app = test_app();
        handle_key(
            &mut app,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        );
        assert!(app.should_quit);
    }

    #[test]
    fn escape_leaves_editing_and_number_keys_route_screens() {
        let mut app = test_app();
        assert_eq!(app.input_mode, InputMode::Editing);

        handle_key(&mut app, press(KeyCode::Esc));
        assert_eq!(app.input_mode, InputMode::Normal);

        handle_key(&mut app, press(KeyCode::Char('2')));
        assert_eq!(app.screen, Screen::Settings);

        handle_key(&mut app, press(KeyCode::Char('3')));
        assert_eq!(app.screen, Screen::Info);

        handle_key(&mut app, press(KeyCode::Esc));
        assert_eq!(app.screen, Screen::Chat);
    }

    #[tokio::test]
    async fn enter_in_editing_mode_starts_a_send() {
        let mut app = test_app();
        for c in "hi".chars() {
            handle_key(&mut app, press(KeyCode::Char(c)));
        }
        handle_key(&mut app, press(KeyCode::Enter));

        assert!(app.is_sending());
        assert!(app.transcript.has_pending());
        assert_eq!(app.composer.text(), "");
    }

    #[test]
    fn picker_captures_keys_while_open() {
        let mut app = test_app();
        handle_key(&mut app, press(KeyCode::Esc));
        handle_key(&mut app, press(KeyCode::Char('r')));
        assert!(app.show_responder_picker);

        handle_key(&mut app, press(KeyCode::Char('j')));
        assert_eq!(app.responder_picker_state.selected(), Some(1));

        handle_key(&mut app, press(KeyCode::Esc));
        assert!(!app.show_responder_picker);
    }
}
