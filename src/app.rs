use anyhow::{anyhow, Result};
use ratatui::widgets::ListState;

use crate::api::{BackendClient, SendReceipt, DEFAULT_RESPONDERS};
use crate::config::Config;
use crate::transcript::{Message, Transcript, FAILURE_MARKER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Chat,
    Settings,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Explicit send guard: a new send may begin only from `Idle`. The state
/// returns to `Idle` in `finish_send` on every outcome, so sends are
/// strictly serialized and at most one pending record can ever exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Idle,
    Sending,
}

/// Composer line with a char-indexed cursor, so editing stays UTF-8 safe.
#[derive(Debug, Default)]
pub struct Composer {
    text: String,
    cursor: usize,
}

impl Composer {
    fn byte_index(&self) -> usize {
        self.text
            .char_indices()
            .nth(self.cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = self.text.chars().count();
    }

    pub fn insert(&mut self, c: char) {
        let at = self.byte_index();
        self.text.insert(at, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_index();
            self.text.remove(at);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let at = self.byte_index();
            self.text.remove(at);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    // Conversation state
    pub transcript: Transcript,
    pub composer: Composer,
    pub send_state: SendState,
    pub send_task: Option<tokio::task::JoinHandle<Result<SendReceipt>>>,

    // Chat scroll state (area dimensions updated during render)
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,

    // Responder picker state
    pub responders: Vec<String>,
    pub selected_responder: String,
    pub show_responder_picker: bool,
    pub responder_picker_state: ListState,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Backend
    pub client: BackendClient,
}

impl App {
    pub fn new(client: BackendClient, config: &Config) -> Self {
        let responders: Vec<String> =
            DEFAULT_RESPONDERS.iter().map(|r| r.to_string()).collect();

        let selected_responder = config
            .default_responder
            .clone()
            .unwrap_or_else(|| responders[0].clone());

        Self {
            should_quit: false,
            screen: Screen::Chat,
            input_mode: InputMode::Editing,

            transcript: Transcript::new(),
            composer: Composer::default(),
            send_state: SendState::Idle,
            send_task: None,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            responders,
            selected_responder,
            show_responder_picker: false,
            responder_picker_state: ListState::default(),

            animation_frame: 0,

            client,
        }
    }

    /// One-shot history seed. Best effort: on any failure the transcript
    /// simply starts empty.
    pub async fn load_history(&mut self) {
        if let Ok(messages) = self.client.history().await {
            self.transcript.load(messages);
            self.scroll_chat_to_bottom();
        }
    }

    /// Refreshes the responder list from the backend's personas. Keeps the
    /// built-in list when the endpoint is unavailable or returns nothing.
    pub async fn refresh_responders(&mut self) {
        if let Ok(names) = self.client.responders().await {
            if !names.is_empty() {
                if !names.contains(&self.selected_responder) {
                    self.selected_responder = names[0].clone();
                }
                self.responders = names;
            }
        }
    }

    pub fn is_sending(&self) -> bool {
        self.send_state == SendState::Sending
    }

    /// Starts a send for the composer contents: optimistic insert, composer
    /// clear, then the network call as a background task. No-op while a
    /// send is already in flight or when the trimmed text is empty.
    pub fn begin_send(&mut self) {
        let raw = self.composer.text().trim().to_string();
        if raw.is_empty() || self.is_sending() {
            return;
        }

        self.send_state = SendState::Sending;
        self.transcript.append(Message::provisional(&raw));
        self.composer.clear();
        self.scroll_chat_to_bottom();

        let client = self.client.clone();
        let responder = self.selected_responder.clone();
        self.send_task = Some(tokio::spawn(async move {
            client.send(&raw, &responder).await
        }));
    }

    /// Called from the Tick event. When the in-flight request has finished,
    /// joins it and reconciles; a panicked task counts as a failed send, so
    /// the guard is released on every path.
    pub async fn poll_send(&mut self) {
        if !self.send_task.as_ref().is_some_and(|t| t.is_finished()) {
            return;
        }
        if let Some(task) = self.send_task.take() {
            let outcome = match task.await {
                Ok(result) => result,
                Err(join_err) => Err(anyhow!("send task failed: {join_err}")),
            };
            self.finish_send(outcome);
        }
    }

    /// Reconciliation: on success the server's records replace the
    /// provisional one; otherwise the provisional record is marked failed
    /// in place. Either way the send guard is released.
    pub fn finish_send(&mut self, outcome: Result<SendReceipt>) {
        match outcome {
            Ok(receipt) => self
                .transcript
                .replace_pending_with(receipt.user, receipt.reply),
            Err(_) => self.transcript.mark_pending_failed(FAILURE_MARKER),
        }
        self.send_state = SendState::Idle;
        self.scroll_chat_to_bottom();
    }

    /// Tick animation frame while a send is in flight.
    pub fn tick_animation(&mut self) {
        if self.is_sending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Chat scrolling

    pub fn scroll_chat_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_chat_down(&mut self) {
        let max = self.transcript_line_count().saturating_sub(self.chat_height);
        if self.chat_scroll < max {
            self.chat_scroll += 1;
        }
    }

    /// Pins the view to the newest message (and the in-flight indicator).
    pub fn scroll_chat_to_bottom(&mut self) {
        let mut total = self.transcript_line_count();
        if self.is_sending() {
            total += 2; // responder label + "Transmitting..." line
        }

        let visible = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        self.chat_scroll = total.saturating_sub(visible);
    }

    /// Rendered line count of the transcript at the current wrap width.
    /// Mirrors the layout in `ui::render_chat_screen`: author label, wrapped
    /// body lines, blank separator.
    fn transcript_line_count(&self) -> u16 {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total: u16 = 0;
        for msg in self.transcript.messages() {
            total += 1; // author label line
            for line in msg.text.lines() {
                let chars = line.chars().count();
                if chars == 0 {
                    total += 1;
                } else {
                    total += ((chars / wrap_width) + 1) as u16;
                }
            }
            total += 1; // blank line between messages
        }
        total
    }

    // Responder picker

    pub fn open_responder_picker(&mut self) {
        let current = self
            .responders
            .iter()
            .position(|r| *r == self.selected_responder)
            .unwrap_or(0);
        self.responder_picker_state.select(Some(current));
        self.show_responder_picker = true;
    }

    pub fn responder_picker_nav_down(&mut self) {
        let len = self.responders.len();
        if len > 0 {
            let i = self.responder_picker_state.selected().unwrap_or(0);
            self.responder_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn responder_picker_nav_up(&mut self) {
        let i = self.responder_picker_state.selected().unwrap_or(0);
        self.responder_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_responder(&mut self) {
        if let Some(i) = self.responder_picker_state.selected() {
            if let Some(responder) = self.responders.get(i) {
                self.selected_responder = responder.clone();
                self.show_responder_picker = false;
                // Remember the choice across sessions
                let _ = Config::save_default_responder(&self.selected_responder);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Role;

    fn test_app() -> App {
        // Nothing listens on the discard port, so any spawned request fails;
        // these tests drive the state machine directly.
        App::new(BackendClient::new("http://127.0.0.1:9"), &Config::new())
    }

    fn record(id: &str, role: Role, text: &str, ts: &str) -> Message {
        Message {
            id: id.to_string(),
            role,
            text: text.to_string(),
            ts: ts.to_string(),
            pending: false,
        }
    }

    fn receipt(user_text: &str, n: u32) -> SendReceipt {
        SendReceipt {
            user: record(&format!("u{n}"), Role::User, user_text, "T1"),
            reply: record(&format!("a{n}"), Role::Agent, "hello", "T2"),
        }
    }

    #[tokio::test]
    async fn successful_send_reconciles_to_confirmed_records() {
        let mut app = test_app();
        app.composer.set_text("hi");
        app.begin_send();

        assert!(app.is_sending());
        assert!(app.transcript.has_pending());
        assert_eq!(app.composer.text(), "");

        app.finish_send(Ok(receipt("hi", 1)));

        let ids: Vec<&str> = app
            .transcript
            .messages()
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(ids, vec!["u1", "a1"]);
        assert!(!app.transcript.has_pending());
        assert!(!app.is_sending());
    }

    #[tokio::test]
    async fn failed_send_marks_provisional_record() {
        let mut app = test_app();
        app.composer.set_text("hi");
        app.begin_send();

        app.finish_send(Err(anyhow!("network unreachable")));

        assert_eq!(app.transcript.messages().len(), 1);
        let m = &app.transcript.messages()[0];
        assert_eq!(m.text, format!("hi{FAILURE_MARKER}"));
        assert!(!m.pending);
        assert!(!app.is_sending());
    }

    #[tokio::test]
    async fn send_is_rejected_while_one_is_in_flight() {
        let mut app = test_app();
        app.composer.set_text("first");
        app.begin_send();

        app.composer.set_text("second");
        app.begin_send();

        // The second invocation must not touch the transcript.
        assert_eq!(app.transcript.messages().len(), 1);
        assert_eq!(app.transcript.messages()[0].text, "first");
        assert_eq!(app.composer.text(), "second");
    }

    #[tokio::test]
    async fn blank_input_does_not_send() {
        let mut app = test_app();
        app.composer.set_text("   ");
        app.begin_send();

        assert!(app.transcript.is_empty());
        assert!(!app.is_sending());
    }

    #[tokio::test]
    async fn input_is_trimmed_before_insert() {
        let mut app = test_app();
        app.composer.set_text("  hi  ");
        app.begin_send();

        assert_eq!(app.transcript.messages()[0].text, "hi");
    }

    #[tokio::test]
    async fn sequential_sends_accumulate_in_order() {
        let mut app = test_app();

        app.composer.set_text("one");
        app.begin_send();
        app.finish_send(Ok(receipt("one", 1)));

        app.composer.set_text("two");
        app.begin_send();
        app.finish_send(Ok(receipt("two", 2)));

        let ids: Vec<&str> = app
            .transcript
            .messages()
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(ids, vec!["u1", "a1", "u2", "a2"]);
    }

    #[tokio::test]
    async fn guard_releases_after_failure_so_next_send_can_start() {
        let mut app = test_app();
        app.composer.set_text("one");
        app.begin_send();
        app.finish_send(Err(anyhow!("boom")));

        app.composer.set_text("two");
        app.begin_send();
        assert!(app.is_sending());
        assert_eq!(app.transcript.messages().len(), 2);
    }

    #[tokio::test]
    async fn poll_send_reconciles_a_finished_task() {
        let mut app = test_app();
        app.composer.set_text("hi");
        // Drive the real spawn path against the closed port.
        app.begin_send();

        while !app.send_task.as_ref().unwrap().is_finished() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        app.poll_send().await;

        assert!(!app.is_sending());
        assert!(app.send_task.is_none());
        assert_eq!(
            app.transcript.messages()[0].text,
            format!("hi{FAILURE_MARKER}")
        );
    }

    #[tokio::test]
    async fn panicked_send_task_counts_as_failure() {
        let mut app = test_app();
        app.transcript.append(Message::provisional("hi"));
        app.send_state = SendState::Sending;
        app.send_task = Some(tokio::spawn(async { panic!("worker died") }));

        while !app.send_task.as_ref().unwrap().is_finished() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        app.poll_send().await;

        assert!(!app.is_sending());
        assert_eq!(
            app.transcript.messages()[0].text,
            format!("hi{FAILURE_MARKER}")
        );
    }

    #[test]
    fn composer_edits_are_utf8_safe() {
        let mut composer = Composer::default();
        for c in "héllo".chars() {
            composer.insert(c);
        }
        composer.left();
        composer.left();
        composer.backspace(); // removes the first 'l'
        assert_eq!(composer.text(), "hélo");

        composer.home();
        composer.delete(); // removes 'h'
        assert_eq!(composer.text(), "élo");

        composer.end();
        composer.insert('!');
        assert_eq!(composer.text(), "élo!");
        assert_eq!(composer.cursor(), 4);
    }

    #[test]
    fn responder_picker_clamps_at_bounds() {
        let mut app = test_app();
        app.open_responder_picker();
        assert!(app.show_responder_picker);
        assert_eq!(app.responder_picker_state.selected(), Some(0));

        app.responder_picker_nav_up(); // already at top
        assert_eq!(app.responder_picker_state.selected(), Some(0));

        for _ in 0..10 {
            app.responder_picker_nav_down();
        }
        assert_eq!(
            app.responder_picker_state.selected(),
            Some(app.responders.len() - 1)
        );
    }
}
