use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

/// Suffix appended to a message that could not be delivered.
pub const FAILURE_MARKER: &str = "  ❌ (failed)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    // The backend historically labels its replies "server".
    #[serde(alias = "server")]
    Agent,
}

/// One entry in the transcript, matching the backend wire shape
/// `{ id, role, text, ts }`. The `pending` flag is local-only: true while
/// an optimistically inserted message awaits the server's confirmation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Message {
    #[serde(deserialize_with = "id_from_wire")]
    pub id: String,
    pub role: Role,
    pub text: String,
    pub ts: String,
    #[serde(skip)]
    pub pending: bool,
}

/// The backend assigns integer ids; locally generated ones are strings.
/// Accept both and normalize to a string.
fn id_from_wire<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WireId {
        Num(i64),
        Str(String),
    }

    Ok(match WireId::deserialize(deserializer)? {
        WireId::Num(n) => n.to_string(),
        WireId::Str(s) => s,
    })
}

impl Message {
    /// A provisional user message awaiting reconciliation. Gets a fresh
    /// local id; the server-assigned id supersedes it on confirmation.
    pub fn provisional(text: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            text: text.to_string(),
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            pending: true,
        }
    }

    /// Wall-clock time for display. Falls back to the raw timestamp if the
    /// server sent something that isn't RFC 3339.
    pub fn clock_time(&self) -> String {
        DateTime::parse_from_rfc3339(&self.ts)
            .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
            .unwrap_or_else(|_| self.ts.clone())
    }
}

/// Ordered, append-only transcript of the conversation. Single source of
/// truth for what the chat screen renders. Does no I/O itself; the send
/// protocol in `app.rs` drives all mutation.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole transcript. Used once, when history is seeded.
    pub fn load(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Reconciles a confirmed send: drops the provisional record and appends
    /// the server's user record followed by the reply. Safe (pure append)
    /// when no record is pending, though the send guard prevents that case.
    pub fn replace_pending_with(&mut self, user: Message, reply: Message) {
        self.messages.retain(|m| !m.pending);
        self.messages.push(user);
        self.messages.push(reply);
    }

    /// Marks the pending record as failed: appends `suffix` to its text and
    /// clears the flag. Failed messages are terminal; they keep their
    /// provisional id and are never retried. No-op without a pending record.
    pub fn mark_pending_failed(&mut self, suffix: &str) {
        if let Some(m) = self.messages.iter_mut().find(|m| m.pending) {
            m.text.push_str(suffix);
            m.pending = false;
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        self.messages.iter().any(|m| m.pending)
    }
}
