use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::transcript::Message;

/// Built-in responder list, used when the backend's personas endpoint is
/// unreachable. Matches the trio the backend ships with.
pub const DEFAULT_RESPONDERS: [&str; 3] = ["Marcus", "Agent1", "Agent2"];

#[derive(Serialize)]
struct SendRequest {
    text: String,
    // The backend names the responder field "model".
    model: String,
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    ok: bool,
    user: Option<Message>,
    reply: Option<Message>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct Persona {
    name: String,
}

#[derive(Deserialize)]
struct PersonasResponse {
    #[serde(default)]
    personas: Vec<Persona>,
}

/// A confirmed send: the server's copy of the user message plus the
/// responder's reply.
#[derive(Debug)]
pub struct SendReceipt {
    pub user: Message,
    pub reply: Message,
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches the stored transcript. The caller treats any error as an
    /// empty history.
    pub async fn history(&self) -> Result<Vec<Message>> {
        let url = format!("{}/api/messages", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("history request failed: {}", response.status()));
        }

        let history: HistoryResponse = response.json().await?;
        Ok(history.messages)
    }

    /// Submits one message. Returns a receipt only for a well-formed
    /// `ok: true` body carrying both records; everything else (transport
    /// error, non-success status, unparseable body, `ok: false`, missing
    /// `user`/`reply`) is an error the send protocol marks as a failure.
    pub async fn send(&self, text: &str, responder: &str) -> Result<SendReceipt> {
        let url = format!("{}/api/message", self.base_url);

        let request = SendRequest {
            text: text.to_string(),
            model: responder.to_string(),
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("send failed with status: {}", response.status()));
        }

        let body: SendResponse = response.json().await?;

        if !body.ok {
            return Err(anyhow!(
                "send rejected: {}",
                body.error.unwrap_or_else(|| "unknown error".to_string())
            ));
        }

        match (body.user, body.reply) {
            (Some(user), Some(reply)) => Ok(SendReceipt { user, reply }),
            _ => Err(anyhow!("send response missing user or reply")),
        }
    }

    /// Lists responder personas known to the backend, sorted by name.
    pub async fn responders(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/personas", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("failed to list personas: {}", response.status()));
        }

        let personas: PersonasResponse = response.json().await?;
        let mut names: Vec<String> = personas.personas.into_iter().map(|p| p.name).collect();
        names.sort_by_key(|n| n.to_lowercase());

        Ok(names)
    }
}
