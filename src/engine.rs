//! Wire contract with the external execution engine.
//!
//! Every command is one JSON POST `{ "action", "code" }` answered by one JSON
//! reply. [`EngineChannel`] is the only seam to the engine; [`HttpEngine`] is
//! the production implementation.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Client, Method, Request, Uri};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Buttons the console offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Load,
    Reset,
    Step,
    Run,
}

impl UserAction {
    pub fn from_name(name: &str) -> Option<UserAction> {
        match name {
            "load" => Some(UserAction::Load),
            "reset" => Some(UserAction::Reset),
            "step" => Some(UserAction::Step),
            "run" => Some(UserAction::Run),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Load(String),
    Reset,
    Step,
    Run,
}

impl Command {
    /// Editor text only travels with `load`.
    pub fn for_action(action: UserAction, editor_text: &str) -> Command {
        match action {
            UserAction::Load => Command::Load(editor_text.to_string()),
            UserAction::Reset => Command::Reset,
            UserAction::Step => Command::Step,
            UserAction::Run => Command::Run,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Command::Load(_) => "load",
            Command::Reset => "reset",
            Command::Step => "step",
            Command::Run => "run",
        }
    }

    pub fn request(&self) -> CommandRequest<'_> {
        let code = match self {
            Command::Load(source) => source.as_str(),
            _ => "",
        };
        CommandRequest {
            action: self.action(),
            code,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommandRequest<'a> {
    pub action: &'static str,
    pub code: &'a str,
}

/// Register values arrive either pre-formatted or as raw words.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RegisterValue {
    Text(String),
    Word(u16),
}

// Distinguishes a field set to `null` (Some(None)) from a missing field (None).
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub registers: Option<HashMap<String, RegisterValue>>,
    #[serde(default)]
    pub flags: Option<HashMap<String, bool>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub current_instruction: Option<Option<String>>,
    #[serde(default)]
    pub microinstructions: Option<Vec<String>>,
    #[serde(default)]
    pub memory: Option<Vec<u8>>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("engine request failed: {0}")]
    Request(String),
    #[error("engine returned HTTP {0}")]
    Status(u16),
    #[error("engine did not answer within {0:?}")]
    TimedOut(Duration),
}

/// One request, one reply. Implementations carry raw bytes; decoding the
/// reply is the synchronizer's job.
pub trait EngineChannel: Send + Sync + 'static {
    fn exchange(&self, body: Vec<u8>) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}

pub struct HttpEngine {
    client: Client<HttpConnector>,
    endpoint: Uri,
    timeout: Option<Duration>,
}

impl HttpEngine {
    pub fn new(endpoint: Uri, timeout: Option<Duration>) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            timeout,
        }
    }

    async fn post(&self, body: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let bytes = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl std::fmt::Debug for HttpEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEngine")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl EngineChannel for HttpEngine {
    async fn exchange(&self, body: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.post(body))
                .await
                .map_err(|_| TransportError::TimedOut(limit))?,
            None => self.post(body).await,
        }
    }
}
