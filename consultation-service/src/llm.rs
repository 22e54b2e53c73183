//! External call adapter for the generative collaborator.
//!
//! [`CompletionBackend`] is the seam: the production implementation talks to
//! OpenRouter through rig, tests swap in scripted mocks. [`CopilotClient`]
//! builds the flow-specific prompts and normalizes the structured response.
//! No backend error escapes past the flow layer; every failure becomes a
//! fixed placeholder text or a null recommendation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use copilot_core::{ChatRole, ChatTurn, Patient, TriageRecommendation, parse_recommendation, prompt};
use rig::agent::Agent;
use rig::client::CompletionClient;
use rig::completion::{Chat, Message, Prompt};
use rig::providers::openrouter;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Low temperature for analytical, factual responses.
const TEMPERATURE: f64 = 0.2;

/// Fixed user-facing text when the credential is missing.
pub const CONFIG_ERROR_TEXT: &str = "Error: API Key no configurada.";
/// Fallback shown in place of a case analysis when the call fails.
pub const ANALYSIS_FALLBACK_TEXT: &str =
    "Lo siento, hubo un error conectando con el servicio de IA. Verifique su conexión.";
/// Fallback appended to the transcript when a chat turn fails.
pub const CHAT_FALLBACK_TEXT: &str = "Error en el servicio de chat.";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("OPENROUTER_API_KEY not set")]
    NotConfigured,
    #[error("completion request timed out after {0}s")]
    Timeout(u64),
    #[error("completion call failed: {0}")]
    Call(String),
    #[error("empty completion response")]
    EmptyResponse,
}

impl BackendError {
    /// Placeholder text to show in place of a real result. A missing
    /// credential has its own fixed message; everything else uses the
    /// flow's fallback.
    pub fn user_text(&self, fallback: &'static str) -> &'static str {
        match self {
            BackendError::NotConfigured => CONFIG_ERROR_TEXT,
            _ => fallback,
        }
    }
}

/// Completion calls against the external generative collaborator.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// One-shot free-text or structured completion.
    async fn complete(&self, preamble: &str, prompt: &str) -> Result<String, BackendError>;

    /// Chat completion with ordered history; `message` is the newest turn.
    async fn chat(
        &self,
        preamble: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String, BackendError>;
}

/// Production backend: OpenRouter via rig.
///
/// Constructed from the environment. A missing API key is not fatal at
/// startup; every call then settles with [`BackendError::NotConfigured`] and
/// the flows surface the fixed configuration-error text.
pub struct OpenRouterBackend {
    client: Option<openrouter::Client>,
    model: String,
}

impl OpenRouterBackend {
    pub fn from_env() -> Self {
        let client = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .map(|key| openrouter::Client::new(&key));
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        info!(model = %model, "OpenRouter backend configured");

        Self { client, model }
    }

    fn agent(&self, preamble: &str) -> Result<Agent<openrouter::CompletionModel>, BackendError> {
        let client = self.client.as_ref().ok_or(BackendError::NotConfigured)?;
        Ok(client
            .agent(&self.model)
            .preamble(preamble)
            .temperature(TEMPERATURE)
            .build())
    }
}

#[async_trait]
impl CompletionBackend for OpenRouterBackend {
    async fn complete(&self, preamble: &str, prompt: &str) -> Result<String, BackendError> {
        let agent = self.agent(preamble)?;
        agent
            .prompt(prompt)
            .await
            .map_err(|e| BackendError::Call(e.to_string()))
    }

    async fn chat(
        &self,
        preamble: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String, BackendError> {
        let agent = self.agent(preamble)?;
        let history = to_rig_messages(history);
        agent
            .chat(message, history)
            .await
            .map_err(|e| BackendError::Call(e.to_string()))
    }
}

/// Convert transcript turns into rig chat messages, preserving order.
fn to_rig_messages(turns: &[ChatTurn]) -> Vec<Message> {
    turns
        .iter()
        .map(|turn| match turn.role {
            ChatRole::User => Message::user(turn.text.clone()),
            ChatRole::Model => Message::assistant(turn.text.clone()),
        })
        .collect()
}

/// Flow-facing client: builds the prompt for each use case, bounds every
/// backend call with the configured timeout, and hands the structured triage
/// response through strict schema parsing. A timeout and an empty reply are
/// both transport failures, whichever backend sits behind the seam.
#[derive(Clone)]
pub struct CopilotClient {
    backend: Arc<dyn CompletionBackend>,
    timeout: Duration,
}

impl CopilotClient {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self::with_timeout(backend, timeout_from_env())
    }

    pub fn with_timeout(backend: Arc<dyn CompletionBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub async fn analyze_case(
        &self,
        patient: &Patient,
        notes: &str,
    ) -> Result<String, BackendError> {
        let prompt_text = prompt::analysis_prompt(patient, notes);
        self.settle(self.backend.complete(prompt::ANALYSIS_PREAMBLE, &prompt_text))
            .await
    }

    pub async fn chat_turn(
        &self,
        patient: &Patient,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String, BackendError> {
        let context_line = prompt::chat_context_line(patient, message);
        self.settle(
            self.backend
                .chat(prompt::CHAT_SYSTEM_INSTRUCTION, history, &context_line),
        )
        .await
    }

    /// Structured triage call. `Ok(None)` means the collaborator answered
    /// but its response did not match the schema: no recommendation is
    /// available, which the caller must render as an absent result.
    pub async fn triage(
        &self,
        patient: &Patient,
        notes: &str,
    ) -> Result<Option<TriageRecommendation>, BackendError> {
        let prompt_text = prompt::triage_prompt(patient, notes);
        let raw = self
            .settle(self.backend.complete(prompt::TRIAGE_PREAMBLE, &prompt_text))
            .await?;
        Ok(parse_recommendation(&raw))
    }

    /// Await one backend call under the timeout and reject blank replies.
    async fn settle<F>(&self, call: F) -> Result<String, BackendError>
    where
        F: Future<Output = Result<String, BackendError>> + Send,
    {
        let secs = self.timeout.as_secs();
        let response = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| BackendError::Timeout(secs))??;

        if response.trim().is_empty() {
            return Err(BackendError::EmptyResponse);
        }
        Ok(response)
    }
}

fn timeout_from_env() -> Duration {
    let secs = std::env::var("LLM_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    Duration::from_secs(secs)
}
