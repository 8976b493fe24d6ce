use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Message in a Langbase conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Body of `POST /v1/pipes/run`
#[derive(Debug, Clone, Serialize)]
pub struct PipeRequest {
    /// Pipe name (required by Langbase API)
    pub name: String,
    pub messages: Vec<Message>,
    /// Always false: the generator needs the whole completion at once.
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<HashMap<String, String>>,
}

impl PipeRequest {
    pub fn new(name: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            name: name.into(),
            messages,
            stream: false,
            variables: None,
        }
    }

    /// Add a single template variable
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Response from a pipe run
#[derive(Debug, Clone, Deserialize)]
pub struct PipeResponse {
    #[serde(default)]
    pub success: bool,
    pub completion: String,
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
    pub raw: Option<RawResponse>,
}

impl PipeResponse {
    /// Total tokens reported by the model, if any.
    pub fn total_tokens(&self) -> Option<u32> {
        self.raw
            .as_ref()
            .and_then(|raw| raw.usage.as_ref())
            .and_then(|usage| usage.total_tokens)
    }
}

/// Raw model response details
#[derive(Debug, Clone, Deserialize)]
pub struct RawResponse {
    pub model: Option<String>,
    pub usage: Option<Usage>,
}

/// Token usage information
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// Body of `POST /v1/pipes`, used to provision the thought pipe.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePipeRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Update the pipe in place when it already exists.
    pub upsert: bool,
    /// Ask the pipe for JSON-mode completions.
    pub json: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
}

impl CreatePipeRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            model: None,
            upsert: true,
            json: false,
            temperature: None,
            max_tokens: None,
            messages: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set model (e.g., "openai:gpt-4o-mini")
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_json_output(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.messages.push(Message::system(prompt));
        self
    }
}

/// Response from creating a pipe
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePipeResponse {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}
