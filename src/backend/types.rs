use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Body for `POST /chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatBackendRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// Body for `POST /complete` and `POST /generate`.
#[derive(Debug, Clone, Serialize)]
pub struct PromptBackendRequest {
    pub prompt: String,
    pub max_length: u32,
    pub temperature: f64,
    pub do_sample: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ChatCompletion,
    Complete,
    Generate,
    ModelInfo,
}

impl Operation {
    pub fn path(self) -> &'static str {
        match self {
            Operation::ChatCompletion => "/chat/completions",
            Operation::Complete => "/complete",
            Operation::Generate => "/generate",
            Operation::ModelInfo => "/model-info",
        }
    }

    /// Field holding the generated text, then the field tried when it is absent.
    /// `None` for operations whose payload is passed through whole.
    pub fn content_fields(self) -> Option<(&'static str, &'static str)> {
        match self {
            Operation::ChatCompletion => Some(("content", "generated_text")),
            Operation::Complete => Some(("completion", "generated_text")),
            Operation::Generate => Some(("generated_text", "completion")),
            Operation::ModelInfo => None,
        }
    }

    /// Message shown to callers when the backend call fails.
    pub fn failure_summary(self) -> &'static str {
        match self {
            Operation::ChatCompletion => "Failed to get chat completion",
            Operation::Complete => "Failed to get completion",
            Operation::Generate => "Failed to get generation",
            Operation::ModelInfo => "Failed to get model information",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::ChatCompletion => "chat_completion",
            Operation::Complete => "complete",
            Operation::Generate => "generate",
            Operation::ModelInfo => "model_info",
        };
        f.write_str(name)
    }
}

/// Pulls the generated text out of a backend payload by field precedence.
/// Empty or whitespace-only values count as absent.
pub fn extract_content(body: &serde_json::Value, operation: Operation) -> Option<String> {
    let (primary, fallback) = operation.content_fields()?;
    [primary, fallback]
        .into_iter()
        .filter_map(|field| body.get(field).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}
