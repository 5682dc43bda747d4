//! Request-scoped data shapes for the AI API.

use serde_json::Value;
use std::fmt;

/// Logical model exposed at `/api/ai/{modelId}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRoute {
    Chatbot,
    Generator,
}

impl ModelRoute {
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "chatbot" => Some(ModelRoute::Chatbot),
            "generator" => Some(ModelRoute::Generator),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelRoute::Chatbot => "chatbot",
            ModelRoute::Generator => "generator",
        }
    }

    /// JSON field carrying the user's text in the request body.
    pub fn request_field(&self) -> &'static str {
        match self {
            ModelRoute::Chatbot => "message",
            ModelRoute::Generator => "prompt",
        }
    }

    /// JSON field carrying the AI text in the response body.
    pub fn response_field(&self) -> &'static str {
        match self {
            ModelRoute::Chatbot => "message",
            ModelRoute::Generator => "result",
        }
    }

    pub fn missing_field_message(&self) -> &'static str {
        match self {
            ModelRoute::Chatbot => "Message is required",
            ModelRoute::Generator => "Prompt is required",
        }
    }

    /// Pull the required non-empty string field out of a request body.
    pub fn extract_input<'a>(&self, body: &'a Value) -> Option<&'a str> {
        body.get(self.request_field())
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
    }
}

impl fmt::Display for ModelRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
