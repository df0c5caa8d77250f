//! Wire types for the Azure AI Foundry agents REST API.

use serde::{Deserialize, Serialize};

/// Any object response; only the id is needed.
#[derive(Debug, Clone, Deserialize)]
pub struct IdObject {
    pub id: String,
}

/// Paged list envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub last_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAgentRequest<'a> {
    pub model: &'a str,
    pub name: &'a str,
    pub instructions: &'a str,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl ToolDefinition {
    pub const fn file_search() -> Self {
        Self {
            kind: "file_search",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateVectorStoreRequest<'a> {
    pub name: &'a str,
    pub file_ids: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreObject {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModifyThreadRequest<'a> {
    pub tool_resources: ToolResources<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolResources<'a> {
    pub file_search: FileSearchResources<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSearchResources<'a> {
    pub vector_store_ids: Vec<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateMessageRequest<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRunRequest<'a> {
    pub assistant_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunObject {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl RunError {
    pub fn reason(&self) -> String {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (Some(code), None) => code.clone(),
            (None, Some(message)) => message.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextContent {
    pub value: String,
}

impl ThreadMessage {
    /// Text blocks of the message joined in order; other block types are skipped.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|c| c.kind == "text")
            .filter_map(|c| c.text.as_ref().map(|t| t.value.as_str()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
