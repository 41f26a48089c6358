use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "tool")]
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

// Inbound body: either a replayed conversation or the flat form fields.
#[derive(Debug, Default, Deserialize)]
pub struct TasacionRequest {
    #[serde(default, rename = "chatHistory")]
    pub chat_history: Vec<ChatMessage>,
    #[serde(flatten)]
    pub datos: DatosMoto,
}

// Form fields as the frontend sends them. Absent fields stay empty; the
// prompt builder renders them as blank labels rather than erroring.
#[derive(Debug, Default, Deserialize)]
pub struct DatosMoto {
    #[serde(default)]
    pub marca: String,
    #[serde(default)]
    pub modelo: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub ano: Option<i32>,
    #[serde(default)]
    pub kms: Option<i64>,
    #[serde(default)]
    pub estado: String,
    #[serde(default)]
    pub extras: String,
    #[serde(default)]
    pub provincia: String,
}

#[derive(Debug, Serialize)]
pub struct TasacionResponse {
    pub success: bool,
    #[serde(rename = "responseText")]
    pub response_text: String,
    // Loose JSON on purpose: the extractor promises "parseable value or null",
    // not a schema-checked record. The frontend reads every field defensively.
    pub valuation: Option<Value>,
}
