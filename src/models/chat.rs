use serde::{ Serialize, Deserialize };
use std::collections::HashMap;

/// Body of a turn submission POST. `conversation_id` is omitted entirely for
/// the first turn of a session; the backend assigns one in its reply.
#[derive(Serialize, Debug, Clone)]
pub struct TurnRequest {
    pub action: String,
    pub messages: Vec<TurnMessage>,
    pub parent_message_id: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct TurnMessage {
    pub id: String,
    pub author: Author,
    pub role: String,
    pub content: MessageContent,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Author {
    pub role: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct MessageContent {
    pub content_type: String,
    pub parts: Vec<String>,
}

impl TurnRequest {
    pub fn new(
        message_id: String,
        prompt: &str,
        parent_message_id: &str,
        model: &str,
        conversation_id: Option<String>
    ) -> Self {
        Self {
            action: "next".to_string(),
            messages: vec![TurnMessage {
                id: message_id,
                author: Author { role: "user".to_string() },
                role: "user".to_string(),
                content: MessageContent {
                    content_type: "text".to_string(),
                    parts: vec![prompt.to_string()],
                },
            }],
            parent_message_id: parent_message_id.to_string(),
            model: model.to_string(),
            conversation_id,
        }
    }
}

/// Payload of the answer-bearing `data: ` event in a turn response stream.
#[derive(Deserialize, Debug, Clone)]
pub struct TurnPayload {
    pub message: PayloadMessage,
    pub conversation_id: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PayloadMessage {
    pub id: String,
    pub content: PayloadContent,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PayloadContent {
    pub parts: Vec<String>,
}

/// One page of the remote conversation listing.
#[derive(Deserialize, Debug, Clone)]
pub struct ConversationPage {
    pub items: Vec<ConversationSummary>,
    pub total: u32,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub create_time: String,
}

/// Full conversation fetch. The backend returns the turns as an unordered
/// node mapping; chronological order has to be derived from `create_time`.
#[derive(Deserialize, Debug, Clone)]
pub struct ConversationDetail {
    pub title: String,
    pub mapping: HashMap<String, MappingNode>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MappingNode {
    #[serde(default)]
    pub message: Option<NodeMessage>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NodeMessage {
    pub id: String,
    #[serde(default)]
    pub create_time: f64,
    pub author: Author,
    pub content: NodeContent,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NodeContent {
    #[serde(default)]
    pub parts: Vec<String>,
}

/// PATCH body that soft-deletes a conversation.
#[derive(Serialize, Debug, Clone)]
pub struct VisibilityUpdate {
    pub is_visible: bool,
}

/// A turn of a fetched conversation, in chronological order.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub id: String,
    pub create_time: f64,
    pub role: String,
    pub text: String,
}
