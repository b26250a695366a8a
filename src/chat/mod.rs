use log::{ debug, info };
use reqwest::header::{
    HeaderMap,
    HeaderValue,
    ACCEPT,
    ACCEPT_LANGUAGE,
    AUTHORIZATION,
    CONTENT_TYPE,
    COOKIE,
    ORIGIN,
    REFERER,
    USER_AGENT,
};
use reqwest::{ Client as HttpClient, Response, StatusCode };
use std::cmp::Ordering;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::cli::console;
use crate::cli::Args;
use crate::models::chat::{
    ConversationDetail,
    ConversationPage,
    ConversationSummary,
    TranscriptEntry,
    TurnPayload,
    TurnRequest,
    VisibilityUpdate,
};
use crate::session::{ SessionState, STATE_PATH };

pub const DEFAULT_BASE_URL: &str = "https://chat.openai.com";
pub const DEFAULT_MODEL: &str = "text-davinci-002-render-sha";

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36";

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status {
        status: StatusCode,
        body: String,
    },

    /// The response stream broke the reverse-engineered wire contract.
    /// Deliberately not recovered; the format is unversioned and silent
    /// guessing would mask upstream drift.
    #[error("malformed response stream: {0}")]
    Protocol(String),

    #[error("could not persist session state: {0}")]
    State(#[from] std::io::Error),

    #[error("invalid credentials: {0}")]
    Credentials(String),
}

/// Controls which side of the dialogue is echoed to the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    QuestionsOnly,
    AnswersOnly,
    Full,
}

impl Verbosity {
    fn echo_questions(self) -> bool {
        matches!(self, Verbosity::QuestionsOnly | Verbosity::Full)
    }

    fn echo_answers(self) -> bool {
        matches!(self, Verbosity::AnswersOnly | Verbosity::Full)
    }
}

/// Client for the ChatGPT web-session backend, authenticated the way a
/// logged-in browser would be. Owns the turn protocol and the conversation
/// directory calls; session state is passed in and advanced after every
/// successful turn.
pub struct ChatClient {
    http: HttpClient,
    base_url: String,
    model: String,
    state_path: PathBuf,
    pub verbosity: Verbosity,
}

impl ChatClient {
    pub fn new(
        token: &str,
        cookie: &str,
        base_url: Option<String>,
        model: Option<String>
    ) -> Result<Self, ChatError> {
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e|
                ChatError::Credentials(format!("bearer token: {}", e))
            )?
        );
        headers.insert(
            COOKIE,
            HeaderValue::from_str(cookie).map_err(|e|
                ChatError::Credentials(format!("session cookie: {}", e))
            )?
        );
        headers.insert(
            ORIGIN,
            HeaderValue::from_str(&base_url).map_err(|e|
                ChatError::Credentials(format!("base url: {}", e))
            )?
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(&format!("{}/chat", base_url)).map_err(|e|
                ChatError::Credentials(format!("base url: {}", e))
            )?
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

        let http = HttpClient::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            base_url,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            state_path: PathBuf::from(STATE_PATH),
            verbosity: Verbosity::Full,
        })
    }

    pub fn from_args(args: &Args) -> Result<Self, ChatError> {
        Self::new(
            &args.token,
            &args.cookie,
            Some(args.base_url.clone()),
            Some(args.model.clone())
        )
    }

    /// The page a browser would show for a conversation.
    pub fn chat_page_url(&self, conversation_id: &str) -> String {
        format!("{}/chat/{}", self.base_url, conversation_id)
    }

    fn turn_endpoint(&self) -> String {
        format!("{}/backend-api/conversation", self.base_url)
    }

    fn listing_endpoint(&self) -> String {
        format!("{}/backend-api/conversations", self.base_url)
    }

    fn conversation_endpoint(&self, conversation_id: &str) -> String {
        format!("{}/backend-api/conversation/{}", self.base_url, conversation_id)
    }

    /// Submit one user turn and return the assistant's answer.
    ///
    /// The new turn's parent is the session tip; the session advances to the
    /// assistant's message id (and the returned conversation id) only after
    /// the response parsed cleanly, and is persisted before returning.
    pub async fn ask(
        &self,
        state: &mut SessionState,
        prompt: &str
    ) -> Result<String, ChatError> {
        let request = TurnRequest::new(
            Uuid::new_v4().to_string(),
            prompt,
            &state.last_message_id,
            &self.model,
            state.conversation_id.clone()
        );

        if self.verbosity.echo_questions() {
            console::you_speak(prompt);
        }

        let response = self.http.post(self.turn_endpoint()).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                console::notice("You need to refresh your ChatGPT credentials.");
            }
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status { status, body });
        }

        let body = response.text().await?;
        let payload = parse_stream_payload(&body)?;
        let answer = payload.message.content.parts
            .first()
            .cloned()
            .ok_or_else(|| ChatError::Protocol("assistant message has no content parts".to_string()))?;

        state.last_message_id = payload.message.id;
        state.conversation_id = Some(payload.conversation_id);
        state.save(&self.state_path)?;
        debug!("Session advanced to message {}", state.last_message_id);

        if self.verbosity.echo_answers() {
            console::assistant_speaks(&answer);
        }
        Ok(answer)
    }

    /// Fetch one page of the conversation listing. The page carries
    /// total/limit/offset for callers that want to page further; nothing
    /// here paginates automatically.
    pub async fn list_conversations(&self) -> Result<ConversationPage, ChatError> {
        let response = self.http.get(self.listing_endpoint()).send().await?;
        let body = expect_success(response).await?.text().await?;
        serde_json
            ::from_str(&body)
            .map_err(|e| ChatError::Protocol(format!("conversation listing: {}", e)))
    }

    /// Mark each conversation invisible. The first failure aborts the rest
    /// of the batch.
    pub async fn delete_conversations(&self, conversation_ids: &[String]) -> Result<(), ChatError> {
        for id in conversation_ids {
            console::notice(&format!("Deleting chat {}", id));
            let response = self.http
                .patch(self.conversation_endpoint(id))
                .json(&(VisibilityUpdate { is_visible: false }))
                .send().await?;
            expect_success(response).await?;
            info!("Conversation {} marked invisible", id);
        }
        Ok(())
    }

    pub async fn fetch_conversation(
        &self,
        conversation_id: &str
    ) -> Result<ConversationDetail, ChatError> {
        let response = self.http.get(self.conversation_endpoint(conversation_id)).send().await?;
        let body = expect_success(response).await?.text().await?;
        serde_json
            ::from_str(&body)
            .map_err(|e| ChatError::Protocol(format!("conversation fetch: {}", e)))
    }

    /// Re-seed the session from a remote conversation's last turn, so later
    /// invocations continue that chain.
    pub async fn seed_from_conversation(
        &self,
        state: &mut SessionState,
        conversation_id: &str
    ) -> Result<(), ChatError> {
        let detail = self.fetch_conversation(conversation_id).await?;
        let entries = transcript(&detail);
        let last = entries
            .last()
            .ok_or_else(|| ChatError::Protocol("conversation has no messages".to_string()))?;
        state.last_message_id = last.id.clone();
        state.conversation_id = Some(conversation_id.to_string());
        state.save(&self.state_path)?;
        Ok(())
    }

    /// Reset the session so the next turn opens a brand new conversation.
    pub fn reset_session(&self, state: &mut SessionState) -> Result<(), ChatError> {
        *state = SessionState::fresh();
        state.save(&self.state_path)?;
        Ok(())
    }
}

async fn expect_success(response: Response) -> Result<Response, ChatError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ChatError::Status { status, body })
}

/// Locate the answer-bearing event in a turn response body.
///
/// The body is a server-sent-event stream captured whole. The answer is the
/// last `data: ` event whose payload carries a non-null `message`; the
/// trailing `data: [DONE]` terminator and incremental events that fail to
/// parse are skipped. This is the single place that knows the undocumented
/// stream format.
pub fn parse_stream_payload(body: &str) -> Result<TurnPayload, ChatError> {
    for line in body.lines().rev() {
        let line = line.trim();
        let Some(data) = line.strip_prefix("data: ") else {
            continue;
        };
        if data == "[DONE]" {
            continue;
        }
        let Ok(value) = serde_json::from_str::<serde_json::Value>(data) else {
            continue;
        };
        if value.get("message").map_or(true, |m| m.is_null()) {
            continue;
        }
        return serde_json
            ::from_value(value)
            .map_err(|e| ChatError::Protocol(format!("unexpected turn payload shape: {}", e)));
    }
    Err(ChatError::Protocol("no answer-bearing `data: ` event in response stream".to_string()))
}

/// Flatten a fetched conversation into chronological turns, skipping nodes
/// with no message or an empty first content part.
pub fn transcript(detail: &ConversationDetail) -> Vec<TranscriptEntry> {
    let mut entries: Vec<TranscriptEntry> = detail.mapping
        .values()
        .filter_map(|node| {
            let message = node.message.as_ref()?;
            let text = message.content.parts.first()?;
            if text.is_empty() {
                return None;
            }
            Some(TranscriptEntry {
                id: message.id.clone(),
                create_time: message.create_time,
                role: message.author.role.clone(),
                text: text.clone(),
            })
        })
        .collect();
    entries.sort_by(|a, b| a.create_time.partial_cmp(&b.create_time).unwrap_or(Ordering::Equal));
    entries
}

/// Resolve a human-entered selector against a listed page: a short numeric
/// token is a 1-based index, anything else matches as an id prefix.
pub fn resolve_selector(token: &str, items: &[ConversationSummary]) -> Option<String> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    if token.len() < 3 {
        if let Ok(index) = token.parse::<usize>() {
            if index >= 1 && index <= items.len() {
                return Some(items[index - 1].id.clone());
            }
            return None;
        }
    }
    items
        .iter()
        .find(|item| item.id.starts_with(token))
        .map(|item| item.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::{ Author, MappingNode, NodeContent, NodeMessage };
    use std::collections::HashMap;

    fn summaries(ids: &[&str]) -> Vec<ConversationSummary> {
        ids.iter()
            .map(|id| ConversationSummary {
                id: id.to_string(),
                title: "a title".to_string(),
                create_time: "2023-04-01T10:00:00.000000".to_string(),
            })
            .collect()
    }

    fn node(id: &str, role: &str, create_time: f64, part: &str) -> MappingNode {
        MappingNode {
            message: Some(NodeMessage {
                id: id.to_string(),
                create_time,
                author: Author { role: role.to_string() },
                content: NodeContent { parts: vec![part.to_string()] },
            }),
        }
    }

    #[test]
    fn first_turn_request_omits_conversation_id() {
        let request = TurnRequest::new("mid".to_string(), "hello", "parent", "a-model", None);
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("conversation_id").is_none());
        assert_eq!(value["action"], "next");
        assert_eq!(value["parent_message_id"], "parent");
        assert_eq!(value["messages"][0]["content"]["parts"][0], "hello");
        assert_eq!(value["messages"][0]["author"]["role"], "user");
    }

    #[test]
    fn later_turn_request_carries_conversation_id() {
        let request = TurnRequest::new(
            "mid".to_string(),
            "hello",
            "parent",
            "a-model",
            Some("conv-1".to_string())
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["conversation_id"], "conv-1");
    }

    #[test]
    fn parse_picks_last_event_with_a_message() {
        let body = concat!(
            "data: {\"message\": {\"id\": \"m1\", \"content\": {\"parts\": [\"partial\"]}}, \"conversation_id\": \"c1\"}\n",
            "\n",
            "data: {\"message\": {\"id\": \"m2\", \"content\": {\"parts\": [\"full answer\"]}}, \"conversation_id\": \"c1\"}\n",
            "\n",
            "data: [DONE]\n"
        );
        let payload = parse_stream_payload(body).unwrap();
        assert_eq!(payload.message.id, "m2");
        assert_eq!(payload.message.content.parts[0], "full answer");
        assert_eq!(payload.conversation_id, "c1");
    }

    #[test]
    fn parse_skips_null_message_events() {
        let body = concat!(
            "data: {\"message\": {\"id\": \"m1\", \"content\": {\"parts\": [\"answer\"]}}, \"conversation_id\": \"c1\"}\n",
            "data: {\"message\": null, \"conversation_id\": \"c1\"}\n",
            "data: [DONE]\n"
        );
        let payload = parse_stream_payload(body).unwrap();
        assert_eq!(payload.message.id, "m1");
    }

    #[test]
    fn parse_fails_without_data_events() {
        let err = parse_stream_payload("<html>Service temporarily unavailable</html>").unwrap_err();
        assert!(matches!(err, ChatError::Protocol(_)));
    }

    #[test]
    fn parse_fails_on_wrong_payload_shape() {
        let body = "data: {\"message\": {\"unexpected\": true}, \"conversation_id\": \"c1\"}\n";
        let err = parse_stream_payload(body).unwrap_err();
        assert!(matches!(err, ChatError::Protocol(_)));
    }

    #[test]
    fn selector_resolves_one_based_index() {
        let items = summaries(&["aaa-1", "bbb-2", "ccc-3"]);
        assert_eq!(resolve_selector("2", &items), Some("bbb-2".to_string()));
        assert_eq!(resolve_selector("4", &items), None);
        assert_eq!(resolve_selector("0", &items), None);
    }

    #[test]
    fn selector_resolves_id_prefix() {
        let items = summaries(&["a63fe212-0a01", "b71c0000-ffff"]);
        assert_eq!(resolve_selector("a63f", &items), Some("a63fe212-0a01".to_string()));
        assert_eq!(resolve_selector("b71c0000", &items), Some("b71c0000-ffff".to_string()));
        assert_eq!(resolve_selector("zzzz", &items), None);
    }

    #[test]
    fn transcript_is_chronological_and_skips_empty_turns() {
        let mut mapping = HashMap::new();
        mapping.insert("n1".to_string(), node("m1", "assistant", 20.0, "second"));
        mapping.insert("n2".to_string(), node("m2", "user", 10.0, "first"));
        mapping.insert("n3".to_string(), node("m3", "system", 5.0, ""));
        mapping.insert("n4".to_string(), MappingNode { message: None });
        let detail = ConversationDetail {
            title: "t".to_string(),
            mapping,
        };

        let entries = transcript(&detail);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "first");
        assert_eq!(entries[0].role, "user");
        assert_eq!(entries[1].text, "second");
        assert_eq!(entries[1].id, "m1");
    }
}
