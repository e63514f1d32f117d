//! Chat endpoints: conversation history and the completion relay
//!
//! The streaming variant opens a server-sent-event response, forwards each
//! upstream text delta as a `chunk` event, and persists the concatenated
//! assistant reply exactly once before emitting `done`. Failures after the
//! stream has opened are reported as an in-stream `error` event since the
//! response status is already committed.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
    Json,
};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{Error, Result};
use crate::llm::{build_system_prompt, ChatProvider, ChatRequest, ModelInfo};
use crate::server::routes::owned_project;
use crate::server::state::AppState;
use crate::storage::Database;
use crate::types::{
    ChatMessage, Conversation, ConversationSummary, Message, MessageRole,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub message: String,
    pub conversation_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<Message>,
    pub conversation: Conversation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub message: Message,
    pub conversation_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct DeleteConversationResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ModelListResponse {
    pub models: Vec<ModelInfo>,
}

/// Everything a chat turn needs after validation and persistence of the
/// user message: the (possibly new) conversation and the upstream request.
#[derive(Debug)]
pub(crate) struct ChatTurn {
    pub conversation: Conversation,
    pub request: ChatRequest,
}

/// Resolve a conversation through its owning project; a broken chain reads
/// as a missing conversation.
fn owned_conversation(state: &AppState, user_id: &Uuid, conversation_id: &Uuid) -> Result<Conversation> {
    let conversation = state
        .db()
        .get_conversation(conversation_id)?
        .ok_or(Error::NotFound("Conversation"))?;

    state
        .db()
        .get_project_owned(&conversation.project_id, user_id)?
        .ok_or(Error::NotFound("Conversation"))?;

    Ok(conversation)
}

/// Shared setup for both send variants: validate, resolve or create the
/// conversation, persist the user message, and assemble the upstream request
/// from the full ordered history plus the project's prompt snippets.
pub(crate) fn prepare_turn(
    state: &AppState,
    user_id: &Uuid,
    project_id: &Uuid,
    request: &SendMessageRequest,
) -> Result<ChatTurn> {
    if request.message.trim().is_empty() {
        return Err(Error::validation("message", "Message is required"));
    }

    let project = owned_project(state, user_id, project_id)?;
    let snippets = state.db().list_prompts_for_project(&project.id)?;

    // A supplied id only counts when it names a conversation of this
    // project; anything else starts a fresh conversation.
    let existing = match request.conversation_id {
        Some(id) => state.db().get_conversation_in_project(&id, &project.id)?,
        None => None,
    };

    let conversation = match existing {
        Some(conversation) => conversation,
        None => {
            let conversation =
                Conversation::new(Conversation::derive_title(&request.message), project.id);
            state.db().insert_conversation(&conversation)?;
            conversation
        }
    };

    state.db().insert_message(&Message::new(
        MessageRole::User,
        request.message.clone(),
        conversation.id,
    ))?;

    let history = state.db().list_messages(&conversation.id)?;
    let system_prompt = build_system_prompt(&project.system_prompt, &snippets);

    Ok(ChatTurn {
        request: ChatRequest {
            model: project.model,
            system_prompt,
            messages: history.iter().map(ChatMessage::from).collect(),
        },
        conversation,
    })
}

/// Complete a buffered turn: one upstream call, then persist the reply
pub(crate) async fn run_buffered_turn(state: &AppState, turn: &ChatTurn) -> Result<Message> {
    let reply = state.llm().complete(&turn.request).await?;

    let message = Message::new(MessageRole::Assistant, reply, turn.conversation.id);
    state.db().insert_message(&message)?;
    state.db().touch_conversation(&turn.conversation.id)?;

    Ok(message)
}

/// Drive one streaming turn, feeding event payloads into `tx`. Emits the
/// conversation id first, then a `chunk` per delta; the assistant reply is
/// persisted once, after the upstream stream completes, before `done` goes
/// out. A dropped receiver (client disconnect) ends the relay without
/// persisting a partial reply.
pub(crate) async fn relay_turn(
    db: Database,
    llm: std::sync::Arc<dyn ChatProvider>,
    turn: ChatTurn,
    tx: mpsc::Sender<serde_json::Value>,
) {
    let conversation_id = turn.conversation.id;

    if tx
        .send(json!({"type": "conversationId", "conversationId": conversation_id}))
        .await
        .is_err()
    {
        return;
    }

    let mut chunks = match llm.complete_stream(&turn.request).await {
        Ok(chunks) => chunks,
        Err(e) => {
            tracing::error!("Stream setup failed: {}", e);
            let _ = tx
                .send(json!({"type": "error", "message": "Failed to stream response"}))
                .await;
            return;
        }
    };

    let mut reply = String::new();
    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(delta) => {
                reply.push_str(&delta);
                if tx
                    .send(json!({"type": "chunk", "content": delta}))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Err(e) => {
                tracing::error!("Upstream stream failed: {}", e);
                let _ = tx
                    .send(json!({"type": "error", "message": "Failed to stream response"}))
                    .await;
                return;
            }
        }
    }

    let message = Message::new(MessageRole::Assistant, reply, conversation_id);
    let persisted = db
        .insert_message(&message)
        .and_then(|_| db.touch_conversation(&conversation_id));

    match persisted {
        Ok(()) => {
            let _ = tx.send(json!({"type": "done"})).await;
        }
        Err(e) => {
            tracing::error!("Failed to persist assistant reply: {}", e);
            let _ = tx
                .send(json!({"type": "error", "message": "Failed to stream response"}))
                .await;
        }
    }
}

/// GET /api/chat/project/:project_id/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ConversationListResponse>> {
    let project = owned_project(&state, &auth.id, &project_id)?;
    let conversations = state.db().list_conversations_for_project(&project.id)?;

    let mut summaries = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        let message_count = state.db().count_messages_for_conversation(&conversation.id)?;
        summaries.push(ConversationSummary {
            conversation,
            message_count,
        });
    }

    Ok(Json(ConversationListResponse {
        conversations: summaries,
    }))
}

/// GET /api/chat/conversations/:conversation_id/messages
pub async fn list_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<MessageListResponse>> {
    let conversation = owned_conversation(&state, &auth.id, &conversation_id)?;
    let messages = state.db().list_messages(&conversation.id)?;

    Ok(Json(MessageListResponse {
        messages,
        conversation,
    }))
}

/// POST /api/chat/project/:project_id/send - Buffered chat turn
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>> {
    let turn = prepare_turn(&state, &auth.id, &project_id, &request)?;
    let conversation_id = turn.conversation.id;

    let message = run_buffered_turn(&state, &turn).await?;

    Ok(Json(SendMessageResponse {
        message,
        conversation_id,
    }))
}

/// POST /api/chat/project/:project_id/stream - Streaming chat turn over SSE
pub async fn stream_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let turn = prepare_turn(&state, &auth.id, &project_id, &request)?;

    let (tx, rx) = mpsc::channel::<serde_json::Value>(32);
    tokio::spawn(relay_turn(state.db().clone(), state.llm(), turn, tx));

    let stream = ReceiverStream::new(rx)
        .map(|payload| Ok::<Event, Infallible>(Event::default().data(payload.to_string())));

    Ok(Sse::new(stream))
}

/// DELETE /api/chat/conversations/:conversation_id
pub async fn delete_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<DeleteConversationResponse>> {
    let conversation = owned_conversation(&state, &auth.id, &conversation_id)?;

    state.db().delete_conversation_cascade(&conversation.id)?;

    Ok(Json(DeleteConversationResponse {
        message: "Conversation deleted successfully".to_string(),
    }))
}

/// GET /api/chat/models - Models available upstream
pub async fn list_models(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<ModelListResponse>> {
    let models = state.llm().list_models().await?;
    Ok(Json(ModelListResponse { models }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChunkStream;
    use crate::storage::UploadStore;
    use crate::types::{Project, Prompt, Role, User};
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Provider that replays a fixed chunk script
    struct ScriptedProvider {
        chunks: Vec<&'static str>,
        fail_stream: bool,
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        async fn complete(&self, _request: &ChatRequest) -> Result<String> {
            Ok(self.chunks.concat())
        }

        async fn complete_stream(&self, _request: &ChatRequest) -> Result<ChunkStream> {
            let (tx, rx) = mpsc::channel(32);
            let chunks = self.chunks.clone();
            let fail = self.fail_stream;
            tokio::spawn(async move {
                if fail {
                    let _ = tx.send(Err(Error::llm("upstream broke"))).await;
                    return;
                }
                for chunk in chunks {
                    if tx.send(Ok(chunk.to_string())).await.is_err() {
                        return;
                    }
                }
            });
            Ok(ReceiverStream::new(rx))
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn test_state(provider: ScriptedProvider) -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::in_memory().unwrap();
        let uploads = UploadStore::new(dir.path()).unwrap();
        let state = AppState::for_tests(db, uploads, Arc::new(provider));
        (state, dir)
    }

    fn seed_project(state: &AppState) -> (User, Project) {
        let user = User::new("a@b.co", "hash".into(), "A", Role::User);
        state.db().insert_user(&user).unwrap();
        let project = Project::new("Bot", None, None, None, user.id);
        state.db().insert_project(&project).unwrap();
        (user, project)
    }

    fn send_request(message: &str, conversation_id: Option<Uuid>) -> SendMessageRequest {
        SendMessageRequest {
            message: message.to_string(),
            conversation_id,
        }
    }

    #[tokio::test]
    async fn first_send_creates_one_conversation_titled_from_the_message() {
        let (state, _dir) = test_state(ScriptedProvider {
            chunks: vec!["ok"],
            fail_stream: false,
        });
        let (user, project) = seed_project(&state);

        let long_message = "y".repeat(60);
        let turn = prepare_turn(&state, &user.id, &project.id, &send_request(&long_message, None)).unwrap();

        assert_eq!(turn.conversation.title, format!("{}...", "y".repeat(50)));
        assert_eq!(
            state.db().list_conversations_for_project(&project.id).unwrap().len(),
            1
        );

        // A second turn on the same conversation does not create another
        let follow_up = send_request("again", Some(turn.conversation.id));
        let turn2 = prepare_turn(&state, &user.id, &project.id, &follow_up).unwrap();
        assert_eq!(turn2.conversation.id, turn.conversation.id);
        assert_eq!(
            state.db().list_conversations_for_project(&project.id).unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn foreign_conversation_id_starts_a_fresh_conversation() {
        let (state, _dir) = test_state(ScriptedProvider {
            chunks: vec!["ok"],
            fail_stream: false,
        });
        let (user, project) = seed_project(&state);

        let turn = prepare_turn(
            &state,
            &user.id,
            &project.id,
            &send_request("hello", Some(Uuid::new_v4())),
        )
        .unwrap();

        assert_eq!(turn.conversation.title, "hello");
    }

    #[tokio::test]
    async fn snippets_flow_into_the_system_prompt() {
        let (state, _dir) = test_state(ScriptedProvider {
            chunks: vec!["ok"],
            fail_stream: false,
        });
        let (user, project) = seed_project(&state);
        state
            .db()
            .insert_prompt(&Prompt::new("Tone", "Be brief.", project.id))
            .unwrap();

        let turn = prepare_turn(&state, &user.id, &project.id, &send_request("hi", None)).unwrap();

        assert!(turn.request.system_prompt.contains("Additional context:"));
        assert!(turn.request.system_prompt.contains("Tone:\nBe brief."));
        assert_eq!(turn.request.messages.len(), 1);
        assert_eq!(turn.request.messages[0].content, "hi");
    }

    #[tokio::test]
    async fn buffered_turn_persists_both_sides() {
        let (state, _dir) = test_state(ScriptedProvider {
            chunks: vec!["Hello ", "there"],
            fail_stream: false,
        });
        let (user, project) = seed_project(&state);

        let turn = prepare_turn(&state, &user.id, &project.id, &send_request("hi", None)).unwrap();
        let reply = run_buffered_turn(&state, &turn).await.unwrap();

        assert_eq!(reply.content, "Hello there");

        let history = state.db().list_messages(&turn.conversation.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[1].role, MessageRole::Assistant);
        assert_eq!(history[1].content, "Hello there");
    }

    #[tokio::test]
    async fn streamed_chunks_concatenate_to_the_persisted_reply() {
        let (state, _dir) = test_state(ScriptedProvider {
            chunks: vec!["Hel", "lo ", "world"],
            fail_stream: false,
        });
        let (user, project) = seed_project(&state);

        let turn = prepare_turn(&state, &user.id, &project.id, &send_request("hi", None)).unwrap();
        let conversation_id = turn.conversation.id;

        let (tx, mut rx) = mpsc::channel(32);
        relay_turn(state.db().clone(), state.llm(), turn, tx).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(events.first().unwrap()["type"], "conversationId");
        assert_eq!(
            events.first().unwrap()["conversationId"],
            conversation_id.to_string()
        );
        assert_eq!(events.last().unwrap()["type"], "done");

        let streamed: String = events
            .iter()
            .filter(|e| e["type"] == "chunk")
            .map(|e| e["content"].as_str().unwrap())
            .collect();

        let history = state.db().list_messages(&conversation_id).unwrap();
        assert_eq!(history.last().unwrap().role, MessageRole::Assistant);
        assert_eq!(history.last().unwrap().content, streamed);
        assert_eq!(streamed, "Hello world");
    }

    #[tokio::test]
    async fn upstream_failure_emits_an_error_event_and_persists_nothing() {
        let (state, _dir) = test_state(ScriptedProvider {
            chunks: vec![],
            fail_stream: true,
        });
        let (user, project) = seed_project(&state);

        let turn = prepare_turn(&state, &user.id, &project.id, &send_request("hi", None)).unwrap();
        let conversation_id = turn.conversation.id;

        let (tx, mut rx) = mpsc::channel(32);
        relay_turn(state.db().clone(), state.llm(), turn, tx).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(events.last().unwrap()["type"], "error");

        // Only the user message is in the history
        let history = state.db().list_messages(&conversation_id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn empty_message_is_rejected_before_any_writes() {
        let (state, _dir) = test_state(ScriptedProvider {
            chunks: vec!["ok"],
            fail_stream: false,
        });
        let (user, project) = seed_project(&state);

        let err = prepare_turn(&state, &user.id, &project.id, &send_request("   ", None)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(state
            .db()
            .list_conversations_for_project(&project.id)
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn other_users_cannot_read_or_delete_a_conversation() {
        let (state, _dir) = test_state(ScriptedProvider {
            chunks: vec!["ok"],
            fail_stream: false,
        });
        let (user, project) = seed_project(&state);
        let intruder = User::new("evil@b.co", "hash".into(), "E", Role::User);
        state.db().insert_user(&intruder).unwrap();

        let turn = prepare_turn(&state, &user.id, &project.id, &send_request("hi", None)).unwrap();

        let err = owned_conversation(&state, &intruder.id, &turn.conversation.id).unwrap_err();
        assert!(matches!(err, Error::NotFound("Conversation")));

        // The owner still resolves it
        assert!(owned_conversation(&state, &user.id, &turn.conversation.id).is_ok());
    }
}
