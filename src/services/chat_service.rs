use crate::{
    dao::models::{ConversationScope, OutgoingMessage},
    dto::{
        chat::{ConversationResponse, SendMessageRequest, SentMessageResponse, SurfacePath},
        session::ActionResponse,
        surfaces::ViewportReport,
    },
    error::{ServiceError, ServiceResult},
    state::SharedState,
};

fn scope_of(path: &SurfacePath) -> ServiceResult<ConversationScope> {
    path.scope()
        .ok_or_else(|| ServiceError::InvalidInput(format!("unknown surface `{}`", path.key)))
}

fn not_open(scope: ConversationScope) -> ServiceError {
    ServiceError::NotFound(format!(
        "conversation {} is not open",
        scope.surface_key()
    ))
}

/// Open a conversation surface and return its history.
pub async fn open(
    state: &SharedState,
    scope: ConversationScope,
) -> ServiceResult<ConversationResponse> {
    state.session().open_conversation(scope).await
}

pub async fn close(state: &SharedState, scope: ConversationScope) -> ServiceResult<ActionResponse> {
    if state.session().close_conversation(scope).await? {
        Ok(ActionResponse::new(format!(
            "conversation {} closed",
            scope.surface_key()
        )))
    } else {
        Err(not_open(scope))
    }
}

/// Current render buffer of an open surface.
pub async fn conversation(
    state: &SharedState,
    path: &SurfacePath,
) -> ServiceResult<ConversationResponse> {
    let scope = scope_of(path)?;
    state
        .session()
        .conversation(scope)
        .await?
        .ok_or_else(|| not_open(scope))
}

/// Record the scroll geometry of an open surface.
pub async fn report_viewport(
    state: &SharedState,
    path: &SurfacePath,
    report: ViewportReport,
) -> ServiceResult<ActionResponse> {
    let scope = scope_of(path)?;
    if state
        .session()
        .report_viewport(scope, report.into())
        .await?
    {
        Ok(ActionResponse::new("viewport recorded"))
    } else {
        Err(not_open(scope))
    }
}

pub async fn send(
    state: &SharedState,
    request: SendMessageRequest,
) -> ServiceResult<SentMessageResponse> {
    let message = state
        .session()
        .send_message(OutgoingMessage {
            scope: request.scope,
            content: request.content,
        })
        .await?;
    Ok(SentMessageResponse { message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::ChatMessage,
        services::test_support::{StubApi, shared_state},
    };

    fn history() -> Vec<ChatMessage> {
        serde_json::from_value(serde_json::json!([
            {"id": 1, "content": "anyone here?", "msg_type": "court", "court_id": 3},
            {"id": 2, "content": "yes", "msg_type": "court", "court_id": 3,
             "sender": {"username": "mo"}}
        ]))
        .unwrap()
    }

    fn key(key: &str) -> SurfacePath {
        SurfacePath { key: key.into() }
    }

    #[tokio::test]
    async fn open_send_and_read_back() {
        let api = StubApi::default();
        *api.history.lock().unwrap() = history();
        let state = shared_state(api, Some("t"));
        let scope = ConversationScope::Court(3);

        let opened = open(&state, scope).await.unwrap();
        assert_eq!(opened.surface, "court-3");
        assert_eq!(opened.messages[1].sender, "mo");

        let sent = send(
            &state,
            SendMessageRequest {
                scope,
                content: "on my way".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(sent.message.id, 9_000);

        let view = conversation(&state, &key("court-3")).await.unwrap();
        assert_eq!(
            view.messages.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![1, 2, 9_000]
        );
        state.shutdown().await;
    }

    #[tokio::test]
    async fn closed_surfaces_are_not_found() {
        let state = shared_state(StubApi::default(), Some("t"));
        let scope = ConversationScope::Session(12);
        open(&state, scope).await.unwrap();
        close(&state, scope).await.unwrap();

        assert!(matches!(
            close(&state, scope).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            conversation(&state, &key("session-12")).await,
            Err(ServiceError::NotFound(_))
        ));
        let report = ViewportReport {
            scroll_top: 0.0,
            scroll_height: 100.0,
            client_height: 100.0,
        };
        assert!(matches!(
            report_viewport(&state, &key("session-12"), report).await,
            Err(ServiceError::NotFound(_))
        ));
        state.shutdown().await;
    }

    #[tokio::test]
    async fn rejected_send_is_reported() {
        let state = shared_state(StubApi::default(), Some("t"));
        let err = send(
            &state,
            SendMessageRequest {
                scope: ConversationScope::Court(3),
                content: "x".repeat(600),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Rejected(_)));
        state.shutdown().await;
    }
}
