use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use copilot_api::{
    decode_body, CancellationSignal, ChatAnswer, ChatMessage, ChatRequest, CodeAttachment,
    CopilotApiError, Role,
};
use copilot_auth::{AuthError, IdentitySource, SessionToken, TokenExchanger};
use copilot_session::{ChatTransport, Session, SessionError};
use pretty_assertions::assert_eq;
use serde_json::json;

struct StaticIdentity {
    calls: AtomicUsize,
}

#[async_trait]
impl IdentitySource for StaticIdentity {
    async fn identity_token(
        &self,
        _cancellation: Option<&CancellationSignal>,
    ) -> Result<String, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("gho_identity".to_owned())
    }
}

struct CountingExchanger {
    calls: AtomicUsize,
    first_expires_at: Option<i64>,
}

#[async_trait]
impl TokenExchanger for CountingExchanger {
    async fn exchange(&self, identity_token: &str) -> Result<SessionToken, AuthError> {
        assert_eq!(identity_token, "gho_identity");
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let mut token = SessionToken::new(format!("bearer-{call}"));
        if call == 1 {
            token.expires_at = self.first_expires_at;
        }
        Ok(token)
    }
}

/// Replays raw completion bodies through the real frame decoder.
struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<String, CopilotApiError>>>,
    seen: Mutex<Vec<(String, ChatRequest)>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<Result<String, CopilotApiError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<(String, ChatRequest)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    fn session_id(&self) -> &str {
        "session-test"
    }

    async fn stream_chat(
        &self,
        bearer_token: &str,
        request: &ChatRequest,
        _cancellation: Option<&CancellationSignal>,
        on_fragment: &mut (dyn for<'f> FnMut(&'f str) + Send),
    ) -> Result<ChatAnswer, CopilotApiError> {
        self.seen
            .lock()
            .unwrap()
            .push((bearer_token.to_owned(), request.clone()));
        let body = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected chat request")?;
        let answer = decode_body(&body);
        if let ChatAnswer::Reply(text) = &answer {
            on_fragment(text);
        }
        Ok(answer)
    }
}

fn stream_of(parts: &[&str]) -> String {
    let mut body = String::new();
    for part in parts {
        let frame = json!({"choices":[{"index":0,"delta":{"content":part}}]});
        body.push_str(&format!("data: {frame}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

struct Harness {
    identity: Arc<StaticIdentity>,
    exchanger: Arc<CountingExchanger>,
    transport: Arc<ScriptedTransport>,
}

impl Harness {
    fn new(responses: Vec<Result<String, CopilotApiError>>) -> Self {
        Self::with_first_expiry(responses, None)
    }

    fn with_first_expiry(
        responses: Vec<Result<String, CopilotApiError>>,
        first_expires_at: Option<i64>,
    ) -> Self {
        Self {
            identity: Arc::new(StaticIdentity {
                calls: AtomicUsize::new(0),
            }),
            exchanger: Arc::new(CountingExchanger {
                calls: AtomicUsize::new(0),
                first_expires_at,
            }),
            transport: ScriptedTransport::new(responses),
        }
    }

    fn session(&self) -> Session {
        Session::new(
            self.identity.clone(),
            self.exchanger.clone(),
            self.transport.clone(),
        )
    }
}

#[tokio::test]
async fn asking_before_authentication_fails_without_network() {
    let harness = Harness::new(Vec::new());
    let mut session = harness.session();

    let error = session.ask("hello", None, None).await.expect_err("not ready");

    assert!(matches!(error, SessionError::NotAuthenticated));
    assert!(harness.transport.seen().is_empty());
    assert!(session.conversation().is_empty());
}

#[tokio::test]
async fn conversation_round_trip_appends_answer_once() {
    let harness = Harness::new(vec![Ok(stream_of(&["Hel", "lo"]))]);
    let mut session = harness.session().with_instructions("be terse");
    session.add_message("context", Role::System);
    session.add_message("earlier question", Role::User);

    session.authenticate(None).await.expect("authenticate");
    assert!(session.is_ready());
    assert_eq!(session.session_id(), "session-test");

    let mut fragments = Vec::new();
    let answer = session
        .ask_streaming("hi", None, None, &mut |fragment: &str| {
            fragments.push(fragment.to_owned())
        })
        .await
        .expect("answer");

    assert_eq!(answer, ChatAnswer::Reply("Hello".into()));
    assert_eq!(fragments, vec!["Hello".to_string()]);

    let seen = harness.transport.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "bearer-1");
    assert_eq!(
        seen[0].1.messages,
        vec![
            ChatMessage::system("be terse"),
            ChatMessage::system("context"),
            ChatMessage::user("earlier question"),
            ChatMessage::user("hi"),
        ]
    );
    assert_eq!(
        session.conversation().messages(),
        &[
            ChatMessage::system("context"),
            ChatMessage::user("earlier question"),
            ChatMessage::user("hi"),
            ChatMessage::system("Hello"),
        ]
    );
}

#[tokio::test]
async fn follow_up_requests_carry_previous_answers() {
    let harness = Harness::new(vec![Ok(stream_of(&["4"])), Ok(stream_of(&["8"]))]);
    let mut session = harness.session();
    session.ensure_ready(None).await.expect("ready");
    session.ensure_ready(None).await.expect("still ready");
    assert_eq!(harness.exchanger.calls.load(Ordering::SeqCst), 1);

    session.ask("2+2?", None, None).await.expect("first");
    session.ask("double it", None, None).await.expect("second");

    let seen = harness.transport.seen();
    let second = &seen[1].1;
    assert_eq!(
        second.messages,
        vec![
            ChatMessage::system(""),
            ChatMessage::user("2+2?"),
            ChatMessage::system("4"),
            ChatMessage::user("double it"),
        ]
    );
    assert_eq!(session.conversation().len(), 4);
}

#[tokio::test]
async fn attachment_is_sent_but_not_recorded() {
    let harness = Harness::new(vec![Ok(stream_of(&["ok"]))]);
    let mut session = harness.session();
    session.authenticate(None).await.expect("authenticate");

    let attachment = CodeAttachment::new("fn main() {}").with_language("rust");
    session
        .ask("explain", Some(&attachment), None)
        .await
        .expect("answer");

    let seen = harness.transport.seen();
    let request = &seen[0].1;
    assert_eq!(
        request.messages.last(),
        Some(&ChatMessage::system(attachment.render()))
    );
    assert_eq!(session.conversation().len(), 2);
}

#[tokio::test]
async fn rejected_bearer_is_exchanged_once_and_retried() {
    let harness = Harness::new(vec![
        Err(CopilotApiError::Unauthorized("token expired".into())),
        Ok(stream_of(&["fresh"])),
    ]);
    let mut session = harness.session();
    session.authenticate(None).await.expect("authenticate");

    let answer = session.ask("hi", None, None).await.expect("answer");

    assert_eq!(answer.text(), "fresh");
    let bearers: Vec<String> = harness
        .transport
        .seen()
        .into_iter()
        .map(|(bearer, _)| bearer)
        .collect();
    assert_eq!(bearers, vec!["bearer-1".to_string(), "bearer-2".to_string()]);
    assert_eq!(harness.identity.calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.exchanger.calls.load(Ordering::SeqCst), 2);
    assert_eq!(session.conversation().len(), 2);
}

#[tokio::test]
async fn second_rejection_is_surfaced() {
    let harness = Harness::new(vec![
        Err(CopilotApiError::Unauthorized("no".into())),
        Err(CopilotApiError::Unauthorized("still no".into())),
    ]);
    let mut session = harness.session();
    session.authenticate(None).await.expect("authenticate");

    let error = session.ask("hi", None, None).await.expect_err("rejected");

    assert!(matches!(
        error,
        SessionError::Api(CopilotApiError::Unauthorized(ref message)) if message == "still no"
    ));
    assert_eq!(session.conversation().messages(), &[ChatMessage::user("hi")]);
}

#[tokio::test]
async fn service_error_becomes_the_recorded_answer() {
    let frame = json!({"error":{"message":"quota exceeded","details":"try later"}});
    let harness = Harness::new(vec![Ok(format!("data: {frame}\n\ndata: [DONE]\n\n"))]);
    let mut session = harness.session();
    session.authenticate(None).await.expect("authenticate");

    let answer = session.ask("hi", None, None).await.expect("answer");

    assert!(answer.is_service_error());
    assert_eq!(
        session.conversation().last(),
        Some(&ChatMessage::system("quota exceeded\n\ntry later"))
    );
}

#[tokio::test]
async fn expired_bearer_is_exchanged_before_asking() {
    let harness = Harness::with_first_expiry(vec![Ok(stream_of(&["ok"]))], Some(1));
    let mut session = harness.session();
    session.authenticate(None).await.expect("authenticate");

    session.ask("hi", None, None).await.expect("answer");

    let seen = harness.transport.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "bearer-2");
    assert_eq!(harness.exchanger.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unexpired_bearer_is_reused() {
    let far_future = 32_503_680_000;
    let harness = Harness::with_first_expiry(
        vec![Ok(stream_of(&["a"])), Ok(stream_of(&["b"]))],
        Some(far_future),
    );
    let mut session = harness.session();
    session.authenticate(None).await.expect("authenticate");

    session.ask("one", None, None).await.expect("first");
    session.ask("two", None, None).await.expect("second");

    let bearers: Vec<String> = harness
        .transport
        .seen()
        .into_iter()
        .map(|(bearer, _)| bearer)
        .collect();
    assert_eq!(bearers, vec!["bearer-1".to_string(), "bearer-1".to_string()]);
    assert_eq!(harness.exchanger.calls.load(Ordering::SeqCst), 1);
}
