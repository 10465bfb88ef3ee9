use copilot_api::headers::{
    build_headers, editor_headers, HEADER_AUTHORIZATION, HEADER_CONTENT_TYPE,
    HEADER_EDITOR_PLUGIN_VERSION, HEADER_EDITOR_VERSION, HEADER_MACHINE_ID,
    HEADER_OPENAI_INTENT, HEADER_OPENAI_ORGANIZATION, HEADER_REQUEST_ID, HEADER_SESSION_ID,
    HEADER_USER_AGENT,
};
use copilot_api::{CopilotApiConfig, CopilotApiError, EditorIdentity};

#[test]
fn header_map_contains_chat_headers() {
    let config = CopilotApiConfig::new()
        .with_session_id("session-42")
        .with_machine_id("machine-7")
        .insert_header("X-Extra", " value ");

    let headers = build_headers(&config, " bearer-token ", "request-1").expect("headers");
    let get = |key: &str| headers.get(key).map(String::as_str);

    assert_eq!(get(HEADER_AUTHORIZATION), Some("Bearer bearer-token"));
    assert_eq!(get(HEADER_REQUEST_ID), Some("request-1"));
    assert_eq!(get(HEADER_SESSION_ID), Some("session-42"));
    assert_eq!(get(HEADER_MACHINE_ID), Some("machine-7"));
    assert_eq!(get(HEADER_EDITOR_VERSION), Some("vscode/1.80.1"));
    assert_eq!(get(HEADER_EDITOR_PLUGIN_VERSION), Some("copilot-chat/0.4.1"));
    assert_eq!(get(HEADER_USER_AGENT), Some("GitHubCopilotChat/0.4.1"));
    assert_eq!(get(HEADER_OPENAI_ORGANIZATION), Some("github-copilot"));
    assert_eq!(get(HEADER_OPENAI_INTENT), Some("conversation-panel"));
    assert_eq!(get(HEADER_CONTENT_TYPE), Some("application/json"));
    assert_eq!(get("x-extra"), Some("value"));
}

#[test]
fn header_map_rejects_missing_bearer_token() {
    let config = CopilotApiConfig::new();
    let error = build_headers(&config, "", "request-1").expect_err("missing token");
    assert!(matches!(error, CopilotApiError::MissingBearerToken));
}

#[test]
fn login_identity_uses_plugin_attribution() {
    let headers = editor_headers(&EditorIdentity::login());
    assert_eq!(headers[HEADER_EDITOR_VERSION], "Neovim/0.9.2");
    assert_eq!(headers[HEADER_EDITOR_PLUGIN_VERSION], "copilot.lua/1.11.4");
    assert_eq!(headers[HEADER_USER_AGENT], "GithubCopilot/1.133.0");
}

#[test]
fn generated_session_ids_are_unique() {
    let first = CopilotApiConfig::new();
    let second = CopilotApiConfig::new();
    assert_ne!(first.session_id, second.session_id);
    assert_ne!(first.machine_id, second.machine_id);
}
