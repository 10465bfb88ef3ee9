use reqwest::StatusCode;

use copilot_api::error::parse_error_message;

#[test]
fn parse_error_message_prefers_nested_error_message() {
    let body = r#"{"error":{"message":"model unavailable","code":"bad_request"}}"#;
    let message = parse_error_message(StatusCode::BAD_REQUEST, body);
    assert_eq!(message, "model unavailable");
}

#[test]
fn parse_error_message_reads_github_and_oauth_shapes() {
    let github = r#"{"message":"Bad credentials","documentation_url":"https://docs.github.com"}"#;
    assert_eq!(
        parse_error_message(StatusCode::UNAUTHORIZED, github),
        "Bad credentials"
    );

    let oauth = r#"{"error":"incorrect_client_credentials","error_description":"The client_id passed is incorrect."}"#;
    assert_eq!(
        parse_error_message(StatusCode::BAD_REQUEST, oauth),
        "The client_id passed is incorrect."
    );
}

#[test]
fn parse_error_message_falls_back_to_raw_body_then_reason() {
    assert_eq!(
        parse_error_message(StatusCode::INTERNAL_SERVER_ERROR, "raw failure text"),
        "raw failure text"
    );
    assert_eq!(
        parse_error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
        "Service Unavailable"
    );
}
