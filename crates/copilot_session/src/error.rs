use copilot_api::CopilotApiError;
use copilot_auth::AuthError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// A prompt was asked before a bearer token was obtained.
    #[error("not authenticated")]
    NotAuthenticated,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Api(#[from] CopilotApiError),
}

impl SessionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Auth(AuthError::Cancelled) | Self::Api(CopilotApiError::Cancelled)
        )
    }
}
