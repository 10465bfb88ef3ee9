//! GitHub identity and Copilot session credentials.
//!
//! Three pieces, leaves first: a [`TokenStore`] persisting the long-lived
//! GitHub token per login, the [`DeviceCodeAuthenticator`] running the OAuth
//! device-code handshake, and the [`TokenExchanger`] trading the GitHub token
//! for a short-lived chat bearer token.

mod device_flow;
mod endpoints;
mod error;
mod exchange;
mod paths;
mod token_cache;

pub use device_flow::{
    AccessToken, DeviceCode, DeviceCodeAuthenticator, DeviceFlowApi, GithubDeviceFlow,
    IdentitySource, PollOutcome, DEFAULT_DEVICE_CODE_LIFETIME, MIN_POLL_INTERVAL,
    SLOW_DOWN_STEP,
};
pub use endpoints::{AuthEndpoints, GITHUB_CLIENT_ID, GITHUB_SCOPE};
pub use error::AuthError;
pub use exchange::{CopilotTokenExchange, SessionToken, TokenExchanger};
pub use paths::{default_token_cache_path, TOKEN_CACHE_PATH};
pub use token_cache::{FileTokenStore, MemoryTokenStore, TokenStore};
