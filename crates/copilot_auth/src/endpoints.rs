/// OAuth application id the device flow authenticates as.
pub const GITHUB_CLIENT_ID: &str = "Iv1.b507a08c87ecfe98";
/// Minimal scope; only the login name is read.
pub const GITHUB_SCOPE: &str = "read:user";

const GITHUB_BASE_URL: &str = "https://github.com";
const GITHUB_API_BASE_URL: &str = "https://api.github.com";

/// Remote endpoints used during authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    pub device_code_url: String,
    pub access_token_url: String,
    pub user_url: String,
    pub token_exchange_url: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self::from_bases(GITHUB_BASE_URL, GITHUB_API_BASE_URL)
    }
}

impl AuthEndpoints {
    /// Derive all endpoints from the web and API base URLs.
    pub fn from_bases(github_base: &str, api_base: &str) -> Self {
        let github = github_base.trim().trim_end_matches('/');
        let api = api_base.trim().trim_end_matches('/');
        Self {
            device_code_url: format!("{github}/login/device/code"),
            access_token_url: format!("{github}/login/oauth/access_token"),
            user_url: format!("{api}/user"),
            token_exchange_url: format!("{api}/copilot_internal/v2/token"),
        }
    }
}
