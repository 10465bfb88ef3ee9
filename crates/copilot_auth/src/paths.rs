use std::path::{Path, PathBuf};

use crate::error::AuthError;

/// Token cache location relative to the home directory.
pub const TOKEN_CACHE_PATH: [&str; 2] = [".config", ".copilot"];

#[must_use]
pub fn token_cache_path_in(home: &Path) -> PathBuf {
    home.join(TOKEN_CACHE_PATH[0]).join(TOKEN_CACHE_PATH[1])
}

pub fn default_token_cache_path() -> Result<PathBuf, AuthError> {
    dirs::home_dir()
        .map(|home| token_cache_path_in(&home))
        .ok_or(AuthError::NoHomeDir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_path_lives_under_dot_config() {
        let path = token_cache_path_in(Path::new("/home/dev"));
        assert_eq!(path, PathBuf::from("/home/dev/.config/.copilot"));
    }
}
