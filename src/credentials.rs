//! Bearer credential providers.

use crate::error::{Error, Result};

/// Supplies the current bearer token, asked once per request.
///
/// Implement this to plug in a token store that rotates credentials.
pub trait CredentialProvider: Send + Sync {
    fn current_token(&self) -> Result<String>;
}

/// A fixed token.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        StaticToken(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

impl CredentialProvider for StaticToken {
    fn current_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Reads the token from an environment variable on every request.
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub const DEFAULT_VAR: &'static str = "POSTS_API_TOKEN";

    pub fn new(var: impl Into<String>) -> Self {
        EnvToken { var: var.into() }
    }
}

impl Default for EnvToken {
    fn default() -> Self {
        EnvToken::new(Self::DEFAULT_VAR)
    }
}

impl CredentialProvider for EnvToken {
    fn current_token(&self) -> Result<String> {
        match std::env::var(&self.var) {
            Ok(token) if !token.is_empty() => Ok(token),
            Ok(_) => Err(Error::ApplicationError(format!(
                "credential variable {} is empty",
                self.var
            ))),
            Err(e) => Err(Error::application(
                &format!("failed to read credential variable {}", self.var),
                e,
            )),
        }
    }
}

impl<F> CredentialProvider for F
where
    F: Fn() -> Result<String> + Send + Sync,
{
    fn current_token(&self) -> Result<String> {
        self()
    }
}
