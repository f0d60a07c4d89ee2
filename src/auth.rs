use std::fmt;

use crate::error::{PerfLensError, Result};

/// Bearer credential for the CI provider API.
///
/// Resolved once at startup and handed to the client constructor; never read
/// from the environment after that.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Picks the first non-blank candidate, failing when none is available.
    pub fn resolve<'a, I>(candidates: I) -> Result<Self>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        candidates
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|candidate| !candidate.is_empty())
            .map(Token::from)
            .ok_or_else(|| {
                PerfLensError::Config(
                    "missing API token (pass --token or set BUILDKITE_TOKEN)".to_string(),
                )
            })
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

// Keep the credential out of logs and panic messages.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}
