//! Error types for ACS requests.

use thiserror::Error;

/// Everything that can go wrong between a query and a finished table.
///
/// Validation and configuration problems are always reported before the
/// first request leaves the process. API-side failures carry the message
/// the Census API returned, when there was one.
#[derive(Debug, Error)]
pub enum AcsError {
    /// Missing API key, unsupported MOE level and similar setup problems.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Bad argument combinations, unsupported years, malformed codes.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A state or county selector that cannot be resolved to a FIPS code.
    #[error("invalid geography: {0}")]
    InvalidGeography(String),

    /// Non-200 response from the API.
    #[error("Your API call has errors. The API message returned is {message}")]
    Api { status: Option<u16>, message: String },

    /// The API does not publish one of the variables at the requested geography.
    #[error(
        "One or more of your requested variables is likely not available at the requested geography. \
         Please refine your selection. (API message: {message})"
    )]
    UnavailableVariable { message: String },

    /// The API flagged the key, even though it answered with 200.
    #[error(
        "You have supplied an invalid or inactive API key. To obtain a valid API key, visit \
         https://api.census.gov/data/key_signup.html. To activate your key, be sure to click the \
         link provided to you in the email from the Census Bureau that contained your key."
    )]
    InvalidApiKey,

    /// Connection failures and timeouts.
    #[error("request to the Census API failed: {0}")]
    Transport(String),

    /// The payload was not the expected array of string rows.
    #[error("could not decode Census API response: {0}")]
    Decode(String),
}

impl AcsError {
    /// True for every error raised before a request is issued.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AcsError::Validation(_) | AcsError::InvalidGeography(_)
        )
    }

    /// True for errors that originate from talking to the API.
    pub fn is_api(&self) -> bool {
        matches!(
            self,
            AcsError::Api { .. }
                | AcsError::UnavailableVariable { .. }
                | AcsError::InvalidApiKey
                | AcsError::Transport(_)
                | AcsError::Decode(_)
        )
    }

    /// Failures worth retrying: the network, or a 5xx from the server.
    pub fn is_transient(&self) -> bool {
        match self {
            AcsError::Transport(_) => true,
            AcsError::Api {
                status: Some(code), ..
            } => *code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AcsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AcsError::Transport(format!("request timed out: {e}"))
        } else {
            AcsError::Transport(e.to_string())
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, AcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(AcsError::Validation("x".into()).is_validation());
        assert!(AcsError::InvalidGeography("x".into()).is_validation());
        assert!(!AcsError::InvalidApiKey.is_validation());
        assert!(AcsError::InvalidApiKey.is_api());
        assert!(
            AcsError::UnavailableVariable {
                message: "m".into()
            }
            .is_api()
        );
        assert!(!AcsError::Configuration("k".into()).is_api());
    }

    #[test]
    fn only_server_and_network_failures_are_transient() {
        let server = AcsError::Api {
            status: Some(503),
            message: "busy".into(),
        };
        let client = AcsError::Api {
            status: Some(400),
            message: "bad".into(),
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
        assert!(AcsError::Transport("reset".into()).is_transient());
        assert!(!AcsError::InvalidApiKey.is_transient());
    }

    #[test]
    fn api_message_is_surfaced() {
        let e = AcsError::Api {
            status: Some(400),
            message: "error: unknown variable 'B0'".into(),
        };
        assert!(e.to_string().contains("unknown variable 'B0'"));
    }
}
