//! Error types for the Supabase provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Supabase REST errors
#[derive(Error, Debug)]
pub enum SupabaseError {
    /// The anon key was rejected or row-level security denied the request
    #[error("Request unauthorized (status {status_code}): {message}")]
    Unauthorized { status_code: u16, message: String },

    /// PostgREST returned an error
    #[error("Supabase API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Supabase operations
pub type Result<T> = std::result::Result<T, SupabaseError>;

impl From<SupabaseError> for BridgeError {
    fn from(error: SupabaseError) -> Self {
        match error {
            SupabaseError::BridgeError(e) => e,
            other => BridgeError::RemoteError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SupabaseError::ApiError {
            status_code: 400,
            message: "column \"nope\" does not exist".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Supabase API error (status 400): column \"nope\" does not exist"
        );
    }

    #[test]
    fn test_error_conversion() {
        let error = SupabaseError::Unauthorized {
            status_code: 401,
            message: "Invalid API key".to_string(),
        };
        let bridge_error: BridgeError = error.into();
        assert!(bridge_error.is_remote());

        let passthrough: BridgeError =
            SupabaseError::BridgeError(BridgeError::NotAvailable("http".to_string())).into();
        assert!(matches!(passthrough, BridgeError::NotAvailable(_)));
    }
}
