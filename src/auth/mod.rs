use axum::http::HeaderMap;


/// Extract bearer token from HTTP Authorization header
///
/// Expected format: "Authorization: Bearer <token>"
/// Returns the token string if present and valid.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, BearerError> {
    // Get Authorization header
    let auth_header = headers
        .get("authorization")
        .ok_or(BearerError::Missing)?
        .to_str()
        .map_err(|_| BearerError::InvalidFormat)?;

    // Parse "Bearer <token>" format
    parse_bearer_token(auth_header)
}

/// Parse bearer token from Authorization header value
///
/// Internal helper for extract_bearer_token
fn parse_bearer_token(header_value: &str) -> Result<String, BearerError> {
    // Expect "Bearer <token>"
    let parts: Vec<&str> = header_value.splitn(2, ' ').collect();

    if parts.len() != 2 {
        return Err(BearerError::InvalidFormat);
    }

    // Check scheme is "Bearer"
    if parts[0].to_lowercase() != "bearer" {
        return Err(BearerError::InvalidFormat);
    }

    // Get token part
    let token = parts[1].trim();

    // Validate not empty
    if token.is_empty() {
        return Err(BearerError::Empty);
    }

    Ok(token.to_string())
}

/// Bearer extraction errors
#[derive(Debug, PartialEq, Clone)]
pub enum BearerError {
    /// Authorization header not present
    Missing,
    /// Invalid format (not "Bearer <token>")
    InvalidFormat,
    /// Token is empty string
    Empty,
}

impl std::fmt::Display for BearerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BearerError::Missing => write!(f, "Authorization token not provided"),
            BearerError::InvalidFormat => write!(f, "Invalid authorization token format"),
            BearerError::Empty => write!(f, "Authorization token is empty"),
        }
    }
}

impl std::error::Error for BearerError {}
