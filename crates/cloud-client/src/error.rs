//! Cloud client errors

use thiserror::Error;

/// Errors that can occur when interacting with the cloud provider gateway
#[derive(Debug, Error)]
pub enum CloudError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    
    /// Provider returned an error not covered by a more specific variant
    #[error("Cloud API error: {0}")]
    Api(String),
    
    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    
    /// Authentication failed (invalid or expired credentials)
    #[error("Authentication failed: {0}")]
    Authentication(String),
    
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),
    
    /// Resource already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    
    /// Provider rejected the request as invalid
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    
    /// Provider is throttling or temporarily unavailable
    #[error("Throttled: {0}")]
    Throttled(String),
}

impl CloudError {
    /// The gateway reported the object missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }

    /// The gateway reported a name or token collision
    pub fn is_already_exists(&self) -> bool {
        matches!(self, CloudError::AlreadyExists(_))
    }

    /// Request can never succeed as written; retrying without a spec change is pointless
    pub fn is_bad_request(&self) -> bool {
        matches!(self, CloudError::InvalidRequest(_))
    }

    /// Map an HTTP status code and response body to an error
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            400 | 422 => CloudError::InvalidRequest(body),
            401 | 403 => CloudError::Authentication(body),
            404 => CloudError::NotFound(body),
            409 => CloudError::AlreadyExists(body),
            429 | 503 => CloudError::Throttled(body),
            _ => CloudError::Api(format!("{status} - {body}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(CloudError::from_status(404, "gone".into()).is_not_found());
        assert!(CloudError::from_status(409, "dup".into()).is_already_exists());
        assert!(CloudError::from_status(400, "bad".into()).is_bad_request());
        assert!(CloudError::from_status(422, "bad".into()).is_bad_request());
        assert!(matches!(CloudError::from_status(429, String::new()), CloudError::Throttled(_)));
        assert!(matches!(CloudError::from_status(403, String::new()), CloudError::Authentication(_)));
        assert!(matches!(CloudError::from_status(500, "x".into()), CloudError::Api(m) if m == "500 - x"));
    }
}
