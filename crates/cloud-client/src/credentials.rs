//! Provider credentials
//!
//! The credentials Secret holds a JSON object:
//!
//! ```json
//! {"accessKeyId": "AKID", "secretAccessKey": "...", "sessionToken": "...", "endpoint": "https://gw"}
//! ```
//!
//! The snake_case names of the shared credentials file (`aws_access_key_id`, ...) are
//! accepted as well.

use serde::Deserialize;

use crate::error::CloudError;

/// Credentials used to sign gateway requests
#[derive(Clone, Deserialize, PartialEq)]
pub struct CloudCredentials {
    #[serde(alias = "accessKeyId")]
    pub aws_access_key_id: String,
    #[serde(alias = "secretAccessKey")]
    pub aws_secret_access_key: String,
    #[serde(default, alias = "sessionToken")]
    pub aws_session_token: Option<String>,
    /// Gateway URL; when absent the controller's configured endpoint is used
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl std::fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudCredentials")
            .field("aws_access_key_id", &self.aws_access_key_id)
            .field("aws_secret_access_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl CloudCredentials {
    /// Parse a JSON credentials blob
    pub fn parse(blob: &[u8]) -> Result<Self, CloudError> {
        let text = std::str::from_utf8(blob)
            .map_err(|e| CloudError::Authentication(format!("credentials are not valid UTF-8: {e}")))?;
        serde_json::from_str(text)
            .map_err(|e| CloudError::Authentication(format!("credentials are not a valid JSON object: {e}")))
    }
}
