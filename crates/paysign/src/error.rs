use std::fmt;

use serde::Deserialize;

/// Status code the asymmetric gateway returns for a successful call.
pub const CODE_SUCCESS: &str = "10000";

pub type Result<T> = std::result::Result<T, PaySignError>;

#[derive(Debug, thiserror::Error)]
pub enum PaySignError {
    #[error("incorrect key format: {0}")]
    KeyFormat(String),
    #[error("certificate format error: {0}")]
    CertFormat(String),
    #[error("gateway public key not found for certificate serial `{0}`")]
    KeyNotFound(String),
    #[error("sign content not found")]
    SignNotFound,
    #[error("signature verification failed")]
    VerificationFailed,
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("gateway returned an error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl PaySignError {
    /// True when the response must be treated as untrusted rather than as a
    /// business outcome that may be retried.
    pub fn is_security_failure(&self) -> bool {
        matches!(
            self,
            PaySignError::SignNotFound
                | PaySignError::VerificationFailed
                | PaySignError::KeyNotFound(_)
        )
    }
}

/// Business-level failure reported by a gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GatewayError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub sub_code: String,
    #[serde(default)]
    pub sub_msg: String,
}

impl GatewayError {
    pub fn is_success(&self) -> bool {
        self.code == CODE_SUCCESS
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.code, self.sub_msg)
    }
}

impl std::error::Error for GatewayError {}
