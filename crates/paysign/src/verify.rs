use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::canonical::{CERT_SN_FIELD, ParameterSet, SIGN_FIELD, SIGNATURE_METADATA, canonicalize};
use crate::error::{GatewayError, PaySignError, Result};
use crate::extract::{NodeKind, SignedPayload, extract_signed_payload, response_node_name};
use crate::keys::PublicKeyRegistry;
use crate::signing::{SignType, verify_base64};

/// Where a verification call is. Every failure is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    KeyLookup,
    Verifying,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Extracting => "extracting",
            Stage::KeyLookup => "key-lookup",
            Stage::Verifying => "verifying",
            Stage::Done => "done",
        })
    }
}

/// Response content whose signature has been checked.
#[derive(Debug, Clone, Copy)]
pub struct VerifiedResponse<'a> {
    payload: SignedPayload<'a>,
}

impl<'a> VerifiedResponse<'a> {
    /// The exact signed bytes of the inner response object.
    pub fn content(&self) -> &'a str {
        self.payload.content
    }

    pub fn cert_sn(&self) -> &'a str {
        self.payload.cert_sn
    }

    pub fn node(&self) -> NodeKind {
        self.payload.node
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(self.payload.content)
            .map_err(|e| PaySignError::MalformedResponse(e.to_string()))
    }

    /// The business error carried by a verified payload whose status code is
    /// not the success code.
    pub fn gateway_error(&self) -> Option<GatewayError> {
        serde_json::from_str::<GatewayError>(self.payload.content)
            .ok()
            .filter(|error| !error.is_success())
    }
}

/// Extraction, key lookup and signature check for asymmetric gateway
/// responses and notifications.
#[derive(Debug, Clone)]
pub struct ResponseVerifier {
    registry: Arc<PublicKeyRegistry>,
    sign_type: SignType,
}

impl ResponseVerifier {
    pub fn new(registry: Arc<PublicKeyRegistry>, sign_type: SignType) -> Self {
        Self {
            registry,
            sign_type,
        }
    }

    pub fn registry(&self) -> &PublicKeyRegistry {
        &self.registry
    }

    pub fn sign_type(&self) -> SignType {
        self.sign_type
    }

    /// Verifies the response body of a call to `method`.
    ///
    /// An unsigned payload is only ever reported as a business error or as
    /// [`PaySignError::SignNotFound`]; its content is never released. Any
    /// unsigned JSON object whose `code` is not the success code, including
    /// one with no `code` at all, is a business error. An unsigned payload
    /// carrying the success code is `SignNotFound`, even under the
    /// `error_response` node. A verified `error_response` node surfaces as
    /// [`PaySignError::Gateway`].
    pub fn verify_response<'a>(&self, body: &'a str, method: &str) -> Result<VerifiedResponse<'a>> {
        let node_name = response_node_name(method);
        tracing::debug!(stage = %Stage::Extracting, node = %node_name);
        let payload = extract_signed_payload(body, &node_name)?;

        if !payload.is_signed() {
            return Err(unsigned_failure(payload.content));
        }

        tracing::debug!(stage = %Stage::KeyLookup, cert_sn = payload.cert_sn);
        let public_key = self.registry.lookup(payload.cert_sn)?;

        tracing::debug!(stage = %Stage::Verifying, sign_type = %self.sign_type);
        if let Err(e) = verify_base64(payload.content, payload.sign, public_key, self.sign_type) {
            tracing::warn!(node = %node_name, cert_sn = payload.cert_sn, "response signature rejected");
            return Err(e);
        }

        tracing::debug!(stage = %Stage::Done);
        if payload.node == NodeKind::Error {
            let error: GatewayError = serde_json::from_str(payload.content)
                .map_err(|e| PaySignError::MalformedResponse(e.to_string()))?;
            return Err(error.into());
        }
        Ok(VerifiedResponse { payload })
    }

    /// Verifies an asynchronous notification. The whole field set, minus
    /// signature metadata, is the signed content; the key is chosen by the
    /// notification's own certificate serial, or the default.
    pub fn verify_notification(&self, fields: &ParameterSet) -> Result<()> {
        let sign = fields
            .get(SIGN_FIELD)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or(PaySignError::SignNotFound)?;
        let cert_sn = fields.get(CERT_SN_FIELD).map_or("", |s| s.trim());

        tracing::debug!(stage = %Stage::KeyLookup, cert_sn);
        let public_key = self.registry.lookup(cert_sn)?;

        let content = canonicalize(fields, &SIGNATURE_METADATA);
        tracing::debug!(stage = %Stage::Verifying, sign_type = %self.sign_type);
        verify_base64(&content, sign, public_key, self.sign_type).inspect_err(|_| {
            tracing::warn!(cert_sn, "notification signature rejected");
        })
    }
}

fn unsigned_failure(content: &str) -> PaySignError {
    match serde_json::from_str::<GatewayError>(content) {
        Ok(error) if !error.is_success() => error.into(),
        _ => PaySignError::SignNotFound,
    }
}
