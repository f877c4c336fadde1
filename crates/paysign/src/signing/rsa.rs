use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::Deserialize;
use sha1::Sha1;
use sha2::Sha256;

use super::signer::ParamSigner;
use crate::canonical::{ParameterSet, SIGN_FIELD, canonicalize};
use crate::error::{PaySignError, Result};

/// Asymmetric algorithm tag. `RSA` is PKCS#1 v1.5 over SHA-1; every other
/// tag selects SHA-256.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum SignType {
    #[default]
    Rsa,
    Rsa2,
}

impl SignType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "RSA" => SignType::Rsa,
            _ => SignType::Rsa2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignType::Rsa => "RSA",
            SignType::Rsa2 => "RSA2",
        }
    }
}

impl From<String> for SignType {
    fn from(tag: String) -> Self {
        SignType::from_tag(&tag)
    }
}

impl fmt::Display for SignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Key {
    Sha1(SigningKey<Sha1>),
    Sha256(SigningKey<Sha256>),
}

/// RSA PKCS#1 v1.5 signer for outbound requests.
pub struct RsaSigner {
    key: Key,
    sign_type: SignType,
}

impl RsaSigner {
    pub fn new(private_key: RsaPrivateKey, sign_type: SignType) -> Self {
        let key = match sign_type {
            SignType::Rsa => Key::Sha1(SigningKey::<Sha1>::new(private_key)),
            SignType::Rsa2 => Key::Sha256(SigningKey::<Sha256>::new(private_key)),
        };
        Self { key, sign_type }
    }

    pub fn sign_type(&self) -> SignType {
        self.sign_type
    }

    /// Raw signature bytes over `content`.
    pub fn sign(&self, content: &[u8]) -> Result<Vec<u8>> {
        let signature = match &self.key {
            Key::Sha1(key) => key.try_sign(content),
            Key::Sha256(key) => key.try_sign(content),
        }
        .map_err(|e| PaySignError::Signing(e.to_string()))?;
        Ok(signature.to_vec())
    }

    /// Base64 signature over `content`, as embedded in a `sign` field.
    pub fn sign_base64(&self, content: &str) -> Result<String> {
        Ok(STANDARD.encode(self.sign(content.as_bytes())?))
    }
}

impl ParamSigner for RsaSigner {
    fn canonical_string(&self, params: &ParameterSet) -> String {
        canonicalize(params, &[SIGN_FIELD])
    }

    fn sign_params(&self, params: &ParameterSet) -> Result<String> {
        self.sign_base64(&self.canonical_string(params))
    }

    fn algorithm(&self) -> &str {
        self.sign_type.as_str()
    }
}

/// Checks a raw PKCS#1 v1.5 signature over `content`.
pub fn verify(
    content: &[u8],
    signature: &[u8],
    public_key: &RsaPublicKey,
    sign_type: SignType,
) -> Result<()> {
    let signature =
        Signature::try_from(signature).map_err(|_| PaySignError::VerificationFailed)?;
    let checked = match sign_type {
        SignType::Rsa => VerifyingKey::<Sha1>::new(public_key.clone()).verify(content, &signature),
        SignType::Rsa2 => {
            VerifyingKey::<Sha256>::new(public_key.clone()).verify(content, &signature)
        }
    };
    checked.map_err(|_| PaySignError::VerificationFailed)
}

/// Like [`verify`], for a base64 signature taken off the wire. A signature
/// that is not base64 fails verification.
pub fn verify_base64(
    content: &str,
    signature: &str,
    public_key: &RsaPublicKey,
    sign_type: SignType,
) -> Result<()> {
    let raw = STANDARD
        .decode(signature.trim())
        .map_err(|_| PaySignError::VerificationFailed)?;
    verify(content.as_bytes(), &raw, public_key, sign_type)
}
