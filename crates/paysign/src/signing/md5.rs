use md5::{Digest, Md5};

use super::signer::ParamSigner;
use crate::canonical::{ParameterSet, SIGN_FIELD, canonicalize_with_secret};
use crate::error::{PaySignError, Result};

/// Shared-secret MD5 digest scheme. The secret is appended as `key=<secret>`
/// after the sorted pairs and never leaves the process.
#[derive(Clone)]
pub struct Md5Signer {
    secret: String,
}

impl Md5Signer {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Upper-case hex MD5 over the canonical string plus secret.
    pub fn sign(&self, params: &ParameterSet) -> String {
        let digest = Md5::digest(self.canonical_string(params).as_bytes());
        hex::encode_upper(digest)
    }

    /// Recomputes and compares against `signature`, case-normalized.
    pub fn verify(&self, params: &ParameterSet, signature: &str) -> Result<()> {
        if self.sign(params) == signature.trim().to_ascii_uppercase() {
            Ok(())
        } else {
            Err(PaySignError::VerificationFailed)
        }
    }
}

impl ParamSigner for Md5Signer {
    fn canonical_string(&self, params: &ParameterSet) -> String {
        canonicalize_with_secret(params, &[SIGN_FIELD], &self.secret)
    }

    fn sign_params(&self, params: &ParameterSet) -> Result<String> {
        Ok(self.sign(params))
    }

    fn algorithm(&self) -> &str {
        "MD5"
    }
}

impl std::fmt::Debug for Md5Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Md5Signer").finish_non_exhaustive()
    }
}
