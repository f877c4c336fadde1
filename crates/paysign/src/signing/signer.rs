use crate::canonical::ParameterSet;
use crate::error::Result;

/// Signs a parameter set for transport to a gateway.
///
/// Implementations are sync; signing is CPU-bound.
pub trait ParamSigner: Send + Sync {
    /// The exact string the signature covers.
    fn canonical_string(&self, params: &ParameterSet) -> String;

    /// Signature over [`ParamSigner::canonical_string`], in the encoding the
    /// gateway expects (base64 for RSA, upper-case hex for MD5).
    fn sign_params(&self, params: &ParameterSet) -> Result<String>;

    /// Algorithm tag as sent in `sign_type`.
    fn algorithm(&self) -> &str;
}
