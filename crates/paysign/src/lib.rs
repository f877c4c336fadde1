pub mod alipay;
pub mod canonical;
pub mod error;
pub mod extract;
pub mod keys;
pub mod signing;
pub mod verify;
pub mod wxpay;

pub use alipay::{AlipayClient, AlipayConfig, GatewayRequest};
pub use canonical::{ParameterSet, canonicalize, canonicalize_with_secret};
pub use error::{GatewayError, PaySignError, Result};
pub use extract::{SignedPayload, extract_signed_payload};
pub use keys::{CertificateRecord, PublicKeyRegistry};
pub use signing::{Md5Signer, ParamSigner, RsaSigner, SignType};
pub use verify::{ResponseVerifier, Stage, VerifiedResponse};
pub use wxpay::{WxClient, WxPayConfig, WxRequest};
