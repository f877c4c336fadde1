mod signer;
mod rsa;
mod md5;

pub use signer::ParamSigner;
pub use self::rsa::{RsaSigner, SignType, verify, verify_base64};
pub use self::md5::Md5Signer;
