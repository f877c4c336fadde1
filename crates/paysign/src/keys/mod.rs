mod cert;
mod pem;
mod registry;

pub use cert::{
    CertificateRecord, SHA1_WITH_RSA, SHA256_WITH_RSA, derive_root_chain_identifier,
    distinguished_name, parse_certificate, serial_identifier,
};
pub use pem::{
    CERTIFICATE_END, PKCS1_PRIVATE_BEGIN, PKCS1_PRIVATE_END, PKCS8_PRIVATE_BEGIN,
    PKCS8_PRIVATE_END, PUBLIC_BEGIN, PUBLIC_END, load_private_key, load_public_key,
    normalize_private_key, normalize_public_key,
};
pub use registry::PublicKeyRegistry;
