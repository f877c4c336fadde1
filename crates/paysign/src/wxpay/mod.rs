mod client;
mod request;
mod xml;

pub use client::{
    FAIL, NONCE_LEN, PRODUCTION_HOST, SANDBOX_HOST, SUCCESS, WxClient, WxPayConfig, nonce_str,
};
pub use request::{OrderQuery, WxRequest};
pub use xml::{PLAIN_FIELDS, decode_xml, encode_xml};
