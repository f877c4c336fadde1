mod client;
mod config;
mod request;

pub use client::{
    AlipayClient, CHARSET, FORMAT, PRODUCTION_HOST, PUBLIC_KEY_SN, SANDBOX_HOST, TIMESTAMP_FORMAT,
    VERSION, encode_order_string,
};
pub use config::{AlipayConfig, DEFAULT_TIME_ZONE};
pub use request::{GatewayRequest, RawRequest, TradeQuery};
