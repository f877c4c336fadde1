use serde::Deserialize;

use crate::signing::SignType;

pub const DEFAULT_TIME_ZONE: &str = "Asia/Shanghai";

fn default_time_zone() -> String {
    DEFAULT_TIME_ZONE.to_owned()
}

/// Settings for an asymmetric gateway client.
///
/// Key and certificate fields hold PEM text. Setting `merchant_cert` switches
/// the client to certificate mode, which also needs `gateway_cert` and
/// `gateway_root_cert`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AlipayConfig {
    pub app_id: String,
    pub merchant_private_key: String,
    pub gateway_public_key: Option<String>,
    pub merchant_cert: Option<String>,
    pub gateway_cert: Option<String>,
    pub gateway_root_cert: Option<String>,
    pub notify_url: String,
    pub is_prod: bool,
    pub sign_type: SignType,
    /// IANA zone of the gateway's wall clock, used for request timestamps.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
}

impl Default for AlipayConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            merchant_private_key: String::new(),
            gateway_public_key: None,
            merchant_cert: None,
            gateway_cert: None,
            gateway_root_cert: None,
            notify_url: String::new(),
            is_prod: false,
            sign_type: SignType::default(),
            time_zone: default_time_zone(),
        }
    }
}

impl AlipayConfig {
    /// The merchant certificate, when one is configured. Its presence selects
    /// certificate mode.
    pub fn merchant_cert(&self) -> Option<&str> {
        self.merchant_cert
            .as_deref()
            .filter(|cert| !cert.trim().is_empty())
    }
}
