use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::de::DeserializeOwned;

use super::config::AlipayConfig;
use super::request::GatewayRequest;
use crate::canonical::{ParameterSet, SIGN_FIELD};
use crate::error::{PaySignError, Result};
use crate::keys::{
    PublicKeyRegistry, derive_root_chain_identifier, load_private_key, load_public_key,
    parse_certificate,
};
use crate::signing::{ParamSigner, RsaSigner};
use crate::verify::{ResponseVerifier, VerifiedResponse};

pub const SANDBOX_HOST: &str = "https://openapi.alipaydev.com/gateway.do";
pub const PRODUCTION_HOST: &str = "https://openapi.alipay.com/gateway.do";

/// Registry serial of a gateway key configured as a bare public key.
pub const PUBLIC_KEY_SN: &str = "alipay-public-key";

pub const FORMAT: &str = "json";
pub const CHARSET: &str = "UTF-8";
pub const VERSION: &str = "1.0";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Certificate serials advertised on every request in certificate mode.
#[derive(Debug, Clone)]
struct CertSerials {
    merchant: String,
    root_chain: String,
}

/// Signs requests for, and verifies responses from, the asymmetric gateway.
pub struct AlipayClient {
    app_id: String,
    notify_url: String,
    gateway_host: &'static str,
    time_zone: Tz,
    signer: RsaSigner,
    verifier: ResponseVerifier,
    cert_serials: Option<CertSerials>,
}

impl AlipayClient {
    /// Loads every key and certificate up front. The public key registry is
    /// frozen once this returns.
    pub fn new(config: &AlipayConfig) -> Result<Self> {
        let time_zone: Tz = config.time_zone.parse().map_err(|_| {
            PaySignError::InvalidConfig(format!("time zone error: `{}`", config.time_zone))
        })?;
        let signer = RsaSigner::new(
            load_private_key(&config.merchant_private_key)?,
            config.sign_type,
        );

        let mut registry = match non_empty(&config.gateway_public_key) {
            Some(raw) => Some(PublicKeyRegistry::new(PUBLIC_KEY_SN, load_public_key(raw)?)),
            None => None,
        };

        let cert_serials = match config.merchant_cert() {
            Some(merchant_cert) => {
                let merchant = parse_certificate(merchant_cert)?.serial_id;

                let gateway_cert = non_empty(&config.gateway_cert).ok_or_else(|| {
                    PaySignError::CertFormat("gateway certificate is required".into())
                })?;
                let gateway = parse_certificate(gateway_cert)?;
                let gateway_key = gateway.public_key.ok_or_else(|| {
                    PaySignError::CertFormat("gateway certificate does not carry an RSA key".into())
                })?;

                let root_cert = non_empty(&config.gateway_root_cert).ok_or_else(|| {
                    PaySignError::CertFormat("gateway root certificate is required".into())
                })?;
                let root_chain = derive_root_chain_identifier(root_cert)?;

                // the certificate key becomes the default, the bare key stays
                // reachable under its own serial
                registry = Some(match registry.take() {
                    Some(mut registry) => {
                        registry.register(gateway.serial_id.as_str(), gateway_key);
                        registry.set_default(&gateway.serial_id)?;
                        registry
                    }
                    None => PublicKeyRegistry::new(gateway.serial_id, gateway_key),
                });
                tracing::debug!(merchant_cert_sn = %merchant, root_cert_sn = %root_chain, "certificate mode");
                Some(CertSerials {
                    merchant,
                    root_chain,
                })
            }
            None => None,
        };

        let registry = registry.ok_or_else(|| {
            PaySignError::KeyFormat("gateway public key cannot be empty".into())
        })?;

        Ok(Self {
            app_id: config.app_id.clone(),
            notify_url: config.notify_url.clone(),
            gateway_host: if config.is_prod {
                PRODUCTION_HOST
            } else {
                SANDBOX_HOST
            },
            time_zone,
            signer,
            verifier: ResponseVerifier::new(Arc::new(registry), config.sign_type),
            cert_serials,
        })
    }

    pub fn gateway_host(&self) -> &str {
        self.gateway_host
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Serial of the merchant application certificate, in certificate mode.
    pub fn merchant_cert_sn(&self) -> Option<&str> {
        self.cert_serials.as_ref().map(|s| s.merchant.as_str())
    }

    /// `_`-joined serials of the trusted RSA root certificates, in
    /// certificate mode.
    pub fn root_cert_sn(&self) -> Option<&str> {
        self.cert_serials.as_ref().map(|s| s.root_chain.as_str())
    }

    pub fn verifier(&self) -> &ResponseVerifier {
        &self.verifier
    }

    /// Signed request parameters, timestamped now.
    pub fn request_params<R: GatewayRequest>(&self, request: &R) -> Result<ParameterSet> {
        self.request_params_at(request, Utc::now())
    }

    /// Signed request parameters for a request issued at `now`.
    pub fn request_params_at<R: GatewayRequest>(
        &self,
        request: &R,
        now: DateTime<Utc>,
    ) -> Result<ParameterSet> {
        let method = request.method_name();
        if method.is_empty() {
            return Err(PaySignError::InvalidRequest("method name cannot be empty".into()));
        }
        let biz_content = serde_json::to_string(request)
            .map_err(|e| PaySignError::InvalidRequest(format!("encoding biz_content: {e}")))?;
        let timestamp = now.with_timezone(&self.time_zone).format(TIMESTAMP_FORMAT);

        let mut params = ParameterSet::new();
        params.insert("app_id".into(), self.app_id.clone());
        params.insert("method".into(), method.to_owned());
        params.insert("format".into(), FORMAT.into());
        params.insert("charset".into(), CHARSET.into());
        params.insert("sign_type".into(), self.signer.algorithm().to_owned());
        params.insert("timestamp".into(), timestamp.to_string());
        params.insert("version".into(), VERSION.into());
        params.insert("notify_url".into(), self.notify_url.clone());
        params.insert("biz_content".into(), biz_content);
        if let Some(serials) = &self.cert_serials {
            params.insert("app_cert_sn".into(), serials.merchant.clone());
            params.insert("alipay_root_cert_sn".into(), serials.root_chain.clone());
        }

        let sign = self.signer.sign_params(&params)?;
        params.insert(SIGN_FIELD.into(), sign);
        tracing::debug!(%method, "signed gateway request");
        Ok(params)
    }

    /// Signed request parameters as a form-urlencoded order string, the form
    /// the in-app payment SDK consumes.
    pub fn order_string<R: GatewayRequest>(&self, request: &R) -> Result<String> {
        encode_order_string(&self.request_params(request)?)
    }

    /// Verifies the raw response body of `method`.
    pub fn verify_response<'a>(&self, body: &'a str, method: &str) -> Result<VerifiedResponse<'a>> {
        self.verifier.verify_response(body, method)
    }

    /// Verifies the response to `request` and decodes the signed content.
    /// A verified business failure surfaces as [`PaySignError::Gateway`].
    pub fn decode_response<T, R>(&self, body: &str, request: &R) -> Result<T>
    where
        T: DeserializeOwned,
        R: GatewayRequest,
    {
        let verified = self.verify_response(body, request.method_name())?;
        if let Some(error) = verified.gateway_error() {
            return Err(error.into());
        }
        verified.decode()
    }

    pub fn verify_notification(&self, fields: &ParameterSet) -> Result<()> {
        self.verifier.verify_notification(fields)
    }
}

/// Form-urlencodes a parameter set in key order.
pub fn encode_order_string(params: &ParameterSet) -> Result<String> {
    serde_urlencoded::to_string(params)
        .map_err(|e| PaySignError::InvalidRequest(format!("encoding order string: {e}")))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}
