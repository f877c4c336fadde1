use chrono::Utc;
use rand::Rng;
use serde::Deserialize;

use super::request::WxRequest;
use super::xml::{decode_xml, encode_xml};
use crate::canonical::{ParameterSet, SIGN_FIELD};
use crate::error::{GatewayError, PaySignError, Result};
use crate::signing::{Md5Signer, ParamSigner};

pub const SANDBOX_HOST: &str = "https://api.mch.weixin.qq.com/sandboxnew/";
pub const PRODUCTION_HOST: &str = "https://api.mch.weixin.qq.com/";

pub const SUCCESS: &str = "SUCCESS";
pub const FAIL: &str = "FAIL";

pub const NONCE_LEN: usize = 32;
const NONCE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Settings for the symmetric gateway client.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct WxPayConfig {
    pub app_id: String,
    pub mch_id: String,
    /// Shared MD5 secret. Empty disables the `key=` suffix.
    pub md5_key: String,
    pub is_prod: bool,
}

/// Random `[a-z0-9]` string of [`NONCE_LEN`] characters.
pub fn nonce_str() -> String {
    let mut rng = rand::thread_rng();
    (0..NONCE_LEN)
        .map(|_| NONCE_ALPHABET[rng.gen_range(0..NONCE_ALPHABET.len())] as char)
        .collect()
}

/// Signs requests for, and verifies responses from, the symmetric gateway.
pub struct WxClient {
    app_id: String,
    mch_id: String,
    gateway_host: &'static str,
    signer: Md5Signer,
}

impl WxClient {
    pub fn new(config: &WxPayConfig) -> Self {
        Self {
            app_id: config.app_id.clone(),
            mch_id: config.mch_id.clone(),
            gateway_host: if config.is_prod {
                PRODUCTION_HOST
            } else {
                SANDBOX_HOST
            },
            signer: Md5Signer::new(config.md5_key.as_str()),
        }
    }

    pub fn gateway_host(&self) -> &str {
        self.gateway_host
    }

    pub fn signer(&self) -> &Md5Signer {
        &self.signer
    }

    /// The request's fields plus `appid`, `mch_id`, a fresh `nonce_str` and
    /// `sign`.
    pub fn request_params<R: WxRequest + ?Sized>(&self, request: &R) -> ParameterSet {
        let mut params = request.params();
        params.insert("appid".into(), self.app_id.clone());
        params.insert("mch_id".into(), self.mch_id.clone());
        params.insert("nonce_str".into(), nonce_str());
        let sign = self.signer.sign(&params);
        params.insert(SIGN_FIELD.into(), sign);
        params
    }

    /// [`WxClient::request_params`] rendered as the request body.
    pub fn request_xml<R: WxRequest + ?Sized>(&self, request: &R) -> Result<String> {
        encode_xml(&self.request_params(request))
    }

    /// Checks status fields, then the signature, of an XML response body.
    /// Returns every field of a verified response.
    pub fn verify_response(&self, body: &str) -> Result<ParameterSet> {
        let fields = decode_xml(body)?;

        let return_code = status_field(&fields, "return_code")?;
        if return_code == FAIL {
            let message = field(&fields, "return_msg");
            return Err(GatewayError {
                code: FAIL.into(),
                msg: message.into(),
                sub_code: String::new(),
                sub_msg: message.into(),
            }
            .into());
        }
        let result_code = status_field(&fields, "result_code")?;
        if result_code == FAIL {
            return Err(GatewayError {
                code: FAIL.into(),
                msg: field(&fields, "return_msg").into(),
                sub_code: field(&fields, "err_code").into(),
                sub_msg: field(&fields, "err_code_des").into(),
            }
            .into());
        }

        let sign = field(&fields, SIGN_FIELD);
        if sign.is_empty() {
            return Err(PaySignError::SignNotFound);
        }
        if let Err(e) = self.signer.verify(&fields, sign) {
            tracing::warn!("symmetric gateway response signature rejected");
            return Err(e);
        }
        Ok(fields)
    }

    /// Payment notifications carry the same status fields and signature as
    /// responses.
    pub fn verify_notification(&self, body: &str) -> Result<ParameterSet> {
        self.verify_response(body)
    }

    /// In-page payment parameters for `prepay_id`, timestamped now.
    pub fn jsapi_params(&self, sign_type: &str, prepay_id: &str, nonce: &str) -> ParameterSet {
        self.jsapi_params_at(sign_type, prepay_id, nonce, Utc::now().timestamp())
    }

    pub fn jsapi_params_at(
        &self,
        sign_type: &str,
        prepay_id: &str,
        nonce: &str,
        timestamp: i64,
    ) -> ParameterSet {
        let mut params = ParameterSet::new();
        params.insert("appId".into(), self.app_id.clone());
        params.insert("timeStamp".into(), timestamp.to_string());
        params.insert("signType".into(), sign_type.into());
        params.insert("package".into(), format!("prepay_id={prepay_id}"));
        params.insert("nonceStr".into(), nonce.into());
        let pay_sign = self.signer.sign(&params);
        params.insert("paySign".into(), pay_sign);
        params
    }

    pub fn algorithm(&self) -> &str {
        self.signer.algorithm()
    }
}

fn field<'a>(fields: &'a ParameterSet, name: &str) -> &'a str {
    fields.get(name).map_or("", |v| v.trim())
}

fn status_field<'a>(fields: &'a ParameterSet, name: &str) -> Result<&'a str> {
    let value = field(fields, name);
    if value.is_empty() {
        return Err(PaySignError::MalformedResponse(format!("missing {name}")));
    }
    Ok(value)
}
