use serde::Serialize;

/// A call to the asymmetric gateway. The serialized form of the request is
/// sent as `biz_content`.
pub trait GatewayRequest: Serialize {
    /// Dotted gateway method, e.g. `alipay.trade.query`.
    fn method_name(&self) -> &str;
}

/// Request with a caller-supplied method and an arbitrary JSON body.
#[derive(Debug, Clone, Serialize)]
pub struct RawRequest {
    #[serde(skip)]
    pub method: String,
    #[serde(flatten)]
    pub biz_content: serde_json::Map<String, serde_json::Value>,
}

impl GatewayRequest for RawRequest {
    fn method_name(&self) -> &str {
        &self.method
    }
}

/// `alipay.trade.query`: look up a trade by merchant order number or gateway
/// trade number.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TradeQuery {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub out_trade_no: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub trade_no: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub query_options: Vec<String>,
}

impl GatewayRequest for TradeQuery {
    fn method_name(&self) -> &str {
        "alipay.trade.query"
    }
}
