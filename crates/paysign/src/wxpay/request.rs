use crate::canonical::ParameterSet;

/// A call to the symmetric gateway, supplying its own business fields.
/// Common fields and the signature are added by the client.
pub trait WxRequest {
    fn params(&self) -> ParameterSet;
}

impl WxRequest for ParameterSet {
    fn params(&self) -> ParameterSet {
        self.clone()
    }
}

/// `pay/orderquery`: look up an order by gateway transaction id or merchant
/// order number.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    pub transaction_id: String,
    pub out_trade_no: String,
}

impl WxRequest for OrderQuery {
    fn params(&self) -> ParameterSet {
        let mut params = ParameterSet::new();
        params.insert("transaction_id".into(), self.transaction_id.clone());
        params.insert("out_trade_no".into(), self.out_trade_no.clone());
        params.insert("sign_type".into(), "MD5".into());
        params
    }
}
