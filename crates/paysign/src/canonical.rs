use std::collections::BTreeMap;

/// Field name -> value. Order carries no meaning; it is imposed by
/// [`canonicalize`].
pub type ParameterSet = BTreeMap<String, String>;

pub const SIGN_FIELD: &str = "sign";
pub const SIGN_TYPE_FIELD: &str = "sign_type";
pub const CERT_SN_FIELD: &str = "alipay_cert_sn";

/// Fields transported alongside signed content but never part of it.
pub const SIGNATURE_METADATA: [&str; 3] = [SIGN_FIELD, SIGN_TYPE_FIELD, CERT_SN_FIELD];

fn sorted_pairs<I, K, V>(params: I, excluded: &[&str]) -> Vec<String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<String> = params
        .into_iter()
        .filter(|(key, _)| !excluded.contains(&key.as_ref()))
        .filter_map(|(key, value)| {
            let value = value.as_ref().trim();
            (!value.is_empty()).then(|| format!("{}={}", key.as_ref(), value))
        })
        .collect();
    // whole `key=value` strings, byte order
    pairs.sort_unstable();
    pairs
}

/// Builds the `&`-joined, sorted `key=value` string a signature covers.
///
/// Values are trimmed, empty or whitespace-only values are dropped, and keys
/// in `excluded` are skipped.
pub fn canonicalize<I, K, V>(params: I, excluded: &[&str]) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    sorted_pairs(params, excluded).join("&")
}

/// Like [`canonicalize`], with `key=<secret>` appended after sorting. An
/// empty secret appends nothing.
pub fn canonicalize_with_secret<I, K, V>(params: I, excluded: &[&str], secret: &str) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs = sorted_pairs(params, excluded);
    if !secret.is_empty() {
        pairs.push(format!("key={secret}"));
    }
    pairs.join("&")
}
