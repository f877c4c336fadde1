//! Boundary scanning over raw gateway response bodies.
//!
//! The gateway signs the exact bytes of the inner response object, so the
//! signed region is sliced out of the body by marker position. Parsing and
//! re-serializing the JSON would not reproduce those bytes.

use crate::canonical::{CERT_SN_FIELD, SIGN_FIELD};
use crate::error::{PaySignError, Result};

pub const RESPONSE_SUFFIX: &str = "_response";
pub const ERROR_RESPONSE_NODE: &str = "error_response";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The node named after the called method.
    Method,
    /// The generic `error_response` node.
    Error,
}

/// Signed content plus the fields transported next to it. Borrows from the
/// response body and lives for one verification call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedPayload<'a> {
    pub node: NodeKind,
    pub content: &'a str,
    pub cert_sn: &'a str,
    pub sign: &'a str,
}

impl SignedPayload<'_> {
    pub fn is_signed(&self) -> bool {
        !self.sign.is_empty()
    }
}

/// `alipay.trade.query` -> `alipay_trade_query_response`.
pub fn response_node_name(method: &str) -> String {
    format!("{}{RESPONSE_SUFFIX}", method.replace('.', "_"))
}

/// Locates the signed payload for `node_name`, falling back to the generic
/// error node. Fails with [`PaySignError::SignNotFound`] when neither is
/// present.
pub fn extract_signed_payload<'a>(body: &'a str, node_name: &str) -> Result<SignedPayload<'a>> {
    let (node, marker_end) = match node_value_start(body, node_name) {
        Some(start) => (NodeKind::Method, start),
        None => match node_value_start(body, ERROR_RESPONSE_NODE) {
            Some(start) => (NodeKind::Error, start),
            None => return Err(PaySignError::SignNotFound),
        },
    };

    let sign_at = rfind_field(body, SIGN_FIELD);
    let cert_at = rfind_field(body, CERT_SN_FIELD);

    let content_end = match (sign_at, cert_at) {
        (Some(sign), Some(cert)) => strip_separator(body, sign.min(cert)),
        (Some(at), None) | (None, Some(at)) => strip_separator(body, at),
        // no trailing fields: drop the closing brace of the outer object
        (None, None) => strip_closing_brace(body),
    };

    if content_end < marker_end {
        return Ok(SignedPayload {
            node,
            content: "",
            cert_sn: "",
            sign: "",
        });
    }

    Ok(SignedPayload {
        node,
        content: &body[marker_end..content_end],
        cert_sn: cert_at.map_or("", |at| field_value(body, at, CERT_SN_FIELD)),
        sign: sign_at.map_or("", |at| field_value(body, at, SIGN_FIELD)),
    })
}

/// Byte offset just past `"<node>":` and any whitespace, using the
/// right-most occurrence of the node marker used as a key.
fn node_value_start(body: &str, node: &str) -> Option<usize> {
    let marker = format!("\"{node}\"");
    body.rmatch_indices(&marker).find_map(|(at, _)| {
        let rest = &body[at + marker.len()..];
        let value = rest.trim_start().strip_prefix(':')?.trim_start();
        Some(body.len() - value.len())
    })
}

fn rfind_field(body: &str, field: &str) -> Option<usize> {
    body.rfind(&format!("\"{field}\""))
}

/// End of the content region before a trailing field starting at `at`:
/// whitespace and one `,` separator are excluded.
fn strip_separator(body: &str, at: usize) -> usize {
    let head = body[..at].trim_end();
    head.strip_suffix(',').unwrap_or(head).trim_end().len()
}

fn strip_closing_brace(body: &str) -> usize {
    let head = body.trim_end();
    head.strip_suffix('}').unwrap_or(head).trim_end().len()
}

/// String value of the field whose quoted name starts at `at`, up to the next
/// quote. Empty when the value is not a terminated string.
fn field_value<'a>(body: &'a str, at: usize, field: &str) -> &'a str {
    let rest = &body[at + field.len() + 2..];
    let Some(rest) = rest.trim_start().strip_prefix(':') else {
        return "";
    };
    let Some(rest) = rest.trim_start().strip_prefix('"') else {
        return "";
    };
    rest.find('"').map_or("", |end| &rest[..end])
}
