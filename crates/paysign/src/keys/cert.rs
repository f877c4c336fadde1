use md5::{Digest, Md5};
use rsa::pkcs8::DecodePublicKey;
use rsa::{BigUint, RsaPublicKey};
use x509_cert::Certificate;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::der::asn1::{PrintableStringRef, Utf8StringRef};
use x509_cert::der::oid::ObjectIdentifier;
use x509_cert::der::{Any, DecodePem, Encode, Tag, Tagged};
use x509_cert::name::Name;

use super::pem::{CERTIFICATE_END, wrap_payload};
use crate::error::{PaySignError, Result};

const CERTIFICATE_BEGIN: &str = "-----BEGIN CERTIFICATE-----";

pub const SHA1_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
pub const SHA256_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");

const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const SERIAL_NUMBER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.5");

/// Attribute types with a short label, in the order they are laid out before
/// the sequence is reversed for display.
const LABELLED_ATTRIBUTES: [(ObjectIdentifier, &str); 9] = [
    (ObjectIdentifier::new_unwrap("2.5.4.6"), "C"),
    (ObjectIdentifier::new_unwrap("2.5.4.8"), "ST"),
    (ObjectIdentifier::new_unwrap("2.5.4.7"), "L"),
    (ObjectIdentifier::new_unwrap("2.5.4.9"), "STREET"),
    (ObjectIdentifier::new_unwrap("2.5.4.17"), "POSTALCODE"),
    (ObjectIdentifier::new_unwrap("2.5.4.10"), "O"),
    (ObjectIdentifier::new_unwrap("2.5.4.11"), "OU"),
    (COMMON_NAME, "CN"),
    (SERIAL_NUMBER, "SERIALNUMBER"),
];

/// The parts of an X.509 certificate the gateway integration cares about.
#[derive(Debug, Clone)]
pub struct CertificateRecord {
    /// Lowercase hex MD5 of the issuer string followed by the decimal serial.
    pub serial_id: String,
    pub issuer: String,
    pub serial_number: String,
    pub signature_algorithm: ObjectIdentifier,
    /// Present when the subject key is RSA.
    pub public_key: Option<RsaPublicKey>,
}

impl CertificateRecord {
    pub fn from_certificate(cert: &Certificate) -> Self {
        let tbs = &cert.tbs_certificate;
        let issuer = distinguished_name(&tbs.issuer);
        let serial_number = decimal_serial(tbs.serial_number.as_bytes());
        let public_key = tbs
            .subject_public_key_info
            .to_der()
            .ok()
            .and_then(|der| RsaPublicKey::from_public_key_der(&der).ok());

        Self {
            serial_id: serial_identifier(&issuer, &serial_number),
            issuer,
            serial_number,
            signature_algorithm: cert.signature_algorithm.oid,
            public_key,
        }
    }

    /// Whether the certificate is signed with SHA-1 or SHA-256 over RSA.
    pub fn is_rsa_signed(&self) -> bool {
        self.signature_algorithm == SHA256_WITH_RSA || self.signature_algorithm == SHA1_WITH_RSA
    }
}

pub fn serial_identifier(issuer: &str, serial_number: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(issuer.as_bytes());
    hasher.update(serial_number.as_bytes());
    hex::encode(hasher.finalize())
}

/// Parses the first certificate block in `raw`.
pub fn parse_certificate(raw: &str) -> Result<CertificateRecord> {
    let pem = first_certificate_block(raw)
        .ok_or_else(|| PaySignError::CertFormat("no certificate block found".into()))?;
    let cert = Certificate::from_pem(pem.as_bytes())
        .map_err(|e| PaySignError::CertFormat(format!("decoding certificate: {e}")))?;
    Ok(CertificateRecord::from_certificate(&cert))
}

/// Joins the serial identifiers of every RSA-signed certificate in a root
/// bundle with `_`, in bundle order.
pub fn derive_root_chain_identifier(raw: &str) -> Result<String> {
    if raw.trim().is_empty() {
        return Err(PaySignError::CertFormat("the certificate cannot be empty".into()));
    }

    let mut serials = Vec::new();
    for fragment in raw.split(CERTIFICATE_END) {
        if fragment.trim().is_empty() {
            continue;
        }
        let record = parse_certificate(&format!("{fragment}{CERTIFICATE_END}"))?;
        if record.is_rsa_signed() {
            serials.push(record.serial_id);
        } else {
            tracing::debug!(
                algorithm = %record.signature_algorithm,
                serial_id = %record.serial_id,
                "skipping root certificate with unsupported signature algorithm"
            );
        }
    }

    Ok(serials.join("_"))
}

/// Extracts the first BEGIN/END certificate pair and rewraps its payload at
/// 64 columns, so bundles wrapped at other widths still decode.
fn first_certificate_block(raw: &str) -> Option<String> {
    let begin = raw.find(CERTIFICATE_BEGIN)?;
    let body_start = begin + CERTIFICATE_BEGIN.len();
    let body_len = raw[body_start..].find(CERTIFICATE_END)?;
    let mut payload = raw[body_start..body_start + body_len].to_owned();
    payload.retain(|c| !c.is_ascii_whitespace());
    (!payload.is_empty()).then(|| wrap_payload(&payload, CERTIFICATE_BEGIN, CERTIFICATE_END))
}

fn decimal_serial(bytes: &[u8]) -> String {
    match bytes.first() {
        Some(first) if first & 0x80 != 0 => {
            let inverted: Vec<u8> = bytes.iter().map(|b| !b).collect();
            format!("-{}", BigUint::from_bytes_be(&inverted) + BigUint::from(1u32))
        }
        _ => BigUint::from_bytes_be(bytes).to_string(),
    }
}

/// Renders a distinguished name the way the gateway computes its issuer
/// string: labelled attributes grouped per type in a fixed order, unlabelled
/// attributes as `oid=#hex` trailing at the end, most specific RDN first.
pub fn distinguished_name(name: &Name) -> String {
    let attributes: Vec<&AttributeTypeAndValue> =
        name.0.iter().flat_map(|rdn| rdn.0.iter()).collect();

    let mut rdns: Vec<Vec<String>> = attributes
        .iter()
        .filter(|atv| !LABELLED_ATTRIBUTES.iter().any(|(oid, _)| *oid == atv.oid))
        .map(|atv| vec![format!("{}=#{}", atv.oid, hex::encode(reencode(&atv.value)))])
        .collect();

    for (oid, label) in LABELLED_ATTRIBUTES {
        let mut values: Vec<String> = attributes
            .iter()
            .filter(|atv| atv.oid == oid)
            .filter_map(|atv| attribute_text(&atv.value))
            .collect();
        if oid == COMMON_NAME || oid == SERIAL_NUMBER {
            // single-valued: the last one wins
            values = values.pop().filter(|v| !v.is_empty()).into_iter().collect();
        }
        if values.is_empty() {
            continue;
        }
        rdns.push(values.iter().map(|v| format!("{label}={}", escape_value(v))).collect());
    }

    rdns.iter()
        .rev()
        .map(|rdn| rdn.join("+"))
        .collect::<Vec<_>>()
        .join(",")
}

fn attribute_text(value: &Any) -> Option<String> {
    match value.tag() {
        Tag::Utf8String
        | Tag::PrintableString
        | Tag::Ia5String
        | Tag::NumericString
        | Tag::TeletexString
        | Tag::VisibleString => std::str::from_utf8(value.value()).ok().map(str::to_owned),
        Tag::BmpString => {
            let units: Vec<u16> = value
                .value()
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).ok()
        }
        _ => None,
    }
}

/// String values are re-encoded as PrintableString when the character set
/// allows it and as UTF8String otherwise; anything else keeps its DER.
fn reencode(value: &Any) -> Vec<u8> {
    let reencoded = attribute_text(value).and_then(|text| {
        PrintableStringRef::new(&text)
            .and_then(|s| s.to_der())
            .or_else(|_| Utf8StringRef::new(&text).and_then(|s| s.to_der()))
            .ok()
    });
    reencoded
        .or_else(|| value.to_der().ok())
        .unwrap_or_default()
}

fn escape_value(value: &str) -> String {
    let last = value.len().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len());
    for (index, c) in value.char_indices() {
        let escape = match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' => true,
            ' ' => index == 0 || index == last,
            '#' => index == 0,
            _ => false,
        };
        if escape {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    const ROOT_RSA: &str = include_str!("../../tests/fixtures/root_rsa.pem");
    const ROOT_EC: &str = include_str!("../../tests/fixtures/root_ec.pem");
    const ROOT_SHA1: &str = include_str!("../../tests/fixtures/root_sha1.pem");
    const ROOT_BUNDLE: &str = include_str!("../../tests/fixtures/root_bundle.pem");
    const GATEWAY_CERT: &str = include_str!("../../tests/fixtures/gateway_cert.pem");

    const ROOT_ISSUER: &str =
        "CN=Test Financial Root CA R1,OU=Certification Authority,O=Test Financial,C=CN";

    #[test]
    fn issuer_string_lists_most_specific_first() {
        let record = parse_certificate(GATEWAY_CERT).unwrap();
        assert_eq!(record.issuer, ROOT_ISSUER);
        assert_eq!(record.serial_number, "4567890123");
    }

    #[test]
    fn serial_identifier_is_md5_of_issuer_and_decimal_serial() {
        let record = parse_certificate(GATEWAY_CERT).unwrap();
        assert_eq!(record.serial_id, "d63f633904ed204715a060d9c79cc8b8");
        assert_eq!(
            record.serial_id,
            serial_identifier(&record.issuer, &record.serial_number)
        );
    }

    #[test]
    fn rsa_certificate_carries_public_key() {
        let record = parse_certificate(GATEWAY_CERT).unwrap();
        assert!(record.public_key.is_some());
        assert!(record.is_rsa_signed());
    }

    #[test]
    fn ec_certificate_has_no_rsa_key() {
        let record = parse_certificate(ROOT_EC).unwrap();
        assert!(record.public_key.is_none());
        assert!(!record.is_rsa_signed());
        assert_eq!(record.serial_id, "5c0bdcb2e6c95072be8d7eb45a2694fe");
    }

    #[test]
    fn root_chain_keeps_only_rsa_signed_certificates() {
        let identifier = derive_root_chain_identifier(ROOT_BUNDLE).unwrap();
        assert_eq!(identifier, "ac35edbe4518c6d4caad96a7176eca3c");
    }

    #[test]
    fn root_chain_joins_serials_in_bundle_order() {
        let bundle = format!("{GATEWAY_CERT}{ROOT_EC}{ROOT_RSA}");
        let identifier = derive_root_chain_identifier(&bundle).unwrap();
        assert_eq!(
            identifier,
            "d63f633904ed204715a060d9c79cc8b8_ac35edbe4518c6d4caad96a7176eca3c"
        );
    }

    #[test]
    fn sha1_signed_root_is_accepted() {
        let record = parse_certificate(ROOT_SHA1).unwrap();
        assert_eq!(record.signature_algorithm, SHA1_WITH_RSA);
        assert!(record.is_rsa_signed());
        assert_eq!(record.serial_id, "dca13912e6a85ce70f311e01ee9f9205");
    }

    #[test]
    fn root_chain_mixes_sha1_and_sha256_roots() {
        let bundle = format!("{ROOT_SHA1}{ROOT_EC}{ROOT_RSA}");
        let identifier = derive_root_chain_identifier(&bundle).unwrap();
        assert_eq!(
            identifier,
            "dca13912e6a85ce70f311e01ee9f9205_ac35edbe4518c6d4caad96a7176eca3c"
        );
    }

    #[test]
    fn rewrapped_certificate_still_parses() {
        let single_line: String = GATEWAY_CERT
            .lines()
            .filter(|line| !line.starts_with("-----"))
            .collect();
        let raw = format!("{CERTIFICATE_BEGIN}\n{single_line}\n{CERTIFICATE_END}\n");
        let record = parse_certificate(&raw).unwrap();
        assert_eq!(record.serial_id, "d63f633904ed204715a060d9c79cc8b8");
    }

    #[test]
    fn missing_block_is_a_cert_format_error() {
        assert!(matches!(parse_certificate(""), Err(PaySignError::CertFormat(_))));
        assert!(matches!(
            parse_certificate("-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----"),
            Err(PaySignError::CertFormat(_))
        ));
        assert!(matches!(
            derive_root_chain_identifier(" \n"),
            Err(PaySignError::CertFormat(_))
        ));
    }

    #[test]
    fn multi_valued_types_share_one_rdn() {
        let name = Name::from_str("O=B,O=A,C=CN").unwrap();
        assert_eq!(distinguished_name(&name), "O=A+O=B,C=CN");
    }

    #[test]
    fn unlabelled_attributes_render_as_hex_der_at_the_end() {
        // emailAddress "a@b.c" as IA5String
        let name =
            Name::from_str("CN=Root,O=Org,C=CN,1.2.840.113549.1.9.1=#16056140622e63").unwrap();
        assert_eq!(
            distinguished_name(&name),
            "CN=Root,O=Org,C=CN,1.2.840.113549.1.9.1=#0c056140622e63"
        );
    }

    #[test]
    fn special_characters_are_escaped() {
        assert_eq!(escape_value("a,b"), "a\\,b");
        assert_eq!(escape_value(" lead"), "\\ lead");
        assert_eq!(escape_value("trail "), "trail\\ ");
        assert_eq!(escape_value("#1 in # "), "\\#1 in #\\ ");
    }

    #[test]
    fn negative_serials_keep_their_sign() {
        assert_eq!(decimal_serial(&[0x01, 0x00]), "256");
        assert_eq!(decimal_serial(&[0xff]), "-1");
        assert_eq!(decimal_serial(&[0x00, 0x80]), "128");
    }
}
