//! Flat `<xml>` documents: one child element per field.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};

use crate::canonical::ParameterSet;
use crate::error::{PaySignError, Result};

const ROOT: &str = "xml";

/// Fields written as plain text rather than CDATA.
pub const PLAIN_FIELDS: [&str; 3] = ["total_fee", "refund_fee", "execute_time_"];

/// Renders `params` as a flat `<xml>` document, fields in key order.
pub fn encode_xml(params: &ParameterSet) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    write_document(&mut writer, params)
        .map_err(|e| PaySignError::InvalidRequest(format!("encoding xml: {e}")))?;
    String::from_utf8(writer.into_inner())
        .map_err(|e| PaySignError::InvalidRequest(format!("encoding xml: {e}")))
}

fn write_document(writer: &mut Writer<Vec<u8>>, params: &ParameterSet) -> std::io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(ROOT)))?;
    for (key, value) in params {
        writer.write_event(Event::Start(BytesStart::new(key.as_str())))?;
        if PLAIN_FIELDS.contains(&key.as_str()) {
            writer.write_event(Event::Text(BytesText::new(value)))?;
        } else {
            for part in BytesCData::escaped(value) {
                writer.write_event(Event::CData(part))?;
            }
        }
        writer.write_event(Event::End(BytesEnd::new(key.as_str())))?;
    }
    writer.write_event(Event::End(BytesEnd::new(ROOT)))
}

/// Reads the direct children of the root element into a parameter set.
/// Text and CDATA content are both accepted; nested elements are ignored.
pub fn decode_xml(body: &str) -> Result<ParameterSet> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut params = ParameterSet::new();
    let mut depth = 0usize;
    let mut saw_root = false;
    let mut field: Option<String> = None;
    let mut value = String::new();

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(start) => {
                depth += 1;
                match depth {
                    1 => saw_root = true,
                    2 => {
                        field = Some(element_name(&start)?);
                        value.clear();
                    }
                    _ => {}
                }
            }
            Event::Empty(start) => match depth {
                0 => saw_root = true,
                1 => {
                    params.insert(element_name(&start)?, String::new());
                }
                _ => {}
            },
            Event::Text(text) if depth == 2 => {
                value.push_str(&text.unescape().map_err(malformed)?);
            }
            Event::CData(cdata) if depth == 2 => {
                value.push_str(&cdata.decode().map_err(malformed)?);
            }
            Event::End(_) => {
                if depth == 2 {
                    if let Some(name) = field.take() {
                        params.insert(name, std::mem::take(&mut value));
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(PaySignError::MalformedResponse("no root element".into()));
    }
    Ok(params)
}

fn element_name(start: &BytesStart<'_>) -> Result<String> {
    let name = start.local_name();
    std::str::from_utf8(name.as_ref())
        .map(str::to_owned)
        .map_err(malformed)
}

fn malformed(e: impl std::fmt::Display) -> PaySignError {
    PaySignError::MalformedResponse(format!("reading xml: {e}"))
}
