use serde::{Serialize, Deserialize};
use crate::core::error::{Error, ErrorKind, Result};

/// How the bytes of a column are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnEncoding {
    Bytes,
    /// Unsigned big-endian integer (`b256`)
    Cardinal,
}

/// Fixed-width field definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub width: usize,
    pub encoding: ColumnEncoding,
}

impl Column {
    pub fn bytes(name: &str, width: usize) -> Self {
        Column {
            name: name.to_string(),
            width,
            encoding: ColumnEncoding::Bytes,
        }
    }

    pub fn cardinal(name: &str, width: usize) -> Self {
        Column {
            name: name.to_string(),
            width,
            encoding: ColumnEncoding::Cardinal,
        }
    }

    /// Parses one definition of the form `<type> <name>-<width> [{encoder}]`,
    /// e.g. `byte[] urlhash-12` or `Cardinal hits-4 {b256}`.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let (body, encoder) = match text.find('{') {
            Some(open) => {
                let close = text.rfind('}').ok_or_else(|| {
                    parse_error(text, "unterminated encoder braces")
                })?;
                if close < open {
                    return Err(parse_error(text, "unterminated encoder braces"));
                }
                (text[..open].trim(), Some(text[open + 1..close].trim()))
            }
            None => (text, None),
        };

        let mut parts = body.split_whitespace();
        let type_name = parts.next().ok_or_else(|| parse_error(text, "missing type"))?;
        let sized_name = parts.next().ok_or_else(|| parse_error(text, "missing name"))?;
        if parts.next().is_some() {
            return Err(parse_error(text, "trailing tokens"));
        }

        let dash = sized_name
            .rfind('-')
            .ok_or_else(|| parse_error(text, "missing -<width> suffix"))?;
        let name = &sized_name[..dash];
        if name.is_empty() {
            return Err(parse_error(text, "empty column name"));
        }
        let width: usize = sized_name[dash + 1..]
            .parse()
            .map_err(|_| parse_error(text, "width is not a number"))?;
        if width == 0 || width > u16::MAX as usize {
            return Err(parse_error(text, "width must be in 1..=65535"));
        }

        let encoding = match type_name {
            "byte[]" | "String" | "char" => ColumnEncoding::Bytes,
            "Cardinal" | "int" | "long" | "short" | "byte" => ColumnEncoding::Cardinal,
            other => return Err(parse_error(text, &format!("unknown type '{}'", other))),
        };
        match (encoding, encoder) {
            (_, None) => {}
            (ColumnEncoding::Cardinal, Some("b256")) => {}
            (ColumnEncoding::Bytes, Some("b256")) => {}
            (_, Some(other)) => {
                return Err(parse_error(text, &format!("unsupported encoder '{}'", other)));
            }
        }
        if encoding == ColumnEncoding::Cardinal && width > 8 {
            return Err(parse_error(text, "cardinal columns hold at most 8 bytes"));
        }

        Ok(Column {
            name: name.to_string(),
            width,
            encoding,
        })
    }

    /// Parses a comma-separated column layout
    pub fn parse_layout(text: &str) -> Result<Vec<Column>> {
        text.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Column::parse)
            .collect()
    }
}

fn parse_error(text: &str, reason: &str) -> Error {
    Error::new(ErrorKind::Parse, format!("column '{}': {}", text, reason))
}

/// Reads an unsigned big-endian integer of up to eight bytes
pub fn decode_cardinal(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Writes `value` big-endian into `out`, truncating high bytes that do not fit
pub fn encode_cardinal(out: &mut [u8], value: u64) {
    let be = value.to_be_bytes();
    let width = out.len().min(8);
    let start = out.len() - width;
    out[..start].fill(0);
    out[start..].copy_from_slice(&be[8 - width..]);
}
