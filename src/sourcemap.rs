//! Source map v3 model and the base64-VLQ `mappings` codec.
//!
//! Only what stitching needs: decode a `mappings` string into absolute
//! segments, and encode absolute segments back into relative VLQ form.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A revision 3 source map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources_content: Vec<Option<String>>,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub mappings: String,
}

impl SourceMap {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            version: 3,
            file: Some(file.into()),
            source_root: None,
            sources: Vec::new(),
            sources_content: Vec::new(),
            names: Vec::new(),
            mappings: String::new(),
        }
    }

    /// A map with no sources or no mappings attributes nothing.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() || self.mappings.bytes().all(|b| b == b';' || b == b',')
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Decoded segments
// ---------------------------------------------------------------------------

/// Position in an original source. All fields are zero-based and absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: u32,
    pub line: u32,
    pub column: u32,
    pub name: Option<u32>,
}

/// One mapping segment on a generated line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub generated_column: u32,
    pub original: Option<OriginalPosition>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("invalid base64 character '{0}' in mappings")]
    InvalidCharacter(char),

    #[error("mappings end in the middle of a VLQ value")]
    Truncated,

    #[error("VLQ value overflows")]
    Overflow,

    #[error("segment has {0} fields (expected 1, 4 or 5)")]
    SegmentLength(usize),

    #[error("mapping resolves to a negative position")]
    NegativePosition,
}

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn base64_value(byte: u8) -> Option<i64> {
    let value = match byte {
        b'A'..=b'Z' => byte - b'A',
        b'a'..=b'z' => byte - b'a' + 26,
        b'0'..=b'9' => byte - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };
    Some(i64::from(value))
}

fn decode_vlq(bytes: &[u8], pos: &mut usize) -> Result<i64, MappingError> {
    let mut result: i64 = 0;
    let mut shift = 0;
    loop {
        let byte = *bytes.get(*pos).ok_or(MappingError::Truncated)?;
        *pos += 1;
        let digit = base64_value(byte).ok_or(MappingError::InvalidCharacter(byte as char))?;
        if shift > 55 {
            return Err(MappingError::Overflow);
        }
        result += (digit & 31) << shift;
        shift += 5;
        if digit & 32 == 0 {
            break;
        }
    }
    let negative = result & 1 == 1;
    result >>= 1;
    Ok(if negative { -result } else { result })
}

fn encode_vlq(value: i64, out: &mut String) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    loop {
        let mut digit = vlq & 31;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 32;
        }
        out.push(BASE64[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}

fn position(value: i64) -> Result<u32, MappingError> {
    u32::try_from(value).map_err(|_| MappingError::NegativePosition)
}

/// Decode a `mappings` string into one vector of segments per generated line.
pub fn decode_mappings(mappings: &str) -> Result<Vec<Vec<Segment>>, MappingError> {
    let mut lines = Vec::new();
    let (mut source, mut line, mut column, mut name) = (0i64, 0i64, 0i64, 0i64);

    for raw_line in mappings.split(';') {
        let mut segments = Vec::new();
        let mut generated_column = 0i64;

        for raw in raw_line.split(',').filter(|s| !s.is_empty()) {
            let bytes = raw.as_bytes();
            let mut pos = 0;
            let mut fields = [0i64; 5];
            let mut count = 0;
            while pos < bytes.len() {
                if count == fields.len() {
                    return Err(MappingError::SegmentLength(count + 1));
                }
                fields[count] = decode_vlq(bytes, &mut pos)?;
                count += 1;
            }

            generated_column += fields[0];
            let original = match count {
                1 => None,
                4 | 5 => {
                    source += fields[1];
                    line += fields[2];
                    column += fields[3];
                    let name_index = if count == 5 {
                        name += fields[4];
                        Some(position(name)?)
                    } else {
                        None
                    };
                    Some(OriginalPosition {
                        source: position(source)?,
                        line: position(line)?,
                        column: position(column)?,
                        name: name_index,
                    })
                }
                other => return Err(MappingError::SegmentLength(other)),
            };

            segments.push(Segment {
                generated_column: position(generated_column)?,
                original,
            });
        }
        lines.push(segments);
    }

    Ok(lines)
}

/// Encode absolute segments back into a relative VLQ `mappings` string.
pub fn encode_mappings(lines: &[Vec<Segment>]) -> String {
    let mut out = String::new();
    let (mut source, mut line, mut column, mut name) = (0i64, 0i64, 0i64, 0i64);

    for (index, segments) in lines.iter().enumerate() {
        if index > 0 {
            out.push(';');
        }
        let mut generated_column = 0i64;
        for (seg_index, segment) in segments.iter().enumerate() {
            if seg_index > 0 {
                out.push(',');
            }
            let col = i64::from(segment.generated_column);
            encode_vlq(col - generated_column, &mut out);
            generated_column = col;

            if let Some(original) = segment.original {
                let (s, l, c) = (
                    i64::from(original.source),
                    i64::from(original.line),
                    i64::from(original.column),
                );
                encode_vlq(s - source, &mut out);
                encode_vlq(l - line, &mut out);
                encode_vlq(c - column, &mut out);
                source = s;
                line = l;
                column = c;
                if let Some(n) = original.name {
                    let n = i64::from(n);
                    encode_vlq(n - name, &mut out);
                    name = n;
                }
            }
        }
    }

    out
}
