//! Low level FinTS wire syntax.
//!
//! A message is a sequence of segments terminated by `'`. A segment is a
//! sequence of data element groups separated by `+`, a group is a sequence of
//! data elements separated by `:`. Text elements escape the reserved
//! characters with `?`. Binary elements are written as `@<length>@<bytes>`
//! and are never escaped.

use crate::error::{Error, Result};

pub const SEGMENT_TERMINATOR: u8 = b'\'';
pub const GROUP_SEPARATOR: u8 = b'+';
pub const ELEMENT_SEPARATOR: u8 = b':';
pub const ESCAPE: u8 = b'?';
pub const BINARY_MARKER: u8 = b'@';

/// One data element of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataElement {
    Text(String),
    Binary(String),
}

/// Ordered data elements of one group.
pub type DataGroup = Vec<DataElement>;

impl DataElement {
    pub fn as_str(&self) -> &str {
        match self {
            DataElement::Text(value) | DataElement::Binary(value) => value,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, DataElement::Binary(_))
    }
}

impl From<&str> for DataElement {
    fn from(value: &str) -> Self {
        DataElement::Text(value.to_string())
    }
}

impl From<String> for DataElement {
    fn from(value: String) -> Self {
        DataElement::Text(value)
    }
}

fn is_reserved(byte: u8) -> bool {
    matches!(
        byte,
        SEGMENT_TERMINATOR | GROUP_SEPARATOR | ELEMENT_SEPARATOR | ESCAPE | BINARY_MARKER
    )
}

/// Escape a literal text value for the wire.
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_ascii() && is_reserved(ch as u8) {
            escaped.push(ESCAPE as char);
        }
        escaped.push(ch);
    }
    escaped
}

/// Reverse [`escape`]. Fails on an escape character that is not followed by
/// a reserved character.
pub fn unescape(value: &str) -> Result<String> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == ESCAPE {
            match bytes.get(i + 1) {
                Some(&next) if is_reserved(next) => {
                    out.push(next);
                    i += 2;
                }
                Some(_) => return Err(Error::malformed(i, "escape character before unreserved character")),
                None => return Err(Error::malformed(i, "dangling escape character")),
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| Error::malformed(0, "invalid UTF-8 after unescaping"))
}

fn encode_element(element: &DataElement, out: &mut String) {
    match element {
        DataElement::Text(value) => out.push_str(&escape(value)),
        DataElement::Binary(value) => {
            out.push('@');
            out.push_str(&value.len().to_string());
            out.push('@');
            out.push_str(value);
        }
    }
}

/// Encode the groups of one segment (header group first) including the
/// terminator. Trailing empty elements and groups are omitted.
pub fn encode_groups(groups: &[DataGroup]) -> String {
    let group_end = groups
        .iter()
        .rposition(|group| group.iter().any(|element| !element.is_empty()))
        .map_or(0, |pos| pos + 1);

    let mut out = String::new();
    for (index, group) in groups[..group_end].iter().enumerate() {
        if index > 0 {
            out.push(GROUP_SEPARATOR as char);
        }
        let element_end = group
            .iter()
            .rposition(|element| !element.is_empty())
            .map_or(0, |pos| pos + 1);
        for (position, element) in group[..element_end].iter().enumerate() {
            if position > 0 {
                out.push(ELEMENT_SEPARATOR as char);
            }
            encode_element(element, &mut out);
        }
    }
    out.push(SEGMENT_TERMINATOR as char);
    out
}

/// Split wire text into segments, each a list of groups with the header
/// group first.
pub fn split_segments(wire: &str) -> Result<Vec<Vec<DataGroup>>> {
    Tokenizer::new(wire).run()
}

struct Tokenizer<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn run(mut self) -> Result<Vec<Vec<DataGroup>>> {
        let mut segments = Vec::new();
        let mut groups: Vec<DataGroup> = Vec::new();
        let mut group: DataGroup = Vec::new();
        let mut in_segment = false;

        loop {
            // Line breaks between segments are tolerated.
            if !in_segment {
                while self.pos < self.bytes.len() && matches!(self.bytes[self.pos], b'\r' | b'\n') {
                    self.pos += 1;
                }
                if self.pos == self.bytes.len() {
                    break;
                }
            }

            in_segment = true;
            let element = self.element()?;
            group.push(element);

            match self.bytes.get(self.pos) {
                Some(&ELEMENT_SEPARATOR) => {
                    self.pos += 1;
                }
                Some(&GROUP_SEPARATOR) => {
                    self.pos += 1;
                    groups.push(std::mem::take(&mut group));
                }
                Some(&SEGMENT_TERMINATOR) => {
                    self.pos += 1;
                    groups.push(std::mem::take(&mut group));
                    segments.push(std::mem::take(&mut groups));
                    in_segment = false;
                }
                Some(_) => return Err(Error::malformed(self.pos, "unexpected data after binary element")),
                None => return Err(Error::malformed(self.pos, "unterminated segment")),
            }
        }

        Ok(segments)
    }

    fn element(&mut self) -> Result<DataElement> {
        if self.bytes.get(self.pos) == Some(&BINARY_MARKER) {
            return self.binary();
        }

        let mut value = Vec::new();
        while let Some(&byte) = self.bytes.get(self.pos) {
            match byte {
                ESCAPE => match self.bytes.get(self.pos + 1) {
                    Some(&next) if is_reserved(next) => {
                        value.push(next);
                        self.pos += 2;
                    }
                    Some(_) => {
                        return Err(Error::malformed(
                            self.pos,
                            "escape character before unreserved character",
                        ))
                    }
                    None => return Err(Error::malformed(self.pos, "dangling escape character")),
                },
                ELEMENT_SEPARATOR | GROUP_SEPARATOR | SEGMENT_TERMINATOR => break,
                BINARY_MARKER => {
                    return Err(Error::malformed(self.pos, "unescaped binary marker inside text"))
                }
                _ => {
                    value.push(byte);
                    self.pos += 1;
                }
            }
        }

        String::from_utf8(value)
            .map(DataElement::Text)
            .map_err(|_| Error::malformed(self.pos, "invalid UTF-8 in text element"))
    }

    fn binary(&mut self) -> Result<DataElement> {
        let start = self.pos;
        let digits_start = self.pos + 1;
        let digits_end = self.bytes[digits_start..]
            .iter()
            .position(|&b| b == BINARY_MARKER)
            .map(|offset| digits_start + offset)
            .ok_or_else(|| Error::malformed(start, "unterminated binary length"))?;

        let length: usize = self.text[digits_start..digits_end]
            .parse()
            .map_err(|_| Error::malformed(start, "invalid binary length"))?;

        let payload_start = digits_end + 1;
        let payload_end = payload_start
            .checked_add(length)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| Error::malformed(start, "binary length exceeds message"))?;

        let payload = self
            .text
            .get(payload_start..payload_end)
            .ok_or_else(|| Error::malformed(start, "binary data splits a character"))?;

        self.pos = payload_end;
        Ok(DataElement::Binary(payload.to_string()))
    }
}
