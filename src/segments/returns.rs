//! Bank return values: `HIRMG` for the whole message, `HIRMS` for one
//! request segment (referenced through the segment header).

use super::{non_empty, Fields, SegmentType};
use crate::error::Result;
use crate::wire::DataElement;

/// Return code announcing a further page ("touchdown").
pub const TOUCHDOWN_CODE: &str = "3040";

/// One `code:element:text:params...` group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnValue {
    pub code: String,
    /// Data element of the request the value refers to.
    pub reference_element: Option<String>,
    pub text: String,
    pub parameters: Vec<String>,
}

impl ReturnValue {
    /// `0xxx` codes.
    pub fn is_success(&self) -> bool {
        self.code.starts_with('0')
    }

    /// `3xxx` codes.
    pub fn is_warning(&self) -> bool {
        self.code.starts_with('3')
    }

    /// `9xxx` codes.
    pub fn is_error(&self) -> bool {
        self.code.starts_with('9')
    }

    fn from_group(group: &[DataElement]) -> Self {
        let text = |index: usize| group.get(index).map(DataElement::as_str).unwrap_or("");
        ReturnValue {
            code: text(0).to_string(),
            reference_element: non_empty(text(1)),
            text: text(2).to_string(),
            parameters: group
                .iter()
                .skip(3)
                .map(|element| element.as_str().to_string())
                .collect(),
        }
    }
}

fn return_values(fields: &Fields<'_>) -> Result<Vec<ReturnValue>> {
    fields
        .groups()
        .iter()
        .filter(|group| group.iter().any(|element| !element.is_empty()))
        .map(|group| {
            let value = ReturnValue::from_group(group);
            if value.code.len() != 4 || !value.code.bytes().all(|b| b.is_ascii_digit()) {
                return Err(fields.error(format!("invalid return code {:?}", value.code)));
            }
            Ok(value)
        })
        .collect()
}

/// `HIRMG`: return values for the message as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalReturns {
    pub values: Vec<ReturnValue>,
}

impl SegmentType for GlobalReturns {
    const KIND: &'static str = "HIRMG";
    const VERSION: u32 = 2;
    const VERSIONS: &'static [u32] = &[2];
    const DECODES: bool = true;

    fn decode(fields: &Fields<'_>, _version: u32) -> Result<Self> {
        Ok(GlobalReturns {
            values: return_values(fields)?,
        })
    }
}

/// `HIRMS`: return values for the referenced request segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentReturns {
    pub values: Vec<ReturnValue>,
}

impl SegmentReturns {
    /// Continuation token, if the bank announced another page.
    pub fn touchdown(&self) -> Option<&str> {
        self.values
            .iter()
            .find(|value| value.code == TOUCHDOWN_CODE)
            .and_then(|value| value.parameters.first())
            .map(String::as_str)
    }
}

impl SegmentType for SegmentReturns {
    const KIND: &'static str = "HIRMS";
    const VERSION: u32 = 2;
    const VERSIONS: &'static [u32] = &[2];
    const DECODES: bool = true;

    fn decode(fields: &Fields<'_>, _version: u32) -> Result<Self> {
        Ok(SegmentReturns {
            values: return_values(fields)?,
        })
    }
}
