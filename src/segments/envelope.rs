//! Message framing and PIN/TAN security envelope segments.
//!
//! PIN/TAN uses a dummy encryption: the signed segments travel as binary
//! data inside `HNVSD`, announced by an `HNVSK` header carrying a fixed
//! all-zero key.

use chrono::NaiveDateTime;

use super::elements as el;
use super::{Fields, SegmentType};
use crate::auth::Pin;
use crate::error::{Error, Result};
use crate::wire::DataGroup;

/// Country code of German banks.
pub const COUNTRY_CODE: &str = "280";
/// Security profile used by PIN/TAN.
pub const SECURITY_PROFILE: &str = "PIN";
/// One-step PIN/TAN security function.
pub const SINGLE_STEP_FUNCTION: &str = "999";

fn timestamp(fields: &Fields<'_>, group: usize) -> Result<NaiveDateTime> {
    let date = fields
        .date(group, 1, "security date")?
        .ok_or_else(|| fields.error("missing security date"))?;
    let time = fields
        .time(group, 2, "security time")?
        .ok_or_else(|| fields.error("missing security time"))?;
    Ok(date.and_time(time))
}

fn required(kind: &str, field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::missing_field(kind, field));
    }
    Ok(())
}

/// Back reference from a response header to the request message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReference {
    pub dialog_id: String,
    pub message_number: u32,
}

/// `HNHBK`: first segment of every message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    /// Total message length in bytes, written with 12 digits.
    pub size: u64,
    pub hbci_version: u32,
    pub dialog_id: String,
    pub message_number: u32,
    pub reference: Option<MessageReference>,
}

impl MessageHeader {
    pub fn new(dialog_id: impl Into<String>, message_number: u32) -> Self {
        MessageHeader {
            size: 0,
            hbci_version: crate::message::HBCI_VERSION,
            dialog_id: dialog_id.into(),
            message_number,
            reference: None,
        }
    }
}

impl SegmentType for MessageHeader {
    const KIND: &'static str = "HNHBK";
    const VERSION: u32 = 3;
    const VERSIONS: &'static [u32] = &[3];
    const ENCODES: bool = true;
    const DECODES: bool = true;

    fn encode(&self, _version: u32) -> Result<Vec<DataGroup>> {
        required(Self::KIND, "dialog id", &self.dialog_id)?;
        let reference = match &self.reference {
            Some(reference) => vec![
                el::text(&reference.dialog_id),
                el::number(reference.message_number),
            ],
            None => vec![],
        };
        Ok(vec![
            vec![el::text(format!("{:012}", self.size))],
            vec![el::number(self.hbci_version)],
            vec![el::text(&self.dialog_id)],
            vec![el::number(self.message_number)],
            reference,
        ])
    }

    fn decode(fields: &Fields<'_>, _version: u32) -> Result<Self> {
        let reference = match fields.optional(4, 0) {
            Some(dialog_id) => Some(MessageReference {
                dialog_id,
                message_number: fields.number(4, 1, "referenced message number")?,
            }),
            None => None,
        };
        Ok(MessageHeader {
            size: fields.number(0, 0, "message size")?,
            hbci_version: fields.number(1, 0, "HBCI version")?,
            dialog_id: fields.required(2, 0, "dialog id")?,
            message_number: fields.number(3, 0, "message number")?,
            reference,
        })
    }
}

/// `HNHBS`: last segment of every message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTrailer {
    pub message_number: u32,
}

impl SegmentType for MessageTrailer {
    const KIND: &'static str = "HNHBS";
    const VERSION: u32 = 1;
    const VERSIONS: &'static [u32] = &[1];
    const ENCODES: bool = true;
    const DECODES: bool = true;

    fn encode(&self, _version: u32) -> Result<Vec<DataGroup>> {
        Ok(vec![vec![el::number(self.message_number)]])
    }

    fn decode(fields: &Fields<'_>, _version: u32) -> Result<Self> {
        Ok(MessageTrailer {
            message_number: fields.number(0, 0, "message number")?,
        })
    }
}

/// `HNVSK`: encryption header, segment number 998.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionHeader {
    /// 1 for the customer, 4 for the bank.
    pub role: u32,
    pub system_id: String,
    pub blz: String,
    pub user_id: String,
    pub timestamp: NaiveDateTime,
}

impl SegmentType for EncryptionHeader {
    const KIND: &'static str = "HNVSK";
    const VERSION: u32 = 3;
    const VERSIONS: &'static [u32] = &[3];
    const ENCODES: bool = true;
    const DECODES: bool = true;

    fn encode(&self, _version: u32) -> Result<Vec<DataGroup>> {
        required(Self::KIND, "system id", &self.system_id)?;
        required(Self::KIND, "bank code", &self.blz)?;
        required(Self::KIND, "user id", &self.user_id)?;
        Ok(vec![
            vec![el::text(SECURITY_PROFILE), el::text("1")],
            vec![el::text("998")],
            vec![el::number(self.role)],
            vec![el::text("1"), el::empty(), el::text(&self.system_id)],
            vec![
                el::text("1"),
                el::date(self.timestamp.date()),
                el::time(self.timestamp.time()),
            ],
            vec![
                el::text("2"),
                el::text("2"),
                el::text("13"),
                el::binary("00000000"),
                el::text("5"),
                el::text("1"),
            ],
            vec![
                el::text(COUNTRY_CODE),
                el::text(&self.blz),
                el::text(&self.user_id),
                el::text("V"),
                el::text("0"),
                el::text("0"),
            ],
            vec![el::text("0")],
        ])
    }

    fn decode(fields: &Fields<'_>, _version: u32) -> Result<Self> {
        Ok(EncryptionHeader {
            role: fields.number(2, 0, "role")?,
            system_id: fields.text(3, 2).to_string(),
            blz: fields.text(6, 1).to_string(),
            user_id: fields.text(6, 2).to_string(),
            timestamp: timestamp(fields, 4)?,
        })
    }
}

/// `HNVSD`: encrypted data, segment number 999.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    /// Wire text of the enclosed segments.
    pub payload: String,
}

impl SegmentType for EncryptedData {
    const KIND: &'static str = "HNVSD";
    const VERSION: u32 = 1;
    const VERSIONS: &'static [u32] = &[1];
    const ENCODES: bool = true;
    const DECODES: bool = true;

    fn encode(&self, _version: u32) -> Result<Vec<DataGroup>> {
        Ok(vec![vec![el::binary(self.payload.clone())]])
    }

    fn decode(fields: &Fields<'_>, _version: u32) -> Result<Self> {
        Ok(EncryptedData {
            payload: fields.text(0, 0).to_string(),
        })
    }
}

/// `HNSHK`: signature header, always segment number 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub security_function: String,
    /// Control reference repeated in the matching `HNSHA`.
    pub security_reference: String,
    pub system_id: String,
    pub blz: String,
    pub user_id: String,
    pub timestamp: NaiveDateTime,
}

impl SegmentType for SignatureHeader {
    const KIND: &'static str = "HNSHK";
    const VERSION: u32 = 4;
    const VERSIONS: &'static [u32] = &[4];
    const ENCODES: bool = true;
    const DECODES: bool = true;

    fn encode(&self, _version: u32) -> Result<Vec<DataGroup>> {
        required(Self::KIND, "security function", &self.security_function)?;
        required(Self::KIND, "security reference", &self.security_reference)?;
        required(Self::KIND, "system id", &self.system_id)?;
        required(Self::KIND, "bank code", &self.blz)?;
        required(Self::KIND, "user id", &self.user_id)?;
        Ok(vec![
            vec![el::text(SECURITY_PROFILE), el::text("1")],
            vec![el::text(&self.security_function)],
            vec![el::text(&self.security_reference)],
            vec![el::text("1")],
            vec![el::text("1")],
            vec![el::text("1"), el::empty(), el::text(&self.system_id)],
            vec![el::text("1")],
            vec![
                el::text("1"),
                el::date(self.timestamp.date()),
                el::time(self.timestamp.time()),
            ],
            vec![el::text("1"), el::text("999"), el::text("1")],
            vec![el::text("6"), el::text("10"), el::text("16")],
            vec![
                el::text(COUNTRY_CODE),
                el::text(&self.blz),
                el::text(&self.user_id),
                el::text("S"),
                el::text("0"),
                el::text("0"),
            ],
        ])
    }

    fn decode(fields: &Fields<'_>, _version: u32) -> Result<Self> {
        Ok(SignatureHeader {
            security_function: fields.required(1, 0, "security function")?,
            security_reference: fields.required(2, 0, "security reference")?,
            system_id: fields.text(5, 2).to_string(),
            blz: fields.text(10, 1).to_string(),
            user_id: fields.text(10, 2).to_string(),
            timestamp: timestamp(fields, 7)?,
        })
    }
}

/// `HNSHA`: signature trailer carrying the PIN. Send only.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureTrailer {
    pub security_reference: String,
    pub pin: Pin,
    pub tan: Option<String>,
}

impl SegmentType for SignatureTrailer {
    const KIND: &'static str = "HNSHA";
    const VERSION: u32 = 2;
    const VERSIONS: &'static [u32] = &[2];
    const ENCODES: bool = true;

    fn encode(&self, _version: u32) -> Result<Vec<DataGroup>> {
        required(Self::KIND, "security reference", &self.security_reference)?;
        required(Self::KIND, "pin", self.pin.expose())?;
        let mut credentials = vec![el::text(self.pin.expose())];
        if let Some(tan) = &self.tan {
            credentials.push(el::text(tan));
        }
        Ok(vec![
            vec![el::text(&self.security_reference)],
            vec![],
            credentials,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::{decode_segment, encode_segment, Segment};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 15)
            .unwrap()
            .and_hms_opt(12, 30, 5)
            .unwrap()
    }

    #[test]
    fn test_message_header_wire_form() {
        let mut header = MessageHeader::new("0", 1);
        header.size = 170;
        let wire = encode_segment(&Segment::from(header), 1).unwrap();
        assert_eq!(wire, "HNHBK:1:3+000000000170+300+0+1'");
    }

    #[test]
    fn test_message_header_round_trip() {
        let header = MessageHeader {
            size: 1234,
            hbci_version: 300,
            dialog_id: "dialog+1:2".into(),
            message_number: 7,
            reference: Some(MessageReference {
                dialog_id: "dialog+1:2".into(),
                message_number: 7,
            }),
        };
        let wire = encode_segment(&Segment::from(header.clone()), 1).unwrap();
        let decoded = decode_segment(&wire).unwrap();
        assert_eq!(decoded.typed::<MessageHeader>(), Some(&header));
    }

    #[test]
    fn test_encryption_header_round_trip() {
        let header = EncryptionHeader {
            role: 1,
            system_id: "ABC?123".into(),
            blz: "10020030".into(),
            user_id: "max'mustermann".into(),
            timestamp: noon(),
        };
        let wire = encode_segment(&Segment::from(header.clone()), 998).unwrap();
        assert!(wire.contains("+2:2:13:@8@00000000:5:1+"));
        let decoded = decode_segment(&wire).unwrap();
        assert_eq!(decoded.number(), 998);
        assert_eq!(decoded.typed::<EncryptionHeader>(), Some(&header));
    }

    #[test]
    fn test_signature_header_round_trip() {
        let header = SignatureHeader {
            security_function: SINGLE_STEP_FUNCTION.into(),
            security_reference: "4711".into(),
            system_id: "0".into(),
            blz: "10020030".into(),
            user_id: "test1".into(),
            timestamp: noon(),
        };
        let wire = encode_segment(&Segment::from(header.clone()), 2).unwrap();
        assert_eq!(
            wire,
            "HNSHK:2:4+PIN:1+999+4711+1+1+1::0+1+1:20200115:123005+1:999:1+6:10:16+280:10020030:test1:S:0:0'"
        );
        let decoded = decode_segment(&wire).unwrap();
        assert_eq!(decoded.typed::<SignatureHeader>(), Some(&header));
    }

    #[test]
    fn test_signature_trailer_escapes_pin() {
        let trailer = SignatureTrailer {
            security_reference: "4711".into(),
            pin: Pin::new("se+cr:et"),
            tan: None,
        };
        let wire = encode_segment(&Segment::from(trailer), 5).unwrap();
        assert_eq!(wire, "HNSHA:5:2+4711++se?+cr?:et'");
    }

    #[test]
    fn test_signature_trailer_requires_pin() {
        let trailer = SignatureTrailer {
            security_reference: "4711".into(),
            pin: Pin::new(""),
            tan: None,
        };
        let result = encode_segment(&Segment::from(trailer), 5);
        assert!(matches!(result, Err(Error::MissingField { ref field, .. }) if field == "pin"));
    }

    #[test]
    fn test_encrypted_data_round_trip() {
        let data = EncryptedData {
            payload: "HNSHK:2:4+PIN:1'HKSPA:3:1'".into(),
        };
        let wire = encode_segment(&Segment::from(data.clone()), 999).unwrap();
        assert_eq!(wire, "HNVSD:999:1+@26@HNSHK:2:4+PIN:1'HKSPA:3:1''");
        assert_eq!(decode_segment(&wire).unwrap().typed::<EncryptedData>(), Some(&data));
    }

    #[test]
    fn test_signature_header_requires_security_function() {
        let header = SignatureHeader {
            security_function: String::new(),
            security_reference: "4711".into(),
            system_id: "0".into(),
            blz: "10020030".into(),
            user_id: "test1".into(),
            timestamp: noon(),
        };
        let result = encode_segment(&Segment::from(header), 2);
        assert!(matches!(
            result,
            Err(Error::MissingField { ref field, .. }) if field == "security function"
        ));
    }

    fn field() -> impl Strategy<Value = String> {
        prop_oneof![
            "[?+:'@a-zA-Z0-9 äöü]{1,12}",
            any::<String>().prop_filter("non-empty", |value| !value.is_empty()),
        ]
    }

    fn moment() -> impl Strategy<Value = NaiveDateTime> {
        (1990i32..2100, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60).prop_map(
            |(year, month, day, hour, minute, second)| {
                NaiveDate::from_ymd_opt(year, month, day)
                    .unwrap()
                    .and_hms_opt(hour, minute, second)
                    .unwrap()
            },
        )
    }

    fn round_trip<T: SegmentType + Clone>(value: &T, number: u32) -> Option<T> {
        let wire = encode_segment(&Segment::from(value.clone()), number).unwrap();
        let decoded = decode_segment(&wire).unwrap();
        decoded.typed::<T>().cloned()
    }

    proptest! {
        #[test]
        fn prop_message_header_round_trip(
            size in 0u64..1_000_000_000_000,
            hbci_version in any::<u32>(),
            dialog_id in field(),
            message_number in any::<u32>(),
            reference in proptest::option::of((field(), any::<u32>())),
        ) {
            let header = MessageHeader {
                size,
                hbci_version,
                dialog_id,
                message_number,
                reference: reference.map(|(dialog_id, message_number)| MessageReference {
                    dialog_id,
                    message_number,
                }),
            };
            prop_assert_eq!(round_trip(&header, 1), Some(header));
        }

        #[test]
        fn prop_message_trailer_round_trip(message_number in any::<u32>(), number in 1u32..1000) {
            let trailer = MessageTrailer { message_number };
            prop_assert_eq!(round_trip(&trailer, number), Some(trailer));
        }

        #[test]
        fn prop_encryption_header_round_trip(
            role in any::<u32>(),
            system_id in field(),
            blz in field(),
            user_id in field(),
            timestamp in moment(),
        ) {
            let header = EncryptionHeader { role, system_id, blz, user_id, timestamp };
            prop_assert_eq!(round_trip(&header, 998), Some(header));
        }

        #[test]
        fn prop_encrypted_data_round_trip(payload in any::<String>()) {
            let data = EncryptedData { payload };
            prop_assert_eq!(round_trip(&data, 999), Some(data));
        }

        #[test]
        fn prop_signature_header_round_trip(
            security_function in field(),
            security_reference in field(),
            system_id in field(),
            blz in field(),
            user_id in field(),
            timestamp in moment(),
        ) {
            let header = SignatureHeader {
                security_function,
                security_reference,
                system_id,
                blz,
                user_id,
                timestamp,
            };
            prop_assert_eq!(round_trip(&header, 2), Some(header));
        }
    }
}
