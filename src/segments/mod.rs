//! Typed FinTS segments.
//!
//! Every modelled segment kind is a struct implementing [`SegmentType`]. The
//! struct declares its kind tag, the versions it can be written in and
//! whether the client encodes it, decodes it, or both. Kinds are dispatched
//! through a static registry, so decoding a message never needs to know the
//! concrete types up front and unknown kinds fall back to [`SegmentBody::Raw`].

use chrono::{NaiveDate, NaiveTime};
use std::str::FromStr;

use crate::error::{Direction, Error, Result};
use crate::wire::{self, DataElement, DataGroup};

pub mod accounts;
pub mod envelope;
pub mod identification;
pub mod returns;
pub mod statements;

pub use accounts::{SepaAccounts, SepaAccountsRequest};
pub use envelope::{
    EncryptedData, EncryptionHeader, MessageHeader, MessageTrailer, SignatureHeader,
    SignatureTrailer,
};
pub use identification::{
    BankParameters, DialogEnd, Identification, ProcessingPreparation, Synchronization,
    SynchronizationResponse,
};
pub use returns::{GlobalReturns, ReturnValue, SegmentReturns};
pub use statements::{StatementRequest, StatementResponse};

/// Date format of FinTS date fields.
pub const DATE_FORMAT: &str = "%Y%m%d";
/// Time format of FinTS time fields.
pub const TIME_FORMAT: &str = "%H%M%S";

/// Conversion between a typed segment struct and [`SegmentBody`].
pub trait BodyVariant: Sized {
    fn from_body(body: &SegmentBody) -> Option<&Self>;
    fn into_body(self) -> SegmentBody;
}

/// Contract shared by all typed segments.
pub trait SegmentType: BodyVariant {
    /// Kind tag, e.g. `HKSPA`.
    const KIND: &'static str;
    /// Version written when nothing else was negotiated.
    const VERSION: u32;
    /// Versions this client can encode.
    const VERSIONS: &'static [u32];
    const ENCODES: bool = false;
    const DECODES: bool = false;

    /// Data element groups following the segment header.
    fn encode(&self, _version: u32) -> Result<Vec<DataGroup>> {
        Err(Error::unsupported(Self::KIND, Direction::Encode))
    }

    fn decode(_fields: &Fields<'_>, _version: u32) -> Result<Self> {
        Err(Error::unsupported(Self::KIND, Direction::Decode))
    }
}

/// Registry entry for one segment kind.
pub struct SegmentCodec {
    pub kind: &'static str,
    pub version: u32,
    pub versions: &'static [u32],
    pub encodes: bool,
    pub decodes: bool,
    decode: fn(&Fields<'_>, u32) -> Result<SegmentBody>,
}

fn decode_body<T: SegmentType>(fields: &Fields<'_>, version: u32) -> Result<SegmentBody> {
    T::decode(fields, version).map(BodyVariant::into_body)
}

fn encode_body<T: SegmentType>(segment: &T, version: u32) -> Result<Vec<DataGroup>> {
    if !T::ENCODES {
        return Err(Error::unsupported(T::KIND, Direction::Encode));
    }
    if !T::VERSIONS.contains(&version) {
        return Err(Error::UnsupportedVersion {
            kind: T::KIND.to_string(),
            version,
        });
    }
    segment.encode(version)
}

macro_rules! segment_kinds {
    ($($variant:ident),* $(,)?) => {
        /// Typed payload of a segment.
        #[derive(Debug, Clone, PartialEq)]
        pub enum SegmentBody {
            $($variant($variant),)*
            /// Segment kept verbatim: an unknown kind, or a known kind the
            /// client never decodes.
            Raw(Vec<DataGroup>),
        }

        impl SegmentBody {
            /// Kind tag of a typed body, `None` for raw segments.
            pub fn kind(&self) -> Option<&'static str> {
                match self {
                    $(SegmentBody::$variant(_) => Some(<$variant as SegmentType>::KIND),)*
                    SegmentBody::Raw(_) => None,
                }
            }

            fn default_version(&self) -> Option<u32> {
                match self {
                    $(SegmentBody::$variant(_) => Some(<$variant as SegmentType>::VERSION),)*
                    SegmentBody::Raw(_) => None,
                }
            }

            fn encode(&self, version: u32) -> Result<Vec<DataGroup>> {
                match self {
                    $(SegmentBody::$variant(inner) => encode_body(inner, version),)*
                    SegmentBody::Raw(groups) => Ok(groups.clone()),
                }
            }
        }

        $(
            impl BodyVariant for $variant {
                fn from_body(body: &SegmentBody) -> Option<&Self> {
                    match body {
                        SegmentBody::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }

                fn into_body(self) -> SegmentBody {
                    SegmentBody::$variant(self)
                }
            }

            impl From<$variant> for SegmentBody {
                fn from(value: $variant) -> Self {
                    SegmentBody::$variant(value)
                }
            }
        )*

        static CODECS: &[SegmentCodec] = &[
            $(SegmentCodec {
                kind: <$variant as SegmentType>::KIND,
                version: <$variant as SegmentType>::VERSION,
                versions: <$variant as SegmentType>::VERSIONS,
                encodes: <$variant as SegmentType>::ENCODES,
                decodes: <$variant as SegmentType>::DECODES,
                decode: decode_body::<$variant>,
            },)*
        ];
    };
}

segment_kinds!(
    MessageHeader,
    MessageTrailer,
    EncryptionHeader,
    EncryptedData,
    SignatureHeader,
    SignatureTrailer,
    Identification,
    ProcessingPreparation,
    Synchronization,
    SynchronizationResponse,
    DialogEnd,
    BankParameters,
    SepaAccountsRequest,
    SepaAccounts,
    StatementRequest,
    StatementResponse,
    GlobalReturns,
    SegmentReturns,
);

/// Every registered segment kind.
pub fn codecs() -> &'static [SegmentCodec] {
    CODECS
}

/// Look up the registry entry for a kind tag.
pub fn codec(kind: &str) -> Option<&'static SegmentCodec> {
    CODECS.iter().find(|codec| codec.kind == kind)
}

/// Segment header: `KIND:number:version[:reference]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHeader {
    pub kind: String,
    pub number: u32,
    pub version: u32,
    /// Number of the request segment a response segment answers.
    pub reference: Option<u32>,
}

impl SegmentHeader {
    fn to_group(&self, number: u32) -> DataGroup {
        let mut group = vec![
            DataElement::Text(self.kind.clone()),
            DataElement::Text(number.to_string()),
            DataElement::Text(self.version.to_string()),
        ];
        if let Some(reference) = self.reference {
            group.push(DataElement::Text(reference.to_string()));
        }
        group
    }

    fn from_group(group: &[DataElement]) -> Result<Self> {
        let kind = group
            .first()
            .map(DataElement::as_str)
            .filter(|kind| !kind.is_empty())
            .ok_or_else(|| Error::malformed(0, "segment without kind"))?;

        let number_at = |index: usize, name: &str| -> Result<u32> {
            group
                .get(index)
                .map(DataElement::as_str)
                .unwrap_or("")
                .parse()
                .map_err(|_| Error::unparseable(kind, format!("invalid segment {}", name)))
        };

        let reference = match group.get(3).map(DataElement::as_str) {
            Some(value) if !value.is_empty() => Some(
                value
                    .parse()
                    .map_err(|_| Error::unparseable(kind, "invalid reference segment number"))?,
            ),
            _ => None,
        };

        Ok(SegmentHeader {
            kind: kind.to_string(),
            number: number_at(1, "number")?,
            version: number_at(2, "version")?,
            reference,
        })
    }
}

/// One protocol segment: header plus typed or raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub header: SegmentHeader,
    pub body: SegmentBody,
}

impl<T: SegmentType> From<T> for Segment {
    fn from(value: T) -> Self {
        Segment::new(value.into_body())
    }
}

impl Segment {
    /// Create an unnumbered segment from a typed body. Raw bodies have no
    /// kind of their own, use [`Segment::raw`] for them.
    pub fn new(body: SegmentBody) -> Self {
        Segment {
            header: SegmentHeader {
                kind: body.kind().unwrap_or_default().to_string(),
                number: 0,
                version: body.default_version().unwrap_or(1),
                reference: None,
            },
            body,
        }
    }

    /// Segment of an arbitrary kind with verbatim groups.
    pub fn raw(kind: &str, number: u32, version: u32, groups: Vec<DataGroup>) -> Self {
        Segment {
            header: SegmentHeader {
                kind: kind.to_string(),
                number,
                version,
                reference: None,
            },
            body: SegmentBody::Raw(groups),
        }
    }

    pub fn with_number(mut self, number: u32) -> Self {
        self.header.number = number;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.header.version = version;
        self
    }

    pub fn kind(&self) -> &str {
        &self.header.kind
    }

    pub fn number(&self) -> u32 {
        self.header.number
    }

    pub fn version(&self) -> u32 {
        self.header.version
    }

    pub fn reference(&self) -> Option<u32> {
        self.header.reference
    }

    /// Typed view of the payload.
    pub fn typed<T: SegmentType>(&self) -> Option<&T> {
        T::from_body(&self.body)
    }

    /// Groups of a raw segment.
    pub fn raw_groups(&self) -> Option<&[DataGroup]> {
        match &self.body {
            SegmentBody::Raw(groups) => Some(groups),
            _ => None,
        }
    }

    /// Encode with the number already in the header.
    pub fn encode(&self) -> Result<String> {
        encode_segment(self, self.header.number)
    }

    /// Build a segment from tokenized groups. Known kinds with a decoder are
    /// decoded, everything else is kept raw.
    pub(crate) fn from_groups(mut groups: Vec<DataGroup>) -> Result<Self> {
        if groups.is_empty() {
            return Err(Error::malformed(0, "empty segment"));
        }
        let header = SegmentHeader::from_group(&groups[0])?;
        let payload = groups.split_off(1);

        let body = match codec(&header.kind) {
            Some(codec) if codec.decodes => {
                let fields = Fields::new(codec.kind, &payload);
                (codec.decode)(&fields, header.version)?
            }
            _ => SegmentBody::Raw(payload),
        };

        Ok(Segment { header, body })
    }
}

/// Encode `segment` as wire text, numbered `number`.
pub fn encode_segment(segment: &Segment, number: u32) -> Result<String> {
    let mut groups = vec![segment.header.to_group(number)];
    groups.extend(segment.body.encode(segment.header.version)?);
    Ok(wire::encode_groups(&groups))
}

/// Decode wire text holding exactly one segment.
///
/// Kinds the client only ever sends fail with
/// [`Error::UnsupportedDirection`]; unknown kinds decode to a raw segment.
pub fn decode_segment(text: &str) -> Result<Segment> {
    let mut segments = wire::split_segments(text)?;
    if segments.len() != 1 {
        return Err(Error::malformed(
            0,
            format!("expected one segment, found {}", segments.len()),
        ));
    }
    let groups = segments.remove(0);
    let kind = groups
        .first()
        .and_then(|header| header.first())
        .map(|kind| kind.as_str().to_string())
        .unwrap_or_default();

    if let Some(codec) = codec(&kind) {
        if !codec.decodes {
            return Err(Error::unsupported(&kind, Direction::Decode));
        }
    }
    Segment::from_groups(groups)
}

/// Read access to the data element groups of a segment, header excluded.
pub struct Fields<'a> {
    kind: &'a str,
    groups: &'a [DataGroup],
}

impl<'a> Fields<'a> {
    pub fn new(kind: &'a str, groups: &'a [DataGroup]) -> Self {
        Fields { kind, groups }
    }

    pub fn kind(&self) -> &'a str {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &'a [DataGroup] {
        self.groups
    }

    /// Elements of group `group`, empty when the group is absent.
    pub fn group(&self, group: usize) -> &'a [DataElement] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Element value, empty when absent.
    pub fn text(&self, group: usize, element: usize) -> &'a str {
        self.group(group)
            .get(element)
            .map(DataElement::as_str)
            .unwrap_or("")
    }

    pub fn optional(&self, group: usize, element: usize) -> Option<String> {
        non_empty(self.text(group, element))
    }

    pub fn required(&self, group: usize, element: usize, field: &str) -> Result<String> {
        self.optional(group, element)
            .ok_or_else(|| self.error(format!("missing {}", field)))
    }

    pub fn number<T: FromStr>(&self, group: usize, element: usize, field: &str) -> Result<T> {
        self.optional_number(group, element, field)?
            .ok_or_else(|| self.error(format!("missing {}", field)))
    }

    pub fn optional_number<T: FromStr>(
        &self,
        group: usize,
        element: usize,
        field: &str,
    ) -> Result<Option<T>> {
        parse_number(self.kind, self.text(group, element), field)
    }

    pub fn date(&self, group: usize, element: usize, field: &str) -> Result<Option<NaiveDate>> {
        parse_date(self.kind, self.text(group, element), field)
    }

    pub fn time(&self, group: usize, element: usize, field: &str) -> Result<Option<NaiveTime>> {
        let value = self.text(group, element);
        if value.is_empty() {
            return Ok(None);
        }
        if value.len() != 6 {
            return Err(self.error(format!("{} must have 6 digits", field)));
        }
        NaiveTime::parse_from_str(value, TIME_FORMAT)
            .map(Some)
            .map_err(|_| self.error(format!("invalid {} {}", field, value)))
    }

    pub fn flag(&self, group: usize, element: usize, field: &str) -> Result<Option<bool>> {
        parse_flag(self.kind, self.text(group, element), field)
    }

    pub fn error(&self, reason: impl Into<String>) -> Error {
        Error::unparseable(self.kind, reason)
    }
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub(crate) fn parse_number<T: FromStr>(kind: &str, value: &str, field: &str) -> Result<Option<T>> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| Error::unparseable(kind, format!("invalid {} {}", field, value)))
}

pub(crate) fn parse_date(kind: &str, value: &str, field: &str) -> Result<Option<NaiveDate>> {
    if value.is_empty() {
        return Ok(None);
    }
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::unparseable(kind, format!("{} must have 8 digits", field)));
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(Some)
        .map_err(|_| Error::unparseable(kind, format!("invalid {} {}", field, value)))
}

pub(crate) fn parse_flag(kind: &str, value: &str, field: &str) -> Result<Option<bool>> {
    match value {
        "" => Ok(None),
        "J" => Ok(Some(true)),
        "N" => Ok(Some(false)),
        other => Err(Error::unparseable(kind, format!("invalid {} flag {}", field, other))),
    }
}

/// Element builders used by the segment encoders.
pub(crate) mod elements {
    use chrono::{NaiveDate, NaiveTime};
    use std::fmt::Display;

    use super::{DATE_FORMAT, TIME_FORMAT};
    use crate::wire::DataElement;

    pub fn text(value: impl AsRef<str>) -> DataElement {
        DataElement::Text(value.as_ref().to_string())
    }

    pub fn optional(value: Option<&String>) -> DataElement {
        DataElement::Text(value.cloned().unwrap_or_default())
    }

    pub fn empty() -> DataElement {
        DataElement::Text(String::new())
    }

    pub fn number(value: impl Display) -> DataElement {
        DataElement::Text(value.to_string())
    }

    pub fn date(value: NaiveDate) -> DataElement {
        DataElement::Text(value.format(DATE_FORMAT).to_string())
    }

    pub fn optional_date(value: Option<NaiveDate>) -> DataElement {
        value.map_or_else(empty, date)
    }

    pub fn time(value: NaiveTime) -> DataElement {
        DataElement::Text(value.format(TIME_FORMAT).to_string())
    }

    pub fn flag(value: bool) -> DataElement {
        text(if value { "J" } else { "N" })
    }

    pub fn binary(value: impl Into<String>) -> DataElement {
        DataElement::Binary(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_registry_lookup() {
        let hkkaz = codec("HKKAZ").unwrap();
        assert!(hkkaz.encodes);
        assert!(!hkkaz.decodes);
        assert_eq!(hkkaz.versions, &[5, 6, 7]);

        let hispa = codec("HISPA").unwrap();
        assert!(!hispa.encodes);
        assert!(hispa.decodes);

        assert!(codec("HIUPD").is_none());
    }

    #[test]
    fn test_unknown_kind_decodes_raw() {
        let segment = decode_segment("HIUPD:6:6:4+1234567::280:10020030+DE00+1+EUR'").unwrap();
        assert_eq!(segment.kind(), "HIUPD");
        assert_eq!(segment.number(), 6);
        assert_eq!(segment.reference(), Some(4));
        let groups = segment.raw_groups().unwrap();
        assert_eq!(groups.len(), 4);
        assert_eq!(groups[3], vec![DataElement::Text("EUR".into())]);
    }

    #[test]
    fn test_raw_segment_round_trip() {
        let wire = "HIUPD:6:6:4+1234567::280:10020030+DE00+1+EUR'";
        let segment = decode_segment(wire).unwrap();
        assert_eq!(segment.encode().unwrap(), wire);
    }

    #[test]
    fn test_send_only_kind_refuses_decoding() {
        let result = decode_segment("HKEND:3:1+4711'");
        assert!(matches!(
            result,
            Err(Error::UnsupportedDirection { ref kind, direction: Direction::Decode }) if kind == "HKEND"
        ));
    }

    #[test]
    fn test_receive_only_kind_refuses_encoding() {
        let segment = decode_segment("HISYN:4:4:5+sys?+id'").unwrap();
        let result = encode_segment(&segment, 4);
        assert!(matches!(
            result,
            Err(Error::UnsupportedDirection { direction: Direction::Encode, .. })
        ));
    }

    #[test]
    fn test_invalid_header_number() {
        let result = decode_segment("HIRMG:x:2+0010::ok'");
        assert!(matches!(result, Err(Error::Unparseable { .. })));
    }

    #[test]
    fn test_fields_parse_dates_and_flags() {
        let groups = vec![
            vec![DataElement::Text("20200131".into())],
            vec![DataElement::Text("2020013".into())],
            vec![DataElement::Text("J".into()), DataElement::Text("X".into())],
        ];
        let fields = Fields::new("HKKAZ", &groups);
        assert_eq!(
            fields.date(0, 0, "end date").unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 31)
        );
        assert!(fields.date(1, 0, "start date").is_err());
        assert_eq!(fields.flag(2, 0, "all accounts").unwrap(), Some(true));
        assert!(fields.flag(2, 1, "all accounts").is_err());
        assert_eq!(fields.date(5, 0, "missing").unwrap(), None);
    }
}
