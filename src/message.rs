//! Message codec: frames segments into a complete FinTS message and splits
//! a received message back into segments.

use crate::error::{Error, Result};
use crate::segments::{
    encode_segment, EncryptedData, EncryptionHeader, MessageHeader, Segment, SegmentType,
    SignatureHeader, SignatureTrailer,
};
use crate::wire;

/// FinTS 3.0.
pub const HBCI_VERSION: u32 = 300;
/// `HNHBK` is always the first segment.
pub const HEADER_NUMBER: u32 = 1;
/// `HNSHK` directly follows the header.
pub const SIGNATURE_HEADER_NUMBER: u32 = 2;
pub const ENCRYPTION_HEADER_NUMBER: u32 = 998;
pub const ENCRYPTED_DATA_NUMBER: u32 = 999;

fn encode_all(segments: &[Segment]) -> Result<String> {
    segments.iter().map(Segment::encode).collect()
}

fn encode_body(segments: &[Segment]) -> Result<String> {
    let start = segments
        .iter()
        .position(|segment| segment.kind() == SignatureHeader::KIND);
    let end = segments
        .iter()
        .rposition(|segment| segment.kind() == SignatureTrailer::KIND);

    match (start, end) {
        (None, None) => encode_all(segments),
        (Some(start), Some(end)) if start < end => {
            let signature = segments[start]
                .typed::<SignatureHeader>()
                .ok_or_else(|| Error::malformed(0, "signature header without typed payload"))?;

            let encryption = EncryptionHeader {
                role: 1,
                system_id: signature.system_id.clone(),
                blz: signature.blz.clone(),
                user_id: signature.user_id.clone(),
                timestamp: signature.timestamp,
            };
            let data = EncryptedData {
                payload: encode_all(&segments[start..=end])?,
            };

            let mut body = encode_all(&segments[..start])?;
            body.push_str(&encode_segment(&encryption.into(), ENCRYPTION_HEADER_NUMBER)?);
            body.push_str(&encode_segment(&data.into(), ENCRYPTED_DATA_NUMBER)?);
            body.push_str(&encode_all(&segments[end + 1..])?);
            Ok(body)
        }
        _ => Err(Error::malformed(
            0,
            "signature header and trailer must enclose the signed segments",
        )),
    }
}

/// Encode a message. `segments` holds everything after `HNHBK`, numbered,
/// ending with `HNHBS`. A signed range (`HNSHK` … `HNSHA`) is wrapped into
/// the `HNVSK`/`HNVSD` envelope. The header size is computed here.
pub fn encode_message(header: &MessageHeader, segments: &[Segment]) -> Result<String> {
    let body = encode_body(segments)?;

    let mut header = header.clone();
    header.size = 0;
    let header_length = encode_segment(&header.clone().into(), HEADER_NUMBER)?.len();
    header.size = (header_length + body.len()) as u64;

    let mut message = encode_segment(&header.into(), HEADER_NUMBER)?;
    message.push_str(&body);
    Ok(message)
}

/// Decode a message into its segments. The content of `HNVSD` replaces the
/// `HNVSD` segment itself; unknown kinds are kept as raw segments. Only one
/// envelope level is unwrapped, an `HNVSD` inside the payload is malformed.
pub fn decode_message(text: &str) -> Result<Vec<Segment>> {
    let raw = wire::split_segments(text)?;
    if raw.is_empty() {
        return Err(Error::malformed(0, "empty message"));
    }

    let mut segments = Vec::with_capacity(raw.len());
    for groups in raw {
        let segment = Segment::from_groups(groups)?;
        match segment.typed::<EncryptedData>() {
            Some(data) => segments.extend(decode_envelope(&data.payload)?),
            None => segments.push(segment),
        }
    }
    Ok(segments)
}

fn decode_envelope(payload: &str) -> Result<Vec<Segment>> {
    wire::split_segments(payload)?
        .into_iter()
        .map(|groups| {
            let segment = Segment::from_groups(groups)?;
            if segment.kind() == EncryptedData::KIND {
                return Err(Error::malformed(0, "nested encryption envelope"));
            }
            Ok(segment)
        })
        .collect()
}
