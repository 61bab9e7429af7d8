//! Outgoing requests.
//!
//! A [`Request`] holds the business segments of one message. The dialog
//! stamps segment numbers and negotiated versions when the request is
//! serialized, and adds the signature and framing segments around them.

use chrono::{Local, Timelike};
use std::collections::HashMap;

use crate::auth::Credential;
use crate::error::{Error, Result};
use crate::message::{encode_message, SIGNATURE_HEADER_NUMBER};
use crate::segments::envelope::SINGLE_STEP_FUNCTION;
use crate::segments::{
    MessageHeader, MessageTrailer, Segment, SegmentBody, SegmentType, SignatureHeader,
    SignatureTrailer,
};

/// First number handed out to business segments.
pub const FIRST_SEGMENT_NUMBER: u32 = 3;

/// Dialog-wide segment numbering. Numbers are never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentCounter {
    next: u32,
}

impl SegmentCounter {
    pub fn new() -> Self {
        SegmentCounter {
            next: FIRST_SEGMENT_NUMBER,
        }
    }

    /// Number the next segment will get.
    pub fn peek(&self) -> u32 {
        self.next
    }

    pub fn next_number(&mut self) -> u32 {
        let number = self.next;
        self.next += 1;
        number
    }
}

impl Default for SegmentCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Message level values supplied by the dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContext {
    pub dialog_id: String,
    pub message_number: u32,
    pub system_id: String,
    pub blz: String,
    pub user_id: String,
}

/// One request message in preparation.
#[derive(Debug, Clone)]
pub struct Request {
    segments: Vec<Segment>,
    signed: bool,
    credential: Option<Credential>,
    context: Option<MessageContext>,
}

impl Request {
    /// Unsigned request.
    pub fn new(segments: Vec<SegmentBody>) -> Self {
        Request {
            segments: segments.into_iter().map(Segment::new).collect(),
            signed: false,
            credential: None,
            context: None,
        }
    }

    /// Request signed with `credential`. The credential is dropped as soon
    /// as the request has been serialized.
    pub fn signed(segments: Vec<SegmentBody>, credential: Credential) -> Self {
        Request {
            signed: true,
            credential: Some(credential),
            ..Request::new(segments)
        }
    }

    /// Append a prepared segment. Segments of kinds without a typed body
    /// come from [`Segment::raw`], which carries the kind tag.
    pub fn with_segment(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Business segments, numbered once the request has been sent.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// First business segment of `kind`.
    pub fn segment(&self, kind: &str) -> Option<&Segment> {
        self.segments.iter().find(|segment| segment.kind() == kind)
    }

    /// Raw bodies passed to [`Request::new`] have no kind and cannot be
    /// written.
    pub(crate) fn check_segments(&self) -> Result<()> {
        if self.segments.iter().any(|segment| segment.kind().is_empty()) {
            return Err(Error::missing_field("request", "segment kind"));
        }
        Ok(())
    }

    /// Message values the request was last sent with.
    pub fn context(&self) -> Option<&MessageContext> {
        self.context.as_ref()
    }

    /// Stamp and serialize the request. Business segments take numbers from
    /// `counter` in order, then `HNSHA` and `HNHBS` follow. Versions come
    /// from `versions` where the bank's parameters fixed one.
    pub(crate) fn serialize(
        &mut self,
        context: MessageContext,
        counter: &mut SegmentCounter,
        versions: &HashMap<String, u32>,
    ) -> Result<String> {
        self.check_segments()?;
        let credential = if self.signed {
            Some(
                self.credential
                    .take()
                    .ok_or_else(|| Error::missing_field(SignatureTrailer::KIND, "pin"))?,
            )
        } else {
            None
        };

        for segment in &mut self.segments {
            segment.header.number = counter.next_number();
            if let Some(version) = versions.get(segment.kind()) {
                segment.header.version = *version;
            }
        }

        let mut segments = Vec::with_capacity(self.segments.len() + 3);
        match credential {
            Some(credential) => {
                let now = Local::now().naive_local();
                let security_reference = security_reference(now.nanosecond());
                segments.push(
                    Segment::from(SignatureHeader {
                        security_function: SINGLE_STEP_FUNCTION.to_string(),
                        security_reference: security_reference.clone(),
                        system_id: context.system_id.clone(),
                        blz: context.blz.clone(),
                        user_id: context.user_id.clone(),
                        timestamp: now,
                    })
                    .with_number(SIGNATURE_HEADER_NUMBER),
                );
                segments.extend(self.segments.iter().cloned());
                segments.push(
                    Segment::from(SignatureTrailer {
                        security_reference,
                        pin: credential.pin,
                        tan: credential.tan,
                    })
                    .with_number(counter.next_number()),
                );
            }
            None => segments.extend(self.segments.iter().cloned()),
        }
        segments.push(
            Segment::from(MessageTrailer {
                message_number: context.message_number,
            })
            .with_number(counter.next_number()),
        );

        let header = MessageHeader::new(context.dialog_id.clone(), context.message_number);
        let message = encode_message(&header, &segments)?;
        self.context = Some(context);
        Ok(message)
    }
}

fn security_reference(seed: u32) -> String {
    (seed % 9_000_000 + 1_000_000).to_string()
}
