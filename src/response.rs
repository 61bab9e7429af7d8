//! Parsed bank responses.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::message::decode_message;
use crate::request::Request;
use crate::segments::{
    GlobalReturns, MessageHeader, ReturnValue, Segment, SegmentReturns, SegmentType,
    SynchronizationResponse,
};

/// All segments of one received message, the encryption envelope already
/// unwrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    segments: Vec<Segment>,
}

impl Response {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(Response {
            segments: decode_message(text)?,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// First segment of `kind`.
    pub fn find_segment(&self, kind: &str) -> Result<&Segment> {
        self.segments
            .iter()
            .find(|segment| segment.kind() == kind)
            .ok_or_else(|| Error::SegmentNotFound(kind.to_string()))
    }

    /// Every segment of `kind`, in message order.
    pub fn find_segments<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Segment> + 'a {
        self.segments
            .iter()
            .filter(move |segment| segment.kind() == kind)
    }

    /// Typed payload of the first segment of `T`'s kind.
    pub fn find<T: SegmentType>(&self) -> Result<&T> {
        self.find_all::<T>()
            .next()
            .ok_or_else(|| Error::SegmentNotFound(T::KIND.to_string()))
    }

    pub fn find_all<'a, T: SegmentType + 'a>(&'a self) -> impl Iterator<Item = &'a T> + 'a {
        self.segments.iter().filter_map(Segment::typed::<T>)
    }

    /// Segments answering the request segment numbered `number`.
    pub fn answers_to(&self, number: u32) -> impl Iterator<Item = &Segment> + '_ {
        self.segments
            .iter()
            .filter(move |segment| segment.reference() == Some(number))
    }

    /// Dialog id assigned in the message header.
    pub fn dialog_id(&self) -> Option<&str> {
        self.find::<MessageHeader>()
            .ok()
            .map(|header| header.dialog_id.as_str())
    }

    pub fn message_number(&self) -> Option<u32> {
        self.find::<MessageHeader>()
            .ok()
            .map(|header| header.message_number)
    }

    /// System id from `HISYN`.
    pub fn system_id(&self) -> Option<&str> {
        self.find_all::<SynchronizationResponse>()
            .find_map(|sync| sync.system_id.as_deref())
    }

    /// Highest version of `kind` present in this response.
    pub fn segment_max_version(&self, kind: &str) -> Option<u32> {
        self.find_segments(kind).map(Segment::version).max()
    }

    /// Message level values first, then segment level values.
    pub fn return_values(&self) -> impl Iterator<Item = &ReturnValue> + '_ {
        let global = self.find_all::<GlobalReturns>().flat_map(|r| r.values.iter());
        let local = self
            .find_all::<SegmentReturns>()
            .flat_map(|r| r.values.iter());
        global.chain(local)
    }

    pub fn errors(&self) -> Vec<&ReturnValue> {
        self.return_values().filter(|value| value.is_error()).collect()
    }

    pub fn warnings(&self) -> Vec<&ReturnValue> {
        self.return_values()
            .filter(|value| value.is_warning())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.return_values().all(|value| !value.is_error())
    }

    /// Continuation token for the request segment numbered `number`.
    pub fn touchdown_for(&self, number: u32) -> Option<String> {
        self.answers_to(number)
            .filter_map(Segment::typed::<SegmentReturns>)
            .find_map(SegmentReturns::touchdown)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    }

    /// Continuation token for the first `kind` segment of `request`.
    pub fn touchdown(&self, request: &Request, kind: &str) -> Option<String> {
        request
            .segment(kind)
            .and_then(|segment| self.touchdown_for(segment.number()))
    }

    /// Continuation tokens keyed by request segment kind.
    pub fn touchdowns(&self, request: &Request) -> HashMap<String, String> {
        request
            .segments()
            .iter()
            .filter_map(|segment| {
                self.touchdown_for(segment.number())
                    .map(|token| (segment.kind().to_string(), token))
            })
            .collect()
    }
}
