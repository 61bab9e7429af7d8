//! Simulated bank server for the integration tests.
//!
//! The bank decodes every request with the crate's own codec, records the
//! segments and answers with an encrypted-envelope message, the way real
//! PIN/TAN servers do.

#![allow(dead_code)]

use async_trait::async_trait;
use fints_client::segments::{MessageHeader, Segment};
use fints_client::{decode_message, ClientConfig, Error, Headers, PinTan, Result, Transport};
use std::sync::Mutex;

pub const BLZ: &str = "10020030";
pub const USER_ID: &str = "test1";
pub const SYSTEM_ID: &str = "SYS1";
pub const DIALOG_ID: &str = "DIA1";
pub const SYNC_DIALOG_ID: &str = "SYNC1";

/// HISPA group of the one account the bank knows.
pub const ACCOUNT: &str = "J:DE02100200300000123456:BANKDEFFXXX:123456::280:10020030";

pub fn auth() -> PinTan {
    let config = ClientConfig::new("https://bank.example/fints", BLZ, USER_ID, "PRODUCT");
    PinTan::new(config, "secret").expect("valid test config")
}

/// Segments of one answer, numbered from 2 on.
struct Answer {
    segments: Vec<String>,
}

impl Answer {
    fn new() -> Self {
        Answer {
            segments: Vec::new(),
        }
    }

    fn push(&mut self, kind: &str, version: u32, reference: Option<u32>, data: &str) {
        let number = self.segments.len() + 2;
        let head = match reference {
            Some(reference) => format!("{}:{}:{}:{}", kind, number, version, reference),
            None => format!("{}:{}:{}", kind, number, version),
        };
        if data.is_empty() {
            self.segments.push(format!("{}'", head));
        } else {
            self.segments.push(format!("{}+{}'", head, data));
        }
    }

    fn finish(self, dialog_id: &str, message_number: u32) -> String {
        let trailer = self.segments.len() + 2;
        let inner = self.segments.concat();
        format!(
            "HNHBK:1:3+000000000000+300+{d}+{m}+{d}:{m}'\
             HNVSK:998:3+PIN:1+998+1+2::{s}+1:20200101:120000+2:2:13:@8@00000000:5:1+280:{b}:{u}:V:0:0+0'\
             HNVSD:999:1+@{len}@{inner}'\
             HNHBS:{t}:1+{m}'",
            d = dialog_id,
            m = message_number,
            s = SYSTEM_ID,
            b = BLZ,
            u = USER_ID,
            len = inner.len(),
            inner = inner,
            t = trailer,
        )
    }
}

pub struct MockBank {
    accounts: Vec<String>,
    pages: Vec<String>,
    extra: Vec<String>,
    requests: Mutex<Vec<Vec<Segment>>>,
    headers: Mutex<Vec<Headers>>,
}

impl MockBank {
    pub fn new() -> Self {
        MockBank {
            accounts: vec![ACCOUNT.to_string()],
            pages: Vec::new(),
            extra: Vec::new(),
            requests: Mutex::new(Vec::new()),
            headers: Mutex::new(Vec::new()),
        }
    }

    /// Statement bodies, one per HKKAZ page.
    pub fn with_pages(mut self, pages: &[&str]) -> Self {
        self.pages = pages.iter().map(|page| page.to_string()).collect();
        self
    }

    /// Segment kind the client does not know, added to every HKSPA answer.
    pub fn with_extra_segment(mut self, segment: &str) -> Self {
        self.extra.push(segment.to_string());
        self
    }

    pub fn requests(&self) -> Vec<Vec<Segment>> {
        self.requests.lock().unwrap().clone()
    }

    /// Header lines of every received message.
    pub fn headers(&self) -> Vec<Headers> {
        self.headers.lock().unwrap().clone()
    }

    /// Request segments of `kind`, in the order they were received.
    pub fn received(&self, kind: &str) -> Vec<Segment> {
        self.requests()
            .into_iter()
            .flatten()
            .filter(|segment| segment.kind() == kind)
            .collect()
    }

    fn answer(&self, request: &[Segment]) -> Result<String> {
        let header = request
            .first()
            .and_then(|segment| segment.typed::<MessageHeader>())
            .ok_or_else(|| Error::Transport("request without HNHBK".into()))?;
        let is_sync = request.iter().any(|segment| segment.kind() == "HKSYN");
        let dialog_id = match header.dialog_id.as_str() {
            "0" if is_sync => SYNC_DIALOG_ID,
            "0" => DIALOG_ID,
            other => other,
        };

        let mut answer = Answer::new();
        answer.push("HIRMG", 2, None, "0010::Nachricht entgegengenommen.");

        for segment in request {
            let number = Some(segment.number());
            match segment.kind() {
                "HKIDN" if !is_sync => {
                    answer.push("HISPAS", 1, number, "1+1+0+J:J:N");
                    answer.push("HISPAS", 3, number, "1+1+0+J:J:N:N");
                    answer.push("HIKAZS", 6, number, "1+1+0+365:J:N");
                    answer.push("HIKAZS", 7, number, "1+1+0+365:J:N");
                    answer.push("HIRMS", 2, number, "3050::UPD nicht mehr aktuell.");
                }
                "HKSYN" => {
                    answer.push("HISYN", 4, number, SYSTEM_ID);
                    answer.push("HIRMS", 2, number, "0020::Auftrag ausgeführt.");
                }
                "HKSPA" => {
                    answer.push("HISPA", 3, number, &self.accounts.join("+"));
                    answer.push("HIRMS", 2, number, "0020::Auftrag ausgeführt.");
                    for extra in &self.extra {
                        answer.push(extra, 1, number, "opaque:data");
                    }
                }
                "HKKAZ" => self.statement_page(segment, &mut answer)?,
                "HKEND" => answer.push("HIRMS", 2, number, "0100::Dialog beendet."),
                _ => {}
            }
        }

        Ok(answer.finish(dialog_id, header.message_number))
    }

    fn statement_page(&self, segment: &Segment, answer: &mut Answer) -> Result<()> {
        let number = Some(segment.number());
        let touchdown = segment
            .raw_groups()
            .and_then(|groups| groups.get(5))
            .and_then(|group| group.first())
            .map(|element| element.as_str().to_string())
            .filter(|token| !token.is_empty());
        let page = match touchdown {
            None => 0,
            Some(token) => token
                .strip_prefix('T')
                .and_then(|index| index.parse::<usize>().ok())
                .ok_or_else(|| Error::Transport(format!("unknown touchdown {}", token)))?,
        };

        match self.pages.get(page) {
            None => answer.push("HIRMS", 2, number, "3010::Keine Umsätze gefunden."),
            Some(body) => {
                answer.push("HIKAZ", 7, number, &format!("@{}@{}", body.len(), body));
                if page + 1 < self.pages.len() {
                    let returns = format!(
                        "0020::Auftrag ausgeführt.+3040::Es liegen weitere Informationen vor.:T{}",
                        page + 1
                    );
                    answer.push("HIRMS", 2, number, &returns);
                } else {
                    answer.push("HIRMS", 2, number, "0020::Auftrag ausgeführt.");
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MockBank {
    async fn send(&self, _url: &str, headers: &Headers, message: &str) -> Result<String> {
        let request = decode_message(message)?;
        let answer = self.answer(&request)?;
        self.requests.lock().unwrap().push(request);
        self.headers.lock().unwrap().push(headers.clone());
        Ok(answer)
    }
}
