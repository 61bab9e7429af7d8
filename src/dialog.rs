//! Dialog state machine.
//!
//! A dialog is one logical session with the bank:
//!
//! ```text
//! Unsynced --sync--> Synced --init--> Open --send*--> Open --end--> Closed
//! ```
//!
//! Any failed round trip moves the dialog to `Failed`, from which only
//! [`Dialog::end`] is allowed. Message numbers count the messages of the
//! current bank dialog. Segment numbers are handed out across the whole
//! lifetime of the value and never repeat.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::auth::Authenticator;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::request::{MessageContext, Request, SegmentCounter};
use crate::response::Response;
use crate::segments::identification::SyncMode;
use crate::segments::{
    codecs, DialogEnd, Identification, MessageHeader, ProcessingPreparation, SegmentType,
    Synchronization, SynchronizationResponse,
};
use crate::transport::{Headers, Transport};

/// Dialog id used before the bank assigned one.
pub const ANONYMOUS_DIALOG_ID: &str = "0";
/// System id used before synchronisation.
pub const UNSYNCED_SYSTEM_ID: &str = "0";

/// Lifecycle state of a [`Dialog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Unsynced,
    Synced,
    Open,
    Closed,
    /// A round trip failed. Behaves like `Closed` except that `end` is
    /// still accepted and closes locally.
    Failed,
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DialogState::Unsynced => "unsynced",
            DialogState::Synced => "synced",
            DialogState::Open => "open",
            DialogState::Closed => "closed",
            DialogState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// `HKxxx` request kind to the `HIxxxS` kind announcing its parameters.
fn parameter_kind(kind: &str) -> Option<String> {
    kind.strip_prefix("HK")
        .map(|suffix| format!("HI{}S", suffix))
}

pub struct Dialog {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    headers: Headers,
    state: DialogState,
    dialog_id: String,
    system_id: String,
    message_number: u32,
    counter: SegmentCounter,
    versions: HashMap<String, u32>,
}

impl fmt::Debug for Dialog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialog")
            .field("blz", &self.config.blz)
            .field("state", &self.state)
            .field("dialog_id", &self.dialog_id)
            .field("system_id", &self.system_id)
            .field("message_number", &self.message_number)
            .field("next_segment_number", &self.counter.peek())
            .finish()
    }
}

impl Dialog {
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Dialog {
            config,
            transport,
            headers: Headers::new(),
            state: DialogState::Unsynced,
            dialog_id: ANONYMOUS_DIALOG_ID.to_string(),
            system_id: UNSYNCED_SYSTEM_ID.to_string(),
            message_number: 0,
            counter: SegmentCounter::new(),
            versions: HashMap::new(),
        }
    }

    /// Reuse a system id from an earlier synchronisation. The dialog starts
    /// out `Synced`.
    pub fn with_system_id(mut self, system_id: impl Into<String>) -> Self {
        self.system_id = system_id.into();
        self.state = DialogState::Synced;
        self
    }

    /// Header lines passed to the transport with every message.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn dialog_id(&self) -> &str {
        &self.dialog_id
    }

    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    /// Number of the last message sent in the current bank dialog.
    pub fn message_number(&self) -> u32 {
        self.message_number
    }

    pub fn next_segment_number(&self) -> u32 {
        self.counter.peek()
    }

    /// Version of `kind` agreed from the bank's parameter segments.
    pub fn negotiated_version(&self, kind: &str) -> Option<u32> {
        self.versions.get(kind).copied()
    }

    /// Obtain a system id from the bank.
    ///
    /// The bank may open a dialog for the synchronisation itself, which is
    /// closed again right away. Afterwards the dialog is `Synced` and the
    /// message numbering restarts.
    #[instrument(skip_all, fields(blz = %self.config.blz))]
    pub async fn sync(&mut self, auth: &dyn Authenticator) -> Result<()> {
        self.expect_state(DialogState::Unsynced, "sync")?;

        let mut request = auth.create_request(vec![
            self.identification().into(),
            self.preparation().into(),
            Synchronization {
                mode: SyncMode::NewSystemId,
            }
            .into(),
        ]);
        let response = self.exchange(&mut request).await?;
        self.absorb_parameters(&response);

        let system_id = match response.system_id() {
            Some(system_id) => system_id.to_string(),
            None => {
                self.state = DialogState::Failed;
                return Err(Error::SegmentNotFound(SynchronizationResponse::KIND.to_string()));
            }
        };
        self.system_id = system_id;

        if let Some(dialog_id) = response.dialog_id().filter(|id| *id != ANONYMOUS_DIALOG_ID) {
            self.dialog_id = dialog_id.to_string();
            let mut end = auth.create_request(vec![DialogEnd {
                dialog_id: self.dialog_id.clone(),
            }
            .into()]);
            self.exchange(&mut end).await?;
        }

        self.dialog_id = ANONYMOUS_DIALOG_ID.to_string();
        self.message_number = 0;
        self.state = DialogState::Synced;
        info!(system_id = %self.system_id, "synchronised");
        Ok(())
    }

    /// Open the bank dialog and record the dialog id the bank assigned.
    #[instrument(skip_all, fields(blz = %self.config.blz))]
    pub async fn init(&mut self, auth: &dyn Authenticator) -> Result<()> {
        self.expect_state(DialogState::Synced, "init")?;

        let mut request =
            auth.create_request(vec![self.identification().into(), self.preparation().into()]);
        let response = self.exchange(&mut request).await?;
        self.absorb_parameters(&response);

        match response.dialog_id().filter(|id| *id != ANONYMOUS_DIALOG_ID) {
            Some(dialog_id) => self.dialog_id = dialog_id.to_string(),
            None => {
                self.state = DialogState::Failed;
                return Err(Error::unparseable(
                    MessageHeader::KIND,
                    "bank did not assign a dialog id",
                ));
            }
        }

        self.state = DialogState::Open;
        info!(dialog_id = %self.dialog_id, "dialog opened");
        Ok(())
    }

    /// Send a business request within the open dialog.
    #[instrument(skip_all, fields(dialog_id = %self.dialog_id))]
    pub async fn send(&mut self, request: &mut Request) -> Result<Response> {
        self.expect_state(DialogState::Open, "send")?;
        request.check_segments()?;
        self.exchange(request).await
    }

    /// Close the dialog. A failed dialog is closed locally without a round
    /// trip.
    #[instrument(skip_all, fields(dialog_id = %self.dialog_id))]
    pub async fn end(&mut self, auth: &dyn Authenticator) -> Result<()> {
        match self.state {
            DialogState::Open => {}
            DialogState::Failed => {
                warn!("closing failed dialog without notifying the bank");
                self.state = DialogState::Closed;
                return Ok(());
            }
            state => {
                return Err(Error::InvalidDialogState {
                    operation: "end",
                    state,
                })
            }
        }

        let mut request = auth.create_request(vec![DialogEnd {
            dialog_id: self.dialog_id.clone(),
        }
        .into()]);
        let result = self.exchange(&mut request).await;
        self.state = DialogState::Closed;
        result?;
        info!("dialog closed");
        Ok(())
    }

    fn expect_state(&self, expected: DialogState, operation: &'static str) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidDialogState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    fn identification(&self) -> Identification {
        Identification {
            blz: self.config.blz.clone(),
            user_id: self.config.user_id.clone(),
            system_id: self.system_id.clone(),
            system_id_required: true,
        }
    }

    fn preparation(&self) -> ProcessingPreparation {
        ProcessingPreparation {
            bpd_version: 0,
            upd_version: 0,
            language: self.config.language,
            product_id: self.config.product_id.clone(),
            product_version: self.config.product_version.clone(),
        }
    }

    /// One round trip. The dialog is `Failed` while the round trip is in
    /// flight, so a failure or a dropped future leaves it unusable. The
    /// previous state comes back only once the answer was accepted.
    async fn exchange(&mut self, request: &mut Request) -> Result<Response> {
        let previous = std::mem::replace(&mut self.state, DialogState::Failed);
        match self.round_trip(request).await {
            Ok(response) => {
                self.state = previous;
                Ok(response)
            }
            Err(error) => {
                warn!(%error, "round trip failed");
                Err(error)
            }
        }
    }

    async fn round_trip(&mut self, request: &mut Request) -> Result<Response> {
        self.message_number += 1;
        let context = MessageContext {
            dialog_id: self.dialog_id.clone(),
            message_number: self.message_number,
            system_id: self.system_id.clone(),
            blz: self.config.blz.clone(),
            user_id: self.config.user_id.clone(),
        };
        let message = request.serialize(context, &mut self.counter, &self.versions)?;
        debug!(
            message_number = self.message_number,
            bytes = message.len(),
            "sending message"
        );

        let answer = self
            .transport
            .send(&self.config.url, &self.headers, &message)
            .await?;
        let response = Response::parse(&answer)?;
        debug!(segments = response.segments().len(), "received response");

        for value in response.warnings() {
            debug!(code = %value.code, text = %value.text, "bank warning");
        }
        if let Some(error) = response.errors().first() {
            return Err(Error::Protocol {
                code: error.code.clone(),
                message: error.text.clone(),
            });
        }
        Ok(response)
    }

    /// Pick the highest version the bank announces that the client can
    /// write, for every request kind.
    fn absorb_parameters(&mut self, response: &Response) {
        for codec in codecs().iter().filter(|codec| codec.encodes) {
            let Some(parameter_kind) = parameter_kind(codec.kind) else {
                continue;
            };
            let version = response
                .find_segments(&parameter_kind)
                .map(|segment| segment.version())
                .filter(|version| codec.versions.contains(version))
                .max();
            if let Some(version) = version {
                debug!(kind = codec.kind, version, "negotiated segment version");
                self.versions.insert(codec.kind.to_string(), version);
            }
        }
    }
}
