//! Authentication strategies.
//!
//! An [`Authenticator`] decides how dialogs are created and how requests are
//! signed. [`PinTan`] is the one-step PIN/TAN scheme: every request carries
//! the PIN in its signature trailer.

use std::fmt;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::dialog::Dialog;
use crate::error::Result;
use crate::request::Request;
use crate::segments::SegmentBody;
use crate::transport::{Headers, Transport};

/// Personal identification number. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(String);

impl Pin {
    pub fn new(pin: impl Into<String>) -> Self {
        Pin(pin.into())
    }

    /// The clear text PIN, for the signature trailer only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(***)")
    }
}

/// Secret material attached to one request until it is serialized.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub(crate) pin: Pin,
    pub(crate) tan: Option<String>,
}

impl Credential {
    pub fn new(pin: Pin) -> Self {
        Credential { pin, tan: None }
    }

    pub fn with_tan(mut self, tan: impl Into<String>) -> Self {
        self.tan = Some(tan.into());
        self
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("pin", &self.pin)
            .field("tan", &self.tan.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Strategy for creating dialogs and requests.
pub trait Authenticator: Send + Sync {
    /// A fresh, unsynchronised dialog.
    fn create_dialog(&self, transport: Arc<dyn Transport>) -> Dialog;

    /// A request carrying `segments`, signed when the scheme requires it.
    fn create_request(&self, segments: Vec<SegmentBody>) -> Request;
}

/// One-step PIN/TAN authentication.
#[derive(Debug, Clone)]
pub struct PinTan {
    config: ClientConfig,
    pin: Pin,
    headers: Headers,
}

impl PinTan {
    /// Fails with [`crate::Error::Config`] for an invalid configuration.
    pub fn new(config: ClientConfig, pin: impl Into<String>) -> Result<Self> {
        config.validate()?;
        Ok(PinTan {
            config,
            pin: Pin::new(pin),
            headers: Headers::new(),
        })
    }

    /// Header lines handed to the transport with every message.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Authenticator for PinTan {
    fn create_dialog(&self, transport: Arc<dyn Transport>) -> Dialog {
        Dialog::new(self.config.clone(), transport).with_headers(self.headers.clone())
    }

    fn create_request(&self, segments: Vec<SegmentBody>) -> Request {
        Request::signed(segments, Credential::new(self.pin.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::segments::SepaAccountsRequest;

    fn config() -> ClientConfig {
        ClientConfig::new("https://bank.example/fints", "12345678", "test1", "PRODUCT")
    }

    #[test]
    fn test_pin_is_redacted() {
        let pin = Pin::new("1234");
        assert_eq!(format!("{:?}", pin), "Pin(***)");
        let credential = Credential::new(pin).with_tan("987654");
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("1234"));
        assert!(!debug.contains("987654"));
    }

    #[test]
    fn test_pin_tan_rejects_bad_config() {
        let mut config = config();
        config.blz = "1234".into();
        assert!(matches!(PinTan::new(config, "1234"), Err(Error::Config(_))));
    }

    #[test]
    fn test_pin_tan_requests_are_signed() {
        let auth = PinTan::new(config(), "4321").unwrap();
        let request = auth.create_request(vec![SepaAccountsRequest::default().into()]);
        assert!(request.is_signed());
        assert_eq!(request.segments().len(), 1);
        assert!(!format!("{:?}", auth).contains("4321"));
    }

    #[test]
    fn test_pin_tan_header_values_stay_hidden() {
        let headers = Headers::new().with("Proxy-Authorization", "Basic c2VjcmV0");
        let auth = PinTan::new(config(), "4321").unwrap().with_headers(headers);
        let debug = format!("{:?}", auth);
        assert!(debug.contains("Proxy-Authorization"));
        assert!(!debug.contains("c2VjcmV0"));
    }
}
