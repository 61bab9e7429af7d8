//! FinTS Client Library
//!
//! A client for the German FinTS 3.0 home banking protocol with PIN/TAN
//! authentication.
//!
//! # Layers
//!
//! - **wire**: escaping and tokenizing of the segment syntax
//! - **segments**: typed segments with a registry of known kinds
//! - **message**: message framing and the PIN/TAN security envelope
//! - **dialog**: the sync / init / send / end state machine
//! - **client**: account listing and paginated statement retrieval
//!
//! The network is abstracted behind [`Transport`]; statement bodies are read
//! by a [`StatementParser`], MT940 by default.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use chrono::NaiveDate;
//! use fints_client::{Client, ClientConfig, PinTan, Transport};
//!
//! # async fn run(transport: Arc<dyn Transport>) -> fints_client::Result<()> {
//! let config = ClientConfig::new("https://banking.example/fints", "12345678", "user", "PRODUCT");
//! let client = Client::new(PinTan::new(config, "1234")?, transport);
//!
//! for account in client.accounts().await? {
//!     let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
//!     let end = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
//!     for statement in client.statements(&account, start, end).await? {
//!         println!("{}: {} transactions", account, statement.transactions.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod description;
pub mod dialog;
pub mod error;
pub mod message;
pub mod mt940_format;
pub mod request;
pub mod response;
pub mod segments;
pub mod transport;
pub mod types;
pub mod wire;

pub use auth::{Authenticator, Credential, Pin, PinTan};
pub use client::{fetch_pages, Client, StatementParser};
pub use config::ClientConfig;
pub use description::{
    DescriptionParser, PaymentReference, StructuredDescription, StructuredDescriptionParser,
};
pub use dialog::{Dialog, DialogState};
pub use error::{Error, Result};
pub use message::{decode_message, encode_message};
pub use mt940_format::Mt940Parser;
pub use request::Request;
pub use response::Response;
pub use segments::{Segment, SegmentBody, SegmentType};
pub use transport::{Headers, Transport};
pub use types::{Balance, BalanceType, DebitCredit, SepaAccount, Statement, Transaction};
