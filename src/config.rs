//! Client configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_product_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Identity of the client towards one bank. Holds no secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// FinTS server endpoint of the bank.
    pub url: String,

    /// Bank code (Bankleitzahl), 8 digits.
    pub blz: String,

    /// Login name issued by the bank.
    pub user_id: String,

    /// Product registration number.
    pub product_id: String,

    #[serde(default = "default_product_version")]
    pub product_version: String,

    /// Dialog language, 0 lets the bank choose.
    #[serde(default)]
    pub language: u32,
}

impl ClientConfig {
    pub fn new(
        url: impl Into<String>,
        blz: impl Into<String>,
        user_id: impl Into<String>,
        product_id: impl Into<String>,
    ) -> Self {
        ClientConfig {
            url: url.into(),
            blz: blz.into(),
            user_id: user_id.into(),
            product_id: product_id.into(),
            product_version: default_product_version(),
            language: 0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(Error::Config("server url is empty".into()));
        }
        if self.blz.len() != 8 || !self.blz.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Config(format!(
                "bank code must have 8 digits, got {:?}",
                self.blz
            )));
        }
        if self.user_id.is_empty() {
            return Err(Error::Config("user id is empty".into()));
        }
        if self.product_id.is_empty() {
            return Err(Error::Config("product id is empty".into()));
        }
        Ok(())
    }
}
