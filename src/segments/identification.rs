//! Dialog setup and teardown segments.

use super::elements as el;
use super::envelope::COUNTRY_CODE;
use super::{parse_number, Fields, SegmentType};
use crate::error::{Error, Result};
use crate::wire::DataGroup;

/// `HKIDN`: identifies bank, user and client system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    pub blz: String,
    pub user_id: String,
    /// `"0"` until the bank assigned one.
    pub system_id: String,
    pub system_id_required: bool,
}

impl SegmentType for Identification {
    const KIND: &'static str = "HKIDN";
    const VERSION: u32 = 2;
    const VERSIONS: &'static [u32] = &[2];
    const ENCODES: bool = true;

    fn encode(&self, _version: u32) -> Result<Vec<DataGroup>> {
        if self.blz.is_empty() {
            return Err(Error::missing_field(Self::KIND, "bank code"));
        }
        if self.user_id.is_empty() {
            return Err(Error::missing_field(Self::KIND, "user id"));
        }
        Ok(vec![
            vec![el::text(COUNTRY_CODE), el::text(&self.blz)],
            vec![el::text(&self.user_id)],
            vec![el::text(if self.system_id.is_empty() { "0" } else { self.system_id.as_str() })],
            vec![el::text(if self.system_id_required { "1" } else { "0" })],
        ])
    }
}

/// `HKVVB`: announces parameter versions and the client product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingPreparation {
    pub bpd_version: u32,
    pub upd_version: u32,
    pub language: u32,
    pub product_id: String,
    pub product_version: String,
}

impl SegmentType for ProcessingPreparation {
    const KIND: &'static str = "HKVVB";
    const VERSION: u32 = 3;
    const VERSIONS: &'static [u32] = &[3];
    const ENCODES: bool = true;

    fn encode(&self, _version: u32) -> Result<Vec<DataGroup>> {
        if self.product_id.is_empty() {
            return Err(Error::missing_field(Self::KIND, "product id"));
        }
        Ok(vec![
            vec![el::number(self.bpd_version)],
            vec![el::number(self.upd_version)],
            vec![el::number(self.language)],
            vec![el::text(&self.product_id)],
            vec![el::text(&self.product_version)],
        ])
    }
}

/// Synchronisation mode of `HKSYN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    NewSystemId,
    LastMessageNumber,
    SignatureId,
}

impl SyncMode {
    fn code(self) -> u32 {
        match self {
            SyncMode::NewSystemId => 0,
            SyncMode::LastMessageNumber => 1,
            SyncMode::SignatureId => 2,
        }
    }
}

/// `HKSYN`: asks the bank for a system id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synchronization {
    pub mode: SyncMode,
}

impl SegmentType for Synchronization {
    const KIND: &'static str = "HKSYN";
    const VERSION: u32 = 3;
    const VERSIONS: &'static [u32] = &[3];
    const ENCODES: bool = true;

    fn encode(&self, _version: u32) -> Result<Vec<DataGroup>> {
        Ok(vec![vec![el::number(self.mode.code())]])
    }
}

/// `HISYN`: the system id assigned by the bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynchronizationResponse {
    pub system_id: Option<String>,
}

impl SegmentType for SynchronizationResponse {
    const KIND: &'static str = "HISYN";
    const VERSION: u32 = 4;
    const VERSIONS: &'static [u32] = &[4];
    const DECODES: bool = true;

    fn decode(fields: &Fields<'_>, _version: u32) -> Result<Self> {
        Ok(SynchronizationResponse {
            system_id: fields.optional(0, 0),
        })
    }
}

/// `HKEND`: closes a dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogEnd {
    pub dialog_id: String,
}

impl SegmentType for DialogEnd {
    const KIND: &'static str = "HKEND";
    const VERSION: u32 = 1;
    const VERSIONS: &'static [u32] = &[1];
    const ENCODES: bool = true;

    fn encode(&self, _version: u32) -> Result<Vec<DataGroup>> {
        if self.dialog_id.is_empty() {
            return Err(Error::missing_field(Self::KIND, "dialog id"));
        }
        Ok(vec![vec![el::text(&self.dialog_id)]])
    }
}

/// `HIBPA`: general bank parameter data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankParameters {
    pub bpd_version: u32,
    pub country_code: String,
    pub blz: String,
    pub bank_name: String,
    pub max_transactions_per_message: u32,
    pub languages: Vec<u32>,
    pub hbci_versions: Vec<u32>,
}

impl SegmentType for BankParameters {
    const KIND: &'static str = "HIBPA";
    const VERSION: u32 = 3;
    const VERSIONS: &'static [u32] = &[2, 3];
    const DECODES: bool = true;

    fn decode(fields: &Fields<'_>, _version: u32) -> Result<Self> {
        let numbers = |group: usize, field: &str| -> Result<Vec<u32>> {
            fields
                .group(group)
                .iter()
                .filter(|element| !element.is_empty())
                .map(|element| {
                    parse_number(fields.kind(), element.as_str(), field)
                        .map(|value| value.unwrap_or_default())
                })
                .collect()
        };

        Ok(BankParameters {
            bpd_version: fields.number(0, 0, "BPD version")?,
            country_code: fields.text(1, 0).to_string(),
            blz: fields.text(1, 1).to_string(),
            bank_name: fields.text(2, 0).to_string(),
            max_transactions_per_message: fields
                .optional_number(3, 0, "transaction limit")?
                .unwrap_or_default(),
            languages: numbers(4, "language")?,
            hbci_versions: numbers(5, "HBCI version")?,
        })
    }
}
