//! SEPA account information: `HKSPA` request and `HISPA` response.

use super::elements as el;
use super::envelope::COUNTRY_CODE;
use super::{non_empty, parse_flag, Fields, SegmentType};
use crate::error::Result;
use crate::types::SepaAccount;
use crate::wire::{DataElement, DataGroup};

fn country(account: &SepaAccount) -> &str {
    if account.country_code.is_empty() {
        COUNTRY_CODE
    } else {
        account.country_code.as_str()
    }
}

/// National account identification: `number:sub:country:blz`.
pub(crate) fn national_account(account: &SepaAccount) -> DataGroup {
    vec![
        el::text(&account.account_number),
        el::optional(account.sub_account.as_ref()),
        el::text(country(account)),
        el::text(&account.blz),
    ]
}

/// International account identification: `iban:bic:number:sub:country:blz`.
pub(crate) fn international_account(account: &SepaAccount) -> DataGroup {
    vec![
        el::text(&account.iban),
        el::text(&account.bic),
        el::text(&account.account_number),
        el::optional(account.sub_account.as_ref()),
        el::text(country(account)),
        el::text(&account.blz),
    ]
}

fn sepa_account(fields: &Fields<'_>, group: &[DataElement]) -> Result<SepaAccount> {
    let text = |index: usize| group.get(index).map(DataElement::as_str).unwrap_or("");
    Ok(SepaAccount {
        is_sepa: parse_flag(fields.kind(), text(0), "SEPA flag")?.unwrap_or(false),
        iban: text(1).to_string(),
        bic: text(2).to_string(),
        account_number: text(3).to_string(),
        sub_account: non_empty(text(4)),
        country_code: text(5).to_string(),
        blz: text(6).to_string(),
    })
}

/// `HKSPA`: requests SEPA details for the given accounts, or for every
/// account of the user when the list is empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SepaAccountsRequest {
    pub accounts: Vec<SepaAccount>,
}

impl SegmentType for SepaAccountsRequest {
    const KIND: &'static str = "HKSPA";
    const VERSION: u32 = 1;
    const VERSIONS: &'static [u32] = &[1, 2, 3];
    const ENCODES: bool = true;

    fn encode(&self, version: u32) -> Result<Vec<DataGroup>> {
        Ok(self
            .accounts
            .iter()
            .map(|account| {
                if version == 1 {
                    national_account(account)
                } else {
                    international_account(account)
                }
            })
            .collect())
    }
}

/// `HISPA`: one group per account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SepaAccounts {
    pub accounts: Vec<SepaAccount>,
}

impl SegmentType for SepaAccounts {
    const KIND: &'static str = "HISPA";
    const VERSION: u32 = 1;
    const VERSIONS: &'static [u32] = &[1, 2, 3];
    const DECODES: bool = true;

    fn decode(fields: &Fields<'_>, _version: u32) -> Result<Self> {
        let accounts = fields
            .groups()
            .iter()
            .filter(|group| group.iter().any(|element| !element.is_empty()))
            .map(|group| sepa_account(fields, group))
            .collect::<Result<Vec<_>>>()?;
        Ok(SepaAccounts { accounts })
    }
}
