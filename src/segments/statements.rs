//! Account statement segments: `HKKAZ` request and `HIKAZ` response.

use chrono::NaiveDate;

use super::accounts::{international_account, national_account};
use super::elements as el;
use super::{Fields, SegmentType};
use crate::error::{Error, Result};
use crate::types::SepaAccount;
use crate::wire::DataGroup;

/// `HKKAZ`: booked transactions of one account in a date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementRequest {
    pub account: SepaAccount,
    pub all_accounts: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub max_entries: Option<u32>,
    /// Continuation token of the previous page.
    pub touchdown: Option<String>,
}

impl StatementRequest {
    pub fn new(account: SepaAccount, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        StatementRequest {
            account,
            all_accounts: false,
            start_date: Some(start_date),
            end_date: Some(end_date),
            max_entries: None,
            touchdown: None,
        }
    }

    pub fn with_touchdown(mut self, touchdown: Option<String>) -> Self {
        self.touchdown = touchdown;
        self
    }
}

impl SegmentType for StatementRequest {
    const KIND: &'static str = "HKKAZ";
    const VERSION: u32 = 7;
    const VERSIONS: &'static [u32] = &[5, 6, 7];
    const ENCODES: bool = true;

    fn encode(&self, version: u32) -> Result<Vec<DataGroup>> {
        let account = if version >= 7 {
            if self.account.iban.is_empty() {
                return Err(Error::missing_field(Self::KIND, "IBAN"));
            }
            international_account(&self.account)
        } else {
            if self.account.account_number.is_empty() {
                return Err(Error::missing_field(Self::KIND, "account number"));
            }
            national_account(&self.account)
        };

        Ok(vec![
            account,
            vec![el::flag(self.all_accounts)],
            vec![el::optional_date(self.start_date)],
            vec![el::optional_date(self.end_date)],
            vec![self.max_entries.map_or_else(el::empty, el::number)],
            vec![el::optional(self.touchdown.as_ref())],
        ])
    }
}

/// `HIKAZ`: MT940 bodies of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementResponse {
    pub booked: String,
    /// Not yet booked transactions (MT942), when the bank sends them.
    pub pending: Option<String>,
}

impl SegmentType for StatementResponse {
    const KIND: &'static str = "HIKAZ";
    const VERSION: u32 = 7;
    const VERSIONS: &'static [u32] = &[5, 6, 7];
    const DECODES: bool = true;

    fn decode(fields: &Fields<'_>, _version: u32) -> Result<Self> {
        Ok(StatementResponse {
            booked: fields.text(0, 0).to_string(),
            pending: fields.optional(1, 0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::{decode_segment, encode_segment, Segment};
    use pretty_assertions::assert_eq;

    fn account() -> SepaAccount {
        SepaAccount {
            is_sepa: true,
            iban: "DE02100200300000123456".into(),
            bic: "BANKDEFFXXX".into(),
            account_number: "123456".into(),
            sub_account: None,
            country_code: "280".into(),
            blz: "10020030".into(),
        }
    }

    fn january() -> StatementRequest {
        StatementRequest::new(
            account(),
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 31).unwrap(),
        )
    }

    #[test]
    fn test_request_international_account() {
        let segment = Segment::from(january());
        assert_eq!(
            encode_segment(&segment, 3).unwrap(),
            "HKKAZ:3:7+DE02100200300000123456:BANKDEFFXXX:123456::280:10020030+N+20200101+20200131'"
        );
    }

    #[test]
    fn test_request_national_account_with_touchdown() {
        let request = january().with_touchdown(Some("5+2:x".into()));
        let segment = Segment::from(request).with_version(5);
        assert_eq!(
            encode_segment(&segment, 4).unwrap(),
            "HKKAZ:4:5+123456::280:10020030+N+20200101+20200131++5?+2?:x'"
        );
    }

    #[test]
    fn test_request_requires_iban_for_version_7() {
        let mut request = january();
        request.account.iban.clear();
        assert!(matches!(
            encode_segment(&Segment::from(request), 3),
            Err(Error::MissingField { ref field, .. }) if field == "IBAN"
        ));
    }

    #[test]
    fn test_response_binary_bodies() {
        let segment = decode_segment("HIKAZ:4:7:3+@12@:20:STARTUMS+@4@:20:'").unwrap();
        let response = segment.typed::<StatementResponse>().unwrap();
        assert_eq!(response.booked, ":20:STARTUMS");
        assert_eq!(response.pending.as_deref(), Some(":20:"));
    }
}
