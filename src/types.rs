//! Domain types returned by the client.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::description::StructuredDescription;

/// A bank account as listed by the bank's SEPA account information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SepaAccount {
    /// Whether the account takes part in SEPA payments.
    pub is_sepa: bool,

    pub iban: String,

    pub bic: String,

    /// National account number.
    pub account_number: String,

    /// Sub account characteristic, if any.
    pub sub_account: Option<String>,

    /// Country code of the bank (280 for Germany).
    pub country_code: String,

    /// Bank code (Bankleitzahl).
    pub blz: String,
}

impl fmt::Display for SepaAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.iban.is_empty() {
            write!(f, "{}/{}", self.blz, self.account_number)
        } else {
            f.write_str(&self.iban)
        }
    }
}

/// Represents a financial transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction reference.
    pub reference: String,

    /// Date of the transaction.
    pub date: NaiveDate,

    /// Valuation date (value date).
    pub value_date: Option<NaiveDate>,

    /// Transaction amount.
    pub amount: Decimal,

    /// Currency code (e.g., USD, EUR).
    pub currency: String,

    /// Debit (D) or Credit (C) indicator.
    pub debit_credit: DebitCredit,

    /// Reversal of an earlier booking (`RC`/`RD` mark).
    pub reversal: bool,

    /// SWIFT transaction type code, e.g. `NTRF`.
    pub transaction_type: Option<String>,

    /// Bank's own reference for the booking.
    pub bank_reference: Option<String>,

    /// Transaction description/purpose (`:86:`).
    pub description: String,

    /// Description fields, when the bank used the structured layout.
    pub structured_description: Option<StructuredDescription>,
}

/// Debit/Credit indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebitCredit {
    /// Debit transaction (outgoing).
    Debit,
    /// Credit transaction (incoming).
    Credit,
}

impl FromStr for DebitCredit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "D" | "DBIT" | "DEBIT" => Ok(DebitCredit::Debit),
            "C" | "CRDT" | "CREDIT" => Ok(DebitCredit::Credit),
            _ => Err(format!("Invalid debit/credit indicator: {}", s)),
        }
    }
}

impl DebitCredit {
    /// The opposite direction, used for reversals.
    pub fn reversed(self) -> Self {
        match self {
            DebitCredit::Debit => DebitCredit::Credit,
            DebitCredit::Credit => DebitCredit::Debit,
        }
    }
}

/// Account statement balance information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// Balance type (opening, closing, etc.).
    pub balance_type: BalanceType,

    /// Balance amount.
    pub amount: Decimal,

    /// Currency code.
    pub currency: String,

    /// Debit/Credit indicator.
    pub debit_credit: DebitCredit,

    /// Date of the balance.
    pub date: NaiveDate,
}

impl Balance {
    /// Amount with the sign of the debit/credit mark applied.
    pub fn signed_amount(&self) -> Decimal {
        match self.debit_credit {
            DebitCredit::Debit => -self.amount,
            DebitCredit::Credit => self.amount,
        }
    }
}

/// Types of balance in a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceType {
    /// Opening balance.
    Opening,
    /// Closing balance.
    Closing,
    /// Intermediate balance (`M` variants, statement continues on the next page).
    Intermediate,
}

/// Account statement containing transactions and balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// Statement identification.
    pub statement_id: String,

    /// Account identification.
    pub account: String,

    /// Statement sequence number.
    pub sequence_number: Option<String>,

    /// Opening balance.
    pub opening_balance: Option<Balance>,

    /// Closing balance.
    pub closing_balance: Option<Balance>,

    /// List of transactions.
    pub transactions: Vec<Transaction>,

    /// Currency code for the account.
    pub currency: String,
}

impl Statement {
    /// Create a new statement with basic information.
    pub fn new(statement_id: String, account: String, currency: String) -> Self {
        Self {
            statement_id,
            account,
            currency,
            sequence_number: None,
            opening_balance: None,
            closing_balance: None,
            transactions: Vec::new(),
        }
    }

    /// Add a transaction to the statement.
    pub fn add_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debit_credit() {
        assert_eq!("D".parse::<DebitCredit>().ok(), Some(DebitCredit::Debit));
        assert_eq!("crdt".parse::<DebitCredit>().ok(), Some(DebitCredit::Credit));
        assert!("X".parse::<DebitCredit>().is_err());
        assert_eq!(DebitCredit::Debit.reversed(), DebitCredit::Credit);
    }

    #[test]
    fn test_account_display() {
        let mut account = SepaAccount {
            is_sepa: true,
            iban: "DE02100200300000123456".into(),
            bic: "BANKDEFFXXX".into(),
            account_number: "123456".into(),
            sub_account: None,
            country_code: "280".into(),
            blz: "10020030".into(),
        };
        assert_eq!(account.to_string(), "DE02100200300000123456");
        account.iban.clear();
        assert_eq!(account.to_string(), "10020030/123456");
    }

    #[test]
    fn test_signed_balance() {
        let balance = Balance {
            balance_type: BalanceType::Closing,
            amount: Decimal::new(1250, 2),
            currency: "EUR".into(),
            debit_credit: DebitCredit::Debit,
            date: NaiveDate::from_ymd_opt(2020, 1, 31).unwrap(),
        };
        assert_eq!(balance.signed_amount(), Decimal::new(-1250, 2));
    }
}
