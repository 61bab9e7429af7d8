//! MT940 statement reader.
//!
//! Banks answer `HKKAZ` with SWIFT MT940 text. A single body may contain
//! several statements, each opened by `:20:` and usually closed by a `-`
//! line. Lines may end in CRLF.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

use crate::client::StatementParser;
use crate::error::{Error, Result};
use crate::types::{Balance, BalanceType, DebitCredit, Statement, Transaction};

/// Default [`StatementParser`] for MT940 bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mt940Parser;

impl Mt940Parser {
    pub fn new() -> Self {
        Mt940Parser
    }
}

impl StatementParser for Mt940Parser {
    fn parse(&self, raw: &str) -> Result<Vec<Statement>> {
        let statements = parse_statements(raw)?;
        debug!(statements = statements.len(), "parsed MT940 body");
        Ok(statements)
    }
}

/// Statement under construction.
struct Builder {
    statement: Statement,
    transaction: Option<Transaction>,
    /// Line of the `:20:` tag.
    line: usize,
}

impl Builder {
    fn new(statement_id: &str, line: usize) -> Self {
        Builder {
            statement: Statement::new(statement_id.to_string(), String::new(), String::new()),
            transaction: None,
            line,
        }
    }

    fn flush_transaction(&mut self) {
        if let Some(mut transaction) = self.transaction.take() {
            transaction.description = transaction.description.trim().to_string();
            self.statement.add_transaction(transaction);
        }
    }

    fn finish(mut self) -> Result<Statement> {
        self.flush_transaction();
        if self.statement.account.is_empty() {
            return Err(Error::Mt940ParseError {
                line: self.line,
                message: "statement without account identification :25:".to_string(),
            });
        }
        Ok(self.statement)
    }
}

fn parse_statements(raw: &str) -> Result<Vec<Statement>> {
    let mut statements = Vec::new();
    let mut current: Option<Builder> = None;
    // Continuation lines extend the last :86: field only.
    let mut in_description = false;

    for (index, line) in raw.lines().enumerate() {
        let number = index + 1;
        let line = line.trim_end();

        if line.is_empty() || line.starts_with('{') {
            continue;
        }
        if line == "-" || line == "-}" {
            if let Some(builder) = current.take() {
                statements.push(builder.finish()?);
            }
            in_description = false;
            continue;
        }

        if !line.starts_with(':') {
            if in_description {
                if let Some(transaction) = current.as_mut().and_then(|b| b.transaction.as_mut()) {
                    if !line.starts_with('?') {
                        transaction.description.push(' ');
                    }
                    transaction.description.push_str(line.trim_start());
                }
            }
            continue;
        }
        in_description = false;

        if let Some(reference) = line.strip_prefix(":20:") {
            if let Some(builder) = current.take() {
                statements.push(builder.finish()?);
            }
            current = Some(Builder::new(reference.trim(), number));
            continue;
        }

        let builder = current.as_mut().ok_or_else(|| Error::Mt940ParseError {
            line: number,
            message: format!("field outside of a statement: {}", line),
        })?;

        if let Some(account) = line.strip_prefix(":25:") {
            builder.statement.account = account.trim().to_string();
        } else if let Some(sequence) = line
            .strip_prefix(":28C:")
            .or_else(|| line.strip_prefix(":28:"))
        {
            builder.statement.sequence_number = Some(sequence.trim().to_string());
        } else if line.starts_with(":60") {
            let balance = parse_balance(line, BalanceType::Opening)?;
            if builder.statement.currency.is_empty() {
                builder.statement.currency = balance.currency.clone();
            }
            builder.statement.opening_balance = Some(balance);
        } else if line.starts_with(":61:") {
            builder.flush_transaction();
            let transaction = parse_transaction_line(line, &builder.statement.currency)
                .map_err(|error| Error::Mt940ParseError {
                    line: number,
                    message: error.to_string(),
                })?;
            builder.transaction = Some(transaction);
        } else if let Some(text) = line.strip_prefix(":86:") {
            if let Some(transaction) = builder.transaction.as_mut() {
                transaction.description = text.trim().to_string();
                in_description = true;
            }
        } else if line.starts_with(":62") {
            builder.flush_transaction();
            builder.statement.closing_balance = Some(parse_balance(line, BalanceType::Closing)?);
        }
    }

    if let Some(builder) = current.take() {
        statements.push(builder.finish()?);
    }
    Ok(statements)
}

fn parse_amount(text: &str) -> Result<Decimal> {
    let normalized = text.trim_end_matches(',').replace(',', ".");
    Decimal::from_str(&normalized).map_err(|_| Error::InvalidAmount(text.to_string()))
}

/// `:60F:C250218EUR2732,02`. `M` variants are intermediate balances of a
/// statement continued elsewhere.
fn parse_balance(line: &str, balance_type: BalanceType) -> Result<Balance> {
    let invalid = || Error::ParseError(format!("Invalid balance line: {}", line));

    let variant = line.get(3..4).ok_or_else(invalid)?;
    let content = line.get(5..).ok_or_else(invalid)?;
    if content.len() < 11 {
        return Err(Error::ParseError(format!("Balance line too short: {}", line)));
    }

    let debit_credit = content
        .get(0..1)
        .unwrap_or("")
        .parse::<DebitCredit>()
        .map_err(|_| Error::ParseError(format!("Invalid D/C indicator in: {}", line)))?;
    let date = parse_mt940_date(content.get(1..7).ok_or_else(invalid)?)?;
    let currency = content.get(7..10).ok_or_else(invalid)?.to_string();
    let amount = parse_amount(content.get(10..).ok_or_else(invalid)?)?;

    Ok(Balance {
        balance_type: if variant == "M" {
            BalanceType::Intermediate
        } else {
            balance_type
        },
        amount,
        currency,
        debit_credit,
        date,
    })
}

/// `:61:` statement line:
///
/// ```text
/// 2001150115CR12,01NTRFKREF-1//BANKREF
/// |     |   | | |    |   |      bank reference
/// |     |   | | |    |   customer reference
/// |     |   | | |    transaction type
/// |     |   | | amount
/// |     |   | funds code (optional)
/// |     |   mark: C, D, RC or RD
/// |     entry date MMDD (optional)
/// value date YYMMDD
/// ```
fn parse_transaction_line(line: &str, currency: &str) -> Result<Transaction> {
    let content = line
        .get(4..)
        .filter(|content| content.len() >= 6)
        .ok_or_else(|| Error::ParseError(format!("Transaction line too short: {}", line)))?;

    let value_date = parse_mt940_date(content.get(0..6).unwrap_or(content))?;
    let mut rest = content.get(6..).unwrap_or("");

    let date = match rest.get(0..4) {
        Some(entry) if entry.bytes().all(|b| b.is_ascii_digit()) => {
            rest = &rest[4..];
            parse_entry_date(entry, value_date)?
        }
        _ => value_date,
    };

    let reversal = rest.starts_with('R');
    if reversal {
        rest = &rest[1..];
    }
    let mark = rest
        .get(0..1)
        .ok_or_else(|| Error::ParseError(format!("Missing D/C indicator in: {}", line)))?;
    let mark = mark
        .parse::<DebitCredit>()
        .map_err(|_| Error::ParseError(format!("Invalid D/C: {}", mark)))?;
    rest = &rest[1..];

    // funds code
    if rest.starts_with(|c: char| c.is_ascii_alphabetic()) {
        rest = &rest[1..];
    }

    let amount_end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == ','))
        .unwrap_or(rest.len());
    let amount = parse_amount(&rest[..amount_end])?;
    rest = &rest[amount_end..];

    let transaction_type = rest.get(0..4).map(str::to_string);
    let references = rest.get(4..).unwrap_or("");
    let (customer, bank) = match references.split_once("//") {
        Some((customer, bank)) => (customer.trim(), Some(bank.trim())),
        None => (references.trim(), None),
    };
    let bank_reference = bank.filter(|bank| !bank.is_empty()).map(str::to_string);

    let reference = if !customer.is_empty() && customer != "NONREF" {
        customer.to_string()
    } else if let Some(bank) = &bank_reference {
        bank.clone()
    } else {
        format!("{}-{}", date, amount)
    };

    Ok(Transaction {
        reference,
        date,
        value_date: Some(value_date),
        amount,
        currency: currency.to_string(),
        debit_credit: if reversal { mark.reversed() } else { mark },
        reversal,
        transaction_type,
        bank_reference,
        description: String::new(),
        structured_description: None,
    })
}

/// Parse MT940 date format (YYMMDD) to NaiveDate.
fn parse_mt940_date(date_str: &str) -> Result<NaiveDate> {
    if date_str.len() != 6 || !date_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidDate(format!("Invalid MT940 date: {}", date_str)));
    }

    let year: i32 = date_str[0..2]
        .parse()
        .map_err(|_| Error::InvalidDate(date_str.to_string()))?;
    let month: u32 = date_str[2..4]
        .parse()
        .map_err(|_| Error::InvalidDate(date_str.to_string()))?;
    let day: u32 = date_str[4..6]
        .parse()
        .map_err(|_| Error::InvalidDate(date_str.to_string()))?;

    // Assume 2000+ for years < 50, otherwise 1900+
    let full_year = if year < 50 { 2000 + year } else { 1900 + year };

    NaiveDate::from_ymd_opt(full_year, month, day)
        .ok_or_else(|| Error::InvalidDate(format!("{}-{}-{}", full_year, month, day)))
}

/// Entry date (MMDD), in the year closest to the value date.
fn parse_entry_date(date_str: &str, value_date: NaiveDate) -> Result<NaiveDate> {
    let month: u32 = date_str[0..2]
        .parse()
        .map_err(|_| Error::InvalidDate(date_str.to_string()))?;
    let day: u32 = date_str[2..4]
        .parse()
        .map_err(|_| Error::InvalidDate(date_str.to_string()))?;

    let year = value_date.year();
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| Error::InvalidDate(format!("{}-{}-{}", year, month, day)))?;

    // booked in December, valued in January (or the other way round)
    let days = (date - value_date).num_days();
    let shifted = if days > 180 {
        NaiveDate::from_ymd_opt(year - 1, month, day)
    } else if days < -180 {
        NaiveDate::from_ymd_opt(year + 1, month, day)
    } else {
        Some(date)
    };
    shifted.ok_or_else(|| Error::InvalidDate(format!("{}-{}", month, day)))
}
