//! Structured `:86:` descriptions.
//!
//! German banks fill the MT940 information field with a fixed layout: a
//! three digit business transaction code followed by `?NN` sub fields.
//!
//! ```text
//! 166?00SEPA-GUTSCHRIFT?109310?20EREF+4711?21SVWZ+Rechnung 42?30BANKDEFFXXX?31DE02100200300000123456?32Max Mustermann
//! ```
//!
//! The purpose lines (`?20`-`?29`, `?60`-`?63`) carry the SEPA references as
//! `TAG+value` runs, which are split out into a [`PaymentReference`].

use serde::{Deserialize, Serialize};

/// Turns a free-text description into structured fields.
pub trait DescriptionParser: Send + Sync {
    /// `None` when the text does not follow a known layout.
    fn parse(&self, description: &str) -> Option<StructuredDescription>;
}

/// SEPA references found in the purpose lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReference {
    /// `EREF`
    pub end_to_end_reference: Option<String>,
    /// `KREF`
    pub customer_reference: Option<String>,
    /// `MREF`
    pub mandate_reference: Option<String>,
    /// `CRED`
    pub creditor_id: Option<String>,
    /// `DEBT`
    pub debtor_id: Option<String>,
    /// `COAM`
    pub compensation_amount: Option<String>,
    /// `OAMT`
    pub original_amount: Option<String>,
    /// `SVWZ`
    pub remittance_information: Option<String>,
    /// `ABWA`
    pub ultimate_debtor: Option<String>,
    /// `ABWE`
    pub ultimate_creditor: Option<String>,
}

impl PaymentReference {
    fn slot(&mut self, tag: &str) -> Option<&mut Option<String>> {
        let slot = match tag {
            "EREF" => &mut self.end_to_end_reference,
            "KREF" => &mut self.customer_reference,
            "MREF" => &mut self.mandate_reference,
            "CRED" => &mut self.creditor_id,
            "DEBT" => &mut self.debtor_id,
            "COAM" => &mut self.compensation_amount,
            "OAMT" => &mut self.original_amount,
            "SVWZ" => &mut self.remittance_information,
            "ABWA" => &mut self.ultimate_debtor,
            "ABWE" => &mut self.ultimate_creditor,
            _ => return None,
        };
        Some(slot)
    }

    pub fn is_empty(&self) -> bool {
        *self == PaymentReference::default()
    }
}

const SEPA_TAGS: [&str; 10] = [
    "EREF", "KREF", "MREF", "CRED", "DEBT", "COAM", "OAMT", "SVWZ", "ABWA", "ABWE",
];

/// Fields of a structured description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredDescription {
    /// Business transaction code (Geschäftsvorfallcode).
    pub transaction_code: String,
    /// `?00`
    pub booking_text: Option<String>,
    /// `?10`
    pub primanota: Option<String>,
    /// Purpose lines joined in order.
    pub purpose: String,
    pub references: PaymentReference,
    /// `?30`
    pub counterparty_bic: Option<String>,
    /// `?31`
    pub counterparty_iban: Option<String>,
    /// `?32` and `?33`
    pub counterparty_name: Option<String>,
    /// `?34`
    pub text_key_extension: Option<String>,
}

/// Parser for the `NNN?00...` layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredDescriptionParser;

impl StructuredDescriptionParser {
    pub fn new() -> Self {
        StructuredDescriptionParser
    }
}

fn set(target: &mut Option<String>, value: &str) {
    if !value.is_empty() {
        target.get_or_insert_with(String::new).push_str(value);
    }
}

/// Split `TAG+value` runs. Text before the first tag is ignored.
fn payment_reference(purpose: &str) -> PaymentReference {
    let mut marks: Vec<(usize, &str)> = SEPA_TAGS
        .iter()
        .flat_map(|tag| {
            let needle = format!("{}+", tag);
            purpose
                .match_indices(&needle)
                .map(move |(index, _)| (index, *tag))
                .collect::<Vec<_>>()
        })
        .collect();
    marks.sort_unstable();

    let mut reference = PaymentReference::default();
    for (i, (start, tag)) in marks.iter().enumerate() {
        let value_start = start + tag.len() + 1;
        let value_end = marks.get(i + 1).map_or(purpose.len(), |(next, _)| *next);
        if value_end < value_start {
            continue;
        }
        let value = purpose[value_start..value_end].trim();
        if let Some(slot) = reference.slot(tag) {
            if slot.is_none() && !value.is_empty() {
                *slot = Some(value.to_string());
            }
        }
    }
    reference
}

impl DescriptionParser for StructuredDescriptionParser {
    fn parse(&self, description: &str) -> Option<StructuredDescription> {
        let description = description.trim();
        let code = description.get(..3)?;
        if !code.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let rest = &description[3..];
        if !rest.is_empty() && !rest.starts_with('?') {
            return None;
        }

        let mut structured = StructuredDescription {
            transaction_code: code.to_string(),
            ..StructuredDescription::default()
        };

        for field in rest.split('?').skip(1) {
            let key = field.get(..2)?;
            if !key.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let value = &field[2..];
            match key {
                "00" => set(&mut structured.booking_text, value),
                "10" => set(&mut structured.primanota, value),
                "20" | "21" | "22" | "23" | "24" | "25" | "26" | "27" | "28" | "29" | "60"
                | "61" | "62" | "63" => structured.purpose.push_str(value),
                "30" => set(&mut structured.counterparty_bic, value),
                "31" => set(&mut structured.counterparty_iban, value),
                "32" | "33" => set(&mut structured.counterparty_name, value),
                "34" => set(&mut structured.text_key_extension, value),
                _ => {}
            }
        }

        structured.references = payment_reference(&structured.purpose);
        Some(structured)
    }
}
