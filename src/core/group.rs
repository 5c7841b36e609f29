//! Payment groups and the fee feed the batch assembler reconciles against.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::calendar::is_business_day;
use super::error::{IncassoError, ValidationError, Warning};
use super::types::{AccountId, ChargeBearer, CreditorId, GroupId, MessageId};

/// A dated collection of payments sharing one settlement date and one
/// settlement bank account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentGroup {
    pub id: GroupId,
    /// Reference, unique per creditor.
    pub reference: String,
    pub creditor: CreditorId,
    /// Settlement account the collected funds arrive on (IBAN-type).
    pub account: AccountId,
    /// Requested debit date for all payments in the group.
    pub date: NaiveDate,
    pub batch_booking: Option<bool>,
    pub charge_bearer: Option<ChargeBearer>,
    /// Owning message, once the group is attached to one.
    pub message: Option<MessageId>,
    pub currency: String,
}

impl PaymentGroup {
    /// Date rules: the debit date must not be in the past and must fall on
    /// a business day.
    pub fn validate_date(&self, today: NaiveDate) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.date < today {
            errors.push(ValidationError::new(
                "group.date",
                format!("debit date {} is in the past", self.date),
            ));
        }
        if !is_business_day(self.date) {
            errors.push(ValidationError::new(
                "group.date",
                format!("debit date {} is not a business day", self.date),
            ));
        }
        errors
    }
}

/// One row of the semicolon-delimited fee feed:
/// `unit_name;amount;description[;role]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRow {
    pub unit: String,
    pub amount: String,
    pub description: String,
    pub role: Option<String>,
}

/// Parse the fee feed. Blank lines are skipped; each remaining line must
/// carry at least unit name, amount and description.
pub fn parse_feed(text: &str) -> Result<Vec<FeedRow>, IncassoError> {
    let mut rows = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(';').collect();
        if fields.len() < 3 {
            return Err(IncassoError::Feed(format!(
                "line {}: expected 'unit;amount;description[;role]', got '{line}'",
                lineno + 1
            )));
        }
        let role = fields.get(3).map(|r| r.trim()).filter(|r| !r.is_empty());
        rows.push(FeedRow {
            unit: fields[0].trim().to_string(),
            amount: fields[1].trim().to_string(),
            description: fields[2].trim().to_string(),
            role: role.map(String::from),
        });
    }
    Ok(rows)
}

/// Parse a feed amount. The feed uses a comma as decimal separator; it is
/// substituted before numeric conversion.
pub fn parse_feed_amount(raw: &str) -> Result<Decimal, IncassoError> {
    Decimal::from_str(&raw.replace(',', "."))
        .map_err(|_| IncassoError::Feed(format!("amount '{raw}' is not a number")))
}

/// Pick the feed row for a unit and debtor role.
///
/// A row matches when it carries no role tag, or a role tag equal to the
/// debtor's role, or when it is the sole row for that unit. Several untagged
/// rows for one unit are ambiguous: no row is picked and a warning is
/// returned instead.
pub fn select_feed_row<'a>(
    rows: &'a [FeedRow],
    unit_name: &str,
    role: Option<&str>,
) -> (Option<&'a FeedRow>, Option<Warning>) {
    let candidates: Vec<&FeedRow> = rows.iter().filter(|r| r.unit == unit_name).collect();
    match candidates.as_slice() {
        [] => (None, None),
        [only] => (Some(only), None),
        many => {
            if let Some(tagged) = many
                .iter()
                .find(|r| r.role.as_deref().is_some_and(|t| Some(t) == role))
            {
                return (Some(tagged), None);
            }
            let untagged: Vec<&&FeedRow> = many.iter().filter(|r| r.role.is_none()).collect();
            match untagged.as_slice() {
                [only] => (Some(**only), None),
                [] => (None, None),
                _ => (
                    None,
                    Some(Warning::new(
                        unit_name,
                        format!(
                            "{} untagged feed rows for this unit, none applied",
                            untagged.len()
                        ),
                    )),
                ),
            }
        }
    }
}
