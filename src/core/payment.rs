//! Payment records — one debit instruction per due amount.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::calendar::is_business_day;
use super::error::ValidationError;
use super::identifier::{MAX_IDENTIFICATION_LEN, MAX_REMITTANCE_LEN, validate_sepa_text};
use super::mandate::{Mandate, MandateState};
use super::types::{GroupId, MandateId, PartyId, PaymentId, SequenceType, UnitId};

/// Lifecycle state of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentState {
    Draft,
    Approved,
    Processing,
    Succeeded,
    Failed,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Approved => "approved",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Allowed workflow edges. `succeeded` and `failed` re-toggle to cover
    /// reversals and resubmissions.
    pub fn can_transition(self, to: PaymentState) -> bool {
        use PaymentState::*;
        matches!(
            (self, to),
            (Draft, Approved)
                | (Approved, Processing)
                | (Processing, Succeeded)
                | (Processing, Failed)
                | (Approved, Draft)
                | (Succeeded, Failed)
                | (Failed, Succeeded)
        )
    }
}

/// A single debit instruction for one due amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    /// Owning payment group.
    pub group: GroupId,
    /// Unit this payment collects for, when it is a fee payment.
    pub unit: Option<UnitId>,
    /// Condominium fee payment (as opposed to an ad-hoc debit).
    pub fee: bool,
    /// Ultimate debtor.
    pub party: PartyId,
    pub mandate: MandateId,
    /// Due amount. Left unset by the batch assembler when the fee feed has
    /// no row for the unit; draft validation flags it as missing.
    pub amount: Option<Decimal>,
    /// Unstructured remittance information.
    pub description: Option<String>,
    /// End-to-end identification carried through the whole chain.
    pub end_to_end_id: Option<String>,
    pub sequence_type: SequenceType,
    pub date: NaiveDate,
    pub currency: String,
    pub state: PaymentState,
}

impl Payment {
    /// Validate a draft payment before it can leave draft state.
    ///
    /// `group_date` is the owning group's debit date; `mandate` is the
    /// referenced mandate record.
    pub fn validate_draft(&self, group_date: NaiveDate, mandate: &Mandate) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.date < group_date {
            errors.push(ValidationError::new(
                "payment.date",
                format!(
                    "due date {} is before the group date {}",
                    self.date, group_date
                ),
            ));
        }
        if !is_business_day(self.date) {
            errors.push(ValidationError::new(
                "payment.date",
                format!("due date {} is not a business day", self.date),
            ));
        }
        if self.amount.is_none() {
            errors.push(ValidationError::new("payment.amount", "amount is not set"));
        }
        if let Some(amount) = self.amount {
            if amount <= Decimal::ZERO {
                errors.push(ValidationError::new(
                    "payment.amount",
                    format!("amount {amount} must be positive"),
                ));
            }
        }
        if mandate.account.is_none() {
            errors.push(ValidationError::new(
                "payment.mandate",
                "mandate has no account number to debit",
            ));
        }
        if matches!(mandate.state, MandateState::Draft | MandateState::Canceled) {
            errors.push(ValidationError::new(
                "payment.mandate",
                format!("mandate is {}", mandate.state.as_str()),
            ));
        }
        if let Some(description) = &self.description {
            errors.extend(validate_sepa_text(
                "payment.description",
                description,
                MAX_REMITTANCE_LEN,
            ));
        }
        if let Some(end_to_end_id) = &self.end_to_end_id {
            errors.extend(validate_sepa_text(
                "payment.end_to_end_id",
                end_to_end_id,
                MAX_IDENTIFICATION_LEN,
            ));
        }
        errors
    }
}
