//! Mandate records and their lifecycle.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::identifier::{MAX_IDENTIFICATION_LEN, validate_sepa_text};
use super::types::{AccountId, CreditorId, MandateId, MandateType, PartyId, Scheme, SequenceType};

/// Lifecycle state of a mandate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MandateState {
    Draft,
    Requested,
    Validated,
    Canceled,
}

impl MandateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Requested => "requested",
            Self::Validated => "validated",
            Self::Canceled => "canceled",
        }
    }

    /// Allowed workflow edges. No edge re-enters `requested` from
    /// `validated` or `canceled`.
    pub fn can_transition(self, to: MandateState) -> bool {
        use MandateState::*;
        matches!(
            (self, to),
            (Draft, Requested)
                | (Requested, Validated)
                | (Requested, Canceled)
                | (Requested, Draft)
                | (Validated, Canceled)
        )
    }
}

/// A debtor's authorization to be debited by a creditor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mandate {
    pub id: MandateId,
    /// The condominium the mandate authorizes to collect.
    pub creditor: CreditorId,
    pub debtor: PartyId,
    /// Debited account. Required once the mandate is validated.
    pub account: Option<AccountId>,
    /// Human identification code, unique per creditor.
    pub identification: Option<String>,
    pub mandate_type: MandateType,
    pub scheme: Scheme,
    pub signature_date: Option<NaiveDate>,
    pub state: MandateState,
}

impl Mandate {
    /// Default sequence type for a new collection against this mandate.
    pub fn sequence_type(&self) -> SequenceType {
        match self.mandate_type {
            MandateType::OneOff => SequenceType::OneOff,
            MandateType::Recurrent => SequenceType::Recurrent,
        }
    }

    /// A mandate can be collected against once it has left draft, is not
    /// canceled, and has an account on file.
    pub fn is_usable(&self) -> bool {
        !matches!(self.state, MandateState::Draft | MandateState::Canceled)
            && self.account.is_some()
    }

    /// Field-level validation, independent of workflow state.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if let Some(identification) = &self.identification {
            errors.extend(validate_sepa_text(
                "mandate.identification",
                identification,
                MAX_IDENTIFICATION_LEN,
            ));
        }
        if self.state == MandateState::Validated {
            if self.account.is_none() {
                errors.push(ValidationError::new(
                    "mandate.account",
                    "a validated mandate must have an account number",
                ));
            }
            if self.identification.is_none() {
                errors.push(ValidationError::new(
                    "mandate.identification",
                    "a validated mandate must have an identification",
                ));
            }
            if self.signature_date.is_none() {
                errors.push(ValidationError::new(
                    "mandate.signature_date",
                    "a validated mandate must have a signature date",
                ));
            }
        }
        errors
    }

    /// Copy semantics for duplication: the copy starts over in draft with
    /// no signature date and no identification.
    pub fn duplicate(&self, id: MandateId) -> Mandate {
        Mandate {
            id,
            creditor: self.creditor,
            debtor: self.debtor,
            account: self.account,
            identification: None,
            mandate_type: self.mandate_type,
            scheme: self.scheme,
            signature_date: None,
            state: MandateState::Draft,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        use MandateState::*;
        assert!(Draft.can_transition(Requested));
        assert!(Requested.can_transition(Validated));
        assert!(Requested.can_transition(Canceled));
        assert!(Requested.can_transition(Draft));
        assert!(Validated.can_transition(Canceled));

        assert!(!Draft.can_transition(Validated));
        assert!(!Draft.can_transition(Canceled));
        assert!(!Validated.can_transition(Requested));
        assert!(!Validated.can_transition(Draft));
        assert!(!Canceled.can_transition(Requested));
        assert!(!Canceled.can_transition(Draft));
    }

    fn mandate(state: MandateState) -> Mandate {
        Mandate {
            id: MandateId(1),
            creditor: CreditorId(1),
            debtor: PartyId(1),
            account: Some(AccountId(1)),
            identification: Some("M-0001".into()),
            mandate_type: MandateType::Recurrent,
            scheme: Scheme::Core,
            signature_date: NaiveDate::from_ymd_opt(2026, 1, 5),
            state,
        }
    }

    #[test]
    fn validated_mandate_requires_account_and_signature() {
        let mut m = mandate(MandateState::Validated);
        assert!(m.validate().is_empty());

        m.account = None;
        m.signature_date = None;
        let errors = m.validate();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn usable_requires_account_and_live_state() {
        assert!(mandate(MandateState::Requested).is_usable());
        assert!(mandate(MandateState::Validated).is_usable());
        assert!(!mandate(MandateState::Draft).is_usable());
        assert!(!mandate(MandateState::Canceled).is_usable());

        let mut m = mandate(MandateState::Validated);
        m.account = None;
        assert!(!m.is_usable());
    }

    #[test]
    fn sequence_type_follows_mandate_type() {
        let mut m = mandate(MandateState::Validated);
        assert_eq!(m.sequence_type(), SequenceType::Recurrent);
        m.mandate_type = MandateType::OneOff;
        assert_eq!(m.sequence_type(), SequenceType::OneOff);
    }

    #[test]
    fn duplicate_resets_lifecycle_fields() {
        let copy = mandate(MandateState::Validated).duplicate(MandateId(2));
        assert_eq!(copy.state, MandateState::Draft);
        assert_eq!(copy.identification, None);
        assert_eq!(copy.signature_date, None);
        assert_eq!(copy.account, Some(AccountId(1)));
    }
}
