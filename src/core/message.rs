//! Pain messages — one ISO20022 collection file per message.

use serde::{Deserialize, Serialize};

use super::types::{CreditorId, MessageId};

/// Lifecycle state of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageState {
    Draft,
    Generated,
    Booked,
    Rejected,
}

impl MessageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Generated => "generated",
            Self::Booked => "booked",
            Self::Rejected => "rejected",
        }
    }

    pub fn can_transition(self, to: MessageState) -> bool {
        use MessageState::*;
        matches!(
            (self, to),
            (Draft, Generated)
                | (Generated, Draft)
                | (Generated, Booked)
                | (Generated, Rejected)
                | (Booked, Rejected)
                | (Rejected, Draft)
        )
    }
}

/// Schema flavor the message renders with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageFlavor {
    Pain008_001_02,
}

impl MessageFlavor {
    /// XML namespace of the flavor.
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::Pain008_001_02 => "urn:iso:std:iso:20022:tech:xsd:pain.008.001.02",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pain008_001_02 => "pain.008.001.02",
        }
    }
}

/// One collection message covering one or more payment groups that share a
/// single settlement bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    /// Reference, unique per creditor.
    pub reference: String,
    pub creditor: CreditorId,
    pub flavor: MessageFlavor,
    /// Rendered XML text, set when generation succeeds.
    pub text: Option<String>,
    pub state: MessageState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        use MessageState::*;
        assert!(Draft.can_transition(Generated));
        assert!(Generated.can_transition(Draft));
        assert!(Generated.can_transition(Booked));
        assert!(Generated.can_transition(Rejected));
        assert!(Booked.can_transition(Rejected));
        assert!(Rejected.can_transition(Draft));

        assert!(!Draft.can_transition(Booked));
        assert!(!Draft.can_transition(Rejected));
        assert!(!Booked.can_transition(Draft));
        assert!(!Booked.can_transition(Generated));
        assert!(!Rejected.can_transition(Generated));
        assert!(!Rejected.can_transition(Booked));
    }
}
