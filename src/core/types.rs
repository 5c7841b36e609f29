use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a creditor company (condominium).
    CreditorId
);
id_type!(
    /// Identifier of a party (debtor or company holder).
    PartyId
);
id_type!(
    /// Identifier of a bank.
    BankId
);
id_type!(
    /// Identifier of a bank account.
    AccountId
);
id_type!(
    /// Identifier of a condominium unit.
    UnitId
);
id_type!(
    /// Identifier of a debtor-unit-role association.
    LinkId
);
id_type!(
    /// Identifier of a SEPA mandate.
    MandateId
);
id_type!(
    /// Identifier of a payment.
    PaymentId
);
id_type!(
    /// Identifier of a payment group.
    GroupId
);
id_type!(
    /// Identifier of a pain message.
    MessageId
);

/// A creditor company — the condominium collecting fees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Creditor {
    pub id: CreditorId,
    pub name: String,
    /// Parent company for sub-condominium hierarchies.
    pub parent: Option<CreditorId>,
    pub active: bool,
    /// Tax identifier the creditor identifier is derived from (e.g. "ESB12345678").
    pub tax_identifier: Option<String>,
    /// 3-character business code embedded in the SEPA creditor identifier.
    pub creditor_business_code: String,
    /// SEPA creditor identifier (AT-02), e.g. "ES82ZZZ00000000000".
    pub sepa_creditor_identifier: Option<String>,
}

/// A natural or legal person that can be debited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub id: PartyId,
    pub name: String,
    pub active: bool,
}

/// A bank, carrying the ISO20022 character-set configuration used when
/// rendering free text into messages submitted to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bank {
    pub id: BankId,
    pub name: String,
    pub bic: Option<String>,
    pub charset: CharsetMode,
}

/// Character-set restriction applied to free text in generated messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharsetMode {
    /// Plain ISO20022 ASCII subset.
    Ascii,
    /// ASCII subset extended with a country character set (ISO 3166-1 alpha-2).
    Extended(String),
}

/// An IBAN-type bank account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: AccountId,
    pub bank: BankId,
    pub owner: PartyId,
    pub iban: String,
    pub active: bool,
}

/// A condominium unit (apartment) belonging to a creditor company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub company: CreditorId,
    pub name: String,
}

/// Association of a debtor party with a unit under a given role.
/// May reference the mandate used to collect that unit's fees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitLink {
    pub id: LinkId,
    pub unit: UnitId,
    pub party: PartyId,
    pub role: Option<String>,
    pub active: bool,
    pub mandate: Option<MandateId>,
}

/// SEPA direct debit scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scheme {
    /// CORE — consumer scheme.
    Core,
    /// B2B — business to business scheme.
    B2b,
}

impl Scheme {
    /// Local instrument code as written into the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Core => "CORE",
            Self::B2b => "B2B",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "CORE" => Some(Self::Core),
            "B2B" => Some(Self::B2b),
            _ => None,
        }
    }
}

/// Mandate collection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MandateType {
    Recurrent,
    OneOff,
}

/// SEPA sequence type of a single collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SequenceType {
    /// FRST — first collection of a recurrent mandate.
    First,
    /// RCUR — recurrent collection.
    Recurrent,
    /// FNAL — final collection of a recurrent mandate.
    Final,
    /// OOFF — one-off collection.
    OneOff,
}

impl SequenceType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::First => "FRST",
            Self::Recurrent => "RCUR",
            Self::Final => "FNAL",
            Self::OneOff => "OOFF",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "FRST" => Some(Self::First),
            "RCUR" => Some(Self::Recurrent),
            "FNAL" => Some(Self::Final),
            "OOFF" => Some(Self::OneOff),
            _ => None,
        }
    }
}

/// Who pays the transaction fees (ISO20022 ChrgBr).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargeBearer {
    /// DEBT — borne by debtor.
    Debtor,
    /// CRED — borne by creditor.
    Creditor,
    /// SHAR — shared.
    Shared,
    /// SLEV — following the scheme's service level.
    ServiceLevel,
}

impl ChargeBearer {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Debtor => "DEBT",
            Self::Creditor => "CRED",
            Self::Shared => "SHAR",
            Self::ServiceLevel => "SLEV",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "DEBT" => Some(Self::Debtor),
            "CRED" => Some(Self::Creditor),
            "SHAR" => Some(Self::Shared),
            "SLEV" => Some(Self::ServiceLevel),
            _ => None,
        }
    }
}
