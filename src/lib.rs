//! # incasso
//!
//! SEPA Direct Debit collection for condominium fee billing: mandate
//! lifecycle, payment batching and ISO20022 `pain.008` generation.
//!
//! All monetary values use [`rust_decimal::Decimal`] — never floating point.
//! Records live in a [`core::Registry`], an in-memory transactional store:
//! every operation applies completely or not at all.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use incasso::core::*;
//!
//! let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
//! let mut reg = Registry::new(today);
//!
//! let bank = reg.add_bank("Banco Demo", Some("DEMOESM1XXX"), CharsetMode::Ascii);
//! let condo_party = reg.add_party("Comunidad Calle Mayor 1");
//! let condo = reg.add_creditor("Comunidad Calle Mayor 1", None, Some("ES00000000000"));
//! reg.compute_creditor_identifier(condo).unwrap();
//!
//! let owner = reg.add_party("Ana García");
//! let owner_account = reg.add_account(bank, owner, "ES9121000418450200051332");
//! let mandate = reg
//!     .new_mandate(NewMandate {
//!         creditor: condo,
//!         debtor: owner,
//!         account: Some(owner_account),
//!         identification: Some("MNDT-0001".into()),
//!         mandate_type: None,
//!         scheme: None,
//!         signature_date: NaiveDate::from_ymd_opt(2026, 1, 5),
//!     })
//!     .unwrap();
//! reg.transition_mandate(mandate, MandateState::Requested).unwrap();
//! reg.transition_mandate(mandate, MandateState::Validated).unwrap();
//! # let _ = condo_party;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `pain008` (default) | pain.008 document building and XML generation |

pub mod core;

#[cfg(feature = "pain008")]
pub mod pain008;

// Re-export core types at crate root for convenience
pub use crate::core::*;
