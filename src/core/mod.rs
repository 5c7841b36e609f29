//! Core domain model: mandates, payments, groups, messages and the
//! registry that owns them.

pub mod calendar;
pub mod charset;
mod error;
mod group;
pub mod identifier;
mod mandate;
mod message;
mod payment;
mod registry;
mod types;

pub use error::{IncassoError, ValidationError, Warning, into_validation_result};
pub use group::{FeedRow, PaymentGroup, parse_feed, parse_feed_amount, select_feed_row};
pub use mandate::{Mandate, MandateState};
pub use message::{Message, MessageFlavor, MessageState};
pub use payment::{Payment, PaymentState};
pub use registry::{GroupDefaults, MandateDefaults, NewGroup, NewMandate, Registry};
pub use types::*;
