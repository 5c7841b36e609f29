//! pain.008 message generation.
//!
//! The generation pipeline takes a draft message, approves every payment
//! of every attached group, renders the collection file from the grouped
//! payment data and commits — or, on any rendering error, restores every
//! payment to its previous state and leaves the message in draft.
//!
//! # Example
//!
//! ```no_run
//! use incasso::core::{MessageId, Registry};
//! use incasso::pain008;
//!
//! # fn demo(reg: &mut Registry, message: MessageId) -> Result<(), incasso::core::IncassoError> {
//! pain008::generate_message(reg, message)?;
//! let xml = reg.message(message)?.text.as_deref().unwrap_or_default();
//! # let _ = xml;
//! # Ok(())
//! # }
//! ```

mod document;
pub(crate) mod writer;

pub use document::{
    Document, GroupHeader, PaymentBlock, TransactionBatch, TransactionEntry, build_document,
    to_xml,
};
pub use writer::format_amount;

use crate::core::{
    IncassoError, MessageId, MessageState, PaymentState, Registry, into_validation_result,
};

/// Generate the message: all-or-nothing.
///
/// On success the message holds the rendered text, every contained
/// payment is `approved` and the state is `generated`. On failure no
/// payment state changes, the message stays `draft` and the error names
/// the message reference and creditor.
pub fn generate_message(reg: &mut Registry, id: MessageId) -> Result<(), IncassoError> {
    let message = reg.message(id)?;
    if message.state != MessageState::Draft {
        return Err(IncassoError::Transition {
            entity: "message",
            from: message.state.as_str(),
            to: MessageState::Generated.as_str(),
        });
    }
    let reference = message.reference.clone();
    let creditor_name = reg.creditor(message.creditor)?.name.clone();

    // Structural validation blocks generation regardless of workflow state.
    into_validation_result(reg.validate_message(id)?).map_err(|source| {
        IncassoError::Generation {
            reference: reference.clone(),
            creditor: creditor_name.clone(),
            source: Box::new(source),
        }
    })?;

    // Snapshot the states we are about to mutate.
    let payment_ids = reg.message_payments(id);
    let mut snapshot: Vec<(crate::core::PaymentId, PaymentState)> =
        Vec::with_capacity(payment_ids.len());
    for pid in &payment_ids {
        snapshot.push((*pid, reg.payment(*pid)?.state));
    }

    // Approve in bulk; the message's own state authorizes the bypass of
    // the per-payment workflow checks.
    reg.bulk_set_payment_states(&payment_ids, PaymentState::Approved);

    match build_document(reg, id).and_then(|document| to_xml(&document)) {
        Ok(xml) => {
            reg.commit_generated(id, xml);
            Ok(())
        }
        Err(source) => {
            // Roll back the approval side effect.
            for (pid, state) in snapshot {
                reg.bulk_set_payment_states(&[pid], state);
            }
            Err(IncassoError::Generation {
                reference,
                creditor: creditor_name,
                source: Box::new(source),
            })
        }
    }
}
