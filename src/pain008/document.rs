//! Typed intermediate representation of a customer direct debit
//! initiation, and the grouping algorithm that builds it.
//!
//! A document holds one payment-information block per distinct
//! `(collection date, scheme)` pair. Within a block, payments stay in
//! the order given by the composite sort key
//! `(date, group, sequence type, scheme)`, partitioned into runs that
//! share the whole key. The same input data always serializes to the
//! same bytes.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::writer::{XmlResult, XmlWriter, format_amount};
use crate::core::charset::normalize;
use crate::core::{
    ChargeBearer, CharsetMode, GroupId, IncassoError, MessageFlavor, MessageId, Registry, Scheme,
    SequenceType,
};

/// One rendered collection file.
#[derive(Debug, Clone)]
pub struct Document {
    pub header: GroupHeader,
    pub flavor: MessageFlavor,
    pub blocks: Vec<PaymentBlock>,
}

/// GrpHdr contents.
#[derive(Debug, Clone)]
pub struct GroupHeader {
    pub message_id: String,
    /// Fixed to the registry date so output is reproducible.
    pub creation_date_time: String,
    pub initiating_party: String,
}

/// One PmtInf block — a `(collection date, scheme)` partition.
#[derive(Debug, Clone)]
pub struct PaymentBlock {
    pub id: String,
    pub scheme: Scheme,
    pub collection_date: NaiveDate,
    pub batch_booking: Option<bool>,
    pub charge_bearer: Option<ChargeBearer>,
    pub creditor_name: String,
    pub creditor_iban: String,
    pub creditor_bic: Option<String>,
    pub creditor_identifier: String,
    pub batches: Vec<TransactionBatch>,
}

impl PaymentBlock {
    pub fn transaction_count(&self) -> u32 {
        self.batches.iter().map(|b| b.entries.len() as u32).sum()
    }

    pub fn control_sum(&self) -> Decimal {
        self.batches
            .iter()
            .flat_map(|b| &b.entries)
            .map(|e| e.amount)
            .sum()
    }
}

/// A run of payments sharing `(date, group, sequence type, scheme)`.
#[derive(Debug, Clone)]
pub struct TransactionBatch {
    pub group_reference: String,
    pub sequence_type: SequenceType,
    pub entries: Vec<TransactionEntry>,
}

/// One DrctDbtTxInf entry.
#[derive(Debug, Clone)]
pub struct TransactionEntry {
    pub end_to_end_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub mandate_identification: String,
    pub signature_date: Option<NaiveDate>,
    pub debtor_name: String,
    pub debtor_iban: String,
    pub description: Option<String>,
}

impl Document {
    pub fn transaction_count(&self) -> u32 {
        self.blocks.iter().map(|b| b.transaction_count()).sum()
    }

    pub fn control_sum(&self) -> Decimal {
        self.blocks.iter().map(|b| b.control_sum()).sum()
    }
}

/// Build the document for a message from the registry's current data.
///
/// Every payment must carry an amount and reference a mandate with an
/// identification and a debitable account; anything missing fails the
/// build (and with it, the enclosing generation).
pub fn build_document(reg: &Registry, id: MessageId) -> Result<Document, IncassoError> {
    let message = reg.message(id)?;
    let creditor = reg.creditor(message.creditor)?;
    let creditor_identifier = creditor.sepa_creditor_identifier.clone().ok_or_else(|| {
        IncassoError::Validation(format!(
            "creditor '{}' has no SEPA creditor identifier",
            creditor.name
        ))
    })?;

    // The header text follows the charset of the settlement bank. All
    // attached groups settle on the same bank, so the first group decides.
    let header_charset = match reg.message_groups(id).first() {
        Some(group_id) => {
            let group = reg.group(*group_id)?;
            reg.bank(reg.account(group.account)?.bank)?.charset.clone()
        }
        None => CharsetMode::Ascii,
    };

    // Sort by the composite grouping key; the payment id breaks remaining
    // ties so the order is total.
    let payment_ids = reg.message_payments(id);
    let mut keyed = Vec::with_capacity(payment_ids.len());
    for pid in payment_ids {
        let p = reg.payment(pid)?;
        let scheme = reg.mandate(p.mandate)?.scheme;
        keyed.push(((p.date, p.group, p.sequence_type, scheme, p.id), pid));
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    let mut blocks: Vec<PaymentBlock> = Vec::new();
    let mut current_run: Option<(NaiveDate, GroupId, SequenceType, Scheme)> = None;

    for ((date, group_id, sequence_type, scheme, _), pid) in keyed {
        let payment = reg.payment(pid)?;
        let group = reg.group(group_id)?;
        let mandate = reg.mandate(payment.mandate)?;
        let debtor = reg.party(payment.party)?;

        let settlement_account = reg.account(group.account)?;
        let settlement_bank = reg.bank(settlement_account.bank)?;
        let charset = &settlement_bank.charset;

        let amount = payment.amount.ok_or_else(|| {
            IncassoError::Validation(format!("payment {} has no amount", payment.id))
        })?;
        let mandate_identification = mandate.identification.clone().ok_or_else(|| {
            IncassoError::Validation(format!("mandate {} has no identification", mandate.id))
        })?;
        let debtor_account_id = mandate.account.ok_or_else(|| {
            IncassoError::Validation(format!("mandate {} has no account number", mandate.id))
        })?;
        let debtor_iban = reg.account(debtor_account_id)?.iban.clone();

        let entry = TransactionEntry {
            end_to_end_id: payment
                .end_to_end_id
                .clone()
                .unwrap_or_else(|| payment.id.to_string()),
            amount,
            currency: payment.currency.clone(),
            mandate_identification,
            signature_date: mandate.signature_date,
            debtor_name: normalize(&debtor.name, charset),
            debtor_iban,
            description: payment.description.as_deref().map(|d| normalize(d, charset)),
        };

        // Find or open the (date, scheme) block, preserving first
        // appearance order.
        let block_pos = blocks
            .iter()
            .position(|b| b.collection_date == date && b.scheme == scheme);
        let block_pos = match block_pos {
            Some(pos) => pos,
            None => {
                blocks.push(PaymentBlock {
                    id: format!("{}-{}", message.reference, blocks.len() + 1),
                    scheme,
                    collection_date: date,
                    batch_booking: group.batch_booking,
                    charge_bearer: group.charge_bearer,
                    creditor_name: normalize(&creditor.name, charset),
                    creditor_iban: settlement_account.iban.clone(),
                    creditor_bic: settlement_bank.bic.clone(),
                    creditor_identifier: creditor_identifier.clone(),
                    batches: Vec::new(),
                });
                current_run = None;
                blocks.len() - 1
            }
        };

        let key = (date, group_id, sequence_type, scheme);
        let block = &mut blocks[block_pos];
        if current_run != Some(key) || block.batches.is_empty() {
            block.batches.push(TransactionBatch {
                group_reference: group.reference.clone(),
                sequence_type,
                entries: Vec::new(),
            });
            current_run = Some(key);
        }
        if let Some(batch) = block.batches.last_mut() {
            batch.entries.push(entry);
        }
    }

    Ok(Document {
        header: GroupHeader {
            message_id: message.reference.clone(),
            creation_date_time: format!("{}T00:00:00", reg.today),
            initiating_party: normalize(&creditor.name, &header_charset),
        },
        flavor: message.flavor,
        blocks,
    })
}

/// Serialize the document to pain.008 XML text.
pub fn to_xml(document: &Document) -> XmlResult {
    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs(
        "Document",
        &[
            ("xmlns", document.flavor.namespace()),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
        ],
    )?;
    w.start_element("CstmrDrctDbtInitn")?;

    w.start_element("GrpHdr")?;
    w.text_element("MsgId", &document.header.message_id)?;
    w.text_element("CreDtTm", &document.header.creation_date_time)?;
    w.text_element("NbOfTxs", &document.transaction_count().to_string())?;
    w.text_element("CtrlSum", &format_amount(document.control_sum()))?;
    w.start_element("InitgPty")?;
    w.text_element("Nm", &document.header.initiating_party)?;
    w.end_element("InitgPty")?;
    w.end_element("GrpHdr")?;

    for block in &document.blocks {
        write_payment_block(&mut w, block)?;
    }

    w.end_element("CstmrDrctDbtInitn")?;
    w.end_element("Document")?;
    w.into_string()
}

fn write_payment_block(w: &mut XmlWriter, block: &PaymentBlock) -> Result<(), IncassoError> {
    w.start_element("PmtInf")?;
    w.text_element("PmtInfId", &block.id)?;
    w.text_element("PmtMtd", "DD")?;
    if let Some(batch_booking) = block.batch_booking {
        w.text_element("BtchBookg", if batch_booking { "true" } else { "false" })?;
    }
    w.text_element("NbOfTxs", &block.transaction_count().to_string())?;
    w.text_element("CtrlSum", &format_amount(block.control_sum()))?;

    w.start_element("PmtTpInf")?;
    w.start_element("SvcLvl")?;
    w.text_element("Cd", "SEPA")?;
    w.end_element("SvcLvl")?;
    w.start_element("LclInstrm")?;
    w.text_element("Cd", block.scheme.code())?;
    w.end_element("LclInstrm")?;
    w.end_element("PmtTpInf")?;

    w.text_element("ReqdColltnDt", &block.collection_date.to_string())?;

    w.start_element("Cdtr")?;
    w.text_element("Nm", &block.creditor_name)?;
    w.end_element("Cdtr")?;
    w.start_element("CdtrAcct")?;
    w.start_element("Id")?;
    w.text_element("IBAN", &block.creditor_iban)?;
    w.end_element("Id")?;
    w.end_element("CdtrAcct")?;
    w.start_element("CdtrAgt")?;
    w.start_element("FinInstnId")?;
    match &block.creditor_bic {
        Some(bic) => {
            w.text_element("BIC", bic)?;
        }
        None => {
            w.start_element("Othr")?;
            w.text_element("Id", "NOTPROVIDED")?;
            w.end_element("Othr")?;
        }
    }
    w.end_element("FinInstnId")?;
    w.end_element("CdtrAgt")?;

    if let Some(charge_bearer) = block.charge_bearer {
        w.text_element("ChrgBr", charge_bearer.code())?;
    }

    w.start_element("CdtrSchmeId")?;
    w.start_element("Id")?;
    w.start_element("PrvtId")?;
    w.start_element("Othr")?;
    w.text_element("Id", &block.creditor_identifier)?;
    w.start_element("SchmeNm")?;
    w.text_element("Prtry", "SEPA")?;
    w.end_element("SchmeNm")?;
    w.end_element("Othr")?;
    w.end_element("PrvtId")?;
    w.end_element("Id")?;
    w.end_element("CdtrSchmeId")?;

    for batch in &block.batches {
        for entry in &batch.entries {
            write_transaction(w, batch, entry)?;
        }
    }

    w.end_element("PmtInf")?;
    Ok(())
}

fn write_transaction(
    w: &mut XmlWriter,
    batch: &TransactionBatch,
    entry: &TransactionEntry,
) -> Result<(), IncassoError> {
    w.start_element("DrctDbtTxInf")?;
    w.start_element("PmtId")?;
    w.text_element("EndToEndId", &entry.end_to_end_id)?;
    w.end_element("PmtId")?;

    w.start_element("PmtTpInf")?;
    w.text_element("SeqTp", batch.sequence_type.code())?;
    w.end_element("PmtTpInf")?;

    w.amount_element("InstdAmt", entry.amount, &entry.currency)?;

    w.start_element("DrctDbtTx")?;
    w.start_element("MndtRltdInf")?;
    w.text_element("MndtId", &entry.mandate_identification)?;
    if let Some(signature_date) = entry.signature_date {
        w.text_element("DtOfSgntr", &signature_date.to_string())?;
    }
    w.end_element("MndtRltdInf")?;
    w.end_element("DrctDbtTx")?;

    w.start_element("DbtrAgt")?;
    w.start_element("FinInstnId")?;
    w.start_element("Othr")?;
    w.text_element("Id", "NOTPROVIDED")?;
    w.end_element("Othr")?;
    w.end_element("FinInstnId")?;
    w.end_element("DbtrAgt")?;

    w.start_element("Dbtr")?;
    w.text_element("Nm", &entry.debtor_name)?;
    w.end_element("Dbtr")?;
    w.start_element("DbtrAcct")?;
    w.start_element("Id")?;
    w.text_element("IBAN", &entry.debtor_iban)?;
    w.end_element("Id")?;
    w.end_element("DbtrAcct")?;

    if let Some(description) = &entry.description {
        w.start_element("RmtInf")?;
        w.text_element("Ustrd", description)?;
        w.end_element("RmtInf")?;
    }

    w.end_element("DrctDbtTxInf")?;
    Ok(())
}
