//! End-to-end generation tests: message workflow, document grouping and
//! the rendered pain.008 text.

#![cfg(feature = "pain008")]

use chrono::NaiveDate;
use incasso::core::*;
use incasso::pain008::{self, build_document};
use rust_decimal_macros::dec;

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

struct World {
    reg: Registry,
    condo: CreditorId,
    group: GroupId,
    message: MessageId,
}

/// A condominium with three units on one March group: 101A and 102B
/// collect under CORE, 103C under B2B. The group is attached to a draft
/// message.
fn world(feed: &str) -> World {
    let mut reg = Registry::new(monday());
    let bank = reg.add_bank("Banco Demo", Some("DEMOESM1XXX"), CharsetMode::Ascii);
    let condo = reg.add_creditor("Comunidad Calle Mayor 1", None, Some("ES00000000000"));
    reg.set_creditor_business_code(condo, "ZZZ").unwrap();
    reg.compute_creditor_identifier(condo).unwrap();
    let condo_party = reg.add_party("Comunidad Calle Mayor 1");
    let condo_account = reg.add_account(bank, condo_party, "ES6621000418401234567891");

    let debtors = [
        ("101A", "Ana García", "ES9121000418450200051332", Scheme::Core),
        ("102B", "Bruno Díaz", "ES7921000813610123456789", Scheme::Core),
        ("103C", "Carla Ruiz SL", "ES1000492352082414205416", Scheme::B2b),
    ];
    for (i, (unit_name, owner_name, iban, scheme)) in debtors.into_iter().enumerate() {
        let unit = reg.add_unit(condo, unit_name);
        let owner = reg.add_party(owner_name);
        let account = reg.add_account(bank, owner, iban);
        let mandate = reg
            .new_mandate(NewMandate {
                creditor: condo,
                debtor: owner,
                account: Some(account),
                identification: Some(format!("MNDT-000{}", i + 1)),
                mandate_type: None,
                scheme: Some(scheme),
                signature_date: NaiveDate::from_ymd_opt(2026, 1, 5),
            })
            .unwrap();
        reg.transition_mandate(mandate, MandateState::Requested).unwrap();
        reg.transition_mandate(mandate, MandateState::Validated).unwrap();
        reg.add_link(unit, owner, Some("owner"), Some(mandate)).unwrap();
    }

    let group = reg
        .add_group(NewGroup {
            reference: "G-2026-03".into(),
            creditor: condo,
            account: condo_account,
            date: monday(),
            batch_booking: Some(true),
            charge_bearer: Some(ChargeBearer::ServiceLevel),
        })
        .unwrap();
    reg.generate_fees(group, feed).unwrap();

    let message = reg
        .new_message(condo, "MSG-2026-03", MessageFlavor::Pain008_001_02)
        .unwrap();
    reg.attach_group(message, group).unwrap();

    World {
        reg,
        condo,
        group,
        message,
    }
}

const FEED: &str = "101A;150,00;March fee\n102B;95,50;March fee\n103C;80,00;March fee\n";

#[test]
fn generate_commits_text_and_states() {
    let mut world = world(FEED);
    pain008::generate_message(&mut world.reg, world.message).unwrap();

    let message = world.reg.message(world.message).unwrap();
    assert_eq!(message.state, MessageState::Generated);
    let xml = message.text.as_deref().unwrap();
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(xml.contains("urn:iso:std:iso:20022:tech:xsd:pain.008.001.02"));
    assert!(xml.contains("<MsgId>MSG-2026-03</MsgId>"));
    assert!(xml.contains("<CreDtTm>2026-03-02T00:00:00</CreDtTm>"));

    for id in world.reg.message_payments(world.message) {
        assert_eq!(
            world.reg.payment(id).unwrap().state,
            PaymentState::Approved
        );
    }
}

#[test]
fn one_block_per_date_and_scheme() {
    let mut world = world(FEED);
    pain008::generate_message(&mut world.reg, world.message).unwrap();
    let message = world.reg.message(world.message).unwrap();
    let xml = message.text.as_deref().unwrap();

    assert_eq!(xml.matches("<PmtInf>").count(), 2);
    assert_eq!(xml.matches("<Cd>CORE</Cd>").count(), 1);
    assert_eq!(xml.matches("<Cd>B2B</Cd>").count(), 1);
    // CORE sorts ahead of B2B in the composite key.
    assert!(xml.find("<Cd>CORE</Cd>").unwrap() < xml.find("<Cd>B2B</Cd>").unwrap());
    assert!(xml.contains("<PmtInfId>MSG-2026-03-1</PmtInfId>"));
    assert!(xml.contains("<PmtInfId>MSG-2026-03-2</PmtInfId>"));

    // Header totals cover both blocks.
    assert!(xml.contains("<NbOfTxs>3</NbOfTxs>"));
    assert!(xml.contains("<CtrlSum>325.50</CtrlSum>"));
    // Per-block totals.
    assert!(xml.contains("<NbOfTxs>2</NbOfTxs>"));
    assert!(xml.contains("<CtrlSum>245.50</CtrlSum>"));
    assert!(xml.contains("<CtrlSum>80.00</CtrlSum>"));
}

#[test]
fn transaction_details_rendered() {
    let mut world = world(FEED);
    pain008::generate_message(&mut world.reg, world.message).unwrap();
    let message = world.reg.message(world.message).unwrap();
    let xml = message.text.as_deref().unwrap();

    assert!(xml.contains("<EndToEndId>G-2026-03-101A</EndToEndId>"));
    assert!(xml.contains("<InstdAmt Ccy=\"EUR\">150.00</InstdAmt>"));
    assert!(xml.contains("<MndtId>MNDT-0001</MndtId>"));
    assert!(xml.contains("<DtOfSgntr>2026-01-05</DtOfSgntr>"));
    assert!(xml.contains("<SeqTp>RCUR</SeqTp>"));
    assert!(xml.contains("<ReqdColltnDt>2026-03-02</ReqdColltnDt>"));
    assert!(xml.contains("<BtchBookg>true</BtchBookg>"));
    assert!(xml.contains("<ChrgBr>SLEV</ChrgBr>"));
    assert!(xml.contains("<Ustrd>March fee</Ustrd>"));
    assert!(xml.contains("<Id>ES82ZZZ00000000000</Id>"));
    assert!(xml.contains("<Prtry>SEPA</Prtry>"));
    assert!(xml.contains("<BIC>DEMOESM1XXX</BIC>"));
    // Debtor agent is never named.
    assert!(xml.contains("<Id>NOTPROVIDED</Id>"));

    // ASCII bank: debtor names fold their diacritics.
    assert!(xml.contains("<Nm>Ana Garcia</Nm>"));
    assert!(xml.contains("<Nm>Bruno Diaz</Nm>"));
    assert!(!xml.contains("García"));
}

/// One unit of "Comunidad Peña Alta", owned by "Ana García Peña", settled
/// on a bank with the given character set. Returns the generated text.
fn accented_world_xml(charset: CharsetMode) -> String {
    let mut reg = Registry::new(monday());
    let bank = reg.add_bank("Banco Demo", Some("DEMOESM1XXX"), charset);
    let condo = reg.add_creditor("Comunidad Peña Alta", None, Some("ES00000000000"));
    reg.compute_creditor_identifier(condo).unwrap();
    let condo_party = reg.add_party("Comunidad Peña Alta");
    let condo_account = reg.add_account(bank, condo_party, "ES6621000418401234567891");
    let unit = reg.add_unit(condo, "101A");
    let owner = reg.add_party("Ana García Peña");
    let account = reg.add_account(bank, owner, "ES9121000418450200051332");
    let mandate = reg
        .new_mandate(NewMandate {
            creditor: condo,
            debtor: owner,
            account: Some(account),
            identification: Some("MNDT-0001".into()),
            mandate_type: None,
            scheme: None,
            signature_date: NaiveDate::from_ymd_opt(2026, 1, 5),
        })
        .unwrap();
    reg.transition_mandate(mandate, MandateState::Requested).unwrap();
    reg.transition_mandate(mandate, MandateState::Validated).unwrap();
    reg.add_link(unit, owner, Some("owner"), Some(mandate)).unwrap();
    let group = reg
        .add_group(NewGroup {
            reference: "G-2026-03".into(),
            creditor: condo,
            account: condo_account,
            date: monday(),
            batch_booking: None,
            charge_bearer: None,
        })
        .unwrap();
    reg.generate_fees(group, "101A;150,00;Cuota marzo\n").unwrap();
    let message = reg
        .new_message(condo, "MSG-2026-03", MessageFlavor::Pain008_001_02)
        .unwrap();
    reg.attach_group(message, group).unwrap();
    pain008::generate_message(&mut reg, message).unwrap();
    reg.message(message).unwrap().text.clone().unwrap()
}

#[test]
fn extended_charset_keeps_national_characters() {
    // A settlement bank accepting the Spanish extended character set.
    let xml = accented_world_xml(CharsetMode::Extended("ES".into()));
    assert!(xml.contains("<Nm>Ana García Peña</Nm>"));
    assert!(xml.contains("<Nm>Comunidad Peña Alta</Nm>"));
}

#[test]
fn initiating_party_follows_bank_charset() {
    // The header name passes through the same folding as creditor and
    // debtor names.
    let xml = accented_world_xml(CharsetMode::Ascii);
    let header = &xml[..xml.find("</GrpHdr>").unwrap()];
    assert!(header.contains("<Nm>Comunidad Pena Alta</Nm>"));
    assert!(!xml.contains("Peña"));
}

#[test]
fn generation_failure_rolls_back() {
    // 103C has no feed row, so its amount stays unset and the build fails.
    let mut world = world("101A;150,00;March fee\n102B;95,50;March fee\n");
    let err = pain008::generate_message(&mut world.reg, world.message).unwrap_err();
    match err {
        IncassoError::Generation {
            reference,
            creditor,
            source,
        } => {
            assert_eq!(reference, "MSG-2026-03");
            assert_eq!(creditor, "Comunidad Calle Mayor 1");
            assert!(source.to_string().contains("has no amount"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let message = world.reg.message(world.message).unwrap();
    assert_eq!(message.state, MessageState::Draft);
    assert_eq!(message.text, None);
    for id in world.reg.message_payments(world.message) {
        assert_eq!(world.reg.payment(id).unwrap().state, PaymentState::Draft);
    }
}

#[test]
fn generation_requires_creditor_identifier() {
    let mut world = world(FEED);
    world.reg.set_creditor_identifier(world.condo, None).unwrap();
    let err = pain008::generate_message(&mut world.reg, world.message).unwrap_err();
    assert!(err.to_string().contains("no SEPA creditor identifier"));
    assert_eq!(
        world.reg.message(world.message).unwrap().state,
        MessageState::Draft
    );
    for id in world.reg.message_payments(world.message) {
        assert_eq!(world.reg.payment(id).unwrap().state, PaymentState::Draft);
    }
}

#[test]
fn generation_is_deterministic() {
    let mut world = world(FEED);
    pain008::generate_message(&mut world.reg, world.message).unwrap();
    let first = world.reg.message(world.message).unwrap().text.clone().unwrap();

    world.reg.draft_message(world.message).unwrap();
    assert_eq!(world.reg.message(world.message).unwrap().text, None);
    pain008::generate_message(&mut world.reg, world.message).unwrap();
    let second = world.reg.message(world.message).unwrap().text.clone().unwrap();
    assert_eq!(first, second);
}

#[test]
fn generate_rejects_non_draft_message() {
    let mut world = world(FEED);
    pain008::generate_message(&mut world.reg, world.message).unwrap();
    let err = pain008::generate_message(&mut world.reg, world.message).unwrap_err();
    assert!(matches!(err, IncassoError::Transition { entity: "message", .. }));
}

#[test]
fn accept_books_message_and_payments() {
    let mut world = world(FEED);
    pain008::generate_message(&mut world.reg, world.message).unwrap();
    world.reg.accept_message(world.message).unwrap();
    assert_eq!(
        world.reg.message(world.message).unwrap().state,
        MessageState::Booked
    );
    let payments = world.reg.message_payments(world.message);
    for id in &payments {
        assert_eq!(
            world.reg.payment(*id).unwrap().state,
            PaymentState::Processing
        );
    }
    // With the message booked, a payment may now succeed.
    world
        .reg
        .transition_payment(payments[0], PaymentState::Succeeded)
        .unwrap();
}

#[test]
fn cancel_fails_message_and_payments() {
    let mut world = world(FEED);
    pain008::generate_message(&mut world.reg, world.message).unwrap();
    world.reg.cancel_message(world.message).unwrap();
    assert_eq!(
        world.reg.message(world.message).unwrap().state,
        MessageState::Rejected
    );
    for id in world.reg.message_payments(world.message) {
        assert_eq!(world.reg.payment(id).unwrap().state, PaymentState::Failed);
    }
}

#[test]
fn booked_group_is_read_only() {
    let mut world = world(FEED);
    pain008::generate_message(&mut world.reg, world.message).unwrap();
    world.reg.accept_message(world.message).unwrap();

    let err = world.reg.generate_fees(world.group, FEED).unwrap_err();
    assert!(err.to_string().contains("read-only"));
    let err = world
        .reg
        .set_group_date(world.group, NaiveDate::from_ymd_opt(2026, 3, 9).unwrap())
        .unwrap_err();
    assert!(err.to_string().contains("read-only"));

    // Payments cannot slip back to draft either.
    let p = world.reg.message_payments(world.message)[0];
    world.reg.bulk_set_payment_states(&[p], PaymentState::Approved);
    let err = world.reg.transition_payment(p, PaymentState::Draft).unwrap_err();
    assert!(matches!(err, IncassoError::MessageNotDraft(_)));
}

#[test]
fn draft_resets_message_and_payments() {
    let mut world = world(FEED);
    pain008::generate_message(&mut world.reg, world.message).unwrap();
    world.reg.draft_message(world.message).unwrap();
    let message = world.reg.message(world.message).unwrap();
    assert_eq!(message.state, MessageState::Draft);
    assert_eq!(message.text, None);
    for id in world.reg.message_payments(world.message) {
        assert_eq!(world.reg.payment(id).unwrap().state, PaymentState::Draft);
    }
    // Mutable again: the group can be regenerated.
    world.reg.generate_fees(world.group, FEED).unwrap();
}

#[test]
fn groups_in_a_message_share_one_bank() {
    let mut world = world(FEED);
    let other_bank = world
        .reg
        .add_bank("Otro Banco", Some("OTROESM1XXX"), CharsetMode::Ascii);
    let holder = world.reg.add_party("Comunidad Calle Mayor 1");
    let other_account = world
        .reg
        .add_account(other_bank, holder, "ES9820385778983000760236");
    let group2 = world
        .reg
        .add_group(NewGroup {
            reference: "G-2026-03-EXTRA".into(),
            creditor: world.condo,
            account: other_account,
            date: monday(),
            batch_booking: None,
            charge_bearer: None,
        })
        .unwrap();
    let err = world.reg.attach_group(world.message, group2).unwrap_err();
    assert!(err.to_string().contains("different bank"));
}

#[test]
fn document_model_matches_totals() {
    let world = world(FEED);
    // Build the document directly from the draft data.
    let document = build_document(&world.reg, world.message).unwrap();
    assert_eq!(document.blocks.len(), 2);
    assert_eq!(document.transaction_count(), 3);
    assert_eq!(document.control_sum(), dec!(325.50));
    let (count, sum) = world.reg.message_totals(world.message);
    assert_eq!(count, document.transaction_count());
    assert_eq!(sum, document.control_sum());

    let core_block = &document.blocks[0];
    assert_eq!(core_block.scheme, Scheme::Core);
    assert_eq!(core_block.transaction_count(), 2);
    assert_eq!(core_block.control_sum(), dec!(245.50));
    // Both CORE payments share the full grouping key, so they land in one
    // batch.
    assert_eq!(core_block.batches.len(), 1);
    assert_eq!(core_block.batches[0].group_reference, "G-2026-03");
    assert_eq!(core_block.batches[0].sequence_type, SequenceType::Recurrent);
}

#[test]
fn description_text_is_normalized() {
    // '&' is outside the ISO20022 basic set; it becomes a space before the
    // XML layer ever sees it.
    let mut world = world("101A;150,00;Cuota & gastos\n102B;95,50;Fee\n103C;80,00;Fee\n");
    pain008::generate_message(&mut world.reg, world.message).unwrap();
    let message = world.reg.message(world.message).unwrap();
    let xml = message.text.as_deref().unwrap();
    assert!(xml.contains("<Ustrd>Cuota   gastos</Ustrd>"));
}
