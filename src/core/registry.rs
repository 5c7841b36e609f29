//! In-memory registry owning every record and implementing the
//! cross-record operations: workflow transitions with their cascades,
//! uniqueness checks, batch fee generation and bulk updates.
//!
//! All mutating operations are atomic: they either apply completely or
//! leave the registry untouched. Fallible work happens before the first
//! mutation, or against a snapshot that is restored on failure.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::error::{IncassoError, ValidationError, Warning, into_validation_result};
use super::group::{PaymentGroup, parse_feed, parse_feed_amount, select_feed_row};
use super::identifier::{
    MAX_IDENTIFICATION_LEN, derive_creditor_identifier, is_valid_creditor_identifier,
    normalize_identification, validate_sepa_text,
};
use super::mandate::{Mandate, MandateState};
use super::message::{Message, MessageFlavor, MessageState};
use super::payment::{Payment, PaymentState};
use super::types::*;

/// Registry-level defaults for new payment groups.
#[derive(Debug, Clone, Default)]
pub struct GroupDefaults {
    pub batch_booking: Option<bool>,
    pub charge_bearer: Option<ChargeBearer>,
}

/// Registry-level defaults for new mandates.
#[derive(Debug, Clone)]
pub struct MandateDefaults {
    pub mandate_type: MandateType,
    pub scheme: Scheme,
}

impl Default for MandateDefaults {
    fn default() -> Self {
        Self {
            mandate_type: MandateType::Recurrent,
            scheme: Scheme::Core,
        }
    }
}

/// Fields for creating a mandate. Unset type/scheme fall back to the
/// registry defaults.
#[derive(Debug, Clone)]
pub struct NewMandate {
    pub creditor: CreditorId,
    pub debtor: PartyId,
    pub account: Option<AccountId>,
    pub identification: Option<String>,
    pub mandate_type: Option<MandateType>,
    pub scheme: Option<Scheme>,
    pub signature_date: Option<NaiveDate>,
}

/// Fields for creating a payment group. Unset booking/charge-bearer fall
/// back to the registry defaults.
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub reference: String,
    pub creditor: CreditorId,
    pub account: AccountId,
    pub date: NaiveDate,
    pub batch_booking: Option<bool>,
    pub charge_bearer: Option<ChargeBearer>,
}

/// The transactional store.
#[derive(Debug, Clone)]
pub struct Registry {
    /// Reference date for past-date checks; fixed at construction so a
    /// whole settlement run sees one consistent "today".
    pub today: NaiveDate,
    pub group_defaults: GroupDefaults,
    pub mandate_defaults: MandateDefaults,
    pub(crate) banks: BTreeMap<BankId, Bank>,
    pub(crate) accounts: BTreeMap<AccountId, BankAccount>,
    pub(crate) creditors: BTreeMap<CreditorId, Creditor>,
    pub(crate) parties: BTreeMap<PartyId, Party>,
    pub(crate) units: BTreeMap<UnitId, Unit>,
    pub(crate) links: BTreeMap<LinkId, UnitLink>,
    pub(crate) mandates: BTreeMap<MandateId, Mandate>,
    pub(crate) payments: BTreeMap<PaymentId, Payment>,
    pub(crate) groups: BTreeMap<GroupId, PaymentGroup>,
    pub(crate) messages: BTreeMap<MessageId, Message>,
    next_id: u64,
}

impl Registry {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            group_defaults: GroupDefaults::default(),
            mandate_defaults: MandateDefaults::default(),
            banks: BTreeMap::new(),
            accounts: BTreeMap::new(),
            creditors: BTreeMap::new(),
            parties: BTreeMap::new(),
            units: BTreeMap::new(),
            links: BTreeMap::new(),
            mandates: BTreeMap::new(),
            payments: BTreeMap::new(),
            groups: BTreeMap::new(),
            messages: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ------------------------------------------------------------------
    // Master data

    pub fn add_bank(&mut self, name: &str, bic: Option<&str>, charset: CharsetMode) -> BankId {
        let id = BankId(self.next_id());
        self.banks.insert(
            id,
            Bank {
                id,
                name: name.to_string(),
                bic: bic.map(String::from),
                charset,
            },
        );
        id
    }

    pub fn add_party(&mut self, name: &str) -> PartyId {
        let id = PartyId(self.next_id());
        self.parties.insert(
            id,
            Party {
                id,
                name: name.to_string(),
                active: true,
            },
        );
        id
    }

    pub fn add_account(&mut self, bank: BankId, owner: PartyId, iban: &str) -> AccountId {
        let id = AccountId(self.next_id());
        self.accounts.insert(
            id,
            BankAccount {
                id,
                bank,
                owner,
                iban: iban.to_string(),
                active: true,
            },
        );
        id
    }

    pub fn add_creditor(
        &mut self,
        name: &str,
        parent: Option<CreditorId>,
        tax_identifier: Option<&str>,
    ) -> CreditorId {
        let id = CreditorId(self.next_id());
        self.creditors.insert(
            id,
            Creditor {
                id,
                name: name.to_string(),
                parent,
                active: true,
                tax_identifier: tax_identifier.map(String::from),
                creditor_business_code: "000".to_string(),
                sepa_creditor_identifier: None,
            },
        );
        id
    }

    pub fn add_unit(&mut self, company: CreditorId, name: &str) -> UnitId {
        let id = UnitId(self.next_id());
        self.units.insert(
            id,
            Unit {
                id,
                company,
                name: name.to_string(),
            },
        );
        id
    }

    /// Associate a party with a unit under a role. Within one unit and
    /// role, at most one active link may carry a mandate.
    pub fn add_link(
        &mut self,
        unit: UnitId,
        party: PartyId,
        role: Option<&str>,
        mandate: Option<MandateId>,
    ) -> Result<LinkId, IncassoError> {
        if mandate.is_some() {
            let taken = self.links.values().any(|l| {
                l.unit == unit && l.role.as_deref() == role && l.active && l.mandate.is_some()
            });
            if taken {
                return Err(IncassoError::Validation(format!(
                    "unit {unit} already has an active link with a mandate for this role"
                )));
            }
        }
        let id = LinkId(self.next_id());
        self.links.insert(
            id,
            UnitLink {
                id,
                unit,
                party,
                role: role.map(String::from),
                active: true,
                mandate,
            },
        );
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Lookups

    pub fn bank(&self, id: BankId) -> Result<&Bank, IncassoError> {
        self.banks
            .get(&id)
            .ok_or_else(|| IncassoError::NotFound(format!("bank {id}")))
    }

    pub fn account(&self, id: AccountId) -> Result<&BankAccount, IncassoError> {
        self.accounts
            .get(&id)
            .ok_or_else(|| IncassoError::NotFound(format!("account {id}")))
    }

    pub fn creditor(&self, id: CreditorId) -> Result<&Creditor, IncassoError> {
        self.creditors
            .get(&id)
            .ok_or_else(|| IncassoError::NotFound(format!("creditor {id}")))
    }

    pub fn party(&self, id: PartyId) -> Result<&Party, IncassoError> {
        self.parties
            .get(&id)
            .ok_or_else(|| IncassoError::NotFound(format!("party {id}")))
    }

    pub fn unit(&self, id: UnitId) -> Result<&Unit, IncassoError> {
        self.units
            .get(&id)
            .ok_or_else(|| IncassoError::NotFound(format!("unit {id}")))
    }

    pub fn link(&self, id: LinkId) -> Result<&UnitLink, IncassoError> {
        self.links
            .get(&id)
            .ok_or_else(|| IncassoError::NotFound(format!("link {id}")))
    }

    pub fn mandate(&self, id: MandateId) -> Result<&Mandate, IncassoError> {
        self.mandates
            .get(&id)
            .ok_or_else(|| IncassoError::NotFound(format!("mandate {id}")))
    }

    pub fn payment(&self, id: PaymentId) -> Result<&Payment, IncassoError> {
        self.payments
            .get(&id)
            .ok_or_else(|| IncassoError::NotFound(format!("payment {id}")))
    }

    pub fn group(&self, id: GroupId) -> Result<&PaymentGroup, IncassoError> {
        self.groups
            .get(&id)
            .ok_or_else(|| IncassoError::NotFound(format!("group {id}")))
    }

    pub fn message(&self, id: MessageId) -> Result<&Message, IncassoError> {
        self.messages
            .get(&id)
            .ok_or_else(|| IncassoError::NotFound(format!("message {id}")))
    }

    // ------------------------------------------------------------------
    // Creditor identifier

    /// Derive and store the SEPA creditor identifier from the creditor's
    /// tax identifier and business code.
    pub fn compute_creditor_identifier(&mut self, id: CreditorId) -> Result<(), IncassoError> {
        let creditor = self.creditor(id)?;
        let tax = creditor.tax_identifier.clone().ok_or_else(|| {
            IncassoError::Validation(format!(
                "creditor '{}' has no tax identifier defined",
                creditor.name
            ))
        })?;
        let identifier = derive_creditor_identifier(&tax, &creditor.creditor_business_code)?;
        self.set_creditor_identifier(id, Some(&identifier))
    }

    /// Set (or clear) the creditor identifier. An empty string normalizes
    /// to absent. The identifier must be checksum-valid and unique across
    /// creditors.
    pub fn set_creditor_identifier(
        &mut self,
        id: CreditorId,
        identifier: Option<&str>,
    ) -> Result<(), IncassoError> {
        self.creditor(id)?;
        let identifier = normalize_identification(identifier.map(String::from));
        if let Some(value) = &identifier {
            if !is_valid_creditor_identifier(value) {
                let name = &self.creditor(id)?.name;
                return Err(IncassoError::Validation(format!(
                    "SEPA creditor identifier '{value}' of '{name}' is not valid"
                )));
            }
            let in_use = self
                .creditors
                .values()
                .any(|c| c.id != id && c.sepa_creditor_identifier.as_deref() == Some(value));
            if in_use {
                return Err(IncassoError::Validation(format!(
                    "SEPA creditor identifier '{value}' is already in use"
                )));
            }
        }
        if let Some(creditor) = self.creditors.get_mut(&id) {
            creditor.sepa_creditor_identifier = identifier;
        }
        Ok(())
    }

    /// Change the 3-character business code embedded in derived creditor
    /// identifiers. Does not touch an already stored identifier; call
    /// [`Registry::compute_creditor_identifier`] again to re-derive.
    pub fn set_creditor_business_code(
        &mut self,
        id: CreditorId,
        code: &str,
    ) -> Result<(), IncassoError> {
        self.creditor(id)?;
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(IncassoError::Validation(format!(
                "creditor business code '{code}' must be 3 alphanumeric characters"
            )));
        }
        if let Some(creditor) = self.creditors.get_mut(&id) {
            creditor.creditor_business_code = code.to_uppercase();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mandates

    pub fn new_mandate(&mut self, new: NewMandate) -> Result<MandateId, IncassoError> {
        self.creditor(new.creditor)?;
        self.party(new.debtor)?;
        let identification = normalize_identification(new.identification);
        if let Some(value) = &identification {
            self.check_identification_free(new.creditor, value, None)?;
            into_validation_result(validate_sepa_text(
                "mandate.identification",
                value,
                MAX_IDENTIFICATION_LEN,
            ))?;
        }
        let id = MandateId(self.next_id());
        self.mandates.insert(
            id,
            Mandate {
                id,
                creditor: new.creditor,
                debtor: new.debtor,
                account: new.account,
                identification,
                mandate_type: new
                    .mandate_type
                    .unwrap_or(self.mandate_defaults.mandate_type),
                scheme: new.scheme.unwrap_or(self.mandate_defaults.scheme),
                signature_date: new.signature_date,
                state: MandateState::Draft,
            },
        );
        Ok(id)
    }

    fn check_identification_free(
        &self,
        creditor: CreditorId,
        value: &str,
        except: Option<MandateId>,
    ) -> Result<(), IncassoError> {
        let clash = self.mandates.values().any(|m| {
            Some(m.id) != except
                && m.creditor == creditor
                && m.identification.as_deref() == Some(value)
        });
        if clash {
            Err(IncassoError::Validation(format!(
                "mandate identification '{value}' is already in use for this creditor"
            )))
        } else {
            Ok(())
        }
    }

    /// Set the identification. The shape is frozen once any payment
    /// references the mandate; the empty string normalizes to absent.
    pub fn set_mandate_identification(
        &mut self,
        id: MandateId,
        identification: Option<&str>,
    ) -> Result<(), IncassoError> {
        let mandate = self.mandate(id)?;
        let identification = normalize_identification(identification.map(String::from));
        if mandate.identification != identification && self.mandate_has_payments(id) {
            return Err(IncassoError::Validation(format!(
                "identification of mandate {id} cannot change once payments exist"
            )));
        }
        if let Some(value) = &identification {
            into_validation_result(validate_sepa_text(
                "mandate.identification",
                value,
                MAX_IDENTIFICATION_LEN,
            ))?;
            self.check_identification_free(self.mandate(id)?.creditor, value, Some(id))?;
        }
        if let Some(mandate) = self.mandates.get_mut(&id) {
            mandate.identification = identification;
        }
        Ok(())
    }

    pub fn set_mandate_account(
        &mut self,
        id: MandateId,
        account: Option<AccountId>,
    ) -> Result<(), IncassoError> {
        self.mandate(id)?;
        if let Some(acc) = account {
            self.account(acc)?;
        }
        if let Some(mandate) = self.mandates.get_mut(&id) {
            mandate.account = account;
        }
        Ok(())
    }

    pub fn set_mandate_signature_date(
        &mut self,
        id: MandateId,
        date: Option<NaiveDate>,
    ) -> Result<(), IncassoError> {
        self.mandate(id)?;
        if let Some(mandate) = self.mandates.get_mut(&id) {
            mandate.signature_date = date;
        }
        Ok(())
    }

    fn mandate_has_payments(&self, id: MandateId) -> bool {
        self.payments.values().any(|p| p.mandate == id)
    }

    /// Move a mandate along one of the allowed workflow edges.
    ///
    /// Reaching `canceled` cascades: it is blocked while any referencing
    /// payment is draft or approved, and otherwise detaches the mandate
    /// from every unit link, returning a warning with the affected count.
    pub fn transition_mandate(
        &mut self,
        id: MandateId,
        target: MandateState,
    ) -> Result<Vec<Warning>, IncassoError> {
        let mandate = self.mandate(id)?;
        if !mandate.state.can_transition(target) {
            return Err(IncassoError::Transition {
                entity: "mandate",
                from: mandate.state.as_str(),
                to: target.as_str(),
            });
        }
        if target == MandateState::Validated {
            let mut candidate = mandate.clone();
            candidate.state = MandateState::Validated;
            into_validation_result(candidate.validate())?;
        }

        let mut warnings = Vec::new();
        if target == MandateState::Canceled {
            let open = self
                .payments
                .values()
                .filter(|p| {
                    p.mandate == id
                        && matches!(p.state, PaymentState::Draft | PaymentState::Approved)
                })
                .count();
            if open > 0 {
                return Err(IncassoError::Validation(format!(
                    "mandate {id} cannot be canceled: {open} payment(s) still draft or approved"
                )));
            }
            let label = mandate
                .identification
                .clone()
                .unwrap_or_else(|| id.to_string());
            let detached = self.detach_mandate_links(id);
            if detached > 0 {
                warnings.push(Warning::new(
                    label,
                    format!("mandate detached as mean of payment in {detached} unit(s)"),
                ));
            }
        }
        if let Some(mandate) = self.mandates.get_mut(&id) {
            mandate.state = target;
        }
        Ok(warnings)
    }

    fn detach_mandate_links(&mut self, id: MandateId) -> usize {
        let mut detached = 0;
        for link in self.links.values_mut() {
            if link.mandate == Some(id) && link.active {
                link.mandate = None;
                detached += 1;
            }
        }
        detached
    }

    /// Delete a mandate. Only draft or canceled mandates without payments
    /// can go.
    pub fn delete_mandate(&mut self, id: MandateId) -> Result<(), IncassoError> {
        let mandate = self.mandate(id)?;
        if !matches!(mandate.state, MandateState::Draft | MandateState::Canceled) {
            return Err(IncassoError::Validation(format!(
                "mandate {id} cannot be deleted: it is not in draft or canceled state"
            )));
        }
        if self.mandate_has_payments(id) {
            return Err(IncassoError::Validation(format!(
                "mandate {id} cannot be deleted: it has payments"
            )));
        }
        for link in self.links.values_mut() {
            if link.mandate == Some(id) {
                link.mandate = None;
            }
        }
        self.mandates.remove(&id);
        Ok(())
    }

    pub fn duplicate_mandate(&mut self, id: MandateId) -> Result<MandateId, IncassoError> {
        let source = self.mandate(id)?.clone();
        let copy_id = MandateId(self.next_id());
        self.mandates.insert(copy_id, source.duplicate(copy_id));
        Ok(copy_id)
    }

    // ------------------------------------------------------------------
    // Deactivation cascades

    /// Deactivate a bank account: every non-canceled mandate debiting it
    /// is bulk-canceled (no per-row transition validation) and detached
    /// from its unit links. One warning per affected mandate.
    pub fn deactivate_account(&mut self, id: AccountId) -> Result<Vec<Warning>, IncassoError> {
        self.account(id)?;
        let affected: Vec<(MandateId, String)> = self
            .mandates
            .values()
            .filter(|m| m.account == Some(id) && m.state != MandateState::Canceled)
            .map(|m| {
                let label = m
                    .identification
                    .clone()
                    .unwrap_or_else(|| m.id.to_string());
                (m.id, label)
            })
            .collect();

        let mut warnings = Vec::new();
        for (mandate_id, label) in affected {
            let detached = self.detach_mandate_links(mandate_id);
            if let Some(mandate) = self.mandates.get_mut(&mandate_id) {
                mandate.state = MandateState::Canceled;
            }
            warnings.push(Warning::new(
                label,
                format!(
                    "mandate canceled and deactivated as mean of payment in {detached} unit(s)"
                ),
            ));
        }
        if let Some(account) = self.accounts.get_mut(&id) {
            account.active = false;
        }
        Ok(warnings)
    }

    /// Deactivate a party: all its non-canceled mandates are bulk-canceled.
    pub fn deactivate_party(&mut self, id: PartyId) -> Result<Vec<Warning>, IncassoError> {
        let party = self.party(id)?;
        let name = party.name.clone();
        let affected: Vec<MandateId> = self
            .mandates
            .values()
            .filter(|m| m.debtor == id && m.state != MandateState::Canceled)
            .map(|m| m.id)
            .collect();
        let mut warnings = Vec::new();
        if !affected.is_empty() {
            warnings.push(Warning::new(
                name,
                format!("{} mandate(s) of this party canceled", affected.len()),
            ));
        }
        for mandate_id in affected {
            self.detach_mandate_links(mandate_id);
            if let Some(mandate) = self.mandates.get_mut(&mandate_id) {
                mandate.state = MandateState::Canceled;
            }
        }
        if let Some(party) = self.parties.get_mut(&id) {
            party.active = false;
        }
        Ok(warnings)
    }

    // ------------------------------------------------------------------
    // Groups

    pub fn add_group(&mut self, new: NewGroup) -> Result<GroupId, IncassoError> {
        let creditor = self.creditor(new.creditor)?;
        match creditor.sepa_creditor_identifier.as_deref() {
            Some(value) if is_valid_creditor_identifier(value) => {}
            _ => {
                return Err(IncassoError::Validation(format!(
                    "creditor '{}' has no valid SEPA creditor identifier",
                    creditor.name
                )));
            }
        }
        self.account(new.account)?;
        let clash = self
            .groups
            .values()
            .any(|g| g.creditor == new.creditor && g.reference == new.reference);
        if clash {
            return Err(IncassoError::Validation(format!(
                "group reference '{}' is already in use for this creditor",
                new.reference
            )));
        }
        let group = PaymentGroup {
            id: GroupId(0), // assigned below
            reference: new.reference,
            creditor: new.creditor,
            account: new.account,
            date: new.date,
            batch_booking: new.batch_booking.or(self.group_defaults.batch_booking),
            charge_bearer: new.charge_bearer.or(self.group_defaults.charge_bearer),
            message: None,
            currency: "EUR".to_string(),
        };
        into_validation_result(group.validate_date(self.today))?;
        let id = GroupId(self.next_id());
        self.groups.insert(id, PaymentGroup { id, ..group });
        Ok(id)
    }

    /// A group is mutable only while it has no message or its message is
    /// still draft.
    fn check_group_mutable(&self, id: GroupId) -> Result<(), IncassoError> {
        let group = self.group(id)?;
        if let Some(message_id) = group.message {
            let message = self.message(message_id)?;
            if message.state != MessageState::Draft {
                return Err(IncassoError::Validation(format!(
                    "group '{}' is read-only: message '{}' is {}",
                    group.reference,
                    message.reference,
                    message.state.as_str()
                )));
            }
        }
        Ok(())
    }

    /// Change the group's debit date. Rejects entirely when any non-draft
    /// payment in the group has an earlier date; otherwise every draft
    /// payment is re-dated to match.
    pub fn set_group_date(&mut self, id: GroupId, date: NaiveDate) -> Result<(), IncassoError> {
        self.check_group_mutable(id)?;
        let group = self.group(id)?;
        let mut candidate = group.clone();
        candidate.date = date;
        into_validation_result(candidate.validate_date(self.today))?;

        if let Some(blocking) = self
            .payments
            .values()
            .find(|p| p.group == id && p.state != PaymentState::Draft && p.date < date)
        {
            return Err(IncassoError::Validation(format!(
                "payment {} is {} with due date {} before the new group date {date}",
                blocking.id,
                blocking.state.as_str(),
                blocking.date
            )));
        }
        for payment in self.payments.values_mut() {
            if payment.group == id && payment.state == PaymentState::Draft {
                payment.date = date;
            }
        }
        if let Some(group) = self.groups.get_mut(&id) {
            group.date = date;
        }
        Ok(())
    }

    /// Derived control totals: count and sum over payments with an amount
    /// set. Recomputed on every call, never cached.
    pub fn group_totals(&self, id: GroupId) -> (u32, Decimal) {
        let mut count = 0u32;
        let mut sum = Decimal::ZERO;
        for payment in self.payments.values() {
            if payment.group == id {
                if let Some(amount) = payment.amount {
                    count += 1;
                    sum += amount;
                }
            }
        }
        (count, sum)
    }

    pub fn group_payments(&self, id: GroupId) -> Vec<PaymentId> {
        self.payments
            .values()
            .filter(|p| p.group == id)
            .map(|p| p.id)
            .collect()
    }

    // ------------------------------------------------------------------
    // Batch assembly

    /// The creditor and all its sub-condominium companies.
    fn creditor_subtree(&self, root: CreditorId) -> Vec<CreditorId> {
        let mut subtree = vec![root];
        let mut frontier = vec![root];
        while let Some(current) = frontier.pop() {
            for creditor in self.creditors.values() {
                if creditor.parent == Some(current) && !subtree.contains(&creditor.id) {
                    subtree.push(creditor.id);
                    frontier.push(creditor.id);
                }
            }
        }
        subtree
    }

    /// Active debtor-unit links under the creditor (including
    /// sub-condominiums) whose mandate is usable, ordered by unit name.
    pub fn eligible_links(&self, creditor: CreditorId) -> Vec<LinkId> {
        let companies = self.creditor_subtree(creditor);
        let mut eligible: Vec<(&str, LinkId)> = self
            .links
            .values()
            .filter(|link| link.active)
            .filter_map(|link| {
                let unit = self.units.get(&link.unit)?;
                if !companies.contains(&unit.company) {
                    return None;
                }
                let mandate = self.mandates.get(&link.mandate?)?;
                if !mandate.is_usable() {
                    return None;
                }
                Some((unit.name.as_str(), link.id))
            })
            .collect();
        eligible.sort_by(|a, b| a.0.cmp(b.0).then(a.1.cmp(&b.1)));
        eligible.into_iter().map(|(_, id)| id).collect()
    }

    /// Create a draft payment in a group, defaulting currency and date
    /// from the group and the sequence type from the mandate.
    pub fn create_draft_payment(
        &mut self,
        group_id: GroupId,
        unit: Option<UnitId>,
        party: PartyId,
        mandate_id: MandateId,
    ) -> Result<PaymentId, IncassoError> {
        self.check_group_mutable(group_id)?;
        let group = self.group(group_id)?;
        let mandate = self.mandate(mandate_id)?;
        self.party(party)?;
        let payment = Payment {
            id: PaymentId(0), // assigned below
            group: group_id,
            unit,
            fee: false,
            party,
            mandate: mandate_id,
            amount: None,
            description: None,
            end_to_end_id: None,
            sequence_type: mandate.sequence_type(),
            date: group.date,
            currency: group.currency.clone(),
            state: PaymentState::Draft,
        };
        let id = PaymentId(self.next_id());
        self.payments.insert(id, Payment { id, ..payment });
        Ok(id)
    }

    /// Populate a group with one fee payment per eligible debtor-unit link
    /// and reconcile against the semicolon-delimited fee feed.
    ///
    /// Existing draft payments in the group are replaced; approved-or-later
    /// payments stay untouched and their units are not re-collected. The
    /// whole operation applies atomically.
    pub fn generate_fees(
        &mut self,
        group_id: GroupId,
        feed_text: &str,
    ) -> Result<Vec<Warning>, IncassoError> {
        self.check_group_mutable(group_id)?;
        let group = self.group(group_id)?.clone();
        let rows = parse_feed(feed_text)?;

        // Units already covered by a non-draft payment keep their payment.
        let covered: Vec<UnitId> = self
            .payments
            .values()
            .filter(|p| p.group == group_id && p.state != PaymentState::Draft)
            .filter_map(|p| p.unit)
            .collect();

        // Resolve everything fallible before the first mutation.
        let mut warnings = Vec::new();
        let mut planned: Vec<Payment> = Vec::new();
        for link_id in self.eligible_links(group.creditor) {
            let link = self.link(link_id)?;
            let mandate_id = link.mandate.ok_or_else(|| {
                IncassoError::NotFound(format!("mandate of link {link_id}"))
            })?;
            let mandate = self.mandate(mandate_id)?;
            let unit = self.unit(link.unit)?;
            if covered.contains(&unit.id) {
                continue;
            }

            let (row, warning) = select_feed_row(&rows, &unit.name, link.role.as_deref());
            warnings.extend(warning);
            let (amount, description) = match row {
                Some(row) => {
                    let amount = parse_feed_amount(&row.amount)?;
                    if amount <= Decimal::ZERO {
                        warnings.push(Warning::new(
                            unit.name.clone(),
                            format!("fee amount {amount} is not positive"),
                        ));
                    }
                    (Some(amount), Some(row.description.clone()))
                }
                // No feed row: leave the amount unset so draft validation
                // flags it as missing.
                None => (None, None),
            };

            planned.push(Payment {
                id: PaymentId(0), // assigned on insert
                group: group_id,
                unit: Some(unit.id),
                fee: true,
                party: link.party,
                mandate: mandate_id,
                amount,
                description,
                end_to_end_id: Some(format!("{}-{}", group.reference, unit.name)),
                sequence_type: mandate.sequence_type(),
                date: group.date,
                currency: group.currency.clone(),
                state: PaymentState::Draft,
            });
        }

        // Commit: drop old drafts, insert the new set.
        self.payments
            .retain(|_, p| !(p.group == group_id && p.state == PaymentState::Draft));
        for payment in planned {
            let id = PaymentId(self.next_id());
            self.payments.insert(id, Payment { id, ..payment });
        }
        Ok(warnings)
    }

    // ------------------------------------------------------------------
    // Payments

    /// Validate a draft payment (a no-op for non-draft states, which are
    /// already frozen).
    pub fn validate_payment(&self, id: PaymentId) -> Result<Vec<ValidationError>, IncassoError> {
        let payment = self.payment(id)?;
        if payment.state != PaymentState::Draft {
            return Ok(Vec::new());
        }
        let group = self.group(payment.group)?;
        let mandate = self.mandate(payment.mandate)?;
        Ok(payment.validate_draft(group.date, mandate))
    }

    /// Move a payment along one of the allowed workflow edges, enforcing
    /// the message-state guards.
    pub fn transition_payment(
        &mut self,
        id: PaymentId,
        target: PaymentState,
    ) -> Result<(), IncassoError> {
        let payment = self.payment(id)?;
        if !payment.state.can_transition(target) {
            return Err(IncassoError::Transition {
                entity: "payment",
                from: payment.state.as_str(),
                to: target.as_str(),
            });
        }
        let message = self.group(payment.group)?.message;
        match target {
            PaymentState::Draft => {
                if let Some(message_id) = message {
                    let message = self.message(message_id)?;
                    if message.state != MessageState::Draft {
                        return Err(IncassoError::MessageNotDraft(message.reference.clone()));
                    }
                }
            }
            PaymentState::Succeeded => {
                let booked = message
                    .and_then(|m| self.messages.get(&m))
                    .is_some_and(|m| m.state == MessageState::Booked);
                if !booked {
                    let reference = message
                        .and_then(|m| self.messages.get(&m))
                        .map(|m| m.reference.clone())
                        .unwrap_or_else(|| "<none>".to_string());
                    return Err(IncassoError::MessageNotBooked(reference));
                }
            }
            PaymentState::Approved if payment.state == PaymentState::Draft => {
                let errors = self.validate_payment(id)?;
                into_validation_result(errors)?;
            }
            _ => {}
        }
        if let Some(payment) = self.payments.get_mut(&id) {
            payment.state = target;
        }
        Ok(())
    }

    pub fn delete_payment(&mut self, id: PaymentId) -> Result<(), IncassoError> {
        let payment = self.payment(id)?;
        if payment.state != PaymentState::Draft {
            return Err(IncassoError::Validation(format!(
                "payment {id} cannot be deleted: it is {}",
                payment.state.as_str()
            )));
        }
        self.payments.remove(&id);
        Ok(())
    }

    /// Bulk state update bypassing row-level transition checks. This is
    /// the cascade primitive used when a message drives all its payments
    /// at once.
    pub fn bulk_set_payment_states(&mut self, ids: &[PaymentId], state: PaymentState) {
        for id in ids {
            if let Some(payment) = self.payments.get_mut(id) {
                payment.state = state;
            }
        }
    }

    // ------------------------------------------------------------------
    // Messages

    pub fn new_message(
        &mut self,
        creditor: CreditorId,
        reference: &str,
        flavor: MessageFlavor,
    ) -> Result<MessageId, IncassoError> {
        self.creditor(creditor)?;
        let clash = self
            .messages
            .values()
            .any(|m| m.creditor == creditor && m.reference == reference);
        if clash {
            return Err(IncassoError::Validation(format!(
                "message reference '{reference}' is already in use for this creditor"
            )));
        }
        let id = MessageId(self.next_id());
        self.messages.insert(
            id,
            Message {
                id,
                reference: reference.to_string(),
                creditor,
                flavor,
                text: None,
                state: MessageState::Draft,
            },
        );
        Ok(id)
    }

    /// Attach a group to a draft message. Every group in a message must
    /// settle through the same bank.
    pub fn attach_group(
        &mut self,
        message_id: MessageId,
        group_id: GroupId,
    ) -> Result<(), IncassoError> {
        let message = self.message(message_id)?;
        if message.state != MessageState::Draft {
            return Err(IncassoError::MessageNotDraft(message.reference.clone()));
        }
        let group = self.group(group_id)?;
        if let Some(owner) = group.message {
            return Err(IncassoError::Validation(format!(
                "group '{}' already belongs to message {owner}",
                group.reference
            )));
        }
        let bank = self.account(group.account)?.bank;
        for other in self.groups.values() {
            if other.message == Some(message_id) {
                let other_bank = self.account(other.account)?.bank;
                if other_bank != bank {
                    return Err(IncassoError::Validation(format!(
                        "group '{}' settles through a different bank than group '{}'",
                        group.reference, other.reference
                    )));
                }
            }
        }
        if let Some(group) = self.groups.get_mut(&group_id) {
            group.message = Some(message_id);
        }
        Ok(())
    }

    pub fn message_groups(&self, id: MessageId) -> Vec<GroupId> {
        self.groups
            .values()
            .filter(|g| g.message == Some(id))
            .map(|g| g.id)
            .collect()
    }

    pub fn message_payments(&self, id: MessageId) -> Vec<PaymentId> {
        let groups = self.message_groups(id);
        self.payments
            .values()
            .filter(|p| groups.contains(&p.group))
            .map(|p| p.id)
            .collect()
    }

    /// Derived control totals over all constituent groups' payments.
    pub fn message_totals(&self, id: MessageId) -> (u32, Decimal) {
        self.message_groups(id)
            .into_iter()
            .map(|g| self.group_totals(g))
            .fold((0, Decimal::ZERO), |(c, s), (gc, gs)| (c + gc, s + gs))
    }

    /// Structural validation, independent of workflow state: the creditor
    /// must carry a checksum-correct identifier and all groups must share
    /// one settlement bank.
    pub fn validate_message(&self, id: MessageId) -> Result<Vec<ValidationError>, IncassoError> {
        let message = self.message(id)?;
        let creditor = self.creditor(message.creditor)?;
        let mut errors = Vec::new();
        match &creditor.sepa_creditor_identifier {
            None => errors.push(ValidationError::new(
                "message.creditor",
                format!("creditor '{}' has no SEPA creditor identifier", creditor.name),
            )),
            Some(identifier) if !is_valid_creditor_identifier(identifier) => {
                errors.push(ValidationError::new(
                    "message.creditor",
                    format!(
                        "SEPA creditor identifier '{identifier}' of '{}' is not valid",
                        creditor.name
                    ),
                ));
            }
            Some(_) => {}
        }
        let groups = self.message_groups(id);
        let mut banks = Vec::new();
        for group_id in &groups {
            let group = self.group(*group_id)?;
            let bank = self.account(group.account)?.bank;
            if !banks.contains(&bank) {
                banks.push(bank);
            }
        }
        if banks.len() > 1 {
            errors.push(ValidationError::new(
                "message.groups",
                "attached groups do not share a single settlement bank",
            ));
        }
        Ok(errors)
    }

    fn transition_message(
        &mut self,
        id: MessageId,
        target: MessageState,
    ) -> Result<(), IncassoError> {
        let message = self.message(id)?;
        if !message.state.can_transition(target) {
            return Err(IncassoError::Transition {
                entity: "message",
                from: message.state.as_str(),
                to: target.as_str(),
            });
        }
        if let Some(message) = self.messages.get_mut(&id) {
            message.state = target;
        }
        Ok(())
    }

    /// Return a message to draft, resetting every payment of every
    /// attached group back to draft in bulk. The message's own state
    /// authorizes the bypass of the per-payment draft guard.
    pub fn draft_message(&mut self, id: MessageId) -> Result<(), IncassoError> {
        self.transition_message(id, MessageState::Draft)?;
        let payments = self.message_payments(id);
        self.bulk_set_payment_states(&payments, PaymentState::Draft);
        if let Some(message) = self.messages.get_mut(&id) {
            message.text = None;
        }
        Ok(())
    }

    /// Book the message; all contained payments move to processing.
    pub fn accept_message(&mut self, id: MessageId) -> Result<(), IncassoError> {
        self.transition_message(id, MessageState::Booked)?;
        let payments = self.message_payments(id);
        self.bulk_set_payment_states(&payments, PaymentState::Processing);
        Ok(())
    }

    /// Reject the message; all contained payments move to failed.
    pub fn cancel_message(&mut self, id: MessageId) -> Result<(), IncassoError> {
        self.transition_message(id, MessageState::Rejected)?;
        let payments = self.message_payments(id);
        self.bulk_set_payment_states(&payments, PaymentState::Failed);
        Ok(())
    }

    /// Internal commit of a successful generation.
    pub(crate) fn commit_generated(&mut self, id: MessageId, text: String) {
        if let Some(message) = self.messages.get_mut(&id) {
            message.text = Some(text);
            message.state = MessageState::Generated;
        }
    }
}
