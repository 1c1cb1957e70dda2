//! # Leads
//!
//! A lead is a sales opportunity, linked either to a stored contact
//! (`contactPerson`) or to a manually entered contact name. Stages are a
//! plain label set with no transition rules.
//!
//! Base-currency amounts (`audValue`, `audSubscription`) are filled in by
//! [`Lead::normalize`], which runs after every create and update.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::attachment::{Attachable, Attachment};
use crate::change::{Tracked, TrackedField};
use crate::choice::{choice_enum, Choice, Priority};
use crate::contact::Contact;
use crate::error::ValidationErrors;
use crate::identity::{ActorId, EntityKind};
use crate::money::CurrencyCode;
use crate::validate::{nullable_reference, trimmed, AmountInput, Mode, Validator};

/// Label used when a lead has no resolvable contact.
pub const UNKNOWN_CONTACT: &str = "Unknown Contact";

choice_enum! {
    /// Pipeline stage.
    pub enum LeadStage (default NewLead) {
        /// Just captured.
        NewLead => "New Lead",
        /// First contact made.
        Contacted => "Contacted",
        /// Confirmed as a fit.
        Qualified => "Qualified",
        /// Product demonstrated.
        DemoDone => "Demo Done",
        /// Proposal delivered.
        ProposalSent => "Proposal Sent",
        /// Terms under discussion.
        Negotiation => "Negotiation",
        /// Closed and won.
        Won => "Won - Deal Closed",
        /// Prospect declined.
        LostNotInterested => "Lost - Not Interested",
        /// Lost to a competitor.
        LostCompetitor => "Lost - Competitor Win",
        /// No budget available.
        LostNoBudget => "Lost - No Budget",
        /// Parked for later.
        FollowUpLater => "Follow-up Later",
    }
}

choice_enum! {
    /// Country of the opportunity.
    pub enum Country (default Australia) {
        /// Argentina.
        Argentina => "Argentina",
        /// Australia.
        Australia => "Australia",
        /// Canada.
        Canada => "Canada",
        /// Croatia.
        Croatia => "Croatia",
        /// Mauritius.
        Mauritius => "Mauritius",
        /// United States.
        Usa => "USA",
    }
}

/// A stored lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    /// Identifier.
    pub id: Uuid,
    /// Linked contact, when not a manual entry.
    pub contact_person: Option<Uuid>,
    /// Manually entered contact name.
    #[serde(default)]
    pub contact_person_name: String,
    /// Whether the contact was entered by hand.
    #[serde(default)]
    pub is_manual_entry: bool,
    /// Company name.
    pub company: String,
    /// Country.
    pub country: Country,
    /// Deal value in `currency_code`.
    pub value: f64,
    /// Recurring subscription value in `currency_code`.
    pub subscription: f64,
    /// Currency of `value` and `subscription`.
    pub currency_code: CurrencyCode,
    /// `value` in the base currency, when known.
    pub aud_value: Option<f64>,
    /// `subscription` in the base currency, when known.
    pub aud_subscription: Option<f64>,
    /// Pipeline stage.
    pub stage: LeadStage,
    /// Priority.
    pub priority: Priority,
    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
    /// Agreed next step.
    #[serde(default)]
    pub next_step: String,
    /// Owning salesperson (display name).
    #[serde(default)]
    pub lead_owner: String,
    /// Attachments.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Actor that created the lead.
    pub owner_id: Option<ActorId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Create/update body for leads.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadInput {
    /// Linked contact id; `null` or `""` clears it.
    #[serde(deserialize_with = "nullable_reference")]
    #[schema(value_type = Option<Uuid>)]
    pub contact_person: Option<Option<Uuid>>,
    /// Manual contact name.
    pub contact_person_name: Option<String>,
    /// Manual entry flag.
    pub is_manual_entry: Option<bool>,
    /// Company; defaults to the linked contact's company.
    pub company: Option<String>,
    /// Country label.
    pub country: Option<String>,
    /// Deal value.
    pub value: Option<AmountInput>,
    /// Subscription value.
    pub subscription: Option<AmountInput>,
    /// Currency code.
    pub currency_code: Option<String>,
    /// Explicit base-currency value.
    pub aud_value: Option<AmountInput>,
    /// Explicit base-currency subscription.
    pub aud_subscription: Option<AmountInput>,
    /// Stage label.
    pub stage: Option<String>,
    /// Priority label.
    pub priority: Option<String>,
    /// Notes.
    pub notes: Option<String>,
    /// Next step.
    pub next_step: Option<String>,
    /// Lead owner.
    pub lead_owner: Option<String>,
}

impl LeadInput {
    /// The contact id this input links to, if it sets one.
    pub fn linked_contact(&self) -> Option<Uuid> {
        self.contact_person.flatten()
    }
}

impl Lead {
    /// Validate `input` and build a new lead. `linked` is the contact named
    /// by `input.contact_person`, already looked up by the caller.
    pub fn create(
        input: LeadInput,
        linked: Option<&Contact>,
        owner_id: Option<ActorId>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationErrors> {
        let mut lead = Self {
            id: Uuid::new_v4(),
            contact_person: None,
            contact_person_name: String::new(),
            is_manual_entry: false,
            company: String::new(),
            country: Country::default(),
            value: 0.0,
            subscription: 0.0,
            currency_code: CurrencyCode::default(),
            aud_value: None,
            aud_subscription: None,
            stage: LeadStage::default(),
            priority: Priority::default(),
            notes: String::new(),
            next_step: String::new(),
            lead_owner: String::new(),
            attachments: Vec::new(),
            owner_id,
            created_at: now,
            updated_at: now,
        };
        let mut v = Validator::new(Mode::Create);
        lead.apply(input, linked, &mut v);
        v.finish()?;
        lead.normalize();
        Ok(lead)
    }

    /// Validate a partial update and return the patched lead.
    pub fn patched(
        &self,
        input: LeadInput,
        linked: Option<&Contact>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationErrors> {
        let mut next = self.clone();
        let mut v = Validator::new(Mode::Update);
        next.apply(input, linked, &mut v);
        v.finish()?;
        next.normalize();
        next.updated_at = now;
        Ok(next)
    }

    fn apply(&mut self, input: LeadInput, linked: Option<&Contact>, v: &mut Validator) {
        if let Some(manual) = input.is_manual_entry {
            self.is_manual_entry = manual;
        }
        if let Some(name) = trimmed(input.contact_person_name.as_deref()) {
            self.contact_person_name = name;
        }
        if let Some(reference) = input.contact_person {
            self.contact_person = reference;
        }
        if self.is_manual_entry {
            self.contact_person = None;
            let needs_name = v.mode() == Mode::Create
                || input.is_manual_entry.is_some()
                || input.contact_person_name.is_some();
            if needs_name && self.contact_person_name.is_empty() {
                v.push("contactPersonName", "is required for a manual entry");
            }
        } else if v.mode() == Mode::Create && self.contact_person.is_none() {
            v.push("contactPerson", "is required unless the lead is a manual entry");
        }

        if input.company.is_some() {
            if let Some(company) = v.required_text("company", input.company.as_deref()) {
                self.company = company;
            }
        } else if let Some(contact) = linked {
            self.company = contact.company_name.clone();
        } else if v.mode() == Mode::Create {
            v.push("company", "is required");
        }

        if let Some(c) = v.choice::<Country>("country", input.country.as_deref()) {
            self.country = c;
        }
        if let Some(c) = v.choice::<CurrencyCode>("currencyCode", input.currency_code.as_deref()) {
            self.currency_code = c;
        }
        let value = v.amount("value", input.value.as_ref(), true);
        let subscription = v.amount("subscription", input.subscription.as_ref(), false);
        let aud_value = v.amount("audValue", input.aud_value.as_ref(), false);
        let aud_subscription = v.amount("audSubscription", input.aud_subscription.as_ref(), false);
        if let Some(n) = value {
            self.value = n;
            if aud_value.is_none() && self.currency_code.is_base() {
                self.aud_value = None;
            }
        }
        if let Some(n) = subscription {
            self.subscription = n;
            if aud_subscription.is_none() && self.currency_code.is_base() {
                self.aud_subscription = None;
            }
        }
        if aud_value.is_some() {
            self.aud_value = aud_value;
        }
        if aud_subscription.is_some() {
            self.aud_subscription = aud_subscription;
        }

        if let Some(s) = v.choice::<LeadStage>("stage", input.stage.as_deref()) {
            self.stage = s;
        }
        if let Some(p) = v.choice::<Priority>("priority", input.priority.as_deref()) {
            self.priority = p;
        }
        if let Some(notes) = trimmed(input.notes.as_deref()) {
            self.notes = notes;
        }
        if let Some(step) = trimmed(input.next_step.as_deref()) {
            self.next_step = step;
        }
        if let Some(owner) = trimmed(input.lead_owner.as_deref()) {
            self.lead_owner = owner;
        }
    }

    /// Fill unset base-currency amounts from the raw amounts when the lead
    /// is denominated in the base currency.
    pub fn normalize(&mut self) {
        if self.currency_code.is_base() {
            self.aud_value.get_or_insert(self.value);
            self.aud_subscription.get_or_insert(self.subscription);
        }
    }

    /// Display name of the lead's contact.
    pub fn contact_name(&self, linked: Option<&Contact>) -> String {
        if self.is_manual_entry {
            if self.contact_person_name.is_empty() {
                return UNKNOWN_CONTACT.to_string();
            }
            return self.contact_person_name.clone();
        }
        linked
            .map(Contact::display_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN_CONTACT.to_string())
    }
}

impl Tracked for Lead {
    const KIND: EntityKind = EntityKind::Lead;
    const TRACKED: &'static [TrackedField] = &[
        TrackedField::plain("stage"),
        TrackedField::plain("priority"),
        TrackedField::plain("value"),
        TrackedField::plain("notes"),
        TrackedField::plain("leadOwner"),
        TrackedField::reference("contactPerson"),
    ];

    fn tracked_value(&self, field: &str) -> Value {
        match field {
            "stage" => Value::from(self.stage.label()),
            "priority" => Value::from(self.priority.label()),
            "value" => Value::from(self.value),
            "notes" => Value::from(self.notes.as_str()),
            "leadOwner" => Value::from(self.lead_owner.as_str()),
            "contactPerson" => self
                .contact_person
                .map(|id| Value::from(id.to_string()))
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}

impl Attachable for Lead {
    const KIND: EntityKind = EntityKind::Lead;

    fn entity_id(&self) -> Uuid {
        self.id
    }

    fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    fn attachments_mut(&mut self) -> &mut Vec<Attachment> {
        &mut self.attachments
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

/// Output projection with the derived contact name.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadView {
    /// The stored lead.
    #[serde(flatten)]
    pub lead: Lead,
    /// Manual name, linked contact's display name, or `Unknown Contact`.
    pub contact_name: String,
}

impl LeadView {
    /// Project `lead`, resolving its linked contact through `linked`.
    pub fn new(lead: Lead, linked: Option<&Contact>) -> Self {
        let contact_name = lead.contact_name(linked);
        Self { lead, contact_name }
    }
}

/// Contact details offered to the lead form.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LeadContactInfo {
    /// Contact id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Company name.
    pub company: String,
}

impl From<&Contact> for LeadContactInfo {
    fn from(contact: &Contact) -> Self {
        Self {
            id: contact.id,
            name: contact.display_name(),
            company: contact.company_name.clone(),
        }
    }
}

/// One lead inside a pipeline bucket.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PipelineLead {
    /// Lead id.
    pub id: Uuid,
    /// Company.
    pub company: String,
    /// Deal value.
    pub value: f64,
}

/// All leads at one stage.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StageSummary {
    /// Stage label.
    pub stage: LeadStage,
    /// Sum of deal values.
    pub total_value: f64,
    /// Number of leads.
    pub count: usize,
    /// The leads themselves.
    pub leads: Vec<PipelineLead>,
}

/// Group leads by stage. Only stages with at least one lead appear, ordered
/// by stage label.
pub fn pipeline_summary<'a>(leads: impl IntoIterator<Item = &'a Lead>) -> Vec<StageSummary> {
    let mut buckets: BTreeMap<&'static str, StageSummary> = BTreeMap::new();
    for lead in leads {
        let bucket = buckets.entry(lead.stage.label()).or_insert_with(|| StageSummary {
            stage: lead.stage,
            total_value: 0.0,
            count: 0,
            leads: Vec::new(),
        });
        bucket.total_value += lead.value;
        bucket.count += 1;
        bucket.leads.push(PipelineLead {
            id: lead.id,
            company: lead.company.clone(),
            value: lead.value,
        });
    }
    buckets.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ChangeDetector, RawIds};
    use crate::contact::ContactInput;
    use serde_json::json;

    fn contact() -> Contact {
        let input: ContactInput = serde_json::from_value(json!({
            "companyName": "Acme Pty",
            "companyEmail": "sales@acme.com",
            "phoneNumber": "1",
            "contactPersons": [{ "name": "Jordan Lee" }]
        }))
        .unwrap();
        Contact::create(input, None, Utc::now()).unwrap()
    }

    fn input(value: serde_json::Value) -> LeadInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn linked_lead_takes_company_from_contact() {
        let c = contact();
        let lead = Lead::create(
            input(json!({ "contactPerson": c.id, "value": "12,500" })),
            Some(&c),
            None,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(lead.company, "Acme Pty");
        assert_eq!(lead.value, 12500.0);
        assert_eq!(lead.stage, LeadStage::NewLead);
        assert_eq!(lead.priority, Priority::Medium);
        assert_eq!(lead.country, Country::Australia);
        assert_eq!(lead.aud_value, Some(12500.0));
        assert_eq!(lead.aud_subscription, Some(0.0));
        assert_eq!(LeadView::new(lead, Some(&c)).contact_name, "Jordan Lee");
    }

    #[test]
    fn manual_entry_requires_a_name() {
        let err = Lead::create(
            input(json!({ "isManualEntry": true, "company": "Solo", "value": 1 })),
            None,
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(err.has_field("contactPersonName"));
        assert!(!err.has_field("contactPerson"));
    }

    #[test]
    fn linked_entry_requires_a_contact() {
        let err = Lead::create(input(json!({ "value": 5 })), None, None, Utc::now()).unwrap_err();
        assert!(err.has_field("contactPerson"));
        assert!(err.has_field("company"));
    }

    #[test]
    fn bad_labels_and_negative_values_are_all_reported() {
        let err = Lead::create(
            input(json!({
                "isManualEntry": true,
                "contactPersonName": "Kim",
                "company": "K",
                "value": -4,
                "stage": "Won",
                "currencyCode": "XYZ"
            })),
            None,
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(err.has_field("value"));
        assert!(err.has_field("stage"));
        assert!(err.has_field("currencyCode"));
    }

    #[test]
    fn foreign_currency_leaves_base_amount_unset() {
        let lead = Lead::create(
            input(json!({
                "isManualEntry": true,
                "contactPersonName": "Kim",
                "company": "K",
                "value": 100,
                "currencyCode": "USD"
            })),
            None,
            None,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(lead.aud_value, None);
    }

    #[test]
    fn value_update_refreshes_base_amount() {
        let c = contact();
        let lead = Lead::create(
            input(json!({ "contactPerson": c.id, "value": 10 })),
            Some(&c),
            None,
            Utc::now(),
        )
        .unwrap();
        let next = lead.patched(input(json!({ "value": 20 })), None, Utc::now()).unwrap();
        assert_eq!(next.aud_value, Some(20.0));
        assert_eq!(next.company, "Acme Pty");
    }

    #[test]
    fn stage_change_is_tracked() {
        let c = contact();
        let lead = Lead::create(
            input(json!({ "contactPerson": c.id, "value": 10 })),
            Some(&c),
            None,
            Utc::now(),
        )
        .unwrap();
        let next = lead
            .patched(input(json!({ "stage": "Qualified" })), None, Utc::now())
            .unwrap();
        let changes = ChangeDetector::new(&RawIds).detect(&lead, &next);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "stage");
        assert_eq!(changes[0].old_value, json!("New Lead"));
        assert_eq!(changes[0].new_value, json!("Qualified"));
    }

    #[test]
    fn pipeline_groups_by_stage_label() {
        let c = contact();
        let mk = |stage: &str, value: f64| {
            Lead::create(
                input(json!({ "contactPerson": c.id, "value": value, "stage": stage })),
                Some(&c),
                None,
                Utc::now(),
            )
            .unwrap()
        };
        let leads = vec![
            mk("Qualified", 10.0),
            mk("Contacted", 5.0),
            mk("Qualified", 7.5),
        ];
        let summary = pipeline_summary(&leads);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].stage, LeadStage::Contacted);
        assert_eq!(summary[1].stage, LeadStage::Qualified);
        assert_eq!(summary[1].count, 2);
        assert_eq!(summary[1].total_value, 17.5);
    }

    #[test]
    fn unknown_contact_fallback() {
        let c = contact();
        let mut lead = Lead::create(
            input(json!({ "contactPerson": c.id, "value": 1 })),
            Some(&c),
            None,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(lead.contact_name(None), UNKNOWN_CONTACT);
        lead.is_manual_entry = true;
        assert_eq!(lead.contact_name(Some(&c)), UNKNOWN_CONTACT);
    }
}
