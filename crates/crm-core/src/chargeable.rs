//! # Chargeables
//!
//! A billable quote and its progress through quotation, purchase order,
//! invoice and payment. `contactPerson` optionally links a stored contact;
//! an explicit `null` on update clears the link.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::attachment::{Attachable, Attachment};
use crate::change::{Tracked, TrackedField};
use crate::choice::{Choice, YesNoPending};
use crate::error::ValidationErrors;
use crate::identity::{ActorId, EntityKind};
use crate::money::CurrencyCode;
use crate::temporal;
use crate::validate::{nullable_reference, AmountInput, Mode, Validator};

/// A stored chargeable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Chargeable {
    /// Identifier.
    pub id: Uuid,
    /// When the quote was sent (required).
    pub quote_send_date: DateTime<Utc>,
    /// Customer name (required).
    pub customer_name: String,
    /// Linked contact.
    pub contact_person: Option<Uuid>,
    /// Kind of work charged (required).
    pub chargeable_type: String,
    /// Quotation progress.
    pub quotation_sent: YesNoPending,
    /// Number of follow-ups made.
    pub follow_ups: u32,
    /// Amount in `currency_code` (required).
    pub amount: f64,
    /// Currency of `amount`.
    pub currency_code: CurrencyCode,
    /// Purchase order progress.
    pub po_received: YesNoPending,
    /// Invoice progress.
    pub invoice_sent: YesNoPending,
    /// Payment progress.
    pub payment_received: YesNoPending,
    /// Attachments.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Actor that created the record.
    pub created_by: Option<ActorId>,
    /// Actor that last updated the record.
    pub updated_by: Option<ActorId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Create/update body for chargeables.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ChargeableInput {
    /// Quote send date.
    pub quote_send_date: Option<String>,
    /// Customer name.
    pub customer_name: Option<String>,
    /// Linked contact; `null` or `""` clears it.
    #[serde(deserialize_with = "nullable_reference")]
    #[schema(value_type = Option<Uuid>)]
    pub contact_person: Option<Option<Uuid>>,
    /// Chargeable type.
    pub chargeable_type: Option<String>,
    /// `yes`, `no` or `pending`.
    pub quotation_sent: Option<String>,
    /// Follow-up count.
    pub follow_ups: Option<i64>,
    /// Amount.
    pub amount: Option<AmountInput>,
    /// Currency code.
    pub currency_code: Option<String>,
    /// `yes`, `no` or `pending`.
    pub po_received: Option<String>,
    /// `yes`, `no` or `pending`.
    pub invoice_sent: Option<String>,
    /// `yes`, `no` or `pending`.
    pub payment_received: Option<String>,
}

impl ChargeableInput {
    /// The contact id this input links to, if it sets one.
    pub fn linked_contact(&self) -> Option<Uuid> {
        self.contact_person.flatten()
    }
}

impl Chargeable {
    /// Validate `input` and build a new chargeable.
    pub fn create(
        input: ChargeableInput,
        actor: Option<ActorId>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationErrors> {
        let mut chargeable = Self {
            id: Uuid::new_v4(),
            quote_send_date: now,
            customer_name: String::new(),
            contact_person: None,
            chargeable_type: String::new(),
            quotation_sent: YesNoPending::default(),
            follow_ups: 0,
            amount: 0.0,
            currency_code: CurrencyCode::default(),
            po_received: YesNoPending::default(),
            invoice_sent: YesNoPending::default(),
            payment_received: YesNoPending::default(),
            attachments: Vec::new(),
            created_by: actor,
            updated_by: actor,
            created_at: now,
            updated_at: now,
        };
        let mut v = Validator::new(Mode::Create);
        chargeable.apply(input, &mut v);
        v.finish()?;
        Ok(chargeable)
    }

    /// Validate a partial update and return the patched chargeable.
    pub fn patched(
        &self,
        input: ChargeableInput,
        actor: Option<ActorId>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationErrors> {
        let mut next = self.clone();
        let mut v = Validator::new(Mode::Update);
        next.apply(input, &mut v);
        v.finish()?;
        next.updated_by = actor.or(next.updated_by);
        next.updated_at = now;
        Ok(next)
    }

    fn apply(&mut self, input: ChargeableInput, v: &mut Validator) {
        if let Some(date) = v.date("quoteSendDate", input.quote_send_date.as_deref(), true) {
            self.quote_send_date = date;
        }
        if let Some(name) = v.required_text("customerName", input.customer_name.as_deref()) {
            self.customer_name = name;
        }
        if let Some(reference) = input.contact_person {
            self.contact_person = reference;
        }
        if let Some(kind) = v.required_text("chargeableType", input.chargeable_type.as_deref()) {
            self.chargeable_type = kind;
        }
        if let Some(s) = v.choice::<YesNoPending>("quotationSent", input.quotation_sent.as_deref()) {
            self.quotation_sent = s;
        }
        if let Some(n) = v.count("followUps", input.follow_ups) {
            self.follow_ups = n;
        }
        if let Some(amount) = v.amount("amount", input.amount.as_ref(), true) {
            self.amount = amount;
        }
        if let Some(c) = v.choice::<CurrencyCode>("currencyCode", input.currency_code.as_deref()) {
            self.currency_code = c;
        }
        if let Some(s) = v.choice::<YesNoPending>("poReceived", input.po_received.as_deref()) {
            self.po_received = s;
        }
        if let Some(s) = v.choice::<YesNoPending>("invoiceSent", input.invoice_sent.as_deref()) {
            self.invoice_sent = s;
        }
        if let Some(s) = v.choice::<YesNoPending>("paymentReceived", input.payment_received.as_deref()) {
            self.payment_received = s;
        }
    }

    /// Case-insensitive substring match on customer name or type.
    pub fn matches_term(&self, term: &str) -> bool {
        let needle = term.trim().to_lowercase();
        self.customer_name.to_lowercase().contains(&needle)
            || self.chargeable_type.to_lowercase().contains(&needle)
    }
}

impl Tracked for Chargeable {
    const KIND: EntityKind = EntityKind::Chargeable;
    const TRACKED: &'static [TrackedField] = &[
        TrackedField::date("quoteSendDate"),
        TrackedField::plain("customerName"),
        TrackedField::reference("contactPerson"),
        TrackedField::plain("chargeableType"),
        TrackedField::plain("quotationSent"),
        TrackedField::plain("followUps"),
        TrackedField::plain("amount"),
        TrackedField::plain("currencyCode"),
        TrackedField::plain("poReceived"),
        TrackedField::plain("invoiceSent"),
        TrackedField::plain("paymentReceived"),
    ];

    fn tracked_value(&self, field: &str) -> Value {
        match field {
            "quoteSendDate" => Value::from(temporal::canonical(&self.quote_send_date)),
            "customerName" => Value::from(self.customer_name.as_str()),
            "contactPerson" => self
                .contact_person
                .map(|id| Value::from(id.to_string()))
                .unwrap_or(Value::Null),
            "chargeableType" => Value::from(self.chargeable_type.as_str()),
            "quotationSent" => Value::from(self.quotation_sent.label()),
            "followUps" => Value::from(self.follow_ups),
            "amount" => Value::from(self.amount),
            "currencyCode" => Value::from(self.currency_code.label()),
            "poReceived" => Value::from(self.po_received.label()),
            "invoiceSent" => Value::from(self.invoice_sent.label()),
            "paymentReceived" => Value::from(self.payment_received.label()),
            _ => Value::Null,
        }
    }
}

impl Attachable for Chargeable {
    const KIND: EntityKind = EntityKind::Chargeable;

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

/// One entry of the customer dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CustomerOption {
    /// Customer or company name.
    pub name: String,
}

/// Union of chargeable customer names and contact company names:
/// deduplicated, blank-filtered, sorted.
pub fn customer_options(
    customer_names: impl IntoIterator<Item = String>,
    company_names: impl IntoIterator<Item = String>,
) -> Vec<CustomerOption> {
    let mut names: Vec<String> = customer_names
        .into_iter()
        .chain(company_names)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();
    names.sort();
    names.dedup();
    names.into_iter().map(|name| CustomerOption { name }).collect()
}
