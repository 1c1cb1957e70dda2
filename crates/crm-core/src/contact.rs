//! # Contacts
//!
//! A contact is a company plus its contact persons. The stored form is the
//! structured one only; the legacy flat fields (`name`, `email`, `phone`,
//! `company`) are accepted on input by [`ContactInput`] as fallbacks and
//! emitted on output by the [`ContactView`] projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::attachment::{Attachable, Attachment};
use crate::change::{Tracked, TrackedField};
use crate::choice::choice_enum;
use crate::error::ValidationErrors;
use crate::identity::{ActorId, EntityKind};
use crate::validate::{trimmed, Mode, Validator};

choice_enum! {
    /// Relationship stage of a contact.
    pub enum ContactType (default Prospect) {
        /// Not yet a customer.
        Prospect => "prospect",
        /// Paying customer.
        Customer => "customer",
    }
}

/// Postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    /// Country.
    pub country: String,
    /// State or region.
    pub state: String,
    /// First address line.
    pub address_line1: String,
    /// Second address line.
    pub address_line2: String,
    /// Postal code.
    pub postal_code: String,
}

impl Address {
    fn trimmed(self) -> Self {
        Self {
            country: self.country.trim().to_string(),
            state: self.state.trim().to_string(),
            address_line1: self.address_line1.trim().to_string(),
            address_line2: self.address_line2.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
        }
    }
}

/// A person at the contact's company.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactPerson {
    /// Salutation.
    #[serde(default)]
    pub title: String,
    /// Full name (required).
    pub name: String,
    /// Job title.
    #[serde(default)]
    pub designation: String,
    /// Email, lowercased.
    #[serde(default)]
    pub email: String,
    /// Phone number.
    #[serde(default)]
    pub phone_number: String,
    /// LinkedIn profile.
    #[serde(default)]
    pub linkedin: String,
    /// Personal address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
}

/// A stored contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Identifier.
    pub id: Uuid,
    /// Prospect or customer.
    pub contact_type: ContactType,
    /// Company name (required).
    pub company_name: String,
    /// Company address.
    #[serde(default)]
    pub company_address: Address,
    /// Free-form details.
    #[serde(default)]
    pub additional_details: String,
    /// Company email, lowercased (required).
    pub company_email: String,
    /// Company phone (required).
    pub phone_number: String,
    /// Company website.
    #[serde(default)]
    pub website: String,
    /// People at the company; the first one names the contact.
    #[serde(default)]
    pub contact_persons: Vec<ContactPerson>,
    /// Single logo slot.
    #[serde(default)]
    pub company_logo: Option<Attachment>,
    /// General attachments.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Actor that created the contact.
    pub owner_id: Option<ActorId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Contact person as accepted on input; `name` is checked by the validator.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactPersonInput {
    /// Salutation.
    pub title: Option<String>,
    /// Full name.
    pub name: Option<String>,
    /// Job title.
    pub designation: Option<String>,
    /// Email.
    pub email: Option<String>,
    /// Phone number.
    pub phone_number: Option<String>,
    /// LinkedIn profile.
    pub linkedin: Option<String>,
    /// Personal address.
    pub address: Option<Address>,
    /// Notes.
    pub notes: Option<String>,
}

/// Create/update body for contacts. Every field is optional at the type
/// level; required fields are enforced by [`Contact::create`].
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactInput {
    /// `prospect` or `customer`.
    pub contact_type: Option<String>,
    /// Company name.
    pub company_name: Option<String>,
    /// Company address.
    pub company_address: Option<Address>,
    /// Free-form details.
    pub additional_details: Option<String>,
    /// Company email.
    pub company_email: Option<String>,
    /// Company phone.
    pub phone_number: Option<String>,
    /// Website.
    pub website: Option<String>,
    /// Contact persons (replaces the whole list when present).
    pub contact_persons: Option<Vec<ContactPersonInput>>,
    /// Legacy: first contact person's name.
    pub name: Option<String>,
    /// Legacy: company email.
    pub email: Option<String>,
    /// Legacy: company phone.
    pub phone: Option<String>,
    /// Legacy: company name.
    pub company: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

impl ContactInput {
    fn company_name(&self) -> Option<&str> {
        non_blank(&self.company_name)
            .or(non_blank(&self.company))
            .or(self.company_name.as_deref())
    }

    fn company_email(&self) -> Option<&str> {
        non_blank(&self.company_email)
            .or(non_blank(&self.email))
            .or(self.company_email.as_deref())
    }

    fn phone_number(&self) -> Option<&str> {
        non_blank(&self.phone_number)
            .or(non_blank(&self.phone))
            .or(self.phone_number.as_deref())
    }
}

impl Contact {
    /// Validate `input` and build a new contact.
    pub fn create(
        input: ContactInput,
        owner_id: Option<ActorId>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationErrors> {
        let mut contact = Self {
            id: Uuid::new_v4(),
            contact_type: ContactType::default(),
            company_name: String::new(),
            company_address: Address::default(),
            additional_details: String::new(),
            company_email: String::new(),
            phone_number: String::new(),
            website: String::new(),
            contact_persons: Vec::new(),
            company_logo: None,
            attachments: Vec::new(),
            owner_id,
            created_at: now,
            updated_at: now,
        };
        let mut v = Validator::new(Mode::Create);
        contact.apply(input, &mut v);
        v.finish()?;
        Ok(contact)
    }

    /// Validate a partial update and return the patched contact.
    pub fn patched(&self, input: ContactInput, now: DateTime<Utc>) -> Result<Self, ValidationErrors> {
        let mut next = self.clone();
        let mut v = Validator::new(Mode::Update);
        next.apply(input, &mut v);
        v.finish()?;
        next.updated_at = now;
        Ok(next)
    }

    fn apply(&mut self, input: ContactInput, v: &mut Validator) {
        if let Some(t) = v.choice::<ContactType>("contactType", input.contact_type.as_deref()) {
            self.contact_type = t;
        }
        if let Some(name) = v.required_text("companyName", input.company_name()) {
            self.company_name = name;
        }
        if let Some(email) = v.email("companyEmail", input.company_email(), true) {
            self.company_email = email;
        }
        if let Some(phone) = v.required_text("phoneNumber", input.phone_number()) {
            self.phone_number = phone;
        }
        if let Some(address) = input.company_address {
            self.company_address = address.trimmed();
        }
        if let Some(details) = trimmed(input.additional_details.as_deref()) {
            self.additional_details = details;
        }
        if let Some(website) = trimmed(input.website.as_deref()) {
            self.website = website;
        }
        match input.contact_persons {
            Some(persons) => {
                self.contact_persons = persons
                    .into_iter()
                    .enumerate()
                    .filter_map(|(i, p)| person(i, p, v))
                    .collect();
            }
            None => {
                if let Some(name) = non_blank(&input.name).map(str::trim) {
                    match self.contact_persons.first_mut() {
                        Some(first) => first.name = name.to_string(),
                        None => self.contact_persons.push(ContactPerson {
                            name: name.to_string(),
                            ..ContactPerson::default()
                        }),
                    }
                }
            }
        }
    }

    /// Reference label: first contact person's name, else the company name.
    pub fn display_name(&self) -> String {
        self.contact_persons
            .first()
            .map(|p| p.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.company_name.clone())
    }

    /// Storage ids of every blob owned by this contact, logo included.
    pub fn all_storage_ids(&self) -> Vec<String> {
        let mut ids = self.storage_ids();
        if let Some(logo) = &self.company_logo {
            ids.push(logo.storage_id.clone());
        }
        ids
    }
}

fn person(index: usize, input: ContactPersonInput, v: &mut Validator) -> Option<ContactPerson> {
    let name_field = format!("contactPersons[{index}].name");
    let name = match input.name.as_deref().map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => {
            v.push(&name_field, "is required");
            return None;
        }
    };
    let email_field = format!("contactPersons[{index}].email");
    let email = v.email(&email_field, input.email.as_deref(), false)?;
    Some(ContactPerson {
        title: trimmed(input.title.as_deref()).unwrap_or_default(),
        name,
        designation: trimmed(input.designation.as_deref()).unwrap_or_default(),
        email,
        phone_number: trimmed(input.phone_number.as_deref()).unwrap_or_default(),
        linkedin: trimmed(input.linkedin.as_deref()).unwrap_or_default(),
        address: input.address.map(Address::trimmed),
        notes: trimmed(input.notes.as_deref()).unwrap_or_default(),
    })
}

impl Tracked for Contact {
    const KIND: EntityKind = EntityKind::Contact;
    const TRACKED: &'static [TrackedField] = &[
        TrackedField::plain("contactType"),
        TrackedField::plain("companyName"),
        TrackedField::plain("companyAddress"),
        TrackedField::plain("additionalDetails"),
        TrackedField::plain("companyEmail"),
        TrackedField::plain("phoneNumber"),
        TrackedField::plain("website"),
        TrackedField::plain("contactPersons"),
    ];

    fn tracked_value(&self, field: &str) -> Value {
        let value = match field {
            "contactType" => serde_json::to_value(self.contact_type),
            "companyName" => Ok(Value::from(self.company_name.as_str())),
            "companyAddress" => serde_json::to_value(&self.company_address),
            "additionalDetails" => Ok(Value::from(self.additional_details.as_str())),
            "companyEmail" => Ok(Value::from(self.company_email.as_str())),
            "phoneNumber" => Ok(Value::from(self.phone_number.as_str())),
            "website" => Ok(Value::from(self.website.as_str())),
            "contactPersons" => serde_json::to_value(&self.contact_persons),
            _ => Ok(Value::Null),
        };
        value.unwrap_or(Value::Null)
    }
}

impl Attachable for Contact {
    const KIND: EntityKind = EntityKind::Contact;

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

/// Output projection: the stored contact plus the legacy flat fields.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ContactView {
    /// The stored contact.
    #[serde(flatten)]
    pub contact: Contact,
    /// First contact person's name.
    pub name: String,
    /// Company email.
    pub email: String,
    /// Company phone.
    pub phone: String,
    /// Company name.
    pub company: String,
}

impl From<Contact> for ContactView {
    fn from(contact: Contact) -> Self {
        let name = contact
            .contact_persons
            .first()
            .map(|p| p.name.clone())
            .unwrap_or_default();
        Self {
            name,
            email: contact.company_email.clone(),
            phone: contact.phone_number.clone(),
            company: contact.company_name.clone(),
            contact,
        }
    }
}

/// Distinct, non-empty company names, sorted.
pub fn company_names<'a>(contacts: impl IntoIterator<Item = &'a Contact>) -> Vec<String> {
    let mut names: Vec<String> = contacts
        .into_iter()
        .map(|c| c.company_name.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();
    names.sort();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ChangeDetector, RawIds};
    use serde_json::json;

    fn input(value: serde_json::Value) -> ContactInput {
        serde_json::from_value(value).unwrap()
    }

    fn acme() -> Contact {
        Contact::create(
            input(json!({
                "companyName": "Acme Pty",
                "companyEmail": "Sales@Acme.com",
                "phoneNumber": "+61 2 5550 1234",
                "contactPersons": [{ "name": "Jordan Lee", "email": "J.Lee@Acme.com" }]
            })),
            None,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn create_applies_defaults_and_normalizes() {
        let c = acme();
        assert_eq!(c.contact_type, ContactType::Prospect);
        assert_eq!(c.company_email, "sales@acme.com");
        assert_eq!(c.contact_persons[0].email, "j.lee@acme.com");
        assert_eq!(c.display_name(), "Jordan Lee");
    }

    #[test]
    fn legacy_fields_are_accepted_as_fallbacks() {
        let c = Contact::create(
            input(json!({
                "name": "Sam Ortiz",
                "email": "sam@ortiz.io",
                "phone": "0400 000 000",
                "company": "Ortiz Labs"
            })),
            None,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(c.company_name, "Ortiz Labs");
        assert_eq!(c.company_email, "sam@ortiz.io");
        assert_eq!(c.phone_number, "0400 000 000");
        assert_eq!(c.contact_persons[0].name, "Sam Ortiz");
    }

    #[test]
    fn create_reports_all_missing_fields() {
        let err = Contact::create(input(json!({ "contactType": "vip" })), None, Utc::now())
            .unwrap_err();
        for field in ["contactType", "companyName", "companyEmail", "phoneNumber"] {
            assert!(err.has_field(field), "missing {field}");
        }
    }

    #[test]
    fn person_without_name_is_rejected_by_index() {
        let err = Contact::create(
            input(json!({
                "companyName": "Acme",
                "companyEmail": "a@acme.com",
                "phoneNumber": "1",
                "contactPersons": [{ "name": "A" }, { "designation": "CTO" }]
            })),
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(err.has_field("contactPersons[1].name"));
    }

    #[test]
    fn view_projects_legacy_fields() {
        let view = ContactView::from(acme());
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["name"], "Jordan Lee");
        assert_eq!(json["company"], "Acme Pty");
        assert_eq!(json["email"], "sales@acme.com");
        assert_eq!(json["companyName"], "Acme Pty");
    }

    #[test]
    fn display_name_falls_back_to_company() {
        let mut c = acme();
        c.contact_persons.clear();
        assert_eq!(c.display_name(), "Acme Pty");
    }

    #[test]
    fn patch_changes_only_given_fields() {
        let before = acme();
        let after = before
            .patched(input(json!({ "website": "acme.example", "contactType": "customer" })), Utc::now())
            .unwrap();
        let changes = ChangeDetector::new(&RawIds).detect(&before, &after);
        let fields: Vec<_> = changes.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["contactType", "website"]);
        assert_eq!(after.company_name, before.company_name);
    }

    #[test]
    fn company_names_are_distinct_and_sorted() {
        let mut a = acme();
        let b = acme();
        a.company_name = "Beta".into();
        let mut blank = acme();
        blank.company_name = "  ".into();
        assert_eq!(company_names([&a, &b, &blank, &a]), vec!["Acme Pty", "Beta"]);
    }
}
