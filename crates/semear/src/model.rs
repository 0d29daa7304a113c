//! Core record types for semear.
//!
//! This module defines the two persisted record kinds (beneficiary families
//! and donations), the draft/patch payloads used to create and update them,
//! and the closed set of donation categories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Pattern a Brazilian postal code (CEP) must match, hyphen optional.
const CEP_PATTERN: &str = r"^\d{5}-?\d{3}$";

/// The category of goods a donation consists of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationType {
    /// Non-perishable food (rice, beans, canned goods).
    NonPerishableFood,
    /// Perishable food (produce, dairy).
    PerishableFood,
    /// Clothing.
    Clothing,
    /// Shoes.
    Shoes,
    /// Personal hygiene products.
    Hygiene,
    /// Cleaning products.
    Cleaning,
    /// Medicine.
    Medicine,
    /// Furniture.
    Furniture,
    /// Household appliances.
    Appliances,
    /// School supplies.
    SchoolSupplies,
    /// Toys.
    Toys,
    /// Anything that doesn't fit the categories above.
    Other,
}

impl DonationType {
    /// All categories, in registration-form order.
    pub const ALL: [Self; 12] = [
        Self::NonPerishableFood,
        Self::PerishableFood,
        Self::Clothing,
        Self::Shoes,
        Self::Hygiene,
        Self::Cleaning,
        Self::Medicine,
        Self::Furniture,
        Self::Appliances,
        Self::SchoolSupplies,
        Self::Toys,
        Self::Other,
    ];

    /// Human-readable label for listings and reports.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::NonPerishableFood => "Non-perishable food",
            Self::PerishableFood => "Perishable food",
            Self::Clothing => "Clothing",
            Self::Shoes => "Shoes",
            Self::Hygiene => "Hygiene products",
            Self::Cleaning => "Cleaning products",
            Self::Medicine => "Medicine",
            Self::Furniture => "Furniture",
            Self::Appliances => "Appliances",
            Self::SchoolSupplies => "School supplies",
            Self::Toys => "Toys",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for DonationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::NonPerishableFood => "non_perishable_food",
            Self::PerishableFood => "perishable_food",
            Self::Clothing => "clothing",
            Self::Shoes => "shoes",
            Self::Hygiene => "hygiene",
            Self::Cleaning => "cleaning",
            Self::Medicine => "medicine",
            Self::Furniture => "furniture",
            Self::Appliances => "appliances",
            Self::SchoolSupplies => "school_supplies",
            Self::Toys => "toys",
            Self::Other => "other",
        };
        write!(f, "{tag}")
    }
}

impl std::str::FromStr for DonationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "non_perishable_food" => Ok(Self::NonPerishableFood),
            "perishable_food" => Ok(Self::PerishableFood),
            "clothing" => Ok(Self::Clothing),
            "shoes" => Ok(Self::Shoes),
            "hygiene" => Ok(Self::Hygiene),
            "cleaning" => Ok(Self::Cleaning),
            "medicine" => Ok(Self::Medicine),
            "furniture" => Ok(Self::Furniture),
            "appliances" => Ok(Self::Appliances),
            "school_supplies" => Ok(Self::SchoolSupplies),
            "toys" => Ok(Self::Toys),
            "other" => Ok(Self::Other),
            _ => Err(Error::validation(format!("unknown donation type: {s}"))),
        }
    }
}

/// A single member of a beneficiary family.
///
/// Ids are unique within one family only; they exist so individual members
/// can be edited or removed without relying on list positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyMember {
    /// Identifier, unique within the owning family.
    pub id: String,
    /// Age in years.
    pub age: u32,
}

/// A beneficiary family record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Family {
    /// Store-assigned identifier. Never reused, never mutated.
    pub id: i64,
    /// Name of the person responsible for the household.
    pub responsible_name: String,
    /// Number of members. Kept equal to `members.len()` on every edit.
    pub member_count: u32,
    /// The household members.
    pub members: Vec<FamilyMember>,
    /// Contact phone.
    pub phone: String,
    /// Optional contact e-mail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Postal code.
    pub cep: String,
    /// Street address.
    pub address: String,
    /// Neighborhood.
    pub neighborhood: String,
    /// City.
    pub city: String,
    /// State.
    pub state: String,
    /// Optional address complement (apartment, block).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complemento: Option<String>,
    /// Optional house number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Free-text notes about the family.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
    /// When the record was created. Immutable.
    pub created_at: DateTime<Utc>,
    /// Date of the most recent donation to this family, if any.
    ///
    /// Derived: always the maximum donation date among this family's
    /// donation records, maintained by the consistency engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_donation: Option<DateTime<Utc>>,
}

impl Family {
    /// Add a member with the given age, assigning a fresh member id.
    ///
    /// Keeps `member_count` in sync with the member list. Returns the new
    /// member's id.
    pub fn add_member(&mut self, age: u32) -> String {
        let id = next_member_id(&self.members);
        self.members.push(FamilyMember {
            id: id.clone(),
            age,
        });
        self.member_count = self.members.len() as u32;
        id
    }

    /// Remove the member with the given id.
    ///
    /// Returns `true` if a member was removed. Keeps `member_count` in sync.
    pub fn remove_member(&mut self, member_id: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m.id != member_id);
        self.member_count = self.members.len() as u32;
        self.members.len() != before
    }

    /// Update the age of the member with the given id.
    ///
    /// Returns `false` if no such member exists.
    pub fn set_member_age(&mut self, member_id: &str, age: u32) -> bool {
        match self.members.iter_mut().find(|m| m.id == member_id) {
            Some(member) => {
                member.age = age;
                true
            }
            None => false,
        }
    }

    /// Whether this family has ever received a donation.
    #[must_use]
    pub fn has_received_donation(&self) -> bool {
        self.last_donation.is_some()
    }
}

/// Assign the next member id, unique among the given members.
fn next_member_id(members: &[FamilyMember]) -> String {
    let max = members
        .iter()
        .filter_map(|m| m.id.strip_prefix('m').and_then(|s| s.parse::<u64>().ok()))
        .max()
        .unwrap_or(0);
    format!("m{}", max + 1)
}

/// Build a member list from a list of ages, assigning sequential ids.
#[must_use]
pub fn members_from_ages(ages: &[u32]) -> Vec<FamilyMember> {
    ages.iter()
        .enumerate()
        .map(|(i, &age)| FamilyMember {
            id: format!("m{}", i + 1),
            age,
        })
        .collect()
}

/// Payload for creating a family record.
///
/// Everything except the store-assigned id, the creation timestamp, and the
/// derived fields. `member_count` is not part of the draft: it is computed
/// from `members` when the record is written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FamilyDraft {
    /// Name of the person responsible for the household.
    pub responsible_name: String,
    /// The household members.
    pub members: Vec<FamilyMember>,
    /// Contact phone.
    pub phone: String,
    /// Optional contact e-mail.
    pub email: Option<String>,
    /// Postal code.
    pub cep: String,
    /// Street address.
    pub address: String,
    /// Neighborhood.
    pub neighborhood: String,
    /// City.
    pub city: String,
    /// State.
    pub state: String,
    /// Optional address complement.
    pub complemento: Option<String>,
    /// Optional house number.
    pub number: Option<String>,
    /// Free-text notes.
    pub observations: Option<String>,
}

impl FamilyDraft {
    /// Validate the draft before it reaches the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when a required field is empty, the CEP
    /// is malformed, or a member id is duplicated.
    pub fn validate(&self) -> Result<()> {
        if self.responsible_name.trim().is_empty() {
            return Err(Error::validation("responsible name must not be empty"));
        }
        if self.phone.trim().is_empty() {
            return Err(Error::validation("phone must not be empty"));
        }
        validate_cep(&self.cep)?;
        validate_member_ids(&self.members)
    }
}

/// Partial update for a family record.
///
/// Only fields set to `Some` are written; everything else is left untouched.
/// The id, creation timestamp, and `last_donation` are not patchable. A
/// `members` patch also rewrites `member_count`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FamilyPatch {
    /// New responsible name.
    pub responsible_name: Option<String>,
    /// New member list (replaces the whole list).
    pub members: Option<Vec<FamilyMember>>,
    /// New phone.
    pub phone: Option<String>,
    /// New e-mail.
    pub email: Option<String>,
    /// New postal code.
    pub cep: Option<String>,
    /// New street address.
    pub address: Option<String>,
    /// New neighborhood.
    pub neighborhood: Option<String>,
    /// New city.
    pub city: Option<String>,
    /// New state.
    pub state: Option<String>,
    /// New address complement.
    pub complemento: Option<String>,
    /// New house number.
    pub number: Option<String>,
    /// New notes.
    pub observations: Option<String>,
}

impl FamilyPatch {
    /// Whether the patch carries no fields at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responsible_name.is_none()
            && self.members.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.cep.is_none()
            && self.address.is_none()
            && self.neighborhood.is_none()
            && self.city.is_none()
            && self.state.is_none()
            && self.complemento.is_none()
            && self.number.is_none()
            && self.observations.is_none()
    }

    /// Validate the supplied fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when a supplied field is invalid.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.responsible_name {
            if name.trim().is_empty() {
                return Err(Error::validation("responsible name must not be empty"));
            }
        }
        if let Some(cep) = &self.cep {
            validate_cep(cep)?;
        }
        if let Some(members) = &self.members {
            validate_member_ids(members)?;
        }
        Ok(())
    }
}

/// A donation record: one delivery of goods to one family.
///
/// Donations are never edited in place; they are created and deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donation {
    /// Store-assigned identifier. Never reused, never mutated.
    pub id: i64,
    /// The family this donation was delivered to. Never changed after
    /// creation; may dangle once the family is deleted (history is kept).
    pub family_id: i64,
    /// Snapshot of the family's responsible name at donation time.
    /// Not re-synced when the family is later renamed.
    pub family_name: String,
    /// Category of the donated goods.
    pub donation_type: DonationType,
    /// Free-text magnitude/description ("5kg", "one basket").
    pub quantity: String,
    /// The donation's effective date. Distinct from `created_at`.
    pub date: DateTime<Utc>,
    /// Name of the person who delivered it.
    pub responsible: String,
    /// Free-text notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
    /// When the record was created. Immutable.
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a donation record.
///
/// The family name snapshot is taken from the stored family record when the
/// donation is written, so the draft only carries the family id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationDraft {
    /// The family receiving the donation.
    pub family_id: i64,
    /// Category of the donated goods.
    pub donation_type: DonationType,
    /// Free-text magnitude/description.
    pub quantity: String,
    /// The donation's effective date.
    pub date: DateTime<Utc>,
    /// Name of the person delivering it.
    pub responsible: String,
    /// Free-text notes.
    pub observations: Option<String>,
}

impl DonationDraft {
    /// Validate the draft before it reaches the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when a required field is empty.
    pub fn validate(&self) -> Result<()> {
        if self.quantity.trim().is_empty() {
            return Err(Error::validation("quantity must not be empty"));
        }
        if self.responsible.trim().is_empty() {
            return Err(Error::validation("delivery responsible must not be empty"));
        }
        Ok(())
    }
}

/// Check a CEP against the accepted format. Empty is allowed; the field is
/// enforced at the form level, not here.
fn validate_cep(cep: &str) -> Result<()> {
    if cep.is_empty() {
        return Ok(());
    }
    let pattern = regex::Regex::new(CEP_PATTERN)
        .map_err(|err| Error::internal(format!("CEP pattern: {err}")))?;
    if pattern.is_match(cep) {
        Ok(())
    } else {
        Err(Error::validation(format!("malformed CEP: {cep}")))
    }
}

/// Member ids must be unique within one family.
fn validate_member_ids(members: &[FamilyMember]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for member in members {
        if !seen.insert(member.id.as_str()) {
            return Err(Error::validation(format!(
                "duplicate member id: {}",
                member.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_family() -> Family {
        Family {
            id: 1,
            responsible_name: "Maria Souza".to_string(),
            member_count: 2,
            members: members_from_ages(&[34, 12]),
            phone: "(11) 91234-5678".to_string(),
            email: None,
            cep: "01310-100".to_string(),
            address: "Avenida Paulista".to_string(),
            neighborhood: "Bela Vista".to_string(),
            city: "São Paulo".to_string(),
            state: "SP".to_string(),
            complemento: None,
            number: Some("1578".to_string()),
            observations: None,
            created_at: Utc::now(),
            last_donation: None,
        }
    }

    fn sample_draft() -> FamilyDraft {
        FamilyDraft {
            responsible_name: "Maria Souza".to_string(),
            members: members_from_ages(&[34, 12]),
            phone: "(11) 91234-5678".to_string(),
            cep: "01310-100".to_string(),
            address: "Avenida Paulista".to_string(),
            neighborhood: "Bela Vista".to_string(),
            city: "São Paulo".to_string(),
            state: "SP".to_string(),
            ..FamilyDraft::default()
        }
    }

    #[test]
    fn test_add_member_keeps_count_in_sync() {
        // Scenario: two existing members, one added.
        let mut family = sample_family();
        assert_eq!(family.member_count, 2);

        family.add_member(7);

        assert_eq!(family.member_count, 3);
        assert_eq!(family.members.len(), 3);
    }

    #[test]
    fn test_add_member_assigns_unique_id() {
        let mut family = sample_family();
        family.add_member(7);
        family.add_member(64);

        let mut ids: Vec<_> = family.members.iter().map(|m| m.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), family.members.len());
    }

    #[test]
    fn test_remove_member_keeps_count_in_sync() {
        let mut family = sample_family();
        let gone = family.members[0].id.clone();

        assert!(family.remove_member(&gone));
        assert_eq!(family.member_count, 1);
        assert_eq!(family.members.len(), 1);

        // Removing again is a no-op.
        assert!(!family.remove_member(&gone));
        assert_eq!(family.member_count, 1);
    }

    #[test]
    fn test_member_id_not_reused_after_removal() {
        let mut family = sample_family();
        family.remove_member("m2");
        let added = family.add_member(5);
        assert_ne!(added, "m1");
    }

    #[test]
    fn test_set_member_age() {
        let mut family = sample_family();
        assert!(family.set_member_age("m1", 35));
        assert_eq!(family.members[0].age, 35);
        assert!(!family.set_member_age("nope", 1));
    }

    #[test]
    fn test_members_from_ages() {
        let members = members_from_ages(&[40, 38, 9]);
        assert_eq!(members.len(), 3);
        assert_eq!(members[0].id, "m1");
        assert_eq!(members[2].id, "m3");
        assert_eq!(members[1].age, 38);
    }

    #[test]
    fn test_draft_validates() {
        assert!(sample_draft().validate().is_ok());
    }

    #[test]
    fn test_draft_rejects_empty_responsible() {
        let mut draft = sample_draft();
        draft.responsible_name = "  ".to_string();
        let err = draft.validate().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_draft_rejects_empty_phone() {
        let mut draft = sample_draft();
        draft.phone = String::new();
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_draft_rejects_malformed_cep() {
        let mut draft = sample_draft();
        draft.cep = "1310".to_string();
        let err = draft.validate().unwrap_err();
        assert!(err.to_string().contains("CEP"));
    }

    #[test]
    fn test_cep_hyphen_optional() {
        let mut draft = sample_draft();
        draft.cep = "01310100".to_string();
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_draft_rejects_duplicate_member_ids() {
        let mut draft = sample_draft();
        draft.members[1].id = draft.members[0].id.clone();
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(FamilyPatch::default().is_empty());

        let patch = FamilyPatch {
            phone: Some("(21) 99999-0000".to_string()),
            ..FamilyPatch::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_patch_validates_supplied_fields_only() {
        // An empty patch is valid even though a draft with these values
        // would not be.
        assert!(FamilyPatch::default().validate().is_ok());

        let patch = FamilyPatch {
            responsible_name: Some(String::new()),
            ..FamilyPatch::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn test_donation_draft_validates() {
        let draft = DonationDraft {
            family_id: 1,
            donation_type: DonationType::NonPerishableFood,
            quantity: "5kg".to_string(),
            date: Utc::now(),
            responsible: "João".to_string(),
            observations: None,
        };
        assert!(draft.validate().is_ok());

        let mut bad = draft.clone();
        bad.quantity = String::new();
        assert!(bad.validate().is_err());

        let mut bad = draft;
        bad.responsible = " ".to_string();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_donation_type_display_round_trip() {
        for kind in DonationType::ALL {
            let parsed: DonationType = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_donation_type_parse_unknown() {
        let result: Result<DonationType> = "gold".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_donation_type_labels() {
        assert_eq!(
            DonationType::NonPerishableFood.label(),
            "Non-perishable food"
        );
        assert_eq!(DonationType::SchoolSupplies.label(), "School supplies");
    }

    #[test]
    fn test_family_serialization_skips_absent_fields() {
        let family = sample_family();
        let json = serde_json::to_string(&family).unwrap();
        assert!(!json.contains("last_donation"));
        assert!(!json.contains("email"));
        assert!(json.contains("responsible_name"));
    }

    #[test]
    fn test_has_received_donation() {
        let mut family = sample_family();
        assert!(!family.has_received_donation());
        family.last_donation = Some(Utc::now());
        assert!(family.has_received_donation());
    }
}
