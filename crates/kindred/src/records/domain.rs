use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::audit::{AuditStamp, Audited, UserId};

/// Identifier wrapper for people in the archive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PersonId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HouseholdId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParentChildId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartnershipId(pub String);

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Female,
    Male,
    Other,
    #[default]
    Unknown,
}

impl Gender {
    pub const fn label(self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
            Gender::Other => "other",
            Gender::Unknown => "unknown",
        }
    }

    /// Lenient parser used by contributions and csv import.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "f" | "female" | "woman" => Some(Gender::Female),
            "m" | "male" | "man" => Some(Gender::Male),
            "o" | "other" | "x" => Some(Gender::Other),
            "u" | "unknown" | "" => Some(Gender::Unknown),
            _ => None,
        }
    }
}

/// Date and place of a vital event such as a birth or death.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LifeEvent {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub place: Option<String>,
}

impl LifeEvent {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.place.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub given_name: String,
    pub surname: String,
    pub maiden_name: Option<String>,
    pub nickname: Option<String>,
    pub gender: Gender,
    pub birth: LifeEvent,
    pub death: LifeEvent,
    pub biography: Option<String>,
    pub living: bool,
    pub audit: AuditStamp,
}

impl Person {
    pub fn display_name(&self) -> String {
        match (self.given_name.is_empty(), self.surname.is_empty()) {
            (false, false) => format!("{} {}", self.given_name, self.surname),
            (false, true) => self.given_name.clone(),
            (true, false) => self.surname.clone(),
            (true, true) => self.id.0.clone(),
        }
    }

    /// Text rendering of a single field, as compared by contribution review.
    pub fn field_value(&self, field: PersonField) -> Option<String> {
        match field {
            PersonField::GivenName => non_empty(&self.given_name),
            PersonField::Surname => non_empty(&self.surname),
            PersonField::MaidenName => self.maiden_name.clone(),
            PersonField::Nickname => self.nickname.clone(),
            PersonField::Gender => Some(self.gender.label().to_string()),
            PersonField::BirthDate => self.birth.date.map(|date| date.to_string()),
            PersonField::BirthPlace => self.birth.place.clone(),
            PersonField::DeathDate => self.death.date.map(|date| date.to_string()),
            PersonField::DeathPlace => self.death.place.clone(),
            PersonField::Biography => self.biography.clone(),
        }
    }

    pub fn summary(&self) -> PersonSummary {
        PersonSummary {
            id: self.id.clone(),
            name: self.display_name(),
            gender: self.gender,
            birth_year: self.birth.date.map(|date| chrono::Datelike::year(&date)),
            death_year: self.death.date.map(|date| chrono::Datelike::year(&date)),
            living: self.living,
        }
    }

    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [
            Some(self.given_name.as_str()),
            Some(self.surname.as_str()),
            self.maiden_name.as_deref(),
            self.nickname.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|value| value.to_lowercase().contains(&needle))
    }
}

impl Audited for Person {
    fn audit(&self) -> &AuditStamp {
        &self.audit
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Compact projection used by tree views and listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonSummary {
    pub id: PersonId,
    pub name: String,
    pub gender: Gender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub death_year: Option<i32>,
    pub living: bool,
}

/// Single editable fact on a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonField {
    GivenName,
    Surname,
    MaidenName,
    Nickname,
    Gender,
    BirthDate,
    BirthPlace,
    DeathDate,
    DeathPlace,
    Biography,
}

impl PersonField {
    pub const fn label(self) -> &'static str {
        match self {
            PersonField::GivenName => "given name",
            PersonField::Surname => "surname",
            PersonField::MaidenName => "maiden name",
            PersonField::Nickname => "nickname",
            PersonField::Gender => "gender",
            PersonField::BirthDate => "birth date",
            PersonField::BirthPlace => "birth place",
            PersonField::DeathDate => "death date",
            PersonField::DeathPlace => "death place",
            PersonField::Biography => "biography",
        }
    }
}

/// Parsed value for a [`PersonField`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(Option<String>),
    Gender(Gender),
    Date(Option<NaiveDate>),
}

impl PersonField {
    /// Parse raw text for this field. Blank input clears optional fields.
    pub fn parse_value(self, raw: Option<&str>) -> Result<FieldValue, String> {
        let trimmed = raw.map(str::trim).filter(|value| !value.is_empty());
        match self {
            PersonField::Gender => {
                let raw = trimmed.unwrap_or("unknown");
                Gender::parse(raw)
                    .map(FieldValue::Gender)
                    .ok_or_else(|| format!("'{raw}' is not a recognised gender"))
            }
            PersonField::BirthDate | PersonField::DeathDate => match trimmed {
                None => Ok(FieldValue::Date(None)),
                Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map(|date| FieldValue::Date(Some(date)))
                    .map_err(|_| format!("'{raw}' is not a YYYY-MM-DD date")),
            },
            _ => Ok(FieldValue::Text(trimmed.map(str::to_string))),
        }
    }

    /// Canonical text form of a parsed value, comparable with [`Person::field_value`].
    pub fn render(self, value: &FieldValue) -> Option<String> {
        match value {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Gender(gender) => Some(gender.label().to_string()),
            FieldValue::Date(date) => date.map(|date| date.to_string()),
        }
    }
}

impl Person {
    /// Write one field. Recording a death date marks the person as deceased.
    pub fn set_field(&mut self, field: PersonField, value: FieldValue) {
        match (field, value) {
            (PersonField::GivenName, FieldValue::Text(text)) => {
                self.given_name = text.unwrap_or_default()
            }
            (PersonField::Surname, FieldValue::Text(text)) => self.surname = text.unwrap_or_default(),
            (PersonField::MaidenName, FieldValue::Text(text)) => self.maiden_name = text,
            (PersonField::Nickname, FieldValue::Text(text)) => self.nickname = text,
            (PersonField::BirthPlace, FieldValue::Text(text)) => self.birth.place = text,
            (PersonField::DeathPlace, FieldValue::Text(text)) => self.death.place = text,
            (PersonField::Biography, FieldValue::Text(text)) => self.biography = text,
            (PersonField::Gender, FieldValue::Gender(gender)) => self.gender = gender,
            (PersonField::BirthDate, FieldValue::Date(date)) => self.birth.date = date,
            (PersonField::DeathDate, FieldValue::Date(date)) => {
                if date.is_some() {
                    self.living = false;
                }
                self.death.date = date;
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPerson {
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub maiden_name: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub birth: LifeEvent,
    #[serde(default)]
    pub death: LifeEvent,
    #[serde(default)]
    pub biography: Option<String>,
    /// Defaults to living unless a death is recorded.
    #[serde(default)]
    pub living: Option<bool>,
    #[serde(default)]
    pub household: Option<HouseholdId>,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonUpdate {
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub maiden_name: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub birth: Option<LifeEvent>,
    #[serde(default)]
    pub death: Option<LifeEvent>,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub living: Option<bool>,
}

/// Access level a user holds within a household.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum HouseholdRole {
    Viewer,
    Editor,
    Owner,
}

impl HouseholdRole {
    pub fn can_edit(self) -> bool {
        self >= HouseholdRole::Editor
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Household {
    pub id: HouseholdId,
    pub name: String,
    pub description: Option<String>,
    pub members: Vec<PersonId>,
    pub permissions: BTreeMap<UserId, HouseholdRole>,
    pub audit: AuditStamp,
}

impl Household {
    pub fn role_of(&self, user: &UserId) -> Option<HouseholdRole> {
        self.permissions.get(user).copied()
    }

    pub fn contains(&self, person: &PersonId) -> bool {
        self.members.contains(person)
    }

    pub fn owner_count(&self) -> usize {
        self.permissions
            .values()
            .filter(|role| **role == HouseholdRole::Owner)
            .count()
    }

    /// Users able to edit the household's people, in id order.
    pub fn editors(&self) -> Vec<UserId> {
        self.permissions
            .iter()
            .filter(|(_, role)| role.can_edit())
            .map(|(user, _)| user.clone())
            .collect()
    }
}

impl Audited for Household {
    fn audit(&self) -> &AuditStamp {
        &self.audit
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHousehold {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentKind {
    #[default]
    Biological,
    Adoptive,
    Step,
    Foster,
}

/// Directed edge from a parent to a child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentChild {
    pub id: ParentChildId,
    pub parent: PersonId,
    pub child: PersonId,
    pub kind: ParentKind,
    pub audit: AuditStamp,
}

impl Audited for ParentChild {
    fn audit(&self) -> &AuditStamp {
        &self.audit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnershipKind {
    #[default]
    Marriage,
    CivilUnion,
    Partner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnershipStatus {
    #[default]
    Current,
    Separated,
    Divorced,
    Widowed,
}

/// Undirected edge between two partners; the pair is stored in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partnership {
    pub id: PartnershipId,
    pub partners: (PersonId, PersonId),
    pub kind: PartnershipKind,
    pub status: PartnershipStatus,
    pub started_on: Option<NaiveDate>,
    pub ended_on: Option<NaiveDate>,
    pub audit: AuditStamp,
}

impl Partnership {
    pub fn normalized_pair(a: PersonId, b: PersonId) -> (PersonId, PersonId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn involves(&self, person: &PersonId) -> bool {
        &self.partners.0 == person || &self.partners.1 == person
    }

    pub fn other(&self, person: &PersonId) -> Option<&PersonId> {
        if &self.partners.0 == person {
            Some(&self.partners.1)
        } else if &self.partners.1 == person {
            Some(&self.partners.0)
        } else {
            None
        }
    }
}

impl Audited for Partnership {
    fn audit(&self) -> &AuditStamp {
        &self.audit
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewParentChild {
    pub parent: PersonId,
    pub child: PersonId,
    #[serde(default)]
    pub kind: ParentKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPartnership {
    pub first: PersonId,
    pub second: PersonId,
    #[serde(default)]
    pub kind: PartnershipKind,
    #[serde(default)]
    pub status: PartnershipStatus,
    #[serde(default)]
    pub started_on: Option<NaiveDate>,
    #[serde(default)]
    pub ended_on: Option<NaiveDate>,
}
