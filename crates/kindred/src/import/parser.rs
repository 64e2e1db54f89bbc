use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use std::io::Read;

use crate::records::{Gender, LifeEvent, NewPerson};

/// One person row of a family export.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct PersonRow {
    #[serde(rename = "Ref")]
    pub(crate) reference: String,
    #[serde(rename = "Given Name", default)]
    pub(crate) given_name: String,
    #[serde(rename = "Surname", default)]
    pub(crate) surname: String,
    #[serde(rename = "Gender", default, deserialize_with = "empty_string_as_none")]
    pub(crate) gender: Option<String>,
    #[serde(
        rename = "Birth Date",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) birth_date: Option<String>,
    #[serde(
        rename = "Birth Place",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) birth_place: Option<String>,
    #[serde(
        rename = "Death Date",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) death_date: Option<String>,
    #[serde(
        rename = "Death Place",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) death_place: Option<String>,
    #[serde(
        rename = "Father Ref",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) father: Option<String>,
    #[serde(
        rename = "Mother Ref",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) mother: Option<String>,
    #[serde(
        rename = "Partner Ref",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) partner: Option<String>,
}

impl PersonRow {
    /// Person payload for this row, or the reason the row cannot be used.
    pub(crate) fn to_new_person(&self) -> Result<NewPerson, String> {
        let birth = LifeEvent {
            date: optional_date(self.birth_date.as_deref(), "birth")?,
            place: self.birth_place.clone(),
        };
        let death = LifeEvent {
            date: optional_date(self.death_date.as_deref(), "death")?,
            place: self.death_place.clone(),
        };
        Ok(NewPerson {
            given_name: self.given_name.clone(),
            surname: self.surname.clone(),
            gender: self
                .gender
                .as_deref()
                .and_then(Gender::parse)
                .unwrap_or_default(),
            birth,
            death,
            ..NewPerson::default()
        })
    }
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<PersonRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();
    for record in csv_reader.deserialize::<PersonRow>() {
        rows.push(record?);
    }
    Ok(rows)
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn optional_date(value: Option<&str>, label: &str) -> Result<Option<NaiveDate>, String> {
    match value {
        Some(raw) => parse_date(raw)
            .map(Some)
            .ok_or_else(|| format!("invalid {label} date '{raw}'")),
        None => Ok(None),
    }
}

/// `YYYY-MM-DD`, or a bare year which maps to January 1st.
pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if trimmed.len() == 4 && trimmed.chars().all(|ch| ch.is_ascii_digit()) {
        return trimmed
            .parse::<i32>()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1));
    }
    None
}
