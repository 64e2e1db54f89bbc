use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::domain::{
    Household, HouseholdId, HouseholdRole, NewHousehold, NewParentChild,
    NewPartnership, NewPerson, ParentChild, ParentChildId, ParentKind, Partnership,
    PartnershipId, Person, PersonField, PersonId, PersonUpdate,
};
use super::repository::FamilyRepository;
use crate::activity::{ActivityKind, ActivityRecorder, ActivityRepository, ActivitySubject};
use crate::audit::{AuditStamp, Audited, IdSequence, UserId};
use crate::store::RepositoryError;

static PERSON_SEQUENCE: IdSequence = IdSequence::new("per");
static HOUSEHOLD_SEQUENCE: IdSequence = IdSequence::new("hh");
static PARENT_CHILD_SEQUENCE: IdSequence = IdSequence::new("pc");
static PARTNERSHIP_SEQUENCE: IdSequence = IdSequence::new("pt");

const MAX_BIOLOGICAL_PARENTS: usize = 2;

/// Validation failures raised while writing genealogical records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordViolation {
    #[error("a person needs a given name or a surname")]
    MissingName,
    #[error("death date precedes birth date")]
    DeathBeforeBirth,
    #[error("a living person cannot have a death date")]
    LivingWithDeathDate,
    #[error("household name must not be empty")]
    BlankHouseholdName,
    #[error("a person cannot be related to themselves")]
    SelfRelationship,
    #[error("child already has {MAX_BIOLOGICAL_PARENTS} biological parents")]
    TooManyBiologicalParents,
    #[error("link would make a person their own ancestor")]
    AncestryCycle,
    #[error("partnership ends before it starts")]
    PartnershipEndsBeforeStart,
    #[error("household must keep at least one owner")]
    LastOwner,
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Error raised by the record service.
#[derive(Debug, thiserror::Error)]
pub enum RecordServiceError {
    #[error(transparent)]
    Validation(#[from] RecordViolation),
    #[error("{0} not found")]
    NotFound(String),
    #[error("caller may not modify {0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Relationship edges touching one person.
#[derive(Debug, Clone, Serialize)]
pub struct PersonRelationships {
    pub parents: Vec<ParentChild>,
    pub children: Vec<ParentChild>,
    pub partnerships: Vec<Partnership>,
}

/// Application service for people, households, and relationship edges.
pub struct FamilyRecordService<F, A> {
    repository: Arc<F>,
    activity: Arc<ActivityRecorder<A>>,
}

impl<F, A> FamilyRecordService<F, A>
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    pub fn new(repository: Arc<F>, activity: Arc<ActivityRecorder<A>>) -> Self {
        Self {
            repository,
            activity,
        }
    }

    pub fn repository(&self) -> &Arc<F> {
        &self.repository
    }

    pub fn create_person(
        &self,
        actor: &UserId,
        new_person: NewPerson,
    ) -> Result<Person, RecordServiceError> {
        let household = match &new_person.household {
            Some(id) => {
                let household = self.live_household(id)?;
                require_role(&household, actor, HouseholdRole::Editor)?;
                Some(household)
            }
            None => None,
        };

        let living = new_person
            .living
            .unwrap_or(new_person.death.date.is_none() && new_person.death.place.is_none());
        let person = Person {
            id: PersonId(PERSON_SEQUENCE.next_id()),
            given_name: new_person.given_name.trim().to_string(),
            surname: new_person.surname.trim().to_string(),
            maiden_name: clean(new_person.maiden_name),
            nickname: clean(new_person.nickname),
            gender: new_person.gender,
            birth: new_person.birth,
            death: new_person.death,
            biography: clean(new_person.biography),
            living,
            audit: AuditStamp::created(actor, Utc::now()),
        };
        validate_person(&person)?;

        let stored = self.repository.insert_person(person)?;

        if let Some(household) = household {
            self.change_household(actor, &household.id, HouseholdRole::Editor, |household| {
                if !household.contains(&stored.id) {
                    household.members.push(stored.id.clone());
                }
                Ok(())
            })?;
        }

        self.activity.record_or_warn(
            actor,
            ActivityKind::PersonAdded,
            ActivitySubject::Person(stored.id.0.clone()),
            format!("added {}", stored.display_name()),
        );
        info!(person_id = %stored.id, %actor, "person created");
        Ok(stored)
    }

    pub fn get_person(&self, id: &PersonId) -> Result<Person, RecordServiceError> {
        self.live_person(id)
    }

    /// Case-insensitive name search, optionally restricted to a household.
    pub fn search_people(
        &self,
        query: Option<&str>,
        household: Option<&HouseholdId>,
    ) -> Result<Vec<Person>, RecordServiceError> {
        let members = match household {
            Some(id) => Some(self.live_household(id)?.members),
            None => None,
        };
        let needle = query.map(str::trim).filter(|needle| !needle.is_empty());

        let mut people: Vec<_> = self
            .repository
            .people()?
            .into_iter()
            .filter(|person| {
                members
                    .as_ref()
                    .map(|members| members.contains(&person.id))
                    .unwrap_or(true)
            })
            .filter(|person| needle.map(|needle| person.matches(needle)).unwrap_or(true))
            .collect();
        people.sort_by(|a, b| {
            a.surname
                .to_lowercase()
                .cmp(&b.surname.to_lowercase())
                .then_with(|| a.given_name.to_lowercase().cmp(&b.given_name.to_lowercase()))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(people)
    }

    pub fn update_person(
        &self,
        actor: &UserId,
        id: &PersonId,
        update: PersonUpdate,
    ) -> Result<Person, RecordServiceError> {
        let person = self.change_person(actor, id, |person| {
            if let Some(given_name) = update.given_name {
                person.given_name = given_name.trim().to_string();
            }
            if let Some(surname) = update.surname {
                person.surname = surname.trim().to_string();
            }
            if let Some(maiden_name) = update.maiden_name {
                person.maiden_name = clean(Some(maiden_name));
            }
            if let Some(nickname) = update.nickname {
                person.nickname = clean(Some(nickname));
            }
            if let Some(gender) = update.gender {
                person.gender = gender;
            }
            if let Some(birth) = update.birth {
                person.birth = birth;
            }
            if let Some(death) = update.death {
                if !death.is_empty() && update.living.is_none() {
                    person.living = false;
                }
                person.death = death;
            }
            if let Some(biography) = update.biography {
                person.biography = clean(Some(biography));
            }
            if let Some(living) = update.living {
                person.living = living;
            }
            Ok(())
        })?;
        self.activity.record_or_warn(
            actor,
            ActivityKind::PersonUpdated,
            ActivitySubject::Person(person.id.0.clone()),
            format!("updated {}", person.display_name()),
        );
        Ok(person)
    }

    /// Write a single field; used when an approved contribution is applied.
    pub fn apply_person_field(
        &self,
        actor: &UserId,
        id: &PersonId,
        field: PersonField,
        raw: Option<&str>,
    ) -> Result<Person, RecordServiceError> {
        let value = field
            .parse_value(raw)
            .map_err(|reason| RecordViolation::InvalidField {
                field: field.label(),
                reason,
            })?;
        self.change_person(actor, id, |person| {
            person.set_field(field, value);
            Ok(())
        })
    }

    pub fn delete_person(&self, actor: &UserId, id: &PersonId) -> Result<(), RecordServiceError> {
        let person = self.live_person(id)?;
        self.require_edit(actor, &person)?;
        self.repository.modify_person(id, |person| {
            if !person.is_live() {
                return Err(RecordServiceError::NotFound(format!("person {id}")));
            }
            person.audit.soft_delete(actor, Utc::now());
            Ok(())
        })?;
        info!(person_id = %id, %actor, "person soft-deleted");
        Ok(())
    }

    pub fn restore_person(
        &self,
        actor: &UserId,
        id: &PersonId,
    ) -> Result<Person, RecordServiceError> {
        let person = self
            .repository
            .fetch_person(id)?
            .ok_or_else(|| RecordServiceError::NotFound(format!("person {id}")))?;
        if person.is_live() {
            return Ok(person);
        }
        self.require_edit(actor, &person)?;
        let person = self.repository.modify_person(id, |person| {
            if !person.is_live() {
                person.audit.restore(actor, Utc::now());
            }
            Ok::<_, RecordServiceError>(person.clone())
        })?;
        info!(person_id = %id, %actor, "person restored");
        Ok(person)
    }

    /// Edit rights: the creator, or an editor/owner of any household listing the person.
    pub fn can_edit(&self, actor: &UserId, person: &Person) -> Result<bool, RecordServiceError> {
        if &person.audit.created_by == actor {
            return Ok(true);
        }
        Ok(self
            .repository
            .households_containing(&person.id)?
            .iter()
            .any(|household| {
                household
                    .role_of(actor)
                    .map(HouseholdRole::can_edit)
                    .unwrap_or(false)
            }))
    }

    /// Editors and owners of the households listing the person, in id order.
    /// Falls back to the creator when no household lists the person.
    pub fn reviewers_of(&self, person: &Person) -> Result<Vec<UserId>, RecordServiceError> {
        let mut reviewers = BTreeSet::new();
        for household in self.repository.households_containing(&person.id)? {
            reviewers.extend(household.editors());
        }
        if reviewers.is_empty() {
            reviewers.insert(person.audit.created_by.clone());
        }
        Ok(reviewers.into_iter().collect())
    }

    pub fn create_household(
        &self,
        actor: &UserId,
        new_household: NewHousehold,
    ) -> Result<Household, RecordServiceError> {
        let name = new_household.name.trim().to_string();
        if name.is_empty() {
            return Err(RecordViolation::BlankHouseholdName.into());
        }
        let mut permissions = BTreeMap::new();
        permissions.insert(actor.clone(), HouseholdRole::Owner);

        let household = Household {
            id: HouseholdId(HOUSEHOLD_SEQUENCE.next_id()),
            name,
            description: clean(new_household.description),
            members: Vec::new(),
            permissions,
            audit: AuditStamp::created(actor, Utc::now()),
        };
        let stored = self.repository.insert_household(household)?;
        info!(household_id = %stored.id.0, %actor, "household created");
        Ok(stored)
    }

    pub fn get_household(
        &self,
        actor: &UserId,
        id: &HouseholdId,
    ) -> Result<Household, RecordServiceError> {
        let household = self.live_household(id)?;
        require_role(&household, actor, HouseholdRole::Viewer)?;
        Ok(household)
    }

    pub fn households_for(&self, actor: &UserId) -> Result<Vec<Household>, RecordServiceError> {
        Ok(self
            .repository
            .households()?
            .into_iter()
            .filter(|household| household.role_of(actor).is_some())
            .collect())
    }

    pub fn add_household_member(
        &self,
        actor: &UserId,
        id: &HouseholdId,
        person: &PersonId,
    ) -> Result<Household, RecordServiceError> {
        let household = self.live_household(id)?;
        require_role(&household, actor, HouseholdRole::Editor)?;
        self.live_person(person)?;

        self.change_household(actor, id, HouseholdRole::Editor, |household| {
            if !household.contains(person) {
                household.members.push(person.clone());
            }
            Ok(())
        })
    }

    pub fn remove_household_member(
        &self,
        actor: &UserId,
        id: &HouseholdId,
        person: &PersonId,
    ) -> Result<Household, RecordServiceError> {
        self.change_household(actor, id, HouseholdRole::Editor, |household| {
            if !household.contains(person) {
                return Err(RecordServiceError::NotFound(format!(
                    "person {person} in household {}",
                    id.0
                )));
            }
            household.members.retain(|member| member != person);
            Ok(())
        })
    }

    pub fn grant_household_role(
        &self,
        actor: &UserId,
        id: &HouseholdId,
        user: &UserId,
        role: HouseholdRole,
    ) -> Result<Household, RecordServiceError> {
        self.change_household(actor, id, HouseholdRole::Owner, |household| {
            let demotes_last_owner = household.role_of(user) == Some(HouseholdRole::Owner)
                && role != HouseholdRole::Owner
                && household.owner_count() == 1;
            if demotes_last_owner {
                return Err(RecordViolation::LastOwner.into());
            }
            household.permissions.insert(user.clone(), role);
            Ok(())
        })
    }

    pub fn revoke_household_role(
        &self,
        actor: &UserId,
        id: &HouseholdId,
        user: &UserId,
    ) -> Result<Household, RecordServiceError> {
        self.change_household(actor, id, HouseholdRole::Owner, |household| {
            match household.role_of(user) {
                None => {
                    return Err(RecordServiceError::NotFound(format!(
                        "role for {user} in household {}",
                        id.0
                    )))
                }
                Some(HouseholdRole::Owner) if household.owner_count() == 1 => {
                    return Err(RecordViolation::LastOwner.into())
                }
                Some(_) => {}
            }
            household.permissions.remove(user);
            Ok(())
        })
    }

    pub fn link_parent_child(
        &self,
        actor: &UserId,
        link: NewParentChild,
    ) -> Result<ParentChild, RecordServiceError> {
        if link.parent == link.child {
            return Err(RecordViolation::SelfRelationship.into());
        }
        let parent = self.live_person(&link.parent)?;
        let child = self.live_person(&link.child)?;
        if !self.can_edit(actor, &parent)? && !self.can_edit(actor, &child)? {
            return Err(RecordServiceError::Forbidden(format!(
                "relationships of {} and {}",
                parent.id, child.id
            )));
        }

        let links = self.live_parent_links()?;
        if links
            .iter()
            .any(|existing| existing.parent == link.parent && existing.child == link.child)
        {
            return Err(RecordServiceError::Conflict(format!(
                "{} is already a parent of {}",
                parent.id, child.id
            )));
        }
        if link.kind == ParentKind::Biological {
            let biological = links
                .iter()
                .filter(|existing| {
                    existing.child == link.child && existing.kind == ParentKind::Biological
                })
                .count();
            if biological >= MAX_BIOLOGICAL_PARENTS {
                return Err(RecordViolation::TooManyBiologicalParents.into());
            }
        }
        if is_ancestor(&links, &link.child, &link.parent) {
            return Err(RecordViolation::AncestryCycle.into());
        }

        let stored = self.repository.insert_parent_child(ParentChild {
            id: ParentChildId(PARENT_CHILD_SEQUENCE.next_id()),
            parent: link.parent,
            child: link.child,
            kind: link.kind,
            audit: AuditStamp::created(actor, Utc::now()),
        })?;

        self.activity.record_or_warn(
            actor,
            ActivityKind::RelationshipAdded,
            ActivitySubject::Relationship(stored.id.0.clone()),
            format!(
                "linked {} as parent of {}",
                parent.display_name(),
                child.display_name()
            ),
        );
        Ok(stored)
    }

    pub fn link_partnership(
        &self,
        actor: &UserId,
        link: NewPartnership,
    ) -> Result<Partnership, RecordServiceError> {
        if link.first == link.second {
            return Err(RecordViolation::SelfRelationship.into());
        }
        if let (Some(start), Some(end)) = (link.started_on, link.ended_on) {
            if end < start {
                return Err(RecordViolation::PartnershipEndsBeforeStart.into());
            }
        }
        let first = self.live_person(&link.first)?;
        let second = self.live_person(&link.second)?;
        if !self.can_edit(actor, &first)? && !self.can_edit(actor, &second)? {
            return Err(RecordServiceError::Forbidden(format!(
                "relationships of {} and {}",
                first.id, second.id
            )));
        }

        let partners = Partnership::normalized_pair(link.first, link.second);
        if self
            .live_partnerships()?
            .iter()
            .any(|existing| existing.partners == partners)
        {
            return Err(RecordServiceError::Conflict(format!(
                "{} and {} are already partners",
                first.id, second.id
            )));
        }

        let stored = self.repository.insert_partnership(Partnership {
            id: PartnershipId(PARTNERSHIP_SEQUENCE.next_id()),
            partners,
            kind: link.kind,
            status: link.status,
            started_on: link.started_on,
            ended_on: link.ended_on,
            audit: AuditStamp::created(actor, Utc::now()),
        })?;

        self.activity.record_or_warn(
            actor,
            ActivityKind::RelationshipAdded,
            ActivitySubject::Relationship(stored.id.0.clone()),
            format!(
                "linked {} and {} as partners",
                first.display_name(),
                second.display_name()
            ),
        );
        Ok(stored)
    }

    pub fn unlink_parent_child(
        &self,
        actor: &UserId,
        id: &ParentChildId,
    ) -> Result<(), RecordServiceError> {
        let mut link = self
            .repository
            .fetch_parent_child(id)?
            .filter(Audited::is_live)
            .ok_or_else(|| RecordServiceError::NotFound(format!("relationship {}", id.0)))?;
        self.require_edit_either(actor, &link.parent, &link.child)?;
        link.audit.soft_delete(actor, Utc::now());
        self.repository.update_parent_child(link)?;
        Ok(())
    }

    pub fn unlink_partnership(
        &self,
        actor: &UserId,
        id: &PartnershipId,
    ) -> Result<(), RecordServiceError> {
        let mut partnership = self
            .repository
            .fetch_partnership(id)?
            .filter(Audited::is_live)
            .ok_or_else(|| RecordServiceError::NotFound(format!("partnership {}", id.0)))?;
        let (first, second) = partnership.partners.clone();
        self.require_edit_either(actor, &first, &second)?;
        partnership.audit.soft_delete(actor, Utc::now());
        self.repository.update_partnership(partnership)?;
        Ok(())
    }

    pub fn relationships_of(
        &self,
        id: &PersonId,
    ) -> Result<PersonRelationships, RecordServiceError> {
        self.live_person(id)?;
        let links = self.live_parent_links()?;
        let parents = links
            .iter()
            .filter(|link| &link.child == id)
            .cloned()
            .collect();
        let children = links
            .iter()
            .filter(|link| &link.parent == id)
            .cloned()
            .collect();
        let partnerships = self
            .live_partnerships()?
            .into_iter()
            .filter(|partnership| partnership.involves(id))
            .collect();
        Ok(PersonRelationships {
            parents,
            children,
            partnerships,
        })
    }

    fn live_person(&self, id: &PersonId) -> Result<Person, RecordServiceError> {
        self.repository
            .fetch_person(id)?
            .filter(Audited::is_live)
            .ok_or_else(|| RecordServiceError::NotFound(format!("person {id}")))
    }

    /// Applies `change` to a live person the actor may edit, validating the
    /// result before it is stored.
    fn change_person(
        &self,
        actor: &UserId,
        id: &PersonId,
        change: impl FnOnce(&mut Person) -> Result<(), RecordServiceError>,
    ) -> Result<Person, RecordServiceError> {
        let current = self.live_person(id)?;
        self.require_edit(actor, &current)?;
        self.repository.modify_person(id, |person| {
            if !person.is_live() {
                return Err(RecordServiceError::NotFound(format!("person {id}")));
            }
            change(person)?;
            validate_person(person)?;
            person.audit.touch(actor, Utc::now());
            Ok(person.clone())
        })
    }

    /// Role checks and `change` both see the stored household under the
    /// repository lock.
    fn change_household(
        &self,
        actor: &UserId,
        id: &HouseholdId,
        minimum: HouseholdRole,
        change: impl FnOnce(&mut Household) -> Result<(), RecordServiceError>,
    ) -> Result<Household, RecordServiceError> {
        let missing = || RecordServiceError::NotFound(format!("household {}", id.0));
        let outcome = self.repository.modify_household(id, |household| {
            if !household.is_live() {
                return Err(missing());
            }
            require_role(household, actor, minimum)?;
            change(household)?;
            household.audit.touch(actor, Utc::now());
            Ok(household.clone())
        });
        match outcome {
            Err(RecordServiceError::Repository(RepositoryError::NotFound)) => Err(missing()),
            other => other,
        }
    }

    /// Parent-child links whose parent and child are both live.
    fn live_parent_links(&self) -> Result<Vec<ParentChild>, RecordServiceError> {
        let live = self.live_person_ids()?;
        Ok(self
            .repository
            .parent_child_links()?
            .into_iter()
            .filter(|link| live.contains(&link.parent) && live.contains(&link.child))
            .collect())
    }

    /// Partnerships whose partners are both live.
    fn live_partnerships(&self) -> Result<Vec<Partnership>, RecordServiceError> {
        let live = self.live_person_ids()?;
        Ok(self
            .repository
            .partnerships()?
            .into_iter()
            .filter(|partnership| {
                live.contains(&partnership.partners.0) && live.contains(&partnership.partners.1)
            })
            .collect())
    }

    fn live_person_ids(&self) -> Result<BTreeSet<PersonId>, RecordServiceError> {
        Ok(self
            .repository
            .people()?
            .into_iter()
            .map(|person| person.id)
            .collect())
    }

    fn live_household(&self, id: &HouseholdId) -> Result<Household, RecordServiceError> {
        self.repository
            .fetch_household(id)?
            .filter(Audited::is_live)
            .ok_or_else(|| RecordServiceError::NotFound(format!("household {}", id.0)))
    }

    fn require_edit(&self, actor: &UserId, person: &Person) -> Result<(), RecordServiceError> {
        if self.can_edit(actor, person)? {
            Ok(())
        } else {
            Err(RecordServiceError::Forbidden(format!("person {}", person.id)))
        }
    }

    fn require_edit_either(
        &self,
        actor: &UserId,
        first: &PersonId,
        second: &PersonId,
    ) -> Result<(), RecordServiceError> {
        for id in [first, second] {
            if let Some(person) = self.repository.fetch_person(id)? {
                if self.can_edit(actor, &person)? {
                    return Ok(());
                }
            }
        }
        Err(RecordServiceError::Forbidden(format!(
            "relationships of {first} and {second}"
        )))
    }
}

fn require_role(
    household: &Household,
    actor: &UserId,
    minimum: HouseholdRole,
) -> Result<(), RecordServiceError> {
    match household.role_of(actor) {
        Some(role) if role >= minimum => Ok(()),
        _ => Err(RecordServiceError::Forbidden(format!(
            "household {}",
            household.id.0
        ))),
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn validate_person(person: &Person) -> Result<(), RecordViolation> {
    if person.given_name.trim().is_empty() && person.surname.trim().is_empty() {
        return Err(RecordViolation::MissingName);
    }
    if let (Some(birth), Some(death)) = (person.birth.date, person.death.date) {
        if death < birth {
            return Err(RecordViolation::DeathBeforeBirth);
        }
    }
    if person.living && person.death.date.is_some() {
        return Err(RecordViolation::LivingWithDeathDate);
    }
    Ok(())
}

/// Walks parent edges upward from `start`; true when `target` is reached.
fn is_ancestor(links: &[ParentChild], start: &PersonId, target: &PersonId) -> bool {
    let mut visited = BTreeSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(target);
    visited.insert(target);

    // `target` gains `start` as a child; a cycle exists if `start` is already above it.
    while let Some(current) = queue.pop_front() {
        for link in links.iter().filter(|link| &link.child == current) {
            if &link.parent == start {
                return true;
            }
            if visited.insert(&link.parent) {
                queue.push_back(&link.parent);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityService, ScoringConfig};
    use crate::records::domain::{Gender, LifeEvent};
    use crate::store::InMemoryStore;
    use chrono::NaiveDate;

    type Service = FamilyRecordService<InMemoryStore, InMemoryStore>;

    fn service() -> (Service, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::default());
        let recorder = Arc::new(ActivityRecorder::new(store.clone(), ScoringConfig::default()));
        (FamilyRecordService::new(store.clone(), recorder), store)
    }

    fn person(given: &str, surname: &str) -> NewPerson {
        NewPerson {
            given_name: given.to_string(),
            surname: surname.to_string(),
            ..NewPerson::default()
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn create_person_validates_names_and_dates() {
        let (service, store) = service();
        let ada = UserId::new("ada");

        assert!(matches!(
            service.create_person(&ada, person("  ", "")),
            Err(RecordServiceError::Validation(RecordViolation::MissingName))
        ));

        let mut reversed = person("Elsa", "Berg");
        reversed.birth = LifeEvent {
            date: Some(date(1950, 1, 1)),
            place: None,
        };
        reversed.death = LifeEvent {
            date: Some(date(1940, 1, 1)),
            place: None,
        };
        assert!(matches!(
            service.create_person(&ada, reversed),
            Err(RecordServiceError::Validation(
                RecordViolation::DeathBeforeBirth
            ))
        ));

        let mut deceased = person("Olaf", "Berg");
        deceased.death.date = Some(date(1999, 4, 2));
        let stored = service.create_person(&ada, deceased).expect("creates");
        assert!(!stored.living);
        assert!(stored.id.0.starts_with("per-"));

        let feed = ActivityService::new(store);
        assert_eq!(feed.points_for(&ada).expect("points"), 10);
    }

    #[test]
    fn household_editors_gain_edit_rights() {
        let (service, _) = service();
        let owner = UserId::new("owner");
        let cousin = UserId::new("cousin");
        let household = service
            .create_household(
                &owner,
                NewHousehold {
                    name: "Bergs".to_string(),
                    description: None,
                },
            )
            .expect("household");

        let mut new_person = person("Ingrid", "Berg");
        new_person.household = Some(household.id.clone());
        let ingrid = service.create_person(&owner, new_person).expect("person");

        assert!(!service.can_edit(&cousin, &ingrid).expect("check"));
        assert!(matches!(
            service.update_person(&cousin, &ingrid.id, PersonUpdate::default()),
            Err(RecordServiceError::Forbidden(_))
        ));

        service
            .grant_household_role(&owner, &household.id, &cousin, HouseholdRole::Editor)
            .expect("grant");
        let updated = service
            .update_person(
                &cousin,
                &ingrid.id,
                PersonUpdate {
                    gender: Some(Gender::Female),
                    ..PersonUpdate::default()
                },
            )
            .expect("editor updates");
        assert_eq!(updated.gender, Gender::Female);
        assert_eq!(updated.audit.updated_by, cousin);
        assert_eq!(updated.audit.created_by, owner);
    }

    #[test]
    fn last_owner_cannot_be_demoted_or_revoked() {
        let (service, _) = service();
        let owner = UserId::new("owner");
        let household = service
            .create_household(
                &owner,
                NewHousehold {
                    name: "Lindqvist".to_string(),
                    description: Some("  ".to_string()),
                },
            )
            .expect("household");
        assert!(household.description.is_none());

        assert!(matches!(
            service.grant_household_role(&owner, &household.id, &owner, HouseholdRole::Viewer),
            Err(RecordServiceError::Validation(RecordViolation::LastOwner))
        ));
        assert!(matches!(
            service.revoke_household_role(&owner, &household.id, &owner),
            Err(RecordServiceError::Validation(RecordViolation::LastOwner))
        ));
    }

    #[test]
    fn parent_links_reject_cycles_duplicates_and_third_biological_parent() {
        let (service, _) = service();
        let ada = UserId::new("ada");
        let grandparent = service.create_person(&ada, person("Gus", "Holm")).expect("p");
        let parent = service.create_person(&ada, person("Pia", "Holm")).expect("p");
        let child = service.create_person(&ada, person("Kai", "Holm")).expect("p");
        let other = service.create_person(&ada, person("Ola", "Holm")).expect("p");
        let third = service.create_person(&ada, person("Tor", "Holm")).expect("p");

        let link = |parent: &Person, child: &Person| NewParentChild {
            parent: parent.id.clone(),
            child: child.id.clone(),
            kind: ParentKind::Biological,
        };

        service
            .link_parent_child(&ada, link(&grandparent, &parent))
            .expect("link");
        service.link_parent_child(&ada, link(&parent, &child)).expect("link");

        assert!(matches!(
            service.link_parent_child(&ada, link(&child, &grandparent)),
            Err(RecordServiceError::Validation(RecordViolation::AncestryCycle))
        ));
        assert!(matches!(
            service.link_parent_child(&ada, link(&parent, &child)),
            Err(RecordServiceError::Conflict(_))
        ));
        assert!(matches!(
            service.link_parent_child(&ada, link(&child, &child)),
            Err(RecordServiceError::Validation(
                RecordViolation::SelfRelationship
            ))
        ));

        service.link_parent_child(&ada, link(&other, &child)).expect("second parent");
        assert!(matches!(
            service.link_parent_child(&ada, link(&third, &child)),
            Err(RecordServiceError::Validation(
                RecordViolation::TooManyBiologicalParents
            ))
        ));
        service
            .link_parent_child(
                &ada,
                NewParentChild {
                    parent: third.id.clone(),
                    child: child.id.clone(),
                    kind: ParentKind::Step,
                },
            )
            .expect("step parents are not capped");

        let relationships = service.relationships_of(&child.id).expect("edges");
        assert_eq!(relationships.parents.len(), 3);
    }

    #[test]
    fn soft_deleted_people_disappear_until_restored() {
        let (service, _) = service();
        let ada = UserId::new("ada");
        let person = service.create_person(&ada, person("Mia", "Strand")).expect("p");

        service.delete_person(&ada, &person.id).expect("delete");
        assert!(matches!(
            service.get_person(&person.id),
            Err(RecordServiceError::NotFound(_))
        ));
        assert!(service
            .search_people(Some("mia"), None)
            .expect("search")
            .is_empty());

        let restored = service.restore_person(&ada, &person.id).expect("restore");
        assert!(restored.is_live());
        assert_eq!(
            service.search_people(Some("STRAND"), None).expect("search").len(),
            1
        );
    }

    #[test]
    fn links_to_deleted_people_no_longer_count() {
        let (service, _) = service();
        let ada = UserId::new("ada");
        let kid = service.create_person(&ada, person("Kai", "Holm")).expect("p");
        let mum = service.create_person(&ada, person("Pia", "Holm")).expect("p");
        let wrong_dad = service.create_person(&ada, person("Ola", "Dahl")).expect("p");
        let real_dad = service.create_person(&ada, person("Tor", "Holm")).expect("p");
        let ex = service.create_person(&ada, person("Siv", "Dahl")).expect("p");

        let biological = |parent: &Person| NewParentChild {
            parent: parent.id.clone(),
            child: kid.id.clone(),
            kind: ParentKind::Biological,
        };
        service.link_parent_child(&ada, biological(&mum)).expect("mum");
        service.link_parent_child(&ada, biological(&wrong_dad)).expect("wrong dad");
        service
            .link_partnership(
                &ada,
                NewPartnership {
                    first: kid.id.clone(),
                    second: ex.id.clone(),
                    kind: Default::default(),
                    status: Default::default(),
                    started_on: None,
                    ended_on: None,
                },
            )
            .expect("partners");

        service.delete_person(&ada, &wrong_dad.id).expect("delete");
        service.delete_person(&ada, &ex.id).expect("delete");

        let relationships = service.relationships_of(&kid.id).expect("edges");
        assert_eq!(relationships.parents.len(), 1);
        assert_eq!(relationships.parents[0].parent, mum.id);
        assert!(relationships.partnerships.is_empty());
        assert!(service
            .relationships_of(&mum.id)
            .expect("edges")
            .children
            .iter()
            .all(|link| link.child == kid.id));

        service
            .link_parent_child(&ada, biological(&real_dad))
            .expect("the deleted parent frees the slot");
    }

    #[test]
    fn household_members_are_managed_by_editors() {
        let (service, _) = service();
        let owner = UserId::new("owner");
        let viewer = UserId::new("viewer");
        let household = service
            .create_household(
                &owner,
                NewHousehold {
                    name: "Strand".to_string(),
                    description: None,
                },
            )
            .expect("household");
        service
            .grant_household_role(&owner, &household.id, &viewer, HouseholdRole::Viewer)
            .expect("grant");
        let mia = service.create_person(&owner, person("Mia", "Strand")).expect("p");

        assert!(matches!(
            service.add_household_member(&viewer, &household.id, &mia.id),
            Err(RecordServiceError::Forbidden(_))
        ));
        let updated = service
            .add_household_member(&owner, &household.id, &mia.id)
            .expect("owner adds");
        assert_eq!(updated.members, vec![mia.id.clone()]);
        let again = service
            .add_household_member(&owner, &household.id, &mia.id)
            .expect("adding twice is a no-op");
        assert_eq!(again.members.len(), 1);

        let visible: Vec<_> = service
            .households_for(&viewer)
            .expect("households")
            .into_iter()
            .map(|household| household.id)
            .collect();
        assert_eq!(visible, vec![household.id.clone()]);
        assert!(service
            .households_for(&UserId::new("stranger"))
            .expect("households")
            .is_empty());

        assert!(matches!(
            service.remove_household_member(&viewer, &household.id, &mia.id),
            Err(RecordServiceError::Forbidden(_))
        ));
        let emptied = service
            .remove_household_member(&owner, &household.id, &mia.id)
            .expect("owner removes");
        assert!(emptied.members.is_empty());
        assert!(matches!(
            service.remove_household_member(&owner, &household.id, &mia.id),
            Err(RecordServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.add_household_member(&owner, &HouseholdId("hh-missing".to_string()), &mia.id),
            Err(RecordServiceError::NotFound(_))
        ));
    }

    #[test]
    fn concurrent_role_grants_are_all_kept() {
        let (service, _) = service();
        let owner = UserId::new("owner");
        let household = service
            .create_household(
                &owner,
                NewHousehold {
                    name: "Nygaard".to_string(),
                    description: None,
                },
            )
            .expect("household");
        let relatives: Vec<_> = (0..6)
            .map(|n| UserId::new(format!("relative-{n}")))
            .collect();
        let gate = std::sync::Barrier::new(relatives.len());

        std::thread::scope(|scope| {
            for relative in &relatives {
                let (service, gate, owner, id) = (&service, &gate, &owner, &household.id);
                scope.spawn(move || {
                    gate.wait();
                    service
                        .grant_household_role(owner, id, relative, HouseholdRole::Editor)
                        .expect("grant");
                });
            }
        });

        let household = service.get_household(&owner, &household.id).expect("household");
        for relative in &relatives {
            assert_eq!(household.role_of(relative), Some(HouseholdRole::Editor));
        }
    }

    #[test]
    fn unlinking_a_parent_needs_edit_rights() {
        let (service, _) = service();
        let ada = UserId::new("ada");
        let bob = UserId::new("bob");
        let parent = service.create_person(&ada, person("Pia", "Lie")).expect("p");
        let child = service.create_person(&ada, person("Kai", "Lie")).expect("p");
        let link = service
            .link_parent_child(
                &ada,
                NewParentChild {
                    parent: parent.id.clone(),
                    child: child.id.clone(),
                    kind: ParentKind::Adoptive,
                },
            )
            .expect("link");

        assert!(matches!(
            service.unlink_parent_child(&bob, &link.id),
            Err(RecordServiceError::Forbidden(_))
        ));
        service.unlink_parent_child(&ada, &link.id).expect("unlink");
        assert!(service
            .relationships_of(&child.id)
            .expect("edges")
            .parents
            .is_empty());
        assert!(matches!(
            service.unlink_parent_child(&ada, &link.id),
            Err(RecordServiceError::NotFound(_))
        ));
    }

    #[test]
    fn restoring_a_person_needs_edit_rights() {
        let (service, _) = service();
        let ada = UserId::new("ada");
        let bob = UserId::new("bob");
        let mia = service.create_person(&ada, person("Mia", "Lie")).expect("p");
        service.delete_person(&ada, &mia.id).expect("delete");

        assert!(matches!(
            service.restore_person(&bob, &mia.id),
            Err(RecordServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.get_person(&mia.id),
            Err(RecordServiceError::NotFound(_))
        ));
        let restored = service.restore_person(&ada, &mia.id).expect("restore");
        assert_eq!(restored.audit.updated_by, ada);
        assert!(matches!(
            service.restore_person(&ada, &PersonId("per-missing".to_string())),
            Err(RecordServiceError::NotFound(_))
        ));
    }

    #[test]
    fn partnerships_are_unique_per_pair_and_dated_in_order() {
        let (service, _) = service();
        let ada = UserId::new("ada");
        let a = service.create_person(&ada, person("Ann", "Vik")).expect("p");
        let b = service.create_person(&ada, person("Bo", "Vik")).expect("p");

        assert!(matches!(
            service.link_partnership(
                &ada,
                NewPartnership {
                    first: a.id.clone(),
                    second: b.id.clone(),
                    kind: Default::default(),
                    status: Default::default(),
                    started_on: Some(date(1990, 6, 1)),
                    ended_on: Some(date(1980, 1, 1)),
                }
            ),
            Err(RecordServiceError::Validation(
                RecordViolation::PartnershipEndsBeforeStart
            ))
        ));

        let new_link = |first: &Person, second: &Person| NewPartnership {
            first: first.id.clone(),
            second: second.id.clone(),
            kind: Default::default(),
            status: Default::default(),
            started_on: None,
            ended_on: None,
        };
        let stored = service.link_partnership(&ada, new_link(&b, &a)).expect("link");
        assert_eq!(stored.partners.0, std::cmp::min(a.id.clone(), b.id.clone()));
        assert!(matches!(
            service.link_partnership(&ada, new_link(&a, &b)),
            Err(RecordServiceError::Conflict(_))
        ));

        service.unlink_partnership(&ada, &stored.id).expect("unlink");
        service
            .link_partnership(&ada, new_link(&a, &b))
            .expect("relink after soft delete");
    }
}
