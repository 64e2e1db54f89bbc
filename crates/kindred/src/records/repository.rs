use super::domain::{
    Household, HouseholdId, ParentChild, ParentChildId, Partnership, PartnershipId, Person,
    PersonId,
};
use crate::store::RepositoryError;

/// Storage abstraction for people, households, and relationship edges.
///
/// `fetch_*` returns soft-deleted rows so callers can restore them; list
/// methods only return live rows. `modify_*` runs the change against the
/// stored row while it is locked and keeps it only when the change succeeds.
pub trait FamilyRepository: Send + Sync {
    fn insert_person(&self, person: Person) -> Result<Person, RepositoryError>;
    fn modify_person<T, E: From<RepositoryError>>(
        &self,
        id: &PersonId,
        change: impl FnOnce(&mut Person) -> Result<T, E>,
    ) -> Result<T, E>;
    fn fetch_person(&self, id: &PersonId) -> Result<Option<Person>, RepositoryError>;
    fn people(&self) -> Result<Vec<Person>, RepositoryError>;

    fn insert_household(&self, household: Household) -> Result<Household, RepositoryError>;
    fn modify_household<T, E: From<RepositoryError>>(
        &self,
        id: &HouseholdId,
        change: impl FnOnce(&mut Household) -> Result<T, E>,
    ) -> Result<T, E>;
    fn fetch_household(&self, id: &HouseholdId) -> Result<Option<Household>, RepositoryError>;
    fn households(&self) -> Result<Vec<Household>, RepositoryError>;

    fn insert_parent_child(&self, link: ParentChild) -> Result<ParentChild, RepositoryError>;
    fn update_parent_child(&self, link: ParentChild) -> Result<(), RepositoryError>;
    fn fetch_parent_child(&self, id: &ParentChildId)
        -> Result<Option<ParentChild>, RepositoryError>;
    fn parent_child_links(&self) -> Result<Vec<ParentChild>, RepositoryError>;

    fn insert_partnership(&self, partnership: Partnership)
        -> Result<Partnership, RepositoryError>;
    fn update_partnership(&self, partnership: Partnership) -> Result<(), RepositoryError>;
    fn fetch_partnership(&self, id: &PartnershipId)
        -> Result<Option<Partnership>, RepositoryError>;
    fn partnerships(&self) -> Result<Vec<Partnership>, RepositoryError>;

    /// Live households listing the person as a member.
    fn households_containing(&self, person: &PersonId) -> Result<Vec<Household>, RepositoryError> {
        Ok(self
            .households()?
            .into_iter()
            .filter(|household| household.contains(person))
            .collect())
    }
}
