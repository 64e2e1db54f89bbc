//! People, households, and the parent/child and partnership edges that make
//! up the family graph.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{
    FieldValue, Gender, Household, HouseholdId, HouseholdRole, LifeEvent, NewHousehold,
    NewParentChild, NewPartnership, NewPerson, ParentChild, ParentChildId, ParentKind,
    Partnership, PartnershipId, PartnershipKind, PartnershipStatus, Person, PersonField,
    PersonId, PersonSummary, PersonUpdate,
};
pub use repository::FamilyRepository;
pub use router::records_router;
pub use service::{FamilyRecordService, PersonRelationships, RecordServiceError, RecordViolation};
