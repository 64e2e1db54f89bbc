use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::activity::{ActivityRecorder, ScoringConfig};
use crate::audit::UserId;
use crate::contributions::{
    contribution_router, Contribution, ContributionId, ContributionRepository,
    ContributionService, ContributionStatus, ContributionSubmission, ProposedChange,
};
use crate::messaging::{NotificationKind, Notifier};
use crate::records::{
    FamilyRecordService, Gender, HouseholdRole, LifeEvent, NewHousehold, NewPerson,
    Person, PersonField,
};
use crate::store::{InMemoryStore, RepositoryError};

pub(super) type Records = FamilyRecordService<InMemoryStore, InMemoryStore>;
pub(super) type MemoryService =
    ContributionService<InMemoryStore, InMemoryStore, InMemoryStore, InMemoryStore>;

pub(super) fn owner() -> UserId {
    UserId::new("owner")
}

pub(super) fn editor() -> UserId {
    UserId::new("editor")
}

/// Household viewer who proposes changes but cannot edit directly.
pub(super) fn cousin() -> UserId {
    UserId::new("cousin")
}

pub(super) fn outsider() -> UserId {
    UserId::new("outsider")
}

pub(super) struct Family {
    pub(super) store: Arc<InMemoryStore>,
    pub(super) records: Arc<Records>,
    pub(super) recorder: Arc<ActivityRecorder<InMemoryStore>>,
    pub(super) astrid: Person,
    pub(super) erik: Person,
}

pub(super) fn family() -> Family {
    let store = Arc::new(InMemoryStore::default());
    let recorder = Arc::new(ActivityRecorder::new(store.clone(), ScoringConfig::default()));
    let records = Arc::new(FamilyRecordService::new(store.clone(), recorder.clone()));

    let household = records
        .create_household(
            &owner(),
            NewHousehold {
                name: "Lund family".to_string(),
                description: None,
            },
        )
        .expect("household");
    records
        .grant_household_role(&owner(), &household.id, &editor(), HouseholdRole::Editor)
        .expect("grant editor");
    records
        .grant_household_role(&owner(), &household.id, &cousin(), HouseholdRole::Viewer)
        .expect("grant viewer");

    let astrid = records
        .create_person(
            &owner(),
            NewPerson {
                given_name: "Astrid".to_string(),
                surname: "Lund".to_string(),
                gender: Gender::Female,
                birth: LifeEvent {
                    date: NaiveDate::from_ymd_opt(1901, 4, 2),
                    place: Some("Bergen".to_string()),
                },
                household: Some(household.id.clone()),
                ..NewPerson::default()
            },
        )
        .expect("astrid");
    let erik = records
        .create_person(
            &owner(),
            NewPerson {
                given_name: "Erik".to_string(),
                surname: "Lund".to_string(),
                gender: Gender::Male,
                household: Some(household.id.clone()),
                ..NewPerson::default()
            },
        )
        .expect("erik");

    Family {
        store,
        records,
        recorder,
        astrid,
        erik,
    }
}

impl Family {
    pub(super) fn service(&self) -> MemoryService {
        ContributionService::new(
            self.store.clone(),
            self.records.clone(),
            self.recorder.clone(),
            self.store.clone(),
        )
    }

    pub(super) fn service_with<C, N>(
        &self,
        contributions: Arc<C>,
        notifier: Arc<N>,
    ) -> ContributionService<C, InMemoryStore, InMemoryStore, N>
    where
        C: ContributionRepository + 'static,
        N: Notifier + 'static,
    {
        ContributionService::new(
            contributions,
            self.records.clone(),
            self.recorder.clone(),
            notifier,
        )
    }

    pub(super) fn router(&self) -> axum::Router {
        contribution_router(Arc::new(self.service()))
    }
}

pub(super) fn field_change(field: PersonField, value: &str) -> ProposedChange {
    ProposedChange::UpdateField {
        field,
        value: Some(value.to_string()),
    }
}

pub(super) fn birth_place_submission(person: &Person, value: &str) -> ContributionSubmission {
    ContributionSubmission {
        person: person.id.clone(),
        change: field_change(PersonField::BirthPlace, value),
        note: Some("parish register".to_string()),
    }
}

pub(super) struct UnavailableContributions;

impl ContributionRepository for UnavailableContributions {
    fn insert_contribution(
        &self,
        _contribution: Contribution,
    ) -> Result<Contribution, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn transition_contribution(
        &self,
        _contribution: Contribution,
        _expected: ContributionStatus,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_contribution(
        &self,
        _id: &ContributionId,
    ) -> Result<Option<Contribution>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn contributions(&self) -> Result<Vec<Contribution>, RepositoryError> {
        Ok(Vec::new())
    }
}

/// Holds the first `readers` contribution lookups at a barrier so every
/// caller has read the same row before any of them writes.
pub(super) struct ContestedContributions {
    inner: Arc<InMemoryStore>,
    gate: Barrier,
    arrivals: AtomicUsize,
    readers: usize,
}

impl ContestedContributions {
    pub(super) fn new(inner: Arc<InMemoryStore>, readers: usize) -> Self {
        Self {
            inner,
            gate: Barrier::new(readers),
            arrivals: AtomicUsize::new(0),
            readers,
        }
    }
}

impl ContributionRepository for ContestedContributions {
    fn insert_contribution(
        &self,
        contribution: Contribution,
    ) -> Result<Contribution, RepositoryError> {
        self.inner.insert_contribution(contribution)
    }

    fn transition_contribution(
        &self,
        contribution: Contribution,
        expected: ContributionStatus,
    ) -> Result<(), RepositoryError> {
        self.inner.transition_contribution(contribution, expected)
    }

    fn fetch_contribution(
        &self,
        id: &ContributionId,
    ) -> Result<Option<Contribution>, RepositoryError> {
        let found = self.inner.fetch_contribution(id)?;
        if self.arrivals.fetch_add(1, Ordering::SeqCst) < self.readers {
            self.gate.wait();
        }
        Ok(found)
    }

    fn contributions(&self) -> Result<Vec<Contribution>, RepositoryError> {
        self.inner.contributions()
    }
}

pub(super) struct OfflineNotifier;

impl Notifier for OfflineNotifier {
    fn notify(
        &self,
        _user: &UserId,
        _kind: NotificationKind,
        _text: String,
        _subject: String,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("mail relay offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
