use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::parser::{parse_rows, PersonRow};
use super::ImportError;
use crate::activity::{ActivityRecorder, ActivityRepository, ScoringConfig};
use crate::audit::UserId;
use crate::records::{
    FamilyRecordService, FamilyRepository, HouseholdId, NewParentChild, NewPartnership,
    ParentKind, Partnership, PartnershipKind, PartnershipStatus, PersonId, RecordServiceError,
};
use crate::store::InMemoryStore;

/// Row or link the import could not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub reference: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub rows: usize,
    pub people_created: usize,
    pub parent_links: usize,
    pub partnerships: usize,
    pub skipped: Vec<SkippedEntry>,
    /// Export reference to the id assigned on import.
    pub people: BTreeMap<String, PersonId>,
}

impl ImportSummary {
    fn skip(&mut self, reference: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(SkippedEntry {
            reference: reference.into(),
            reason: reason.into(),
        });
    }
}

/// Loads a family CSV export through the record service so every row is
/// validated, audited, and scored like a manual edit.
pub struct FamilyImporter<F, A> {
    records: Arc<FamilyRecordService<F, A>>,
}

impl FamilyImporter<InMemoryStore, InMemoryStore> {
    /// Run the import against a scratch store and report what would happen.
    pub fn dry_run<R: Read>(reader: R) -> Result<ImportSummary, ImportError> {
        let store = Arc::new(InMemoryStore::default());
        let recorder = Arc::new(ActivityRecorder::new(store.clone(), ScoringConfig::default()));
        let importer = Self::new(Arc::new(FamilyRecordService::new(store, recorder)));
        importer.import(&UserId::new("dry-run"), reader, None)
    }

    pub fn dry_run_path(path: &Path) -> Result<ImportSummary, ImportError> {
        let file = File::open(path)?;
        Self::dry_run(file)
    }
}

impl<F, A> FamilyImporter<F, A>
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    pub fn new(records: Arc<FamilyRecordService<F, A>>) -> Self {
        Self { records }
    }

    pub fn import_path(
        &self,
        actor: &UserId,
        path: &Path,
        household: Option<&HouseholdId>,
    ) -> Result<ImportSummary, ImportError> {
        let file = File::open(path)?;
        self.import(actor, file, household)
    }

    /// People first, then parent links, then partnerships.
    pub fn import<R: Read>(
        &self,
        actor: &UserId,
        reader: R,
        household: Option<&HouseholdId>,
    ) -> Result<ImportSummary, ImportError> {
        let rows = parse_rows(reader)?;
        let mut summary = ImportSummary {
            rows: rows.len(),
            ..ImportSummary::default()
        };

        let mut imported: Vec<&PersonRow> = Vec::new();
        for row in &rows {
            if row.reference.is_empty() {
                summary.skip("", "row has no reference");
                continue;
            }
            if summary.people.contains_key(&row.reference) {
                summary.skip(&row.reference, "duplicate reference");
                continue;
            }
            let mut new_person = match row.to_new_person() {
                Ok(new_person) => new_person,
                Err(reason) => {
                    summary.skip(&row.reference, reason);
                    continue;
                }
            };
            new_person.household = household.cloned();
            match self.records.create_person(actor, new_person) {
                Ok(person) => {
                    summary.people.insert(row.reference.clone(), person.id);
                    summary.people_created += 1;
                    imported.push(row);
                }
                Err(RecordServiceError::Validation(violation)) => {
                    summary.skip(&row.reference, violation.to_string());
                }
                Err(err) => return Err(err.into()),
            }
        }

        for row in &imported {
            for parent_ref in [&row.father, &row.mother].into_iter().flatten() {
                let label = format!("{} -> {}", parent_ref, row.reference);
                let (Some(parent), Some(child)) = (
                    summary.people.get(parent_ref).cloned(),
                    summary.people.get(&row.reference).cloned(),
                ) else {
                    summary.skip(label, format!("unknown reference {parent_ref}"));
                    continue;
                };
                let link = NewParentChild {
                    parent,
                    child,
                    kind: ParentKind::Biological,
                };
                match self.records.link_parent_child(actor, link) {
                    Ok(_) => summary.parent_links += 1,
                    Err(err @ RecordServiceError::Repository(_)) => return Err(err.into()),
                    Err(err) => summary.skip(label, err.to_string()),
                }
            }
        }

        let mut linked = BTreeSet::new();
        for row in &imported {
            let Some(partner_ref) = &row.partner else {
                continue;
            };
            let label = format!("{} + {}", row.reference, partner_ref);
            let (Some(first), Some(second)) = (
                summary.people.get(&row.reference).cloned(),
                summary.people.get(partner_ref).cloned(),
            ) else {
                summary.skip(label, format!("unknown reference {partner_ref}"));
                continue;
            };
            if !linked.insert(Partnership::normalized_pair(first.clone(), second.clone())) {
                continue;
            }
            let link = NewPartnership {
                first,
                second,
                kind: PartnershipKind::Marriage,
                status: PartnershipStatus::Current,
                started_on: None,
                ended_on: None,
            };
            match self.records.link_partnership(actor, link) {
                Ok(_) => summary.partnerships += 1,
                Err(err @ RecordServiceError::Repository(_)) => return Err(err.into()),
                Err(err) => summary.skip(label, err.to_string()),
            }
        }

        if !summary.skipped.is_empty() {
            warn!(skipped = summary.skipped.len(), "import skipped entries");
        }
        info!(
            rows = summary.rows,
            people = summary.people_created,
            parent_links = summary.parent_links,
            partnerships = summary.partnerships,
            %actor,
            "import finished"
        );
        Ok(summary)
    }
}
