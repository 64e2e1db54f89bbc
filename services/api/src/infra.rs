use kindred::activity::{ActivityRecorder, ActivityService, ScoringConfig};
use kindred::config::ArchiveConfig;
use kindred::content::ContentService;
use kindred::contributions::ContributionService;
use kindred::import::FamilyImporter;
use kindred::messaging::MessagingService;
use kindred::records::FamilyRecordService;
use kindred::store::InMemoryStore;
use kindred::tree::TreeService;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type Records = FamilyRecordService<InMemoryStore, InMemoryStore>;
pub(crate) type Contributions =
    ContributionService<InMemoryStore, InMemoryStore, InMemoryStore, InMemoryStore>;
pub(crate) type Content = ContentService<InMemoryStore, InMemoryStore, InMemoryStore, InMemoryStore>;
pub(crate) type Messaging = MessagingService<InMemoryStore, InMemoryStore>;
pub(crate) type Importer = FamilyImporter<InMemoryStore, InMemoryStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Every service wired over one shared in-memory store.
#[derive(Clone)]
pub(crate) struct Services {
    pub(crate) records: Arc<Records>,
    pub(crate) tree: Arc<TreeService<InMemoryStore>>,
    pub(crate) contributions: Arc<Contributions>,
    pub(crate) content: Arc<Content>,
    pub(crate) messaging: Arc<Messaging>,
    pub(crate) activity: Arc<ActivityService<InMemoryStore>>,
    pub(crate) importer: Arc<Importer>,
}

impl Services {
    pub(crate) fn in_memory(archive: ArchiveConfig, scoring: ScoringConfig) -> Self {
        let store = Arc::new(InMemoryStore::default());
        let recorder = Arc::new(ActivityRecorder::new(store.clone(), scoring));
        let records = Arc::new(FamilyRecordService::new(store.clone(), recorder.clone()));

        Self {
            tree: Arc::new(TreeService::new(
                store.clone(),
                archive.tree_max_generations,
            )),
            contributions: Arc::new(ContributionService::new(
                store.clone(),
                records.clone(),
                recorder.clone(),
                store.clone(),
            )),
            content: Arc::new(ContentService::new(
                store.clone(),
                store.clone(),
                recorder.clone(),
                store.clone(),
                archive.max_upload_bytes,
            )),
            messaging: Arc::new(MessagingService::new(store.clone(), recorder)),
            activity: Arc::new(ActivityService::new(store.clone())),
            importer: Arc::new(FamilyImporter::new(records.clone())),
            records,
        }
    }
}
