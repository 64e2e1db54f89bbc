use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::domain::{
    normalize_tag, slugify, Comment, CommentId, ContentFilter, ContentId, ContentItem,
    ContentKind, ContentUpdate, MediaDescriptor, MediaUpload, NewComment, NewContent,
};
use super::repository::ContentRepository;
use crate::activity::{ActivityKind, ActivityRecorder, ActivityRepository, ActivitySubject};
use crate::audit::{AuditStamp, Audited, IdSequence, UserId};
use crate::messaging::{NotificationKind, Notifier};
use crate::records::{FamilyRepository, HouseholdId, HouseholdRole, PersonId};
use crate::store::RepositoryError;

static CONTENT_SEQUENCE: IdSequence = IdSequence::new("cnt");
static COMMENT_SEQUENCE: IdSequence = IdSequence::new("cmt");

/// Validation failures for content and comments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentViolation {
    #[error("title must not be empty")]
    BlankTitle,
    #[error("a {0} needs an attached file")]
    MissingMedia(&'static str),
    #[error("photos must be images, got {0}")]
    NotAnImage(String),
    #[error("uploaded file is empty")]
    EmptyUpload,
    #[error("uploaded file is {size} bytes, limit is {limit}")]
    UploadTooLarge { size: u64, limit: u64 },
    #[error("tagged person {0} does not exist")]
    UnknownPerson(PersonId),
    #[error("comment must not be empty")]
    BlankComment,
}

/// Error raised by the content service.
#[derive(Debug, thiserror::Error)]
pub enum ContentServiceError {
    #[error(transparent)]
    Invalid(#[from] ContentViolation),
    #[error("{0} not found")]
    NotFound(String),
    #[error("caller may not modify {0}")]
    Forbidden(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Publishing, visibility, and discussion for shared family content.
pub struct ContentService<R, F, A, N> {
    repository: Arc<R>,
    family: Arc<F>,
    activity: Arc<ActivityRecorder<A>>,
    notifier: Arc<N>,
    max_upload_bytes: u64,
}

impl<R, F, A, N> ContentService<R, F, A, N>
where
    R: ContentRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    pub fn new(
        repository: Arc<R>,
        family: Arc<F>,
        activity: Arc<ActivityRecorder<A>>,
        notifier: Arc<N>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            repository,
            family,
            activity,
            notifier,
            max_upload_bytes,
        }
    }

    pub fn publish(
        &self,
        actor: &UserId,
        new_content: NewContent,
    ) -> Result<ContentItem, ContentServiceError> {
        let title = new_content.title.trim().to_string();
        if title.is_empty() {
            return Err(ContentViolation::BlankTitle.into());
        }
        if let Some(household) = &new_content.household {
            match self.role_in(household, actor)? {
                Some(role) if role.can_edit() => {}
                _ => {
                    return Err(ContentServiceError::Forbidden(format!(
                        "household {}",
                        household.0
                    )))
                }
            }
        }
        let people = self.checked_people(new_content.people)?;
        let media = match new_content.media {
            Some(upload) => Some(self.checked_media(new_content.kind, upload)?),
            None if new_content.kind.requires_media() => {
                return Err(ContentViolation::MissingMedia(new_content.kind.label()).into())
            }
            None => None,
        };
        let slug = match new_content.kind {
            ContentKind::WikiPage => Some(self.unique_slug(&title)?),
            _ => None,
        };

        let item = ContentItem {
            id: ContentId(CONTENT_SEQUENCE.next_id()),
            kind: new_content.kind,
            title,
            body: new_content.body,
            household: new_content.household,
            people,
            tags: normalize_tags(new_content.tags),
            media,
            slug,
            revision: 1,
            author: actor.clone(),
            audit: AuditStamp::created(actor, Utc::now()),
        };
        let stored = self.repository.insert_content(item)?;

        let kind = if stored.media.is_some() {
            ActivityKind::MediaUploaded
        } else {
            ActivityKind::ContentPublished
        };
        self.activity.record_or_warn(
            actor,
            kind,
            ActivitySubject::Content(stored.id.0.clone()),
            format!("shared {} '{}'", stored.kind.label(), stored.title),
        );
        info!(content_id = %stored.id, kind = stored.kind.label(), %actor, "content published");
        Ok(stored)
    }

    /// Edit an item. Wiki pages keep their slug and gain a revision.
    pub fn update(
        &self,
        actor: &UserId,
        id: &ContentId,
        update: ContentUpdate,
    ) -> Result<ContentItem, ContentServiceError> {
        let current = self.live_item(id)?;
        self.require_edit(actor, &current)?;

        let title = match update.title {
            Some(title) if title.trim().is_empty() => {
                return Err(ContentViolation::BlankTitle.into())
            }
            Some(title) => Some(title.trim().to_string()),
            None => None,
        };
        let people = update
            .people
            .map(|people| self.checked_people(people))
            .transpose()?;

        self.change_item(id, |item| {
            if let Some(title) = title {
                item.title = title;
            }
            if let Some(body) = update.body {
                item.body = body;
            }
            if let Some(people) = people {
                item.people = people;
            }
            if let Some(tags) = update.tags {
                item.tags = normalize_tags(tags);
            }
            if item.kind == ContentKind::WikiPage {
                item.revision += 1;
            }
            item.audit.touch(actor, Utc::now());
        })
    }

    pub fn delete(&self, actor: &UserId, id: &ContentId) -> Result<(), ContentServiceError> {
        let item = self.live_item(id)?;
        self.require_edit(actor, &item)?;
        self.change_item(id, |item| item.audit.soft_delete(actor, Utc::now()))?;
        info!(content_id = %id, %actor, "content soft-deleted");
        Ok(())
    }

    /// Items the caller cannot read look missing.
    pub fn get(
        &self,
        actor: Option<&UserId>,
        id: &ContentId,
    ) -> Result<ContentItem, ContentServiceError> {
        let item = self.live_item(id)?;
        if self.can_read(actor, &item)? {
            Ok(item)
        } else {
            Err(ContentServiceError::NotFound(format!("content {id}")))
        }
    }

    pub fn wiki_page(
        &self,
        actor: Option<&UserId>,
        slug: &str,
    ) -> Result<ContentItem, ContentServiceError> {
        let page = self
            .repository
            .contents()?
            .into_iter()
            .find(|item| item.kind == ContentKind::WikiPage && item.slug.as_deref() == Some(slug))
            .ok_or_else(|| ContentServiceError::NotFound(format!("wiki page {slug}")))?;
        if self.can_read(actor, &page)? {
            Ok(page)
        } else {
            Err(ContentServiceError::NotFound(format!("wiki page {slug}")))
        }
    }

    /// Readable items matching the filter, newest first.
    pub fn list(
        &self,
        actor: Option<&UserId>,
        filter: &ContentFilter,
    ) -> Result<Vec<ContentItem>, ContentServiceError> {
        let mut items = Vec::new();
        for item in self.repository.contents()? {
            if filter.matches(&item) && self.can_read(actor, &item)? {
                items.push(item);
            }
        }
        items.sort_by_key(|item| Reverse((item.audit.created_at, item.id.clone())));
        Ok(items)
    }

    pub fn comment(
        &self,
        actor: &UserId,
        content: &ContentId,
        new_comment: NewComment,
    ) -> Result<Comment, ContentServiceError> {
        let item = self.get(Some(actor), content)?;
        let body = new_comment.body.trim().to_string();
        if body.is_empty() {
            return Err(ContentViolation::BlankComment.into());
        }

        let stored = self.repository.insert_comment(Comment {
            id: CommentId(COMMENT_SEQUENCE.next_id()),
            content: item.id.clone(),
            author: actor.clone(),
            body,
            audit: AuditStamp::created(actor, Utc::now()),
        })?;

        self.activity.record_or_warn(
            actor,
            ActivityKind::CommentPosted,
            ActivitySubject::Comment(stored.id.0.clone()),
            format!("commented on '{}'", item.title),
        );
        if &item.author != actor {
            let text = format!("{actor} commented on '{}'", item.title);
            if let Err(err) = self.notifier.notify(
                &item.author,
                NotificationKind::CommentPosted,
                text,
                item.id.0.clone(),
            ) {
                warn!(user = %item.author, error = %err, "comment notification failed");
            }
        }
        Ok(stored)
    }

    pub fn comments(
        &self,
        actor: Option<&UserId>,
        content: &ContentId,
    ) -> Result<Vec<Comment>, ContentServiceError> {
        let item = self.get(actor, content)?;
        let mut comments = self.repository.comments_for(&item.id)?;
        comments.sort_by(|a, b| {
            a.audit
                .created_at
                .cmp(&b.audit.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(comments)
    }

    /// Comment authors and the author of the commented item may remove a comment.
    pub fn delete_comment(
        &self,
        actor: &UserId,
        id: &CommentId,
    ) -> Result<(), ContentServiceError> {
        let mut comment = self
            .repository
            .fetch_comment(id)?
            .filter(Audited::is_live)
            .ok_or_else(|| ContentServiceError::NotFound(format!("comment {}", id.0)))?;
        let content_author = self
            .repository
            .fetch_content(&comment.content)?
            .map(|item| item.author);
        if &comment.author != actor && content_author.as_ref() != Some(actor) {
            return Err(ContentServiceError::Forbidden(format!("comment {}", id.0)));
        }
        comment.audit.soft_delete(actor, Utc::now());
        self.repository.update_comment(comment)?;
        Ok(())
    }

    /// Applies `change` to the stored item if it is still live.
    fn change_item(
        &self,
        id: &ContentId,
        change: impl FnOnce(&mut ContentItem),
    ) -> Result<ContentItem, ContentServiceError> {
        let missing = || ContentServiceError::NotFound(format!("content {id}"));
        let outcome = self.repository.modify_content(id, |item| {
            if !item.is_live() {
                return Err(missing());
            }
            change(item);
            Ok(item.clone())
        });
        match outcome {
            Err(ContentServiceError::Repository(RepositoryError::NotFound)) => Err(missing()),
            other => other,
        }
    }

    fn live_item(&self, id: &ContentId) -> Result<ContentItem, ContentServiceError> {
        self.repository
            .fetch_content(id)?
            .filter(Audited::is_live)
            .ok_or_else(|| ContentServiceError::NotFound(format!("content {id}")))
    }

    fn role_in(
        &self,
        household: &HouseholdId,
        actor: &UserId,
    ) -> Result<Option<HouseholdRole>, ContentServiceError> {
        let household = self
            .family
            .fetch_household(household)?
            .filter(Audited::is_live)
            .ok_or_else(|| ContentServiceError::NotFound(format!("household {}", household.0)))?;
        Ok(household.role_of(actor))
    }

    fn can_read(
        &self,
        actor: Option<&UserId>,
        item: &ContentItem,
    ) -> Result<bool, ContentServiceError> {
        let Some(household) = &item.household else {
            return Ok(true);
        };
        let Some(actor) = actor else {
            return Ok(false);
        };
        if &item.author == actor {
            return Ok(true);
        }
        match self.role_in(household, actor) {
            Ok(role) => Ok(role.is_some()),
            Err(ContentServiceError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn require_edit(&self, actor: &UserId, item: &ContentItem) -> Result<(), ContentServiceError> {
        if &item.author == actor {
            return Ok(());
        }
        let allowed = match &item.household {
            Some(household) => match self.role_in(household, actor) {
                Ok(role) => role.map(HouseholdRole::can_edit).unwrap_or(false),
                Err(ContentServiceError::NotFound(_)) => false,
                Err(err) => return Err(err),
            },
            None => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(ContentServiceError::Forbidden(format!("content {}", item.id)))
        }
    }

    fn checked_people(&self, people: Vec<PersonId>) -> Result<Vec<PersonId>, ContentServiceError> {
        let mut seen = BTreeSet::new();
        let mut checked = Vec::new();
        for id in people {
            if !seen.insert(id.clone()) {
                continue;
            }
            let live = self
                .family
                .fetch_person(&id)?
                .map(|person| person.is_live())
                .unwrap_or(false);
            if !live {
                return Err(ContentViolation::UnknownPerson(id).into());
            }
            checked.push(id);
        }
        Ok(checked)
    }

    fn checked_media(
        &self,
        kind: ContentKind,
        upload: MediaUpload,
    ) -> Result<MediaDescriptor, ContentServiceError> {
        if upload.byte_size == 0 {
            return Err(ContentViolation::EmptyUpload.into());
        }
        if upload.byte_size > self.max_upload_bytes {
            return Err(ContentViolation::UploadTooLarge {
                size: upload.byte_size,
                limit: self.max_upload_bytes,
            }
            .into());
        }
        let media = MediaDescriptor::from_upload(upload);
        if kind == ContentKind::Photo && !media.is_image() {
            return Err(ContentViolation::NotAnImage(media.media_type).into());
        }
        Ok(media)
    }

    fn unique_slug(&self, title: &str) -> Result<String, ContentServiceError> {
        let taken: BTreeSet<String> = self
            .repository
            .contents()?
            .into_iter()
            .filter_map(|item| item.slug)
            .collect();
        let base = slugify(title);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while taken.contains(&candidate) {
            candidate = format!("{base}-{suffix}");
            suffix += 1;
        }
        Ok(candidate)
    }
}

fn normalize_tags(tags: Vec<String>) -> BTreeSet<String> {
    tags.iter()
        .map(|tag| normalize_tag(tag))
        .filter(|tag| !tag.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityService, ScoringConfig};
    use crate::messaging::MessageRepository;
    use crate::records::{FamilyRecordService, NewHousehold, NewPerson};
    use crate::store::InMemoryStore;

    type Service = ContentService<InMemoryStore, InMemoryStore, InMemoryStore, InMemoryStore>;

    struct Fixture {
        store: Arc<InMemoryStore>,
        service: Service,
        household: HouseholdId,
        astrid: PersonId,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::default());
        let recorder = Arc::new(ActivityRecorder::new(store.clone(), ScoringConfig::default()));
        let records = FamilyRecordService::new(store.clone(), recorder.clone());
        let ada = UserId::new("ada");
        let household = records
            .create_household(
                &ada,
                NewHousehold {
                    name: "Lund family".to_string(),
                    description: None,
                },
            )
            .expect("household");
        records
            .grant_household_role(&ada, &household.id, &UserId::new("bea"), HouseholdRole::Viewer)
            .expect("grant");
        let astrid = records
            .create_person(
                &ada,
                NewPerson {
                    given_name: "Astrid".to_string(),
                    ..NewPerson::default()
                },
            )
            .expect("astrid");
        let service = ContentService::new(
            store.clone(),
            store.clone(),
            recorder,
            store.clone(),
            1024,
        );
        Fixture {
            store,
            service,
            household: household.id,
            astrid: astrid.id,
        }
    }

    fn story(title: &str) -> NewContent {
        NewContent {
            kind: ContentKind::Story,
            title: title.to_string(),
            body: "It was a cold winter.".to_string(),
            household: None,
            people: Vec::new(),
            tags: Vec::new(),
            media: None,
        }
    }

    fn upload(file_name: &str, byte_size: u64) -> MediaUpload {
        MediaUpload {
            file_name: file_name.to_string(),
            byte_size,
            storage_key: format!("blobs/{file_name}"),
        }
    }

    #[test]
    fn publish_validates_title_people_and_tags() {
        let fixture = fixture();
        let ada = UserId::new("ada");

        assert!(matches!(
            fixture.service.publish(&ada, story("  ")),
            Err(ContentServiceError::Invalid(ContentViolation::BlankTitle))
        ));

        let mut tagged = story("The winter of 1947");
        tagged.people = vec![fixture.astrid.clone(), PersonId("per-ghost".to_string())];
        assert!(matches!(
            fixture.service.publish(&ada, tagged),
            Err(ContentServiceError::Invalid(ContentViolation::UnknownPerson(_)))
        ));

        let mut tagged = story("The winter of 1947");
        tagged.people = vec![fixture.astrid.clone(), fixture.astrid.clone()];
        tagged.tags = vec![" Winter ".to_string(), "winter".to_string(), "".to_string()];
        let item = fixture.service.publish(&ada, tagged).expect("published");
        assert_eq!(item.people, vec![fixture.astrid.clone()]);
        assert_eq!(item.tags.len(), 1);
        assert!(item.tags.contains("winter"));
        assert_eq!(item.slug, None);
    }

    #[test]
    fn media_rules_follow_kind_and_size_limit() {
        let fixture = fixture();
        let ada = UserId::new("ada");
        let mut photo = NewContent {
            kind: ContentKind::Photo,
            ..story("Wedding day")
        };

        assert!(matches!(
            fixture.service.publish(&ada, photo.clone()),
            Err(ContentServiceError::Invalid(ContentViolation::MissingMedia("photo")))
        ));

        photo.media = Some(upload("wedding.pdf", 100));
        assert!(matches!(
            fixture.service.publish(&ada, photo.clone()),
            Err(ContentServiceError::Invalid(ContentViolation::NotAnImage(_)))
        ));

        photo.media = Some(upload("wedding.png", 4096));
        assert!(matches!(
            fixture.service.publish(&ada, photo.clone()),
            Err(ContentServiceError::Invalid(ContentViolation::UploadTooLarge {
                size: 4096,
                limit: 1024
            }))
        ));

        photo.media = Some(upload("wedding.png", 0));
        assert!(matches!(
            fixture.service.publish(&ada, photo.clone()),
            Err(ContentServiceError::Invalid(ContentViolation::EmptyUpload))
        ));

        let activity = ActivityService::new(fixture.store.clone());
        let before = activity.points_for(&ada).expect("points");
        photo.media = Some(upload("wedding.png", 512));
        let item = fixture.service.publish(&ada, photo).expect("published");
        assert_eq!(
            item.media.map(|media| media.media_type),
            Some("image/png".to_string())
        );
        let after = activity.points_for(&ada).expect("points");
        assert_eq!(after - before, 5);
    }

    #[test]
    fn wiki_pages_get_unique_slugs_and_revisions() {
        let fixture = fixture();
        let ada = UserId::new("ada");
        let wiki = |title: &str| NewContent {
            kind: ContentKind::WikiPage,
            ..story(title)
        };

        let first = fixture.service.publish(&ada, wiki("The Lund Farm")).expect("first");
        let second = fixture.service.publish(&ada, wiki("The Lund farm!")).expect("second");
        assert_eq!(first.slug.as_deref(), Some("the-lund-farm"));
        assert_eq!(second.slug.as_deref(), Some("the-lund-farm-2"));

        let updated = fixture
            .service
            .update(
                &ada,
                &first.id,
                ContentUpdate {
                    body: Some("Sold in 1962.".to_string()),
                    ..ContentUpdate::default()
                },
            )
            .expect("updated");
        assert_eq!(updated.revision, 2);
        assert_eq!(updated.slug, first.slug);

        let found = fixture
            .service
            .wiki_page(None, "the-lund-farm")
            .expect("lookup by slug");
        assert_eq!(found.body, "Sold in 1962.");
    }

    #[test]
    fn concurrent_wiki_edits_each_count_as_a_revision() {
        let fixture = fixture();
        let ada = UserId::new("ada");
        let page = fixture
            .service
            .publish(
                &ada,
                NewContent {
                    kind: ContentKind::WikiPage,
                    ..story("Lund Farm")
                },
            )
            .expect("published");
        let editors = 6;
        let gate = std::sync::Barrier::new(editors);

        std::thread::scope(|scope| {
            for edit in 0..editors {
                let (fixture, gate, ada, id) = (&fixture, &gate, &ada, &page.id);
                scope.spawn(move || {
                    gate.wait();
                    fixture
                        .service
                        .update(
                            ada,
                            id,
                            ContentUpdate {
                                body: Some(format!("edit {edit}")),
                                ..ContentUpdate::default()
                            },
                        )
                        .expect("updated");
                });
            }
        });

        let stored = fixture.service.get(Some(&ada), &page.id).expect("page");
        assert_eq!(stored.revision, 1 + editors as u32);
    }

    #[test]
    fn household_content_is_hidden_from_outsiders() {
        let fixture = fixture();
        let ada = UserId::new("ada");
        let bea = UserId::new("bea");
        let cy = UserId::new("cy");

        let mut private = story("Recipe book");
        private.kind = ContentKind::Recipe;
        private.household = Some(fixture.household.clone());
        assert!(matches!(
            fixture.service.publish(&bea, private.clone()),
            Err(ContentServiceError::Forbidden(_))
        ));
        let item = fixture.service.publish(&ada, private).expect("published");

        assert!(fixture.service.get(Some(&bea), &item.id).is_ok());
        assert!(matches!(
            fixture.service.get(Some(&cy), &item.id),
            Err(ContentServiceError::NotFound(_))
        ));
        assert!(matches!(
            fixture.service.get(None, &item.id),
            Err(ContentServiceError::NotFound(_))
        ));
        assert!(fixture
            .service
            .list(Some(&cy), &ContentFilter::default())
            .expect("list")
            .is_empty());
        assert!(matches!(
            fixture.service.update(&bea, &item.id, ContentUpdate::default()),
            Err(ContentServiceError::Forbidden(_))
        ));
    }

    #[test]
    fn comments_notify_the_author_and_can_be_removed_by_them() {
        let fixture = fixture();
        let ada = UserId::new("ada");
        let bea = UserId::new("bea");
        let cy = UserId::new("cy");
        let item = fixture.service.publish(&ada, story("Midsummer")).expect("story");

        assert!(matches!(
            fixture
                .service
                .comment(&bea, &item.id, NewComment { body: " ".to_string() }),
            Err(ContentServiceError::Invalid(ContentViolation::BlankComment))
        ));
        let comment = fixture
            .service
            .comment(
                &bea,
                &item.id,
                NewComment {
                    body: "We still dance around the pole!".to_string(),
                },
            )
            .expect("comment");

        let inbox = fixture.store.notifications_for(&ada).expect("inbox");
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::CommentPosted);
        assert_eq!(inbox[0].subject, item.id.0);

        assert!(matches!(
            fixture.service.delete_comment(&cy, &comment.id),
            Err(ContentServiceError::Forbidden(_))
        ));
        fixture
            .service
            .delete_comment(&ada, &comment.id)
            .expect("content author removes comment");
        assert!(fixture
            .service
            .comments(None, &item.id)
            .expect("comments")
            .is_empty());
    }

    #[test]
    fn deleted_content_disappears() {
        let fixture = fixture();
        let ada = UserId::new("ada");
        let item = fixture.service.publish(&ada, story("Old letters")).expect("story");
        assert!(matches!(
            fixture.service.delete(&UserId::new("cy"), &item.id),
            Err(ContentServiceError::Forbidden(_))
        ));
        fixture.service.delete(&ada, &item.id).expect("deleted");
        assert!(matches!(
            fixture.service.get(Some(&ada), &item.id),
            Err(ContentServiceError::NotFound(_))
        ));
    }
}
