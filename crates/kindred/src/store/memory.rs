use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::RepositoryError;
use crate::activity::{ActivityFeedItem, ActivityRepository};
use crate::audit::{Audited, UserId};
use crate::content::{Comment, CommentId, ContentId, ContentItem, ContentRepository};
use crate::contributions::{
    Contribution, ContributionId, ContributionRepository, ContributionStatus,
};
use crate::messaging::{
    Message, MessageId, MessageRepository, Notification, NotificationId, NotificationKind,
    Notifier,
};
use crate::records::{
    FamilyRepository, Household, HouseholdId, ParentChild, ParentChildId, Partnership,
    PartnershipId, Person, PersonId,
};

type Table<K, V> = Arc<Mutex<BTreeMap<K, V>>>;

/// Mutex-guarded maps implementing every repository trait. Services order
/// their results by timestamp; map order is only keyed by id.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    people: Table<PersonId, Person>,
    households: Table<HouseholdId, Household>,
    parent_child: Table<ParentChildId, ParentChild>,
    partnerships: Table<PartnershipId, Partnership>,
    contributions: Table<ContributionId, Contribution>,
    content: Table<ContentId, ContentItem>,
    comments: Table<CommentId, Comment>,
    messages: Table<MessageId, Message>,
    notifications: Table<NotificationId, Notification>,
    activity: Arc<Mutex<Vec<ActivityFeedItem>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
}

fn insert_row<K: Ord + Clone, V: Clone>(
    table: &Mutex<BTreeMap<K, V>>,
    key: &K,
    row: V,
) -> Result<V, RepositoryError> {
    let mut guard = lock(table)?;
    if guard.contains_key(key) {
        return Err(RepositoryError::Conflict);
    }
    guard.insert(key.clone(), row.clone());
    Ok(row)
}

fn update_row<K: Ord + Clone, V>(
    table: &Mutex<BTreeMap<K, V>>,
    key: &K,
    row: V,
) -> Result<(), RepositoryError> {
    let mut guard = lock(table)?;
    match guard.get_mut(key) {
        Some(existing) => {
            *existing = row;
            Ok(())
        }
        None => Err(RepositoryError::NotFound),
    }
}

/// Run `change` on a copy of the row while the table is locked and keep the
/// copy only when `change` succeeds.
fn modify_row<K: Ord, V: Clone, T, E: From<RepositoryError>>(
    table: &Mutex<BTreeMap<K, V>>,
    key: &K,
    change: impl FnOnce(&mut V) -> Result<T, E>,
) -> Result<T, E> {
    let mut guard = lock(table)?;
    let existing = guard.get_mut(key).ok_or(RepositoryError::NotFound)?;
    let mut draft = existing.clone();
    let outcome = change(&mut draft)?;
    *existing = draft;
    Ok(outcome)
}

fn fetch_row<K: Ord, V: Clone>(
    table: &Mutex<BTreeMap<K, V>>,
    key: &K,
) -> Result<Option<V>, RepositoryError> {
    Ok(lock(table)?.get(key).cloned())
}

fn live_rows<K, V: Audited + Clone>(
    table: &Mutex<BTreeMap<K, V>>,
) -> Result<Vec<V>, RepositoryError> {
    Ok(lock(table)?
        .values()
        .filter(|row| row.is_live())
        .cloned()
        .collect())
}

impl FamilyRepository for InMemoryStore {
    fn insert_person(&self, person: Person) -> Result<Person, RepositoryError> {
        let key = person.id.clone();
        insert_row(&self.people, &key, person)
    }

    fn modify_person<T, E: From<RepositoryError>>(
        &self,
        id: &PersonId,
        change: impl FnOnce(&mut Person) -> Result<T, E>,
    ) -> Result<T, E> {
        modify_row(&self.people, id, change)
    }

    fn fetch_person(&self, id: &PersonId) -> Result<Option<Person>, RepositoryError> {
        fetch_row(&self.people, id)
    }

    fn people(&self) -> Result<Vec<Person>, RepositoryError> {
        live_rows(&self.people)
    }

    fn insert_household(&self, household: Household) -> Result<Household, RepositoryError> {
        let key = household.id.clone();
        insert_row(&self.households, &key, household)
    }

    fn modify_household<T, E: From<RepositoryError>>(
        &self,
        id: &HouseholdId,
        change: impl FnOnce(&mut Household) -> Result<T, E>,
    ) -> Result<T, E> {
        modify_row(&self.households, id, change)
    }

    fn fetch_household(&self, id: &HouseholdId) -> Result<Option<Household>, RepositoryError> {
        fetch_row(&self.households, id)
    }

    fn households(&self) -> Result<Vec<Household>, RepositoryError> {
        live_rows(&self.households)
    }

    fn insert_parent_child(&self, link: ParentChild) -> Result<ParentChild, RepositoryError> {
        let key = link.id.clone();
        insert_row(&self.parent_child, &key, link)
    }

    fn update_parent_child(&self, link: ParentChild) -> Result<(), RepositoryError> {
        let key = link.id.clone();
        update_row(&self.parent_child, &key, link)
    }

    fn fetch_parent_child(
        &self,
        id: &ParentChildId,
    ) -> Result<Option<ParentChild>, RepositoryError> {
        fetch_row(&self.parent_child, id)
    }

    fn parent_child_links(&self) -> Result<Vec<ParentChild>, RepositoryError> {
        live_rows(&self.parent_child)
    }

    fn insert_partnership(&self, partnership: Partnership) -> Result<Partnership, RepositoryError> {
        let key = partnership.id.clone();
        insert_row(&self.partnerships, &key, partnership)
    }

    fn update_partnership(&self, partnership: Partnership) -> Result<(), RepositoryError> {
        let key = partnership.id.clone();
        update_row(&self.partnerships, &key, partnership)
    }

    fn fetch_partnership(
        &self,
        id: &PartnershipId,
    ) -> Result<Option<Partnership>, RepositoryError> {
        fetch_row(&self.partnerships, id)
    }

    fn partnerships(&self) -> Result<Vec<Partnership>, RepositoryError> {
        live_rows(&self.partnerships)
    }
}

impl ContributionRepository for InMemoryStore {
    fn insert_contribution(
        &self,
        contribution: Contribution,
    ) -> Result<Contribution, RepositoryError> {
        let key = contribution.id.clone();
        insert_row(&self.contributions, &key, contribution)
    }

    fn transition_contribution(
        &self,
        contribution: Contribution,
        expected: ContributionStatus,
    ) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.contributions)?;
        let existing = guard
            .get_mut(&contribution.id)
            .ok_or(RepositoryError::NotFound)?;
        if existing.status != expected {
            return Err(RepositoryError::Conflict);
        }
        *existing = contribution;
        Ok(())
    }

    fn fetch_contribution(
        &self,
        id: &ContributionId,
    ) -> Result<Option<Contribution>, RepositoryError> {
        fetch_row(&self.contributions, id)
    }

    fn contributions(&self) -> Result<Vec<Contribution>, RepositoryError> {
        live_rows(&self.contributions)
    }
}

impl ContentRepository for InMemoryStore {
    fn insert_content(&self, item: ContentItem) -> Result<ContentItem, RepositoryError> {
        let key = item.id.clone();
        insert_row(&self.content, &key, item)
    }

    fn modify_content<T, E: From<RepositoryError>>(
        &self,
        id: &ContentId,
        change: impl FnOnce(&mut ContentItem) -> Result<T, E>,
    ) -> Result<T, E> {
        modify_row(&self.content, id, change)
    }

    fn fetch_content(&self, id: &ContentId) -> Result<Option<ContentItem>, RepositoryError> {
        fetch_row(&self.content, id)
    }

    fn contents(&self) -> Result<Vec<ContentItem>, RepositoryError> {
        live_rows(&self.content)
    }

    fn insert_comment(&self, comment: Comment) -> Result<Comment, RepositoryError> {
        let key = comment.id.clone();
        insert_row(&self.comments, &key, comment)
    }

    fn update_comment(&self, comment: Comment) -> Result<(), RepositoryError> {
        let key = comment.id.clone();
        update_row(&self.comments, &key, comment)
    }

    fn fetch_comment(&self, id: &CommentId) -> Result<Option<Comment>, RepositoryError> {
        fetch_row(&self.comments, id)
    }

    fn comments_for(&self, content: &ContentId) -> Result<Vec<Comment>, RepositoryError> {
        Ok(live_rows(&self.comments)?
            .into_iter()
            .filter(|comment| &comment.content == content)
            .collect())
    }
}

impl MessageRepository for InMemoryStore {
    fn insert_message(&self, message: Message) -> Result<Message, RepositoryError> {
        let key = message.id.clone();
        insert_row(&self.messages, &key, message)
    }

    fn modify_message<T, E: From<RepositoryError>>(
        &self,
        id: &MessageId,
        change: impl FnOnce(&mut Message) -> Result<T, E>,
    ) -> Result<T, E> {
        modify_row(&self.messages, id, change)
    }

    fn fetch_message(&self, id: &MessageId) -> Result<Option<Message>, RepositoryError> {
        fetch_row(&self.messages, id)
    }

    fn messages(&self) -> Result<Vec<Message>, RepositoryError> {
        Ok(lock(&self.messages)?.values().cloned().collect())
    }

    fn insert_notification(&self, notification: Notification) -> Result<(), RepositoryError> {
        let key = notification.id.clone();
        insert_row(&self.notifications, &key, notification).map(|_| ())
    }

    fn modify_notification<T, E: From<RepositoryError>>(
        &self,
        id: &NotificationId,
        change: impl FnOnce(&mut Notification) -> Result<T, E>,
    ) -> Result<T, E> {
        modify_row(&self.notifications, id, change)
    }

    fn mark_notifications_read(
        &self,
        user: &UserId,
        at: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        let mut guard = lock(&self.notifications)?;
        let mut marked = 0;
        for notification in guard
            .values_mut()
            .filter(|notification| &notification.user == user && notification.is_unread())
        {
            notification.read_at = Some(at);
            marked += 1;
        }
        Ok(marked)
    }

    fn fetch_notification(
        &self,
        id: &NotificationId,
    ) -> Result<Option<Notification>, RepositoryError> {
        fetch_row(&self.notifications, id)
    }

    fn notifications_for(&self, user: &UserId) -> Result<Vec<Notification>, RepositoryError> {
        Ok(lock(&self.notifications)?
            .values()
            .filter(|notification| &notification.user == user)
            .cloned()
            .collect())
    }
}

impl Notifier for InMemoryStore {
    fn notify(
        &self,
        user: &UserId,
        kind: NotificationKind,
        text: String,
        subject: String,
    ) -> Result<(), RepositoryError> {
        self.insert_notification(Notification::new(user, kind, text, subject))
    }
}

impl ActivityRepository for InMemoryStore {
    fn append(&self, item: ActivityFeedItem) -> Result<(), RepositoryError> {
        lock(&self.activity)?.push(item);
        Ok(())
    }

    fn items(&self) -> Result<Vec<ActivityFeedItem>, RepositoryError> {
        Ok(lock(&self.activity)?.clone())
    }
}
