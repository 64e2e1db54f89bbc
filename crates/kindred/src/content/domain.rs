use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::audit::{AuditStamp, Audited, UserId};
use crate::records::{HouseholdId, PersonId};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommentId(pub String);

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Story,
    Recipe,
    Tradition,
    WikiPage,
    Photo,
    Document,
}

impl ContentKind {
    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::Story => "story",
            ContentKind::Recipe => "recipe",
            ContentKind::Tradition => "tradition",
            ContentKind::WikiPage => "wiki page",
            ContentKind::Photo => "photo",
            ContentKind::Document => "document",
        }
    }

    pub fn requires_media(&self) -> bool {
        matches!(self, ContentKind::Photo | ContentKind::Document)
    }
}

/// Stored file metadata. Bytes live in external blob storage under `storage_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub file_name: String,
    pub media_type: String,
    pub byte_size: u64,
    pub storage_key: String,
}

impl MediaDescriptor {
    /// Build a descriptor, inferring the media type from the file extension.
    pub fn from_upload(upload: MediaUpload) -> Self {
        let media_type = mime_guess::from_path(&upload.file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            file_name: upload.file_name,
            media_type,
            byte_size: upload.byte_size,
            storage_key: upload.storage_key,
        }
    }

    pub fn is_image(&self) -> bool {
        self.media_type
            .parse::<mime::Mime>()
            .map(|parsed| parsed.type_() == mime::IMAGE)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaUpload {
    pub file_name: String,
    pub byte_size: u64,
    pub storage_key: String,
}

/// Story, recipe, tradition, wiki page, photo, or document shared with the family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ContentId,
    pub kind: ContentKind,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub household: Option<HouseholdId>,
    pub people: Vec<PersonId>,
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaDescriptor>,
    /// Set for wiki pages only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub revision: u32,
    pub author: UserId,
    pub audit: AuditStamp,
}

impl Audited for ContentItem {
    fn audit(&self) -> &AuditStamp {
        &self.audit
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContent {
    pub kind: ContentKind,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub household: Option<HouseholdId>,
    #[serde(default)]
    pub people: Vec<PersonId>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub media: Option<MediaUpload>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub people: Option<Vec<PersonId>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ContentFilter {
    #[serde(default)]
    pub kind: Option<ContentKind>,
    #[serde(default)]
    pub person: Option<PersonId>,
    #[serde(default)]
    pub household: Option<HouseholdId>,
    #[serde(default)]
    pub tag: Option<String>,
}

impl ContentFilter {
    pub fn matches(&self, item: &ContentItem) -> bool {
        self.kind.map(|kind| kind == item.kind).unwrap_or(true)
            && self
                .person
                .as_ref()
                .map(|person| item.people.contains(person))
                .unwrap_or(true)
            && self
                .household
                .as_ref()
                .map(|household| item.household.as_ref() == Some(household))
                .unwrap_or(true)
            && self
                .tag
                .as_deref()
                .map(|tag| item.tags.contains(&normalize_tag(tag)))
                .unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub content: ContentId,
    pub author: UserId,
    pub body: String,
    pub audit: AuditStamp,
}

impl Audited for Comment {
    fn audit(&self) -> &AuditStamp {
        &self.audit
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub body: String,
}

pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Lowercase, hyphen-separated form of a wiki title.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let trimmed = slug.trim_end_matches('-');
    if trimmed.is_empty() {
        "page".to_string()
    } else {
        trimmed.to_string()
    }
}
