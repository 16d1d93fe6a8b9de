//! Bibliographic record types
//!
//! Three shapes of the same seven tracked fields live here:
//! - [`IntermediateRecord`]: one provider's normalized answer, ephemeral
//! - [`CanonicalBook`]: the durable deduplicated record keyed by ISBN
//! - [`BookFieldValues`]: the user-facing (submission) schema used by corrections
//!
//! [`FIELD_MAPPINGS`] is the only place that knows how submission field names
//! relate to canonical field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Title stored when no source supplies one
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// External bibliographic provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceName {
    /// Primary provider (Google Books)
    Google,
    /// Secondary provider (Open Library)
    OpenLibrary,
}

impl SourceName {
    /// Column prefix in the response cache table
    pub fn as_str(self) -> &'static str {
        match self {
            SourceName::Google => "google",
            SourceName::OpenLibrary => "open_library",
        }
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tracked fields and the submission <-> canonical mapping table
// ============================================================================

/// One of the seven fields tracked for completeness
///
/// Serializes with its canonical name (as stored in `missing_fields`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookField {
    Title,
    Authors,
    PageCount,
    CoverUrl,
    Description,
    Categories,
    PublishedDate,
}

/// Row of the bidirectional field-name mapping table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub field: BookField,
    /// Name used by correction submissions and clients
    pub submission_name: &'static str,
    /// Column name on the canonical record
    pub canonical_name: &'static str,
}

/// Indexed by `BookField as usize`
pub static FIELD_MAPPINGS: [FieldMapping; 7] = [
    FieldMapping { field: BookField::Title, submission_name: "title", canonical_name: "title" },
    FieldMapping { field: BookField::Authors, submission_name: "author", canonical_name: "authors" },
    FieldMapping { field: BookField::PageCount, submission_name: "total_pages", canonical_name: "page_count" },
    FieldMapping { field: BookField::CoverUrl, submission_name: "cover_url", canonical_name: "cover_url" },
    FieldMapping { field: BookField::Description, submission_name: "description", canonical_name: "description" },
    FieldMapping { field: BookField::Categories, submission_name: "genres", canonical_name: "categories" },
    FieldMapping { field: BookField::PublishedDate, submission_name: "published_date", canonical_name: "published_date" },
];

impl BookField {
    pub const ALL: [BookField; 7] = [
        BookField::Title,
        BookField::Authors,
        BookField::PageCount,
        BookField::CoverUrl,
        BookField::Description,
        BookField::Categories,
        BookField::PublishedDate,
    ];

    pub fn mapping(self) -> &'static FieldMapping {
        &FIELD_MAPPINGS[self as usize]
    }

    pub fn canonical_name(self) -> &'static str {
        self.mapping().canonical_name
    }

    pub fn submission_name(self) -> &'static str {
        self.mapping().submission_name
    }

    pub fn from_canonical_name(name: &str) -> Option<Self> {
        FIELD_MAPPINGS
            .iter()
            .find(|m| m.canonical_name == name)
            .map(|m| m.field)
    }

    pub fn from_submission_name(name: &str) -> Option<Self> {
        FIELD_MAPPINGS
            .iter()
            .find(|m| m.submission_name == name)
            .map(|m| m.field)
    }
}

impl fmt::Display for BookField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

// ============================================================================
// Provider-normalized record
// ============================================================================

/// Cover image reference as a provider supplies it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoverRef {
    /// Directly fetchable URL
    Url(String),
    /// Open Library numeric cover id, resolved through the covers service
    OpenLibraryId(i64),
}

impl CoverRef {
    /// Fetchable URL, using Open Library's medium-size convention for ids
    pub fn to_url(&self) -> String {
        match self {
            CoverRef::Url(url) => url.clone(),
            CoverRef::OpenLibraryId(id) => {
                format!("https://covers.openlibrary.org/b/id/{}-M.jpg", id)
            }
        }
    }
}

/// Description as the secondary provider returns it: bare string or `{value}` object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceDescription {
    PlainText(String),
    WrappedText { value: String },
}

impl SourceDescription {
    /// Plain text regardless of shape
    pub fn into_text(self) -> String {
        match self {
            SourceDescription::PlainText(text) => text,
            SourceDescription::WrappedText { value } => value,
        }
    }
}

/// One provider's answer, normalized. `None` means the provider said nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntermediateRecord {
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    pub cover: Option<CoverRef>,
    pub description: Option<String>,
    pub page_count: Option<i64>,
    pub published_date: Option<String>,
    pub categories: Option<Vec<String>>,
    /// Provider-native identifier (volume id, edition key)
    pub source_id: Option<String>,
}

impl IntermediateRecord {
    pub fn has_authors(&self) -> bool {
        self.authors.as_ref().is_some_and(|a| a.iter().any(|s| !s.trim().is_empty()))
    }

    pub fn has_positive_page_count(&self) -> bool {
        self.page_count.is_some_and(|p| p > 0)
    }

    pub fn has_description(&self) -> bool {
        self.description.as_ref().is_some_and(|d| !d.trim().is_empty())
    }
}

// ============================================================================
// Canonical record
// ============================================================================

/// Durable, deduplicated bibliographic record keyed by ISBN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalBook {
    pub id: Uuid,
    pub isbn: String,
    pub title: String,
    pub authors: Vec<String>,
    pub cover_url: Option<String>,
    pub description: Option<String>,
    pub page_count: Option<i64>,
    pub published_date: Option<String>,
    pub categories: Vec<String>,
    pub source_google: bool,
    pub source_open_library: bool,
    pub missing_fields: BTreeSet<BookField>,
    pub community_edited: bool,
    /// Last human editor; automated merges never set this
    pub last_edited_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn blank(value: &Option<String>) -> bool {
    value.as_ref().map_or(true, |v| v.trim().is_empty())
}

impl CanonicalBook {
    /// Whether a field counts as missing: absent, empty string, empty list,
    /// or non-positive page count
    pub fn is_field_missing(&self, field: BookField) -> bool {
        match field {
            BookField::Title => self.title.trim().is_empty(),
            BookField::Authors => self.authors.iter().all(|a| a.trim().is_empty()),
            BookField::PageCount => !self.page_count.is_some_and(|p| p > 0),
            BookField::CoverUrl => blank(&self.cover_url),
            BookField::Description => blank(&self.description),
            BookField::Categories => self.categories.iter().all(|c| c.trim().is_empty()),
            BookField::PublishedDate => blank(&self.published_date),
        }
    }

    pub fn compute_missing_fields(&self) -> BTreeSet<BookField> {
        BookField::ALL
            .into_iter()
            .filter(|f| self.is_field_missing(*f))
            .collect()
    }

    /// Must run after every mutation of a tracked field
    pub fn refresh_missing_fields(&mut self) {
        self.missing_fields = self.compute_missing_fields();
    }

    /// Snapshot in submission field names
    pub fn to_field_values(&self) -> BookFieldValues {
        BookFieldValues {
            title: Some(self.title.clone()),
            author: (!self.authors.is_empty()).then(|| self.authors.join(", ")),
            total_pages: self.page_count,
            cover_url: self.cover_url.clone(),
            description: self.description.clone(),
            genres: (!self.categories.is_empty()).then(|| self.categories.clone()),
            published_date: self.published_date.clone(),
        }
    }

    /// Write every field present in `changes` onto the canonical columns
    ///
    /// Recomputes `missing_fields`; audit flags are the caller's concern.
    pub fn apply_field_values(&mut self, changes: &BookFieldValues) {
        for field in BookField::ALL {
            let Some(value) = changes.get(field) else {
                continue;
            };
            match field {
                BookField::Title => {
                    let title = value.as_text();
                    self.title = if title.is_empty() {
                        UNKNOWN_TITLE.to_string()
                    } else {
                        title
                    };
                }
                BookField::Authors => self.authors = value.as_list(),
                BookField::PageCount => self.page_count = value.as_number(),
                BookField::CoverUrl => self.cover_url = Some(value.as_text()),
                BookField::Description => self.description = Some(value.as_text()),
                BookField::Categories => self.categories = value.as_list(),
                BookField::PublishedDate => self.published_date = Some(value.as_text()),
            }
        }
        self.refresh_missing_fields();
    }
}

// ============================================================================
// Submission-schema values
// ============================================================================

/// A single field value in the submission schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(i64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Deep equality: lists by serialized form, scalars by value
    pub fn same_as(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::List(a), FieldValue::List(b)) => {
                serde_json::to_string(a).ok() == serde_json::to_string(b).ok()
            }
            _ => self == other,
        }
    }

    /// Equality as the value would land on the canonical record
    ///
    /// Author text is compared after splitting into the stored list.
    pub fn same_for(&self, field: BookField, other: &FieldValue) -> bool {
        match field {
            BookField::Authors => self.as_list() == other.as_list(),
            _ => self.same_as(other),
        }
    }

    fn as_text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.trim().to_string(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::List(items) => items.join(", "),
        }
    }

    /// Comma-separated text splits into list entries
    fn as_list(&self) -> Vec<String> {
        let items: Vec<String> = match self {
            FieldValue::List(items) => items.clone(),
            FieldValue::Text(s) => s.split(',').map(str::to_string).collect(),
            FieldValue::Number(n) => vec![n.to_string()],
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    fn as_number(&self) -> Option<i64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::List(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

/// Book fields keyed by their user-facing names
///
/// Used both for `original_data` snapshots and `proposed_changes`; in the
/// latter, `None` means "not proposed".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BookFieldValues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
}

/// One changed field between a snapshot and a proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: BookField,
    pub before: Option<FieldValue>,
    pub after: FieldValue,
}

impl BookFieldValues {
    pub fn get(&self, field: BookField) -> Option<FieldValue> {
        match field {
            BookField::Title => self.title.clone().map(FieldValue::Text),
            BookField::Authors => self.author.clone().map(FieldValue::Text),
            BookField::PageCount => self.total_pages.map(FieldValue::Number),
            BookField::CoverUrl => self.cover_url.clone().map(FieldValue::Text),
            BookField::Description => self.description.clone().map(FieldValue::Text),
            BookField::Categories => self.genres.clone().map(FieldValue::List),
            BookField::PublishedDate => self.published_date.clone().map(FieldValue::Text),
        }
    }

    pub fn clear(&mut self, field: BookField) {
        match field {
            BookField::Title => self.title = None,
            BookField::Authors => self.author = None,
            BookField::PageCount => self.total_pages = None,
            BookField::CoverUrl => self.cover_url = None,
            BookField::Description => self.description = None,
            BookField::Categories => self.genres = None,
            BookField::PublishedDate => self.published_date = None,
        }
    }

    /// Copy holding only the listed fields
    pub fn only(&self, fields: &[BookField]) -> Self {
        let mut narrowed = self.clone();
        for field in BookField::ALL {
            if !fields.contains(&field) {
                narrowed.clear(field);
            }
        }
        narrowed
    }

    /// Fields whose proposed value differs from the snapshot
    pub fn diff(original: &BookFieldValues, proposed: &BookFieldValues) -> Vec<FieldChange> {
        BookField::ALL
            .into_iter()
            .filter_map(|field| {
                let after = proposed.get(field)?;
                let before = original.get(field);
                let unchanged = before.as_ref().is_some_and(|b| b.same_for(field, &after));
                (!unchanged).then_some(FieldChange { field, before, after })
            })
            .collect()
    }
}
