//! Field precedence policy for merging provider records
//!
//! Per field, the primary source (Google Books) wins whenever it has a usable
//! value; otherwise the secondary (Open Library) fills in:
//!
//! | Field          | Rule                                                     |
//! |----------------|----------------------------------------------------------|
//! | title          | primary → secondary → `"Unknown Title"`                  |
//! | authors        | primary → secondary                                      |
//! | categories     | primary → secondary                                      |
//! | cover_url      | primary URL → secondary cover id as medium-size URL      |
//! | description    | primary (markup stripped) → secondary (plain text)       |
//! | page_count     | primary if positive → secondary if positive              |
//! | published_date | primary verbatim → secondary verbatim                    |

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::isbn::Isbn;
use crate::models::{CanonicalBook, IntermediateRecord, UNKNOWN_TITLE};
use crate::utils::strip_markup;

/// Whether the secondary source must be consulted
///
/// Completeness beats latency: anything short of a primary result with
/// pages, authors, cover and description asks the secondary too.
pub fn needs_secondary(primary: Option<&IntermediateRecord>) -> bool {
    match primary {
        None => true,
        Some(record) => {
            !record.has_positive_page_count()
                || !record.has_authors()
                || record.cover.is_none()
                || !record.has_description()
        }
    }
}

fn non_empty_list(list: Option<&Vec<String>>) -> Option<Vec<String>> {
    list.filter(|items| items.iter().any(|s| !s.trim().is_empty()))
        .cloned()
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).cloned()
}

/// Merge provider records into a canonical candidate with fresh `missing_fields`
pub fn merge_records(
    isbn: &Isbn,
    primary: Option<&IntermediateRecord>,
    secondary: Option<&IntermediateRecord>,
    now: DateTime<Utc>,
) -> CanonicalBook {
    let title = primary
        .and_then(|p| non_blank(p.title.as_ref()))
        .or_else(|| secondary.and_then(|s| non_blank(s.title.as_ref())))
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    let authors = primary
        .and_then(|p| non_empty_list(p.authors.as_ref()))
        .or_else(|| secondary.and_then(|s| non_empty_list(s.authors.as_ref())))
        .unwrap_or_default();

    let categories = primary
        .and_then(|p| non_empty_list(p.categories.as_ref()))
        .or_else(|| secondary.and_then(|s| non_empty_list(s.categories.as_ref())))
        .unwrap_or_default();

    let cover_url = primary
        .and_then(|p| p.cover.as_ref())
        .or_else(|| secondary.and_then(|s| s.cover.as_ref()))
        .map(|cover| cover.to_url());

    let description = primary
        .and_then(|p| p.description.as_deref())
        .map(strip_markup)
        .filter(|d| !d.is_empty())
        .or_else(|| secondary.and_then(|s| non_blank(s.description.as_ref())));

    let page_count = primary
        .and_then(|p| p.page_count)
        .filter(|p| *p > 0)
        .or_else(|| secondary.and_then(|s| s.page_count).filter(|p| *p > 0));

    let published_date = primary
        .and_then(|p| non_blank(p.published_date.as_ref()))
        .or_else(|| secondary.and_then(|s| non_blank(s.published_date.as_ref())));

    let mut book = CanonicalBook {
        id: Uuid::new_v4(),
        isbn: isbn.to_string(),
        title,
        authors,
        cover_url,
        description,
        page_count,
        published_date,
        categories,
        source_google: primary.is_some(),
        source_open_library: secondary.is_some(),
        missing_fields: BTreeSet::new(),
        community_edited: false,
        last_edited_by: None,
        created_at: now,
        updated_at: now,
    };
    book.refresh_missing_fields();
    book
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookField, CoverRef};

    fn isbn() -> Isbn {
        Isbn::parse("9780545010221").unwrap()
    }

    fn complete_primary() -> IntermediateRecord {
        IntermediateRecord {
            title: Some("Deathly Hallows".to_string()),
            authors: Some(vec!["J.K. Rowling".to_string()]),
            cover: Some(CoverRef::Url("https://books.google.com/t.jpg".to_string())),
            description: Some("<p>Final <i>book</i>.</p>".to_string()),
            page_count: Some(759),
            published_date: Some("2007-07-21".to_string()),
            categories: Some(vec!["Juvenile Fiction".to_string()]),
            source_id: Some("wrOQLV6xB-wC".to_string()),
        }
    }

    #[test]
    fn test_needs_secondary_rules() {
        assert!(needs_secondary(None));
        assert!(!needs_secondary(Some(&complete_primary())));

        let mut no_pages = complete_primary();
        no_pages.page_count = Some(0);
        assert!(needs_secondary(Some(&no_pages)));

        let mut no_authors = complete_primary();
        no_authors.authors = Some(vec![]);
        assert!(needs_secondary(Some(&no_authors)));

        let mut no_cover = complete_primary();
        no_cover.cover = None;
        assert!(needs_secondary(Some(&no_cover)));

        let mut no_description = complete_primary();
        no_description.description = None;
        assert!(needs_secondary(Some(&no_description)));
    }

    #[test]
    fn test_primary_page_count_wins_when_positive() {
        let secondary = IntermediateRecord {
            page_count: Some(800),
            ..Default::default()
        };

        let book = merge_records(&isbn(), Some(&complete_primary()), Some(&secondary), Utc::now());

        assert_eq!(book.page_count, Some(759));
    }

    #[test]
    fn test_primary_description_is_markup_stripped() {
        let book = merge_records(&isbn(), Some(&complete_primary()), None, Utc::now());

        assert_eq!(book.description.as_deref(), Some("Final book."));
        assert!(book.missing_fields.is_empty());
        assert!(book.source_google);
        assert!(!book.source_open_library);
    }

    #[test]
    fn test_description_falls_back_to_secondary() {
        let mut primary = complete_primary();
        primary.description = None;
        let secondary = IntermediateRecord {
            description: Some("From Open Library.".to_string()),
            ..Default::default()
        };

        let book = merge_records(&isbn(), Some(&primary), Some(&secondary), Utc::now());

        assert_eq!(book.description.as_deref(), Some("From Open Library."));
    }

    #[test]
    fn test_secondary_cover_id_becomes_medium_url() {
        let mut primary = complete_primary();
        primary.cover = None;
        let secondary = IntermediateRecord {
            cover: Some(CoverRef::OpenLibraryId(42)),
            ..Default::default()
        };

        let book = merge_records(&isbn(), Some(&primary), Some(&secondary), Utc::now());

        assert_eq!(
            book.cover_url.as_deref(),
            Some("https://covers.openlibrary.org/b/id/42-M.jpg")
        );
    }

    #[test]
    fn test_title_defaults_and_is_not_missing() {
        let secondary = IntermediateRecord {
            page_count: Some(100),
            ..Default::default()
        };

        let book = merge_records(&isbn(), None, Some(&secondary), Utc::now());

        assert_eq!(book.title, UNKNOWN_TITLE);
        assert!(!book.missing_fields.contains(&BookField::Title));
        assert!(book.missing_fields.contains(&BookField::Authors));
        assert!(!book.source_google);
    }

    #[test]
    fn test_dates_pass_through_verbatim() {
        let secondary = IntermediateRecord {
            published_date: Some("Summer 1965?".to_string()),
            ..Default::default()
        };

        let book = merge_records(&isbn(), None, Some(&secondary), Utc::now());

        assert_eq!(book.published_date.as_deref(), Some("Summer 1965?"));
    }

    #[test]
    fn test_primary_zero_pages_falls_back() {
        let primary = IntermediateRecord {
            title: Some("Harry Potter".to_string()),
            page_count: Some(0),
            ..Default::default()
        };
        let secondary = IntermediateRecord {
            page_count: Some(309),
            authors: Some(vec!["J.K. Rowling".to_string()]),
            ..Default::default()
        };

        let book = merge_records(&isbn(), Some(&primary), Some(&secondary), Utc::now());

        assert_eq!(book.page_count, Some(309));
        assert_eq!(book.authors, vec!["J.K. Rowling"]);
        assert!(!book.missing_fields.contains(&BookField::PageCount));
        assert!(!book.missing_fields.contains(&BookField::Authors));
    }
}
