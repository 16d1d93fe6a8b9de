//! Data models for canonical book resolution

pub mod book;
pub mod correction;

pub use book::{
    BookField, BookFieldValues, CanonicalBook, CoverRef, FieldChange, FieldValue,
    IntermediateRecord, SourceDescription, SourceName, FIELD_MAPPINGS, UNKNOWN_TITLE,
};
pub use correction::{
    action_token_ttl, ActionToken, CorrectionSubmission, ReviewDecision, SubmissionStatus,
    ACTION_TOKEN_TTL_HOURS,
};
