//! Services for shelf-canon

pub mod book_source;
pub mod canonical_resolver;
pub mod correction_workflow;
pub mod google_books_client;
pub mod notifier;
pub mod open_library_client;
pub mod record_merger;

pub use book_source::{BookSource, SourceError};
pub use canonical_resolver::{CanonicalResolver, LookupError};
pub use correction_workflow::{CorrectionError, CorrectionWorkflow, NewCorrection, Resolution};
pub use google_books_client::GoogleBooksClient;
pub use notifier::{LogNotifier, Notifier, NotifyError, ReviewNotification, WebhookNotifier};
pub use open_library_client::OpenLibraryClient;
