//! Utility modules

pub mod db_retry;
pub mod text;

pub use db_retry::{retry_on_lock, LockContention};
pub use text::{escape_html, strip_markup};
