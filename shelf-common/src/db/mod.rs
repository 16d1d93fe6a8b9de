//! Database connection management

pub mod init;

pub use init::{connect_in_memory, init_database};
