//! HTTP API handlers for shelf-canon

pub mod books;
pub mod corrections;
pub mod health;
pub mod review_page;
pub mod settings;

pub use books::book_routes;
pub use corrections::correction_routes;
pub use health::health_routes;
pub use review_page::review_routes;
pub use settings::settings_routes;
