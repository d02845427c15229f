//! HTTP handlers for the print supplies inventory API

pub mod analytics;
pub mod backup;
pub mod export;
pub mod health;
pub mod notification;
pub mod params;
pub mod reporting;
pub mod search;

pub use analytics::analytics;
pub use backup::{cleanup_backups, create_backup, delete_backup, list_backups};
pub use export::export;
pub use health::health_check;
pub use notification::notifications;
pub use reporting::generate_report;
pub use search::search;
