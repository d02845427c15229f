//! Business logic services for the print supplies inventory

pub mod analytics;
pub mod backup;
pub mod export;
pub mod notification;
pub mod provenance;
pub mod query;
pub mod report_layout;
pub mod report_sources;
pub mod reporting;
pub mod search;
pub mod timeline;

pub use analytics::AnalyticsService;
pub use backup::BackupManager;
pub use export::ExportService;
pub use notification::NotificationService;
pub use reporting::ReportingService;
pub use search::SearchService;
