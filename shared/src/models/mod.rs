//! Domain models for the print supplies inventory

mod analytics;
mod backup;
mod category;
mod export;
mod notification;
mod report;
mod search;
mod user;

pub use analytics::*;
pub use backup::*;
pub use category::*;
pub use export::*;
pub use notification::*;
pub use report::*;
pub use search::*;
pub use user::*;
