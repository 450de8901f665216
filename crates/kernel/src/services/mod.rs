//! Background services.

pub mod scheduled_publishing;

pub use scheduled_publishing::{ScheduledPublishingService, SchedulerReport};
