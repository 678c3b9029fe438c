//! Downstream automations: classify the summary, then dispatch.

pub mod calendar;
pub mod classifier;
pub mod controller;
pub mod highlights;

pub use calendar::{CalendarApi, CalendarExtractor};
pub use controller::AutomationController;
pub use highlights::HighlightsSink;
