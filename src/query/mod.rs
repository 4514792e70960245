pub mod builder;
pub mod filter;
pub mod period;

pub use builder::{TaskQuery, TimeEntryQuery};
pub use filter::AnalyticsFilter;
pub use period::Period;
