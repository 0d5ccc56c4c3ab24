pub mod enricher;
pub mod html_source;
pub mod models;
pub mod parser;
pub mod scheduler;
pub mod source;
pub mod time;
pub mod watch;

pub use html_source::HtmlCalendarSource;
pub use models::{DayPage, Event, ScheduleEntry};
pub use scheduler::{seed_day, seed_days, SeedSummary};
pub use source::{CalendarSource, DaySession};
pub use watch::WatchLoop;
