use super::models::{DayPage, RawRow};
use crate::error::AppResult;
use async_trait::async_trait;

/// A browsing session over one day page.
///
/// The session is owned by the operation that opened it and is released when
/// dropped, whichever way that operation ends.
#[async_trait]
pub trait DaySession: Send {
    /// Timezone the page renders its clock times in
    fn source_timezone(&self) -> &str;

    /// Ordered rows of the calendar table; `SourceUnavailable` when the table is missing
    fn rows(&self) -> AppResult<Vec<RawRow>>;

    /// Expand one event in place and return the detail text
    async fn expand_detail(&mut self, event_id: &str) -> AppResult<String>;
}

/// Where calendar pages come from
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Open a session on the page of one day
    async fn open_day(&self, page: &DayPage) -> AppResult<Box<dyn DaySession>>;

    /// Visit an event's own link and return its detail text
    async fn fetch_detail(&self, link: &str) -> AppResult<String>;

    /// Base day-query URL that detail links are built from
    fn base_url(&self) -> &str;
}
