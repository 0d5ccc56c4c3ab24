#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use forex_calendar_harvester::components::calendar::models::{DayPage, Event, RawCell, RawRow};
use forex_calendar_harvester::components::calendar::{CalendarSource, DaySession};
use forex_calendar_harvester::components::datastore::{Datastore, EventPatch};
use forex_calendar_harvester::error::{enrichment_error, persistence_error, source_error, AppResult};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const BASE_URL: &str = "https://www.forexfactory.com/calendar";

/// A calendar row as the day page would render it
pub fn calendar_row(
    event_id: Option<&str>,
    time: Option<&str>,
    impact: &str,
    title: &str,
) -> RawRow {
    let mut cells = Vec::new();
    if let Some(time) = time {
        cells.push(RawCell::new("calendar__cell calendar__time", time));
    }
    cells.push(RawCell::new("calendar__cell calendar__currency", "USD"));
    cells.push(RawCell::new("calendar__cell calendar__impact", "").with_title(impact));
    cells.push(RawCell::new("calendar__cell calendar__event event", title));
    RawRow::new(event_id, cells)
}

/// A persisted event as the datastore would return it
pub fn stored_event(id: i64, date: NaiveDate, time: &str, link: &str) -> Event {
    let mut event = Event::new(&DayPage::for_date(date), format!("Event {}", id));
    event.id = Some(id);
    event.time = time.to_string();
    event.link = link.to_string();
    event
}

/// Mock calendar source serving canned day pages and detail texts
#[derive(Debug, Clone, Default)]
pub struct MockCalendarSource {
    source_timezone: String,
    pages: HashMap<String, Vec<RawRow>>,
    failing_pages: HashSet<String>,
    inline_details: HashMap<String, String>,
    linked_details: HashMap<String, String>,
    fetched: Arc<Mutex<Vec<String>>>,
    open_sessions: Arc<AtomicUsize>,
}

impl MockCalendarSource {
    /// Create a mock rendering its times in `source_timezone`
    pub fn new(source_timezone: &str) -> Self {
        Self {
            source_timezone: source_timezone.to_string(),
            ..Self::default()
        }
    }

    /// Serve `rows` for the page of `date`
    pub fn with_page(mut self, date: NaiveDate, rows: Vec<RawRow>) -> Self {
        self.pages.insert(DayPage::for_date(date).param, rows);
        self
    }

    /// Make the page of `date` unreachable
    pub fn with_failing_page(mut self, date: NaiveDate) -> Self {
        self.failing_pages.insert(DayPage::for_date(date).param);
        self
    }

    /// Detail text revealed when expanding `event_id` on an open page
    pub fn with_inline_detail(mut self, event_id: &str, text: &str) -> Self {
        self.inline_details.insert(event_id.to_string(), text.to_string());
        self
    }

    /// Detail text served when visiting `link`
    pub fn with_linked_detail(mut self, link: &str, text: &str) -> Self {
        self.linked_details.insert(link.to_string(), text.to_string());
        self
    }

    /// Links visited so far, in order
    pub async fn fetched(&self) -> Vec<String> {
        self.fetched.lock().await.clone()
    }

    /// Sessions opened and not yet released
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarSource for MockCalendarSource {
    async fn open_day(&self, page: &DayPage) -> AppResult<Box<dyn DaySession>> {
        if self.failing_pages.contains(&page.param) {
            return Err(source_error(&format!("Timed out loading {}", page.param)));
        }

        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            source_timezone: self.source_timezone.clone(),
            rows: self.pages.get(&page.param).cloned(),
            details: self.inline_details.clone(),
            open_sessions: Arc::clone(&self.open_sessions),
        }))
    }

    async fn fetch_detail(&self, link: &str) -> AppResult<String> {
        self.fetched.lock().await.push(link.to_string());
        self.linked_details
            .get(link)
            .cloned()
            .ok_or_else(|| enrichment_error("Detail section did not load"))
    }

    fn base_url(&self) -> &str {
        BASE_URL
    }
}

/// Session over one canned page; counts itself released on drop
struct MockSession {
    source_timezone: String,
    rows: Option<Vec<RawRow>>,
    details: HashMap<String, String>,
    open_sessions: Arc<AtomicUsize>,
}

#[async_trait]
impl DaySession for MockSession {
    fn source_timezone(&self) -> &str {
        &self.source_timezone
    }

    fn rows(&self) -> AppResult<Vec<RawRow>> {
        self.rows
            .clone()
            .ok_or_else(|| source_error("Calendar table not found"))
    }

    async fn expand_detail(&mut self, event_id: &str) -> AppResult<String> {
        self.details
            .get(event_id)
            .cloned()
            .ok_or_else(|| enrichment_error(&format!("Row {} did not expand", event_id)))
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mock datastore keeping rows in memory and assigning ids on insert
#[derive(Debug, Clone, Default)]
pub struct MockDatastore {
    rows: Arc<Mutex<Vec<Event>>>,
    updates: Arc<Mutex<Vec<(i64, EventPatch)>>>,
    inserts: Arc<AtomicUsize>,
    failing_insert_dates: HashSet<NaiveDate>,
    fail_queries: bool,
    fail_updates: bool,
}

impl MockDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Datastore already holding `events`
    pub fn with_rows(events: Vec<Event>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(events)),
            ..Self::default()
        }
    }

    /// Datastore whose reads always fail
    pub fn unreachable() -> Self {
        Self {
            fail_queries: true,
            ..Self::default()
        }
    }

    /// Reject any insert carrying events of `date`
    pub fn with_failing_insert(mut self, date: NaiveDate) -> Self {
        self.failing_insert_dates.insert(date);
        self
    }

    /// Reject every partial update
    pub fn with_failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    pub async fn rows(&self) -> Vec<Event> {
        self.rows.lock().await.clone()
    }

    pub async fn updates(&self) -> Vec<(i64, EventPatch)> {
        self.updates.lock().await.clone()
    }

    /// Number of insert calls received
    pub fn insert_calls(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Datastore for MockDatastore {
    async fn insert(&self, events: &[Event]) -> AppResult<()> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if events
            .iter()
            .any(|event| self.failing_insert_dates.contains(&event.date))
        {
            return Err(persistence_error("HTTP 409 - duplicate key value"));
        }

        let mut rows = self.rows.lock().await;
        for event in events {
            let mut row = event.clone();
            row.id = Some(rows.len() as i64 + 1);
            row.event_id = None;
            rows.push(row);
        }
        Ok(())
    }

    async fn update(&self, id: i64, patch: &EventPatch) -> AppResult<()> {
        if self.fail_updates {
            return Err(persistence_error(&format!("HTTP 500 - update of row {} failed", id)));
        }
        let mut rows = self.rows.lock().await;
        let row = rows
            .iter_mut()
            .find(|row| row.id == Some(id))
            .ok_or_else(|| persistence_error(&format!("No row with id {}", id)))?;
        if let Some(details) = &patch.additional_details {
            row.additional_details = details.clone();
        }
        self.updates.lock().await.push((id, patch.clone()));
        Ok(())
    }

    async fn query(&self, date: NaiveDate) -> AppResult<Vec<Event>> {
        if self.fail_queries {
            return Err(persistence_error("HTTP 503 - Service Unavailable"));
        }
        let rows = self.rows.lock().await;
        Ok(rows.iter().filter(|row| row.date == date).cloned().collect())
    }
}
