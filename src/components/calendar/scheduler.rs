use super::enricher::enrich_inline;
use super::models::DayPage;
use super::parser::parse_day;
use super::source::CalendarSource;
use super::time::normalize_time;
use crate::components::datastore::Datastore;
use crate::error::AppResult;
use chrono::NaiveDate;
use tracing::{error, info, warn};

/// Outcome of a seeding run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Days whose events reached the datastore
    pub seeded: Vec<NaiveDate>,
    /// Days that failed or had nothing to store
    pub skipped: Vec<NaiveDate>,
    /// Events inserted across all days
    pub events: usize,
}

/// Scrape, normalize, enrich and store one day page.
///
/// Returns the number of events inserted. The browsing session is released
/// before the events are persisted.
pub async fn seed_day(
    source: &dyn CalendarSource,
    datastore: &dyn Datastore,
    page: &DayPage,
    target_timezone: &str,
) -> AppResult<usize> {
    let mut session = source.open_day(page).await?;
    let rows = session.rows()?;

    let mut events = parse_day(&rows, page, source.base_url());
    let source_timezone = session.source_timezone().to_string();
    let page_date = page.page_date();
    for event in events.iter_mut() {
        event.time = normalize_time(&page_date, &event.time, &source_timezone, target_timezone);
    }

    let enriched = enrich_inline(&mut *session, &mut events).await;
    drop(session);

    if events.is_empty() {
        warn!("No events found for {}", page.param);
        return Ok(0);
    }

    info!(
        "Parsed {} events for {} ({} with details)",
        events.len(),
        page.param,
        enriched
    );
    datastore.insert(&events).await?;

    Ok(events.len())
}

/// Seed `days` consecutive day pages starting at `start`.
///
/// Each day is attempted once; a failing day is logged and the next one is
/// still attempted.
pub async fn seed_days(
    source: &dyn CalendarSource,
    datastore: &dyn Datastore,
    start: NaiveDate,
    days: u32,
    target_timezone: &str,
) -> SeedSummary {
    info!("Scheduler for {} days started", days);
    let mut summary = SeedSummary::default();

    for offset in 0..days {
        let Some(page) = DayPage::with_offset(start, offset) else {
            error!("Date out of range at offset {}", offset);
            continue;
        };

        info!("Scraping full day news for {}", page.param);
        match seed_day(source, datastore, &page, target_timezone).await {
            Ok(0) => summary.skipped.push(page.date),
            Ok(count) => {
                summary.events += count;
                summary.seeded.push(page.date);
            }
            Err(e) => {
                error!("Skipping {}: {}", page.param, e);
                summary.skipped.push(page.date);
            }
        }
    }

    info!(
        "Seeding finished: {} days seeded, {} skipped, {} events",
        summary.seeded.len(),
        summary.skipped.len(),
        summary.events
    );
    summary
}
