use super::models::{DetailTarget, Event, ScheduleEntry};
use super::source::{CalendarSource, DaySession};
use crate::components::datastore::{Datastore, EventPatch};
use crate::error::{enrichment_error, AppResult};
use async_trait::async_trait;
use tracing::{info, warn};

/// Anything that can produce the expanded detail text of an event
#[async_trait]
pub trait DetailSource: Send {
    async fn detail_text(&mut self, target: DetailTarget<'_>) -> AppResult<String>;
}

/// Expands events in place on a day page that is still open
pub struct InlineDetails<'s> {
    session: &'s mut dyn DaySession,
}

impl<'s> InlineDetails<'s> {
    pub fn new(session: &'s mut dyn DaySession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl DetailSource for InlineDetails<'_> {
    async fn detail_text(&mut self, target: DetailTarget<'_>) -> AppResult<String> {
        let event_id = target
            .event_id
            .ok_or_else(|| enrichment_error("Event has no page identifier"))?;
        self.session.expand_detail(event_id).await
    }
}

/// Visits an event's own link in a fresh request
pub struct LinkedDetails<'s> {
    source: &'s dyn CalendarSource,
}

impl<'s> LinkedDetails<'s> {
    pub fn new(source: &'s dyn CalendarSource) -> Self {
        Self { source }
    }
}

#[async_trait]
impl DetailSource for LinkedDetails<'_> {
    async fn detail_text(&mut self, target: DetailTarget<'_>) -> AppResult<String> {
        if target.link.is_empty() {
            return Err(enrichment_error("Event has no detail link"));
        }
        self.source.fetch_detail(target.link).await
    }
}

/// Fetch the detail text of `event` and overwrite its `additional_details`
pub async fn enrich(details: &mut dyn DetailSource, event: &mut Event) -> AppResult<()> {
    let text = details.detail_text(event.detail_target()).await?;
    event.additional_details = text;
    Ok(())
}

/// Enrich every identified event of an open day page.
///
/// A failed expansion leaves that event's details empty and moves on.
/// Returns how many events were enriched.
pub async fn enrich_inline(session: &mut dyn DaySession, events: &mut [Event]) -> usize {
    let mut details = InlineDetails::new(session);
    let mut enriched = 0;

    for event in events.iter_mut().filter(|e| e.event_id.is_some()) {
        match enrich(&mut details, event).await {
            Ok(()) => enriched += 1,
            Err(e) => {
                warn!(
                    "Failed to expand details for event {}: {}",
                    event.event_id.as_deref().unwrap_or_default(),
                    e
                );
                event.additional_details.clear();
            }
        }
    }

    enriched
}

/// Fetch the details of a due event through its link and store them
pub async fn enrich_deferred(
    source: &dyn CalendarSource,
    datastore: &dyn Datastore,
    entry: &ScheduleEntry,
) -> AppResult<()> {
    let mut details = LinkedDetails::new(source);
    let text = details.detail_text(entry.detail_target()).await?;
    info!("Scraped details for event id {}", entry.id);

    datastore.update(entry.id, &EventPatch::details(text)).await
}
