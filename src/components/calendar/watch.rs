use super::enricher::enrich_deferred;
use super::models::{Event, ScheduleEntry};
use super::source::CalendarSource;
use super::time::scheduled_instant;
use crate::components::datastore::Datastore;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::HashSet;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Persisted events of one day that can still be triggered after `now`
pub fn build_schedule(events: &[Event], zone: &Tz, now: DateTime<Tz>) -> Vec<ScheduleEntry> {
    events
        .iter()
        .filter(|event| event.has_clock_time())
        .filter_map(|event| {
            let id = event.id?;
            let trigger_at = scheduled_instant(event.date, &event.time, zone)?;
            (trigger_at > now).then(|| ScheduleEntry {
                id,
                trigger_at,
                link: event.link.clone(),
            })
        })
        .collect()
}

/// Whether `trigger_at` lies within `window` of `now`, on either side
pub fn is_due(trigger_at: DateTime<Tz>, now: DateTime<Tz>, window: Duration) -> bool {
    (trigger_at - now).abs() < window
}

/// Polls today's events and fetches details for each due event once per run
pub struct WatchLoop<'a> {
    source: &'a dyn CalendarSource,
    datastore: &'a dyn Datastore,
    zone: Tz,
    trigger_window: Duration,
    poll_interval: std::time::Duration,
    triggered: HashSet<i64>,
    triggered_day: Option<NaiveDate>,
}

impl<'a> WatchLoop<'a> {
    pub fn new(
        source: &'a dyn CalendarSource,
        datastore: &'a dyn Datastore,
        zone: Tz,
        trigger_window: std::time::Duration,
        poll_interval: std::time::Duration,
    ) -> Self {
        Self {
            source,
            datastore,
            zone,
            trigger_window: Duration::from_std(trigger_window)
                .unwrap_or_else(|_| Duration::seconds(60)),
            poll_interval,
            triggered: HashSet::new(),
            triggered_day: None,
        }
    }

    /// Ids already triggered today
    pub fn triggered(&self) -> &HashSet<i64> {
        &self.triggered
    }

    /// One poll cycle at `now`; returns how many enrichments were fired
    pub async fn poll_once(&mut self, now: DateTime<Tz>) -> usize {
        let today = now.date_naive();
        if self.triggered_day != Some(today) {
            if !self.triggered.is_empty() {
                debug!("Day rolled over to {}, clearing {} triggers", today, self.triggered.len());
            }
            self.triggered.clear();
            self.triggered_day = Some(today);
        }

        let events = match self.datastore.query(today).await {
            Ok(events) => events,
            Err(e) => {
                error!("Failed to fetch schedule: {}", e);
                return 0;
            }
        };

        let schedule = build_schedule(&events, &self.zone, now);
        let window = self.trigger_window;
        let mut fired = 0;

        for entry in schedule
            .iter()
            .filter(|entry| is_due(entry.trigger_at, now, window))
        {
            // At most one trigger per event and run, even when consecutive polls overlap the window
            if !self.triggered.insert(entry.id) {
                continue;
            }

            info!("Scraping scheduled news: {}", entry.link);
            if let Err(e) = enrich_deferred(self.source, self.datastore, entry).await {
                warn!("Failed to scrape news details for id {}: {}", entry.id, e);
            }
            fired += 1;
        }

        fired
    }

    /// Poll forever, sleeping `poll_interval` between cycles
    pub async fn run(&mut self) {
        info!("Starting live scheduler for today's upcoming news");
        loop {
            let now = Utc::now().with_timezone(&self.zone);
            self.poll_once(now).await;
            sleep(self.poll_interval).await;
        }
    }
}
