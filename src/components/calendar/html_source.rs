use super::models::{DayPage, RawCell, RawRow};
use super::source::{CalendarSource, DaySession};
use crate::config::Config;
use crate::error::{enrichment_error, parse_error, source_error, AppResult};
use async_trait::async_trait;
use chrono_tz::Tz;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info};
use url::Url;

const TABLE_SELECTOR: &str = "table.calendar__table";
const EXPANDED_ROW_CLASS: &str = "calendar__row--expanded";
/// Elements a page uses to declare the zone its clock times are rendered in
const TIMEZONE_SELECTOR: &str = r#"[data-timezone], meta[name="timezone"]"#;

/// Everything a session needs from one fetched page, extracted up front
#[derive(Debug, Default, Clone)]
pub struct PageSnapshot {
    /// `None` when the calendar table is missing from the page
    pub rows: Option<Vec<RawRow>>,
    /// Expanded detail text keyed by the page-local event id it belongs to
    pub details: HashMap<String, String>,
    /// Expanded detail text no event claims, in document order
    pub unowned_details: Vec<String>,
    /// Zone declared by the page itself, when it declares a known one
    pub timezone: Option<String>,
}

impl PageSnapshot {
    /// Detail text for `event_id`.
    ///
    /// Falls back to the first unowned expanded row, never to a row that
    /// belongs to another event.
    pub fn detail_for(&self, event_id: Option<&str>) -> Option<&String> {
        event_id
            .and_then(|id| self.details.get(id))
            .or_else(|| self.unowned_details.first())
    }

    fn record_detail(&mut self, owner: Option<String>, text: String) {
        match owner {
            Some(owner) => {
                self.details.entry(owner).or_insert(text);
            }
            None => self.unowned_details.push(text),
        }
    }
}

fn selector(css: &str) -> AppResult<Selector> {
    Selector::parse(css).map_err(|e| source_error(&format!("Invalid selector {}: {}", css, e)))
}

/// Visible text of an element, one trimmed chunk per text node
fn visible_text(element: &ElementRef<'_>, separator: &str) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

fn has_class(element: &ElementRef<'_>, class: &str) -> bool {
    element
        .value()
        .attr("class")
        .map(|classes| classes.split_whitespace().any(|c| c == class))
        .unwrap_or(false)
}

fn event_id_of(element: &ElementRef<'_>) -> Option<String> {
    element
        .value()
        .attr("data-event-id")
        .map(str::to_string)
        .filter(|id| !id.is_empty())
}

/// First zone name the page declares that resolves to a known zone
fn declared_timezone(document: &Html) -> AppResult<Option<String>> {
    let timezone_selector = selector(TIMEZONE_SELECTOR)?;

    let declared = document
        .select(&timezone_selector)
        .filter_map(|element| {
            let value = element.value();
            value.attr("data-timezone").or_else(|| value.attr("content"))
        })
        .map(str::trim)
        .find(|name| {
            let known = Tz::from_str(name).is_ok();
            if !known {
                debug!("Ignoring unknown page timezone {}", name);
            }
            known
        })
        .map(str::to_string);

    Ok(declared)
}

/// Read the calendar table of a page into raw rows and expanded details
pub fn parse_page(body: &str) -> AppResult<PageSnapshot> {
    let document = Html::parse_document(body);
    let table_selector = selector(TABLE_SELECTOR)?;
    let row_selector = selector("tr")?;
    let cell_selector = selector("td")?;
    let span_selector = selector("span")?;

    let mut snapshot = PageSnapshot {
        timezone: declared_timezone(&document)?,
        ..PageSnapshot::default()
    };

    if let Some(table) = document.select(&table_selector).next() {
        let mut rows = Vec::new();
        let mut last_event_id: Option<String> = None;

        for row in table.select(&row_selector) {
            let event_id = event_id_of(&row);

            if has_class(&row, EXPANDED_ROW_CLASS) {
                let owner = event_id.or_else(|| last_event_id.clone());
                snapshot.record_detail(owner, visible_text(&row, "\n"));
                continue;
            }

            let cells = row
                .select(&cell_selector)
                .map(|cell| RawCell {
                    class: cell.value().attr("class").unwrap_or_default().to_string(),
                    text: visible_text(&cell, " "),
                    title: cell
                        .select(&span_selector)
                        .next()
                        .and_then(|span| span.value().attr("title"))
                        .map(str::to_string),
                })
                .collect();

            if event_id.is_some() {
                last_event_id = event_id.clone();
            }
            rows.push(RawRow { cells, event_id });
        }

        snapshot.rows = Some(rows);
    } else {
        // Detail pages may render the expanded row outside the main table
        for row in document.select(&row_selector) {
            if has_class(&row, EXPANDED_ROW_CLASS) {
                snapshot.record_detail(event_id_of(&row), visible_text(&row, "\n"));
            }
        }
    }

    Ok(snapshot)
}

/// Day page and event id named by a detail link such as
/// `https://www.forexfactory.com/calendar?day=jan05.2024#detail=123`
fn detail_request(link: &str) -> AppResult<(DayPage, Option<String>)> {
    let url = Url::parse(link)
        .map_err(|e| enrichment_error(&format!("Invalid detail link {}: {}", link, e)))?;

    let day = url
        .query_pairs()
        .find(|(key, _)| key == "day")
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| parse_error(&format!("Detail link has no day parameter: {}", link)))?;
    let page = DayPage::parse(&day)?;

    let event_id = url
        .fragment()
        .and_then(|fragment| fragment.strip_prefix("detail="))
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    Ok((page, event_id))
}

/// Calendar source reading the server-rendered calendar page over HTTP
pub struct HtmlCalendarSource {
    client: Client,
    base_url: String,
    source_timezone: String,
}

impl HtmlCalendarSource {
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| source_error(&format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.calendar_url.clone(),
            source_timezone: config.source_timezone.clone(),
        })
    }

    fn day_url(&self, page: &DayPage) -> AppResult<Url> {
        Url::parse_with_params(&self.base_url, &[("day", page.param.as_str())])
            .map_err(|e| source_error(&format!("Failed to parse URL: {}", e)))
    }

    /// Zone of a fetched page: the one it declares, else the configured one
    fn session_timezone(&self, snapshot: &PageSnapshot) -> String {
        match &snapshot.timezone {
            Some(declared) => {
                if declared != &self.source_timezone {
                    info!(
                        "Page renders times in {} instead of {}",
                        declared, self.source_timezone
                    );
                }
                declared.clone()
            }
            None => self.source_timezone.clone(),
        }
    }

    async fn fetch_page(&self, url: Url) -> AppResult<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| source_error(&format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(source_error(&format!("Failed to fetch {}: HTTP {}", url, status)));
        }

        response
            .text()
            .await
            .map_err(|e| source_error(&format!("Failed to read {}: {}", url, e)))
    }
}

#[async_trait]
impl CalendarSource for HtmlCalendarSource {
    async fn open_day(&self, page: &DayPage) -> AppResult<Box<dyn DaySession>> {
        let url = self.day_url(page)?;
        info!("Opening calendar page {}", url);

        let body = self.fetch_page(url).await?;
        let snapshot = parse_page(&body)?;
        let source_timezone = self.session_timezone(&snapshot);

        Ok(Box::new(HtmlDaySession {
            snapshot,
            source_timezone,
        }))
    }

    async fn fetch_detail(&self, link: &str) -> AppResult<String> {
        let (page, event_id) = detail_request(link)?;
        let url = self.day_url(&page)?;
        debug!("Fetching details of {} from {}", link, url);

        let body = self.fetch_page(url).await?;
        let snapshot = parse_page(&body)?;

        snapshot
            .detail_for(event_id.as_deref())
            .cloned()
            .ok_or_else(|| enrichment_error(&format!("No expanded detail on {}", link)))
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Session over an already fetched day page
pub struct HtmlDaySession {
    snapshot: PageSnapshot,
    source_timezone: String,
}

#[async_trait]
impl DaySession for HtmlDaySession {
    fn source_timezone(&self) -> &str {
        &self.source_timezone
    }

    fn rows(&self) -> AppResult<Vec<RawRow>> {
        let rows = self
            .snapshot
            .rows
            .clone()
            .ok_or_else(|| source_error("Calendar table not found"))?;
        debug!("Number of rows found: {}", rows.len());
        Ok(rows)
    }

    async fn expand_detail(&mut self, event_id: &str) -> AppResult<String> {
        self.snapshot
            .details
            .get(event_id)
            .cloned()
            .ok_or_else(|| enrichment_error(&format!("No expanded row for event {}", event_id)))
    }
}
