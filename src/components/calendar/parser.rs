use super::models::{DayPage, Event, FieldTag, RawCell, RawRow};
use tracing::debug;

/// Build the detail link of an event on a day page
pub fn detail_link(base_url: &str, day_param: &str, event_id: &str) -> String {
    format!("{}?day={}#detail={}", base_url, day_param, event_id)
}

/// Field values collected from one row
#[derive(Debug, Default)]
struct RowFields {
    time: Option<String>,
    impact: Option<String>,
    title: Option<String>,
}

impl RowFields {
    fn collect(cells: &[RawCell]) -> Self {
        let mut fields = Self::default();

        for cell in cells {
            let Some(tag) = FieldTag::from_class_list(&cell.class) else {
                continue;
            };
            match tag {
                FieldTag::Time => {
                    let text = cell.text.trim();
                    if !text.is_empty() {
                        fields.time = Some(text.to_string());
                    }
                }
                FieldTag::Impact => {
                    fields.impact = Some(cell.title.clone().unwrap_or_default());
                }
                FieldTag::Event => fields.title = Some(cell.text.trim().to_string()),
                // The page date comes from the day page, the link from the event id
                FieldTag::Date | FieldTag::Detail => {}
            }
        }

        fields
    }
}

/// Turn the ordered rows of one day page into events.
///
/// Rows without an explicit time inherit the last explicit time seen on the
/// page. Rows without an event cell (date headers, spacers) are dropped.
/// Times are returned as rendered by the source; normalisation happens later.
pub fn parse_day(rows: &[RawRow], page: &DayPage, base_url: &str) -> Vec<Event> {
    let mut events = Vec::new();
    let mut current_time = String::new();

    for row in rows {
        let fields = RowFields::collect(&row.cells);

        if let Some(time) = fields.time {
            current_time = time;
        }

        let Some(title) = fields.title else {
            continue;
        };

        let mut event = Event::new(page, title);
        event.time = current_time.clone();
        event.impact = fields.impact.unwrap_or_default();
        event.event_id = row.event_id.clone().filter(|id| !id.is_empty());
        if let Some(event_id) = &event.event_id {
            event.link = detail_link(base_url, &page.param, event_id);
        }

        debug!("Collected row: {:?}", event);
        events.push(event);
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const BASE: &str = "https://www.forexfactory.com/calendar";

    fn page() -> DayPage {
        DayPage::for_date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
    }

    fn event_row(id: Option<&str>, time: Option<&str>, title: &str) -> RawRow {
        let mut cells = vec![];
        if let Some(time) = time {
            cells.push(RawCell::new("calendar__cell calendar__time", time));
        }
        cells.push(RawCell::new("calendar__cell calendar__currency", "USD"));
        cells.push(
            RawCell::new("calendar__cell calendar__impact", "").with_title("High Impact Expected"),
        );
        cells.push(RawCell::new("calendar__cell calendar__event event", title));
        cells.push(RawCell::new("calendar__cell calendar__detail", ""));
        RawRow::new(id, cells)
    }

    #[test]
    fn test_time_carries_forward() {
        let rows = vec![
            event_row(Some("1"), Some("8:30am"), "Non-Farm Employment Change"),
            event_row(Some("2"), None, "Unemployment Rate"),
            event_row(Some("3"), Some(""), "Average Hourly Earnings m/m"),
            event_row(Some("4"), Some("10:00am"), "ISM Services PMI"),
        ];

        let events = parse_day(&rows, &page(), BASE);

        let times: Vec<&str> = events.iter().map(|e| e.time.as_str()).collect();
        assert_eq!(times, vec!["8:30am", "8:30am", "8:30am", "10:00am"]);
    }

    #[test]
    fn test_sentinel_time_carries_unchanged() {
        let rows = vec![
            event_row(None, Some("Tentative"), "OPEC-JMMC Meetings"),
            event_row(None, None, "French Bank Holiday"),
        ];

        let events = parse_day(&rows, &page(), BASE);
        assert_eq!(events[0].time, "Tentative");
        assert_eq!(events[1].time, "Tentative");
    }

    #[test]
    fn test_link_construction() {
        let rows = vec![
            event_row(Some("123"), Some("8:30am"), "CPI m/m"),
            event_row(None, None, "Bank Holiday"),
        ];

        let events = parse_day(&rows, &page(), BASE);
        assert_eq!(
            events[0].link,
            "https://www.forexfactory.com/calendar?day=jan05.2024#detail=123"
        );
        assert!(events[0].link.ends_with("#detail=123"));
        assert_eq!(events[0].event_id.as_deref(), Some("123"));
        assert!(events[1].link.is_empty());
        assert!(events[1].event_id.is_none());
    }

    #[test]
    fn test_rows_without_event_are_dropped() {
        let header = RawRow::new(
            None,
            vec![RawCell::new("calendar__cell calendar__date", "Fri Jan 5")],
        );
        let spacer = RawRow::new(None, vec![RawCell::new("calendar__spacer", "")]);
        let rows = vec![header, event_row(Some("9"), Some("2:00pm"), "FOMC Member Speaks"), spacer];

        let events = parse_day(&rows, &page(), BASE);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "FOMC Member Speaks");
        assert_eq!(events[0].day, "Fri");
        assert_eq!(events[0].date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(events[0].impact, "High Impact Expected");
    }

    #[test]
    fn test_time_only_row_sets_carried_time() {
        // A time header with no event still feeds later rows
        let rows = vec![
            RawRow::new(None, vec![RawCell::new("calendar__time", "All Day")]),
            event_row(None, None, "Bank Holiday"),
        ];

        let events = parse_day(&rows, &page(), BASE);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].time, "All Day");
    }

    #[test]
    fn test_missing_fields_stay_empty() {
        let rows = vec![RawRow::new(
            Some("5"),
            vec![RawCell::new("calendar__event", "Retail Sales m/m")],
        )];

        let events = parse_day(&rows, &page(), BASE);
        assert_eq!(events[0].time, "");
        assert_eq!(events[0].impact, "");
        assert_eq!(events[0].additional_details, "");
        assert!(events[0].link.ends_with("#detail=5"));
    }

    #[test]
    fn test_empty_page_yields_nothing() {
        assert!(parse_day(&[], &page(), BASE).is_empty());
    }
}
