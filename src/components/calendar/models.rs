use chrono::NaiveDate;
use chrono_tz::Tz;
use lazy_static::lazy_static;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Time values that are not clock times and bypass timezone arithmetic
pub const SENTINEL_TIMES: [&str; 2] = ["all day", "tentative"];

/// Check whether a time value is one of the sentinels, ignoring case
pub fn is_sentinel_time(time: &str) -> bool {
    let lowered = time.trim().to_lowercase();
    SENTINEL_TIMES.contains(&lowered.as_str())
}

/// Fields a calendar cell can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldTag {
    Date,
    Time,
    Impact,
    Event,
    Detail,
}

lazy_static! {
    /// Source cell classes mapped to the field they hold
    static ref FIELD_TAGS: HashMap<&'static str, FieldTag> = {
        let mut tags = HashMap::new();
        tags.insert("calendar__date", FieldTag::Date);
        tags.insert("calendar__time", FieldTag::Time);
        tags.insert("calendar__impact", FieldTag::Impact);
        tags.insert("calendar__event", FieldTag::Event);
        tags.insert("calendar__detail", FieldTag::Detail);
        tags
    };
}

impl FieldTag {
    /// Resolve a whitespace separated class list; the first recognized class wins
    pub fn from_class_list(classes: &str) -> Option<Self> {
        classes
            .split_whitespace()
            .find_map(|class| FIELD_TAGS.get(class).copied())
    }
}

/// One `<td>` of a calendar row as read from the source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCell {
    /// Raw class attribute
    pub class: String,
    /// Visible text, trimmed
    pub text: String,
    /// `title` attribute of the first inner span, used by the impact icon
    pub title: Option<String>,
}

impl RawCell {
    pub fn new(class: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            text: text.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// One `<tr>` of a day page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub cells: Vec<RawCell>,
    /// Page-local event identifier, not unique across days
    pub event_id: Option<String>,
}

impl RawRow {
    pub fn new(event_id: Option<&str>, cells: Vec<RawCell>) -> Self {
        Self {
            cells,
            event_id: event_id.map(str::to_string),
        }
    }
}

/// One calendar entry, in the shape of a persisted row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    /// Datastore-assigned id, absent before insertion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub day: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub time: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub impact: String,
    #[serde(rename = "event", default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub link: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub additional_details: String,
    /// Page-local identifier, only meaningful within the page it came from
    #[serde(skip)]
    pub event_id: Option<String>,
}

impl Event {
    /// Create an event for the given day page with every text field empty
    pub fn new(page: &DayPage, title: impl Into<String>) -> Self {
        Self {
            id: None,
            date: page.date,
            day: page.weekday.clone(),
            time: String::new(),
            impact: String::new(),
            title: title.into(),
            link: String::new(),
            additional_details: String::new(),
            event_id: None,
        }
    }

    /// Whether the time is a clock time rather than a sentinel or blank
    pub fn has_clock_time(&self) -> bool {
        !self.time.trim().is_empty() && !is_sentinel_time(&self.time)
    }

    pub fn detail_target(&self) -> DetailTarget<'_> {
        DetailTarget {
            event_id: self.event_id.as_deref(),
            link: &self.link,
        }
    }
}

/// Nullable text columns come back as `null`; treat them as empty
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Day page of the calendar source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayPage {
    pub date: NaiveDate,
    /// Source-specific query parameter, e.g. `jan05.2024`
    pub param: String,
    /// Short weekday label, e.g. `Fri`
    pub weekday: String,
}

/// What a detail source needs to locate the expanded text of one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailTarget<'a> {
    pub event_id: Option<&'a str>,
    pub link: &'a str,
}

/// A persisted event due for deferred enrichment at `trigger_at`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub id: i64,
    pub trigger_at: chrono::DateTime<Tz>,
    pub link: String,
}

impl ScheduleEntry {
    pub fn detail_target(&self) -> DetailTarget<'_> {
        DetailTarget {
            event_id: None,
            link: &self.link,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_detection() {
        assert!(is_sentinel_time("All Day"));
        assert!(is_sentinel_time("TENTATIVE"));
        assert!(is_sentinel_time(" tentative "));
        assert!(!is_sentinel_time("2:00pm"));
        assert!(!is_sentinel_time(""));
    }

    #[test]
    fn test_field_tag_lookup() {
        assert_eq!(
            FieldTag::from_class_list("calendar__cell calendar__time time"),
            Some(FieldTag::Time)
        );
        assert_eq!(
            FieldTag::from_class_list("calendar__event calendar__detail"),
            Some(FieldTag::Event)
        );
        assert_eq!(FieldTag::from_class_list("calendar__currency"), None);
        assert_eq!(FieldTag::from_class_list(""), None);
    }

    #[test]
    fn test_event_serializes_as_persisted_row() {
        let page = DayPage {
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            param: "jan05.2024".to_string(),
            weekday: "Fri".to_string(),
        };
        let mut event = Event::new(&page, "Non-Farm Employment Change");
        event.event_id = Some("123".to_string());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["date"], "2024-01-05");
        assert_eq!(json["event"], "Non-Farm Employment Change");
        assert_eq!(json["additional_details"], "");
        assert!(json.get("id").is_none());
        assert!(json.get("event_id").is_none());
    }

    #[test]
    fn test_event_deserializes_with_missing_columns() {
        let event: Event = serde_json::from_str(
            r#"{"id": 7, "date": "2024-01-05", "time": "13:30", "event": "CPI m/m", "link": null}"#,
        )
        .unwrap();

        assert_eq!(event.id, Some(7));
        assert_eq!(event.title, "CPI m/m");
        assert!(event.link.is_empty());
        assert!(event.has_clock_time());
    }
}
