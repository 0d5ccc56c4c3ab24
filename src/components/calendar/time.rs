use super::models::{is_sentinel_time, DayPage};
use crate::error::{parse_error, AppResult};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use std::str::FromStr;

/// Date format of a day page before normalisation
pub const PAGE_DATE_FORMAT: &str = "%d/%m/%Y";

/// Combined date and clock time as rendered by the calendar, e.g. `15/03/2024 2:00pm`
const SOURCE_DATETIME_FORMAT: &str = "%d/%m/%Y %I:%M%p";

/// Normalized clock time as persisted
pub const CLOCK_FORMAT: &str = "%H:%M";

/// Convert a calendar clock time from `source_zone` to `target_zone`.
///
/// Conversion is best effort: blank input, sentinels, unparsable text and
/// unknown zones all return `time` unchanged so the row can still be stored.
pub fn normalize_time(date: &str, time: &str, source_zone: &str, target_zone: &str) -> String {
    if date.is_empty() || time.is_empty() || is_sentinel_time(time) {
        return time.to_string();
    }

    convert_clock(date, time, source_zone, target_zone).unwrap_or_else(|| time.to_string())
}

fn convert_clock(date: &str, time: &str, source_zone: &str, target_zone: &str) -> Option<String> {
    let from_zone = Tz::from_str(source_zone).ok()?;
    let to_zone = Tz::from_str(target_zone).ok()?;

    let combined = format!("{} {}", date, time.trim());
    let naive = NaiveDateTime::parse_from_str(&combined, SOURCE_DATETIME_FORMAT).ok()?;
    // Ambiguous wall times during a DST fold resolve to the earlier instant
    let localized = from_zone.from_local_datetime(&naive).earliest()?;

    Some(localized.with_timezone(&to_zone).format(CLOCK_FORMAT).to_string())
}

/// Parse time string in HH:MM format
pub fn parse_time(time_str: &str) -> Option<(u32, u32)> {
    let parts: Vec<&str> = time_str.trim().split(':').collect();
    if parts.len() != 2 {
        return None;
    }
    let hour = parts[0].parse::<u32>().ok()?;
    let minute = parts[1].parse::<u32>().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

/// Absolute instant of a persisted `date` + `HH:MM` in the target zone
pub fn scheduled_instant(date: NaiveDate, time: &str, zone: &Tz) -> Option<DateTime<Tz>> {
    let (hour, minute) = parse_time(time)?;
    let naive = date.and_time(NaiveTime::from_hms_opt(hour, minute, 0)?);
    zone.from_local_datetime(&naive).earliest()
}

impl DayPage {
    /// Describe the calendar page for `date`
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date,
            param: date.format("%b%d.%Y").to_string().to_lowercase(),
            weekday: date.format("%a").to_string(),
        }
    }

    /// Page `offset` days after `start`
    pub fn with_offset(start: NaiveDate, offset: u32) -> Option<Self> {
        start
            .checked_add_signed(Duration::days(i64::from(offset)))
            .map(Self::for_date)
    }

    /// Recover the page from a day parameter such as `jan05.2024`
    pub fn parse(param: &str) -> AppResult<Self> {
        let invalid = || parse_error(&format!("Invalid day parameter: {}", param));

        let (month_day, year) = param.rsplit_once('.').ok_or_else(invalid)?;
        if month_day.len() < 4 || !month_day.is_char_boundary(3) {
            return Err(invalid());
        }
        let (month, day) = month_day.split_at(3);

        let month = month_from_abbrev(month).ok_or_else(invalid)?;
        let day = day.parse::<u32>().map_err(|_| invalid())?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;

        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self::for_date)
            .ok_or_else(invalid)
    }

    /// Page date in the `dd/mm/YYYY` form the normalizer expects
    pub fn page_date(&self) -> String {
        self.date.format(PAGE_DATE_FORMAT).to_string()
    }
}

fn month_from_abbrev(abbrev: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lowered = abbrev.to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lowered)
        .map(|index| index as u32 + 1)
}

/// Current date in `zone`
pub fn today_in(zone: &Tz, now: DateTime<chrono::Utc>) -> NaiveDate {
    now.with_timezone(zone).date_naive()
}
