//! Date literals
//!
//! WIQL date constants are strings. Three round-trip shapes are understood
//! everywhere:
//!
//! - universal: `2020-01-15T08:30:00.000Z`
//! - local: `2020-01-15T08:30:00.000 GMT+01:00`
//! - unspecified: `2020-01-15T08:30:00.000`, read in the configured zone
//!
//! A legacy `-04:00` style suffix is rewritten to `GMT-04:00` first. Anything
//! else is read as a short locale date such as `1/15/2020` (en-US) or
//! `15.01.2020` (de-DE), with an optional `h:mm[:ss] [AM|PM]` time.

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Order of day, month and year in a short locale date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
    MonthDayYear,
    DayMonthYear,
    YearMonthDay,
}

impl DateOrder {
    pub fn for_locale(locale: &str) -> DateOrder {
        let lower = locale.to_ascii_lowercase().replace('_', "-");
        let language = lower.split('-').next().unwrap_or("");
        match (language, lower.as_str()) {
            (_, "en-us") | (_, "en") | (_, "en-ph") => DateOrder::MonthDayYear,
            ("ja", _) | ("zh", _) | ("ko", _) | ("hu", _) | ("lt", _) => DateOrder::YearMonthDay,
            _ => DateOrder::DayMonthYear,
        }
    }
}

/// Whether `locale` looks like a language tag (`en`, `en-US`, `zh_CN`).
pub fn is_valid_locale(locale: &str) -> bool {
    let mut parts = locale.split(['-', '_']);
    let language_ok = parts
        .next()
        .is_some_and(|l| (2..=3).contains(&l.len()) && l.chars().all(|c| c.is_ascii_alphabetic()));
    let rest_ok = parts.all(|p| {
        (2..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric())
    });
    language_ok && rest_ok
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a date literal. `None` when the text is not a date.
pub fn parse_date(text: &str, locale: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(body) = text.strip_suffix('Z').or_else(|| text.strip_suffix('z')) {
        return parse_naive(body).map(|naive| Utc.from_utc_datetime(&naive));
    }

    let text = rewrite_legacy_offset(text);
    if let Some((body, zone)) = text.rsplit_once(" GMT") {
        let offset = parse_offset(zone)?;
        let naive = parse_naive(body.trim())?;
        return offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc));
    }

    let naive = parse_naive(&text).or_else(|| parse_locale_date(&text, DateOrder::for_locale(locale)))?;
    local_to_utc(naive, tz)
}

/// `2020-01-01T00:00:00-04:00` becomes `2020-01-01T00:00:00 GMT-04:00`.
pub fn rewrite_legacy_offset(text: &str) -> String {
    let bytes = text.as_bytes();
    let len = bytes.len();
    if len < 7 || text.contains(" GMT") {
        return text.to_string();
    }
    let tail = &bytes[len - 6..];
    let is_offset = matches!(tail[0], b'+' | b'-')
        && tail[1].is_ascii_digit()
        && tail[2].is_ascii_digit()
        && tail[3] == b':'
        && tail[4].is_ascii_digit()
        && tail[5].is_ascii_digit()
        && bytes[len - 7].is_ascii_digit()
        && text.contains(':')
        && text[..len - 6].contains(':');
    if is_offset {
        format!("{} GMT{}", &text[..len - 6], &text[len - 6..])
    } else {
        text.to_string()
    }
}

fn parse_offset(zone: &str) -> Option<FixedOffset> {
    let zone = zone.trim();
    if zone.is_empty() {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match zone.as_bytes().first()? {
        b'+' => (1, &zone[1..]),
        b'-' => (-1, &zone[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (rest.parse::<i32>().ok()?, 0),
    };
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn parse_naive(text: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_locale_date(text: &str, order: DateOrder) -> Option<NaiveDateTime> {
    let mut words = text.split_whitespace();
    let date_part = words.next()?;
    let time_words: Vec<&str> = words.collect();

    let parts: Vec<&str> = date_part.split(['/', '.', '-']).filter(|p| !p.is_empty()).collect();
    if parts.len() != 3 || parts.iter().any(|p| !p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    let numbers: Vec<u32> = parts.iter().map(|p| p.parse().ok()).collect::<Option<_>>()?;

    let order = if parts[0].len() == 4 {
        DateOrder::YearMonthDay
    } else {
        order
    };
    let (year, month, day) = match order {
        DateOrder::MonthDayYear => (numbers[2], numbers[0], numbers[1]),
        DateOrder::DayMonthYear => (numbers[2], numbers[1], numbers[0]),
        DateOrder::YearMonthDay => (numbers[0], numbers[1], numbers[2]),
    };
    let year = match year {
        0..=49 => 2000 + year,
        50..=99 => 1900 + year,
        _ => year,
    };
    let date = NaiveDate::from_ymd_opt(year as i32, month, day)?;
    let time = parse_time(&time_words)?;
    Some(date.and_time(time))
}

fn parse_time(words: &[&str]) -> Option<NaiveTime> {
    let Some(clock) = words.first() else {
        return NaiveTime::from_hms_opt(0, 0, 0);
    };
    let mut fields = clock.split(':');
    let mut hour: u32 = fields.next()?.parse().ok()?;
    let minute: u32 = fields.next()?.parse().ok()?;
    let second: u32 = match fields.next() {
        Some(s) => s.parse().ok()?,
        None => 0,
    };
    match words.get(1).map(|w| w.to_ascii_uppercase()) {
        Some(ref m) if m == "PM" && hour < 12 => hour += 12,
        Some(ref m) if m == "AM" && hour == 12 => hour = 0,
        Some(ref m) if m != "AM" && m != "PM" => return None,
        _ => {}
    }
    if words.len() > 2 {
        return None;
    }
    NaiveTime::from_hms_opt(hour, minute, second)
}

fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

// ============================================================================
// Formatting and arithmetic
// ============================================================================

/// `yyyy-MM-ddTHH:mm:ss.fffZ`
pub fn format_round_trip_universal(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// `yyyy-MM-ddTHH:mm:ss.fff GMT+hh:mm` in the given zone
pub fn format_round_trip_local(dt: DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz)
        .format("%Y-%m-%dT%H:%M:%S%.3f GMT%:z")
        .to_string()
}

/// Start of the current day in `tz`
pub fn today(tz: Tz) -> DateTime<Utc> {
    start_of_day(Utc::now(), tz)
}

pub fn start_of_day(dt: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let local = dt.with_timezone(&tz).date_naive();
    local
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| local_to_utc(midnight, tz))
        .unwrap_or(dt)
}

/// Whether the instant falls on a local midnight in `tz`
pub fn is_midnight(dt: DateTime<Utc>, tz: Tz) -> bool {
    let local = dt.with_timezone(&tz);
    local.hour() == 0 && local.minute() == 0 && local.second() == 0 && local.nanosecond() == 0
}

/// Move by whole calendar days, keeping the local time of day
pub fn add_days(dt: DateTime<Utc>, days: i64, tz: Tz) -> Option<DateTime<Utc>> {
    let local = dt.with_timezone(&tz).naive_local();
    let shifted = local.checked_add_signed(Duration::try_days(days)?)?;
    local_to_utc(shifted, tz)
}

/// Move by a fractional number of days, rounded to the millisecond
pub fn add_fractional_days(dt: DateTime<Utc>, days: f64) -> Option<DateTime<Utc>> {
    let millis = (days * MILLIS_PER_DAY + 0.5).floor() as i64;
    dt.checked_add_signed(Duration::try_milliseconds(millis)?)
}
