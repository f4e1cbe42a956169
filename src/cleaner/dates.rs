//! Day-first date parsing and calendar field derivation
//! Derived columns: day, month, year, day_name, month_name, quarter

use crate::types::{CellValue, Column, Table};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Columns added by [`enrich_date_column`], in the order they are appended
pub const DERIVED_COLUMNS: [&str; 6] = ["day", "month", "year", "day_name", "month_name", "quarter"];

/// 9999-12-31 in the 1900 date system
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Hour, minute, optional seconds with fraction, optional AM/PM
const TIME_OF_DAY: &str = r"[T ]+(\d{1,2}):(\d{2})(?::(\d{2})(?:[.,](\d{1,9}))?)?(?:\s*([AaPp])\.?[Mm]\.?)?";

struct Patterns {
    year_first: Regex,
    day_first: Regex,
    day_month_name: Regex,
    month_name_day: Regex,
    compact: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        // 2024-04-03, 2024/04/03 10:15, 2024-04-03T10:15:30.123Z, 2024-04-03 10:15:30+02:00
        year_first: Regex::new(&format!(
            r"^(\d{{4}})[-/.](\d{{1,2}})[-/.](\d{{1,2}})(?:{}\s*(Z|z|[+-]\d{{2}}(?::?\d{{2}})?)?)?$",
            TIME_OF_DAY
        ))
        .expect("year-first date pattern"),
        // 03/04/2024, 3-4-24, 03.04.2024 08:30, 03/04/2024 8:30 PM
        day_first: Regex::new(&format!(
            r"^(\d{{1,2}})[-/.](\d{{1,2}})[-/.](\d{{4}}|\d{{2}})(?:{})?$",
            TIME_OF_DAY
        ))
        .expect("day-first date pattern"),
        // 3 April 2024, 03-Apr-2024, 3rd Apr, 2024
        day_month_name: Regex::new(
            r"^(\d{1,2})(?:st|nd|rd|th)?[-\s]+([A-Za-z]{3,9})\.?,?[-\s]+(\d{4}|\d{2})$",
        )
        .expect("day-month-name date pattern"),
        // April 3, 2024
        month_name_day: Regex::new(
            r"^([A-Za-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})$",
        )
        .expect("month-name-day date pattern"),
        // 20240403 (date IDs)
        compact: Regex::new(r"^(\d{4})(\d{2})(\d{2})$").expect("compact date pattern"),
    })
}

/// Calendar attributes of one parsed date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarFields {
    pub day: u32,
    pub month: u32,
    pub year: i32,
    pub day_name: String,
    pub month_name: String,
    pub quarter: u32,
}

impl CalendarFields {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            day: date.day(),
            month: date.month(),
            year: date.year(),
            day_name: date.format("%A").to_string(),
            month_name: date.format("%B").to_string(),
            quarter: (date.month() - 1) / 3 + 1,
        }
    }
}

/// Interpret a cell as a timestamp, reading ambiguous numeric dates day-first.
///
/// Returns `None` for anything that is not a recognisable date.
pub fn parse_day_first(value: &CellValue) -> Option<NaiveDateTime> {
    match value {
        CellValue::Date(d) => Some(d.and_time(NaiveTime::MIN)),
        CellValue::DateTime(dt) => Some(*dt),
        CellValue::Text(s) => parse_day_first_str(s),
        CellValue::Int(i) => from_number(*i as f64),
        CellValue::Float(f) => from_number(*f),
        CellValue::Bool(_) | CellValue::Null => None,
    }
}

/// Parse date text. Year-first ISO forms are honoured as written; everything
/// else with numeric day and month is read day first, falling back to month
/// first only when the day-first reading is not a valid date.
pub fn parse_day_first_str(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let p = patterns();

    if let Some(c) = p.year_first.captures(text) {
        let date = NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?)?;
        return with_time(date, &c, 4);
    }

    if let Some(c) = p.day_first.captures(text) {
        let first: u32 = c[1].parse().ok()?;
        let second: u32 = c[2].parse().ok()?;
        let year = expand_year(&c[3])?;
        let date = NaiveDate::from_ymd_opt(year, second, first)
            .or_else(|| NaiveDate::from_ymd_opt(year, first, second))?;
        return with_time(date, &c, 4);
    }

    if let Some(c) = p.day_month_name.captures(text) {
        let month = month_from_name(&c[2])?;
        let date = NaiveDate::from_ymd_opt(expand_year(&c[3])?, month, c[1].parse().ok()?)?;
        return Some(date.and_time(NaiveTime::MIN));
    }

    if let Some(c) = p.month_name_day.captures(text) {
        let month = month_from_name(&c[1])?;
        let date = NaiveDate::from_ymd_opt(c[3].parse().ok()?, month, c[2].parse().ok()?)?;
        return Some(date.and_time(NaiveTime::MIN));
    }

    if let Some(c) = p.compact.captures(text) {
        let date = NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?)?;
        return Some(date.and_time(NaiveTime::MIN));
    }

    None
}

/// Convert an Excel serial day number (1900 date system) to a timestamp
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !(1.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let days = serial.trunc() as i64;
    // Excel counts a 29 Feb 1900 that never existed
    let base = match days {
        60 => return None,
        d if d < 60 => NaiveDate::from_ymd_opt(1899, 12, 31)?,
        _ => NaiveDate::from_ymd_opt(1899, 12, 30)?,
    };
    let date = base.checked_add_signed(Duration::days(days))?;
    let seconds = (serial.fract() * 86_400.0).round() as i64;
    date.and_time(NaiveTime::MIN)
        .checked_add_signed(Duration::seconds(seconds))
}

fn from_number(n: f64) -> Option<NaiveDateTime> {
    if n.fract() == 0.0 && (10_000_101.0..=99_991_231.0).contains(&n) {
        if let Some(dt) = parse_day_first_str(&format!("{}", n as i64)) {
            return Some(dt);
        }
    }
    excel_serial_to_datetime(n)
}

/// Attach the optional time captured from `first_group` onwards: hour, minute,
/// seconds, fraction, meridiem and, for year-first text, a UTC offset.
/// Offset timestamps are normalised to UTC.
fn with_time(date: NaiveDate, c: &Captures<'_>, first_group: usize) -> Option<NaiveDateTime> {
    let Some(hour) = c.get(first_group) else {
        return Some(date.and_time(NaiveTime::MIN));
    };
    let mut hour: u32 = hour.as_str().parse().ok()?;
    let minute = c.get(first_group + 1)?.as_str().parse().ok()?;
    let second = match c.get(first_group + 2) {
        Some(s) => s.as_str().parse().ok()?,
        None => 0,
    };
    let nanos = match c.get(first_group + 3) {
        Some(f) => format!("{:0<9}", f.as_str()).parse().ok()?,
        None => 0,
    };
    if let Some(meridiem) = c.get(first_group + 4) {
        if !(1..=12).contains(&hour) {
            return None;
        }
        let pm = meridiem.as_str().eq_ignore_ascii_case("p");
        hour = match (hour, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
    }

    let local = date.and_time(NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)?);
    match c.get(first_group + 5) {
        Some(offset) => local.checked_sub_signed(Duration::seconds(offset_seconds(offset.as_str())?)),
        None => Some(local),
    }
}

/// `Z`, `+02`, `+0200` or `-05:30` as seconds east of UTC
fn offset_seconds(text: &str) -> Option<i64> {
    if text.eq_ignore_ascii_case("z") {
        return Some(0);
    }
    let sign = if text.starts_with('-') { -1 } else { 1 };
    let digits: String = text[1..].chars().filter(|ch| *ch != ':').collect();
    let hours: i64 = digits.get(..2)?.parse().ok()?;
    let minutes: i64 = match digits.get(2..) {
        Some("") | None => 0,
        Some(m) => m.parse().ok()?,
    };
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(sign * (hours * 3600 + minutes * 60))
}

/// Two-digit years pivot at 69: 00-68 → 20xx, 69-99 → 19xx
fn expand_year(text: &str) -> Option<i32> {
    let year: i32 = text.parse().ok()?;
    Some(match (text.len(), year) {
        (2, y) if y < 69 => 2000 + y,
        (2, y) => 1900 + y,
        (_, y) => y,
    })
}

fn month_from_name(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    if name.len() < 3 {
        return None;
    }
    MONTH_NAMES
        .iter()
        .position(|m| m.starts_with(&name))
        .map(|idx| idx as u32 + 1)
}

/// Replace the column at `index` with parsed dates and append the derived
/// calendar columns. Rows that fail to parse get nulls in every derived column.
///
/// Returns the number of rows that could not be parsed.
pub fn enrich_date_column(table: &mut Table, index: usize) -> usize {
    let parsed: Vec<Option<NaiveDateTime>> = table.columns[index]
        .values
        .iter()
        .map(parse_day_first)
        .collect();
    let fields: Vec<Option<CalendarFields>> = parsed
        .iter()
        .map(|p| p.map(|dt| CalendarFields::from_date(dt.date())))
        .collect();
    let unparsed = parsed.iter().filter(|p| p.is_none()).count();

    table.columns[index].values = parsed
        .iter()
        .map(|p| match p {
            Some(dt) if dt.time() == NaiveTime::MIN => CellValue::Date(dt.date()),
            Some(dt) => CellValue::DateTime(*dt),
            None => CellValue::Null,
        })
        .collect();

    table.add_column(Column::new("day", derived(&fields, |c| CellValue::Int(i64::from(c.day)))));
    table.add_column(Column::new("month", derived(&fields, |c| CellValue::Int(i64::from(c.month)))));
    table.add_column(Column::new("year", derived(&fields, |c| CellValue::Int(i64::from(c.year)))));
    table.add_column(Column::new("day_name", derived(&fields, |c| CellValue::Text(c.day_name.clone()))));
    table.add_column(Column::new("month_name", derived(&fields, |c| CellValue::Text(c.month_name.clone()))));
    table.add_column(Column::new("quarter", derived(&fields, |c| CellValue::Int(i64::from(c.quarter)))));

    unparsed
}

fn derived(
    fields: &[Option<CalendarFields>],
    f: impl Fn(&CalendarFields) -> CellValue,
) -> Vec<CellValue> {
    fields
        .iter()
        .map(|cal| cal.as_ref().map_or(CellValue::Null, &f))
        .collect()
}
