//! Recognition of dates, ISO weeks and months in text.
//!
//! Used to turn strings like `2017-03-27`, `2017-W13` or `wk1713.1` into a
//! [`DateRange`] covering the named period.

use std::sync::OnceLock;

use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use regex::Regex;

use crate::error::ParseError;

/// Regex matching a date, week or month at the start of a string.
///
/// The named group `date` holds the match; the date must not be followed by
/// a word character or `-`.
pub fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            ^(?P<date>
                \d{4}-\d{2}-\d{2}                   # day
              | \d{4}-?[Ww]\d{2}(?:-\d)?            # week, optional weekday
              | \d{4}-\d{2}                         # month
              | (?:W|Wk|wk)\d{4}(?:[-.]\d)?         # short week form
            )
            (?:[^\w-]|$)",
        )
        .expect("valid date regex")
    })
}

/// Return the date, week or month at the start of `text`, if any.
pub fn match_date(text: &str) -> Option<&str> {
    date_re()
        .captures(text)
        .and_then(|caps| caps.name("date"))
        .map(|m| m.as_str())
}

/// A single calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Day(pub NaiveDate);

impl Day {
    /// Day for a year, month and day; `None` if the date does not exist.
    pub fn new(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Day)
    }

    /// Day for an ISO year, week number and weekday.
    ///
    /// Weekday 1 is Monday and 7 is Sunday; 0 is the Sunday before the week,
    /// so `(2017, 13, 7)` equals `(2017, 14, 0)`.
    pub fn new_from_weeknumber(year: i32, week: u32, weekday: u32) -> Option<Self> {
        let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
        Some(Day(monday + Duration::days(i64::from(weekday) - 1)))
    }

    /// ISO week format, e.g. `2017-W13-1`.
    pub fn weekformat(&self) -> String {
        let iso = self.0.iso_week();
        format!(
            "{}-W{:02}-{}",
            iso.year(),
            iso.week(),
            self.0.weekday().number_from_monday()
        )
    }
}

/// Period named by a date string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    /// A single day.
    Day(Day),
    /// An ISO week (Monday to Sunday).
    Week {
        /// ISO year.
        year: i32,
        /// ISO week number.
        week: u32,
    },
    /// A calendar month.
    Month {
        /// Year.
        year: i32,
        /// Month number, 1 to 12.
        month: u32,
    },
}

impl DateRange {
    /// First day of the period.
    pub fn first_day(&self) -> Option<NaiveDate> {
        match *self {
            DateRange::Day(day) => Some(day.0),
            DateRange::Week { year, week } => NaiveDate::from_isoywd_opt(year, week, Weekday::Mon),
            DateRange::Month { year, month } => NaiveDate::from_ymd_opt(year, month, 1),
        }
    }

    /// Last day of the period.
    pub fn last_day(&self) -> Option<NaiveDate> {
        match *self {
            DateRange::Day(day) => Some(day.0),
            DateRange::Week { year, week } => NaiveDate::from_isoywd_opt(year, week, Weekday::Sun),
            DateRange::Month { year, month } => {
                let (y, m) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
                NaiveDate::from_ymd_opt(y, m, 1).and_then(|d| d.pred_opt())
            }
        }
    }

    /// Returns `true` if `date` falls inside the period.
    pub fn contains(&self, date: NaiveDate) -> bool {
        match (self.first_day(), self.last_day()) {
            (Some(first), Some(last)) => first <= date && date <= last,
            _ => false,
        }
    }
}

fn parse_number<T: std::str::FromStr>(text: &str, s: &str) -> Result<T, ParseError> {
    s.parse()
        .map_err(|_| ParseError::InvalidDate(text.to_string()))
}

/// Parse a string matched by [`date_re`].
pub fn parse_date(text: &str) -> Result<DateRange, ParseError> {
    let invalid = || ParseError::InvalidDate(text.to_string());
    let date = match_date(text).ok_or_else(invalid)?;

    // Short week forms: W1713, Wk1713.1, wk1713-1
    if let Some(rest) = date
        .strip_prefix("Wk")
        .or_else(|| date.strip_prefix("wk"))
        .or_else(|| date.strip_prefix('W'))
    {
        let year = 2000 + parse_number::<i32>(text, &rest[..2])?;
        let week = parse_number::<u32>(text, &rest[2..4])?;
        return week_range(text, year, week, rest.get(5..));
    }

    if let Some(pos) = date.find(['W', 'w']) {
        let year = parse_number::<i32>(text, &date[..4])?;
        let week = parse_number::<u32>(text, &date[pos + 1..pos + 3])?;
        return week_range(text, year, week, date.get(pos + 4..));
    }

    let parts: Vec<&str> = date.split('-').collect();
    match parts.as_slice() {
        [y, m, d] => {
            let day = Day::new(
                parse_number(text, y)?,
                parse_number(text, m)?,
                parse_number(text, d)?,
            )
            .ok_or_else(invalid)?;
            Ok(DateRange::Day(day))
        }
        [y, m] => {
            let year = parse_number(text, y)?;
            let month: u32 = parse_number(text, m)?;
            if !(1..=12).contains(&month) {
                return Err(invalid());
            }
            Ok(DateRange::Month { year, month })
        }
        _ => Err(invalid()),
    }
}

fn week_range(
    text: &str,
    year: i32,
    week: u32,
    weekday: Option<&str>,
) -> Result<DateRange, ParseError> {
    match weekday {
        Some(wd) => {
            let weekday = parse_number::<u32>(text, wd)?;
            Day::new_from_weeknumber(year, week, weekday)
                .map(DateRange::Day)
                .ok_or_else(|| ParseError::InvalidDate(text.to_string()))
        }
        None => {
            NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
                .ok_or_else(|| ParseError::InvalidDate(text.to_string()))?;
            Ok(DateRange::Week { year, week })
        }
    }
}

fn old_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(\d{1,4})[/:\-](\d{1,2})(?:[/:\-](\d{1,4}))?\s*$")
            .expect("valid date regex")
    })
}

/// Parse loosely formatted dates: `d/m`, `d/m/yy`, `d/m/yyyy` and `yyyy/m/d`,
/// with `/`, `-` or `:` as separator.
///
/// A bare `d/m` gets the year that puts it closest to today: a month more
/// than half a year back is taken to be next year.
pub fn old_parse_date(text: &str) -> Option<(i32, u32, u32)> {
    let caps = old_date_re().captures(text)?;
    let first = &caps[1];
    let second: u32 = caps[2].parse().ok()?;
    let third = caps.get(3).map(|m| m.as_str());

    let (year, month, day) = match third {
        Some(third) if first.len() == 4 => (first.parse().ok()?, second, third.parse().ok()?),
        Some(third) => {
            let year: i32 = third.parse().ok()?;
            let year = match third.len() {
                1 | 2 if year > 50 => 1900 + year,
                1 | 2 => 2000 + year,
                _ => year,
            };
            (year, second, first.parse().ok()?)
        }
        None => {
            let today = Local::now().date_naive();
            let mut year = today.year();
            if second + 6 <= today.month() {
                year += 1;
            }
            (year, second, first.parse().ok()?)
        }
    };

    NaiveDate::from_ymd_opt(year, month, day)?;
    Some((year, month, day))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2017-03-27")]
    #[case("2017-03")]
    #[case("2017-W13")]
    #[case("2017-W13-1")]
    #[case("2017W13")]
    #[case("2017W13-1")]
    #[case("2017w13")]
    #[case("2017w13-1")]
    #[case("W1713")]
    #[case("W1713-1")]
    #[case("W1713.1")]
    #[case("Wk1713")]
    #[case("Wk1713-1")]
    #[case("Wk1713.1")]
    #[case("wk1713")]
    #[case("wk1713-1")]
    #[case("wk1713.1")]
    fn test_parse_date(#[case] text: &str) {
        let date = NaiveDate::from_ymd_opt(2017, 3, 27).unwrap();
        assert_eq!(match_date(text), Some(text));
        let range = parse_date(text).unwrap();
        assert!(range.contains(date), "{text} does not contain {date}");
    }

    #[rstest]
    #[case("foo")]
    #[case("123foo")]
    #[case("2017-03-270")]
    #[case("20170317")]
    #[case("17-03-27")]
    #[case("17-0317W")]
    #[case("2017W131")]
    #[case("2017-W131")]
    fn test_no_date(#[case] text: &str) {
        assert_eq!(match_date(text), None);
    }

    #[test]
    fn test_week_number() {
        assert_eq!(Day::new(2017, 3, 27), Day::new_from_weeknumber(2017, 13, 1));
        assert_eq!(Day::new(2017, 3, 27).unwrap().weekformat(), "2017-W13-1");
        assert_eq!(
            Day::new_from_weeknumber(2017, 13, 7),
            Day::new_from_weeknumber(2017, 14, 0)
        );
    }

    #[test]
    fn test_old_parse_date() {
        let today = Local::now().date_naive();
        let mut year = today.year();
        if today.month() > 6 {
            year += 1;
        }
        assert_eq!(old_parse_date("1/1"), Some((year, 1, 1)));
        assert_eq!(old_parse_date("1-1"), Some((year, 1, 1)));
        assert_eq!(old_parse_date("1:1"), Some((year, 1, 1)));
        assert_eq!(old_parse_date("11/11/99"), Some((1999, 11, 11)));
        assert_eq!(old_parse_date("11/11/11"), Some((2011, 11, 11)));
        assert_eq!(old_parse_date("1/11/2001"), Some((2001, 11, 1)));
        assert_eq!(old_parse_date("1-11-2001"), Some((2001, 11, 1)));
        assert_eq!(old_parse_date("1:11:2001"), Some((2001, 11, 1)));
        assert_eq!(old_parse_date("2001/11/1"), Some((2001, 11, 1)));
    }
}
