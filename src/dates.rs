//!
//! Date handling: scheduled tags, the natural-date grammar used when
//! deferring items, and the midnight render alarm.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};

use crate::error::ParseError;

/// Scheduled tags start with `$` followed by an ISO date.
pub fn is_scheduled(tag: &str) -> bool {
    tag.starts_with('$')
}

/// The date carried by a scheduled tag.
pub fn parse_scheduled(tag: &str) -> Result<NaiveDate, ParseError> {
    let date = tag
        .strip_prefix('$')
        .ok_or_else(|| ParseError::ScheduledTag(tag.to_string()))?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| ParseError::ScheduledTag(tag.to_string()))
}

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("mon", Weekday::Mon),
    ("tue", Weekday::Tue),
    ("wed", Weekday::Wed),
    ("thu", Weekday::Thu),
    ("fri", Weekday::Fri),
    ("sat", Weekday::Sat),
    ("sun", Weekday::Sun),
];

/// Parse a natural due date relative to `today`.
///
/// Grammar: `in <n><unit>` with unit `d`, `w`, `m` (30 days) or `y`
/// (365 days); `on <weekday>` for the next such day; `on <month> <day>`
/// for the next time that calendar date lies in the future.
pub fn parse_natural_date(input: &str, today: NaiveDate) -> Result<NaiveDate, ParseError> {
    let mut words = input.split_whitespace();
    match words.next() {
        Some("in") => {
            let spec = words.next().ok_or(ParseError::Date)?;
            let unit = spec.chars().last().ok_or(ParseError::Date)?;
            let amount: i64 = spec[..spec.len() - unit.len_utf8()]
                .parse()
                .map_err(|_| ParseError::Date)?;
            let days = match unit {
                'd' => amount,
                'w' => amount * 7,
                'm' => amount * 30,
                'y' => amount * 365,
                _ => return Err(ParseError::Date),
            };
            Ok(today + Duration::days(days))
        }
        Some("on") => {
            let spec = words.next().ok_or(ParseError::Date)?;
            if let Some((_, weekday)) = WEEKDAYS.iter().find(|(name, _)| *name == spec) {
                let mut date = today + Duration::days(1);
                while date.weekday() != *weekday {
                    date += Duration::days(1);
                }
                Ok(date)
            } else if let Some(month) = MONTHS.iter().position(|name| *name == spec) {
                let month = month as u32 + 1;
                let day: u32 = words
                    .next()
                    .ok_or(ParseError::Date)?
                    .parse()
                    .map_err(|_| ParseError::Date)?;
                let this_year =
                    NaiveDate::from_ymd_opt(today.year(), month, day).ok_or(ParseError::Date)?;
                if this_year > today {
                    Ok(this_year)
                } else {
                    NaiveDate::from_ymd_opt(today.year() + 1, month, day).ok_or(ParseError::Date)
                }
            } else {
                Err(ParseError::Date)
            }
        }
        _ => Err(ParseError::Date),
    }
}

/// Time left until five past midnight of the next day, when displays
/// keyed on "today" must re-render.
pub fn delta_to_midnight(now: NaiveDateTime) -> Duration {
    (now.date() + Duration::days(1))
        .and_hms_opt(0, 5, 0)
        .map(|next| next - now)
        .unwrap_or_else(|| Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_scheduled_tags() {
        assert!(is_scheduled("$2016-01-01"));
        assert!(!is_scheduled("todo"));
        assert_eq!(parse_scheduled("$2016-01-01").unwrap(), date(2016, 1, 1));
        assert!(parse_scheduled("$2016-13-01").is_err());
        assert!(parse_scheduled("2016-01-01").is_err());
    }

    #[test]
    fn test_natural_date_relative() {
        let today = date(2015, 12, 3);
        assert_eq!(parse_natural_date("in 3d", today).unwrap(), date(2015, 12, 6));
        assert_eq!(parse_natural_date("in 2w", today).unwrap(), date(2015, 12, 17));
        assert_eq!(parse_natural_date("in 1m", today).unwrap(), date(2016, 1, 2));
        assert_eq!(parse_natural_date("in 1y", today).unwrap(), date(2016, 12, 2));
    }

    #[test]
    fn test_natural_date_weekday() {
        // 2015-12-03 was a Thursday
        let today = date(2015, 12, 3);
        assert_eq!(parse_natural_date("on fri", today).unwrap(), date(2015, 12, 4));
        assert_eq!(parse_natural_date("on mon", today).unwrap(), date(2015, 12, 7));
        // the same weekday means a full week out, never today
        assert_eq!(parse_natural_date("on thu", today).unwrap(), date(2015, 12, 10));
    }

    #[test]
    fn test_natural_date_month_day() {
        let today = date(2015, 12, 3);
        assert_eq!(
            parse_natural_date("on dec 24", today).unwrap(),
            date(2015, 12, 24)
        );
        // dates not in the future roll over to next year
        assert_eq!(
            parse_natural_date("on dec 3", today).unwrap(),
            date(2016, 12, 3)
        );
        assert_eq!(
            parse_natural_date("on jan 15", today).unwrap(),
            date(2016, 1, 15)
        );
        // every month name parses, including the pair adjacent in the table
        assert_eq!(
            parse_natural_date("on jun 1", today).unwrap(),
            date(2016, 6, 1)
        );
        assert_eq!(
            parse_natural_date("on jul 1", today).unwrap(),
            date(2016, 7, 1)
        );
    }

    #[test]
    fn test_natural_date_rejects_garbage() {
        let today = date(2015, 12, 3);
        for input in ["", "tomorrow", "in", "in x", "in 3", "on", "on foo", "on dec", "on feb 30"] {
            assert!(parse_natural_date(input, today).is_err(), "{:?}", input);
        }
    }

    #[test]
    fn test_delta_to_midnight() {
        let now = date(2016, 1, 31).and_hms_micro_opt(16, 48, 1, 49_929).unwrap();
        let expected = date(2016, 2, 1).and_hms_opt(0, 5, 0).unwrap() - now;
        assert_eq!(delta_to_midnight(now), expected);

        let now = date(2016, 1, 31).and_hms_opt(0, 0, 0).unwrap();
        let expected = date(2016, 2, 1).and_hms_opt(0, 5, 0).unwrap() - now;
        assert_eq!(delta_to_midnight(now), expected);

        let now = date(2016, 1, 31).and_hms_opt(0, 2, 56).unwrap();
        let expected = date(2016, 2, 1).and_hms_opt(0, 5, 0).unwrap() - now;
        assert_eq!(delta_to_midnight(now), expected);
    }
}
