use chrono::{Datelike, NaiveDate, Weekday};

/// Number of days between `today` and the future date a phrase names.
///
/// Understands `tomorrow`, `in N days`, weekday names (optionally prefixed
/// with `next`) and ISO dates. Returns `None` for anything that is not
/// strictly in the future.
pub fn days_ahead(phrase: &str, today: NaiveDate) -> Option<i64> {
    let phrase = phrase.trim().to_lowercase();

    if phrase == "tomorrow" {
        return Some(1);
    }

    if let Some(rest) = phrase.strip_prefix("in ") {
        let count = rest
            .strip_suffix(" days")
            .or_else(|| rest.strip_suffix(" day"))?;
        return count.trim().parse::<i64>().ok().filter(|d| *d > 0);
    }

    let (explicit_next, name) = match phrase.strip_prefix("next ") {
        Some(name) => (true, name.trim()),
        None => (false, phrase.as_str()),
    };
    if let Ok(weekday) = name.parse::<Weekday>() {
        let from = i64::from(today.weekday().num_days_from_monday());
        let to = i64::from(weekday.num_days_from_monday());
        let diff = (to - from).rem_euclid(7);
        return match (diff, explicit_next) {
            (0, true) => Some(7),
            (0, false) => None,
            (d, _) => Some(d),
        };
    }

    NaiveDate::parse_from_str(&phrase, "%Y-%m-%d")
        .ok()
        .map(|date| (date - today).num_days())
        .filter(|d| *d > 0)
}

/// Format a date as `Thursday, June 26th`
pub fn ordinal_date(date: NaiveDate) -> String {
    let day = date.day();
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{day}{suffix}", date.format("%A, %B "))
}

#[cfg(test)]
mod tests {
    use super::*;

    // A Wednesday
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 25).unwrap()
    }

    #[test]
    fn test_relative_phrases() {
        assert_eq!(days_ahead("tomorrow", today()), Some(1));
        assert_eq!(days_ahead("  Tomorrow ", today()), Some(1));
        assert_eq!(days_ahead("in 3 days", today()), Some(3));
        assert_eq!(days_ahead("in 1 day", today()), Some(1));
        assert_eq!(days_ahead("in 0 days", today()), None);
        assert_eq!(days_ahead("in a few days", today()), None);
    }

    #[test]
    fn test_weekdays() {
        assert_eq!(days_ahead("friday", today()), Some(2));
        assert_eq!(days_ahead("next Monday", today()), Some(5));
        assert_eq!(days_ahead("wednesday", today()), None);
        assert_eq!(days_ahead("next wednesday", today()), Some(7));
    }

    #[test]
    fn test_iso_dates() {
        assert_eq!(days_ahead("2025-07-01", today()), Some(6));
        assert_eq!(days_ahead("2025-06-25", today()), None);
        assert_eq!(days_ahead("2025-06-01", today()), None);
    }

    #[test]
    fn test_rejected_phrases() {
        assert_eq!(days_ahead("today", today()), None);
        assert_eq!(days_ahead("yesterday", today()), None);
        assert_eq!(days_ahead("someday", today()), None);
    }

    #[test]
    fn test_ordinal_date() {
        assert_eq!(ordinal_date(today()), "Wednesday, June 25th");
        assert_eq!(
            ordinal_date(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()),
            "Tuesday, July 1st"
        );
        assert_eq!(
            ordinal_date(NaiveDate::from_ymd_opt(2025, 7, 12).unwrap()),
            "Saturday, July 12th"
        );
        assert_eq!(
            ordinal_date(NaiveDate::from_ymd_opt(2025, 7, 22).unwrap()),
            "Tuesday, July 22nd"
        );
    }
}
