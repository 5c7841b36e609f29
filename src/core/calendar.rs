//! Business-day arithmetic for collection dates.
//!
//! Collections settle through the TARGET system; the rule enforced here is
//! the weekend rule only. National holidays are a bank-side concern.

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// True when the date is neither Saturday nor Sunday.
pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The given date if it is a business day, otherwise the next Monday.
pub fn next_business_day(date: NaiveDate) -> NaiveDate {
    let mut d = date;
    while !is_business_day(d) {
        d = d + Days::new(1);
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekends_are_not_business_days() {
        assert!(is_business_day(date(2026, 3, 2))); // Monday
        assert!(is_business_day(date(2026, 3, 6))); // Friday
        assert!(!is_business_day(date(2026, 3, 7))); // Saturday
        assert!(!is_business_day(date(2026, 3, 8))); // Sunday
    }

    #[test]
    fn rolls_forward_to_monday() {
        assert_eq!(next_business_day(date(2026, 3, 7)), date(2026, 3, 9));
        assert_eq!(next_business_day(date(2026, 3, 8)), date(2026, 3, 9));
        assert_eq!(next_business_day(date(2026, 3, 9)), date(2026, 3, 9));
    }
}
