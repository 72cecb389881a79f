//! Regional public-holiday calendar used for the `is_public_holiday` feature.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Public-holiday lookup by calendar date
pub trait HolidayCalendar: Send + Sync {
    fn is_holiday(&self, date: NaiveDate) -> bool;
}

/// Alberta (Canada) statutory holidays.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlbertaCalendar;

impl AlbertaCalendar {
    /// All holidays of a year, observed days included, in calendar order
    pub fn holidays(&self, year: i32) -> Vec<NaiveDate> {
        let mut days = Vec::with_capacity(14);

        let fixed = |month: u32, day: u32| NaiveDate::from_ymd_opt(year, month, day);
        let nth = |month: u32, weekday: Weekday, n: u8| {
            NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
        };

        // New Year's Day, Canada Day and Christmas move to Monday when on a weekend
        for (month, day) in [(1, 1), (7, 1), (12, 25)] {
            if let Some(date) = fixed(month, day) {
                days.push(date);
                days.extend(observed_monday(date));
            }
        }

        if year >= 1990 {
            days.extend(nth(2, Weekday::Mon, 3)); // Family Day
        }
        if let Some(easter) = easter_sunday(year) {
            days.push(easter - Duration::days(2)); // Good Friday
        }
        days.extend(victoria_day(year));
        if year >= 1974 {
            days.extend(nth(8, Weekday::Mon, 1)); // Heritage Day
        }
        days.extend(nth(9, Weekday::Mon, 1)); // Labour Day
        days.extend(nth(10, Weekday::Mon, 2)); // Thanksgiving
        days.extend(fixed(11, 11)); // Remembrance Day

        days.sort();
        days.dedup();
        days
    }
}

impl HolidayCalendar for AlbertaCalendar {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays(date.year()).contains(&date)
    }
}

fn observed_monday(date: NaiveDate) -> Option<NaiveDate> {
    match date.weekday() {
        Weekday::Sat => Some(date + Duration::days(2)),
        Weekday::Sun => Some(date + Duration::days(1)),
        _ => None,
    }
}

/// Monday on or before May 24
fn victoria_day(year: i32) -> Option<NaiveDate> {
    let may_24 = NaiveDate::from_ymd_opt(year, 5, 24)?;
    let back = may_24.weekday().num_days_from_monday() as i64;
    Some(may_24 - Duration::days(back))
}

/// Gregorian Easter Sunday (anonymous Gregorian algorithm)
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[rstest]
    #[case(2024, d(2024, 3, 31))]
    #[case(2025, d(2025, 4, 20))]
    #[case(2019, d(2019, 4, 21))]
    #[case(2000, d(2000, 4, 23))]
    fn test_easter(#[case] year: i32, #[case] expected: NaiveDate) {
        assert_eq!(easter_sunday(year), Some(expected));
    }

    #[test]
    fn test_alberta_2024() {
        let expected = vec![
            d(2024, 1, 1),   // New Year's Day
            d(2024, 2, 19),  // Family Day
            d(2024, 3, 29),  // Good Friday
            d(2024, 5, 20),  // Victoria Day
            d(2024, 7, 1),   // Canada Day
            d(2024, 8, 5),   // Heritage Day
            d(2024, 9, 2),   // Labour Day
            d(2024, 10, 14), // Thanksgiving
            d(2024, 11, 11), // Remembrance Day
            d(2024, 12, 25), // Christmas Day
        ];
        assert_eq!(AlbertaCalendar.holidays(2024), expected);
    }

    #[rstest]
    #[case(d(2025, 2, 17), true)]
    #[case(d(2025, 4, 18), true)]
    #[case(d(2025, 5, 19), true)]
    #[case(d(2025, 5, 26), false)]
    #[case(d(2025, 12, 26), false)]
    #[case(d(2025, 6, 15), false)]
    fn test_alberta_2025(#[case] date: NaiveDate, #[case] holiday: bool) {
        assert_eq!(AlbertaCalendar.is_holiday(date), holiday);
    }

    #[test]
    fn test_weekend_holidays_observed_on_monday() {
        // Canada Day 2023 was a Saturday, Christmas 2022 a Sunday
        assert!(AlbertaCalendar.is_holiday(d(2023, 7, 3)));
        assert!(AlbertaCalendar.is_holiday(d(2022, 12, 26)));
        // Victoria Day when May 24 itself is a Monday
        assert!(AlbertaCalendar.is_holiday(d(2021, 5, 24)));
    }
}
