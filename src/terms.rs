use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// School-year quarter. Q1 opens the year in September.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuarterPeriod {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl fmt::Display for QuarterPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Q1 => "Q1",
            Self::Q2 => "Q2",
            Self::Q3 => "Q3",
            Self::Q4 => "Q4",
        };
        f.write_str(label)
    }
}

/// A quarter labelled by the calendar year it starts in, so January and
/// February belong to the previous December's Q2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quarter {
    pub period: QuarterPeriod,
    pub year: i32,
}

impl Quarter {
    pub fn new(period: QuarterPeriod, year: i32) -> Self {
        Self { period, year }
    }

    pub fn of(date: NaiveDate) -> Self {
        let year = date.year();
        match date.month() {
            9..=11 => Self::new(QuarterPeriod::Q1, year),
            12 => Self::new(QuarterPeriod::Q2, year),
            1 | 2 => Self::new(QuarterPeriod::Q2, year - 1),
            3..=5 => Self::new(QuarterPeriod::Q3, year),
            _ => Self::new(QuarterPeriod::Q4, year),
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.period, self.year)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Fall,
    Spring,
    Summer,
}

/// A semester labelled by the calendar year it starts in, so January
/// belongs to the previous year's fall term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Semester {
    pub season: Season,
    pub year: i32,
}

impl Semester {
    pub fn new(season: Season, year: i32) -> Self {
        Self { season, year }
    }

    pub fn of(date: NaiveDate) -> Self {
        let year = date.year();
        match date.month() {
            9..=12 => Self::new(Season::Fall, year),
            1 => Self::new(Season::Fall, year - 1),
            2..=5 => Self::new(Season::Spring, year),
            _ => Self::new(Season::Summer, year),
        }
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.season, self.year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn quarters_wrap_the_new_year() {
        use QuarterPeriod::*;
        assert_eq!(Quarter::of(date(2025, 9, 2)), Quarter::new(Q1, 2025));
        assert_eq!(Quarter::of(date(2025, 12, 15)), Quarter::new(Q2, 2025));
        assert_eq!(Quarter::of(date(2026, 2, 27)), Quarter::new(Q2, 2025));
        assert_eq!(Quarter::of(date(2026, 4, 1)), Quarter::new(Q3, 2026));
        assert_eq!(Quarter::of(date(2026, 7, 4)), Quarter::new(Q4, 2026));
        assert_eq!(Quarter::of(date(2026, 1, 5)).to_string(), "Q2 2025");
    }

    #[test]
    fn same_quarter_in_another_year_differs() {
        assert_ne!(Quarter::of(date(2025, 10, 1)), Quarter::of(date(2026, 10, 1)));
        assert_ne!(Quarter::of(date(2025, 1, 10)), Quarter::of(date(2026, 1, 10)));
    }

    #[test]
    fn january_belongs_to_the_previous_fall() {
        assert_eq!(Semester::of(date(2026, 1, 20)), Semester::new(Season::Fall, 2025));
        assert_eq!(Semester::of(date(2025, 10, 1)).to_string(), "Fall 2025");
        assert_eq!(Semester::of(date(2026, 3, 1)), Semester::new(Season::Spring, 2026));
        assert_eq!(Semester::of(date(2026, 6, 30)), Semester::new(Season::Summer, 2026));
    }
}
