//! Event calendar: which ISO weeks are open and how far Christmas is.

use chrono::{Datelike, NaiveDate};

use crate::config::SeasonConfig;
use crate::error::{ClaimError, ClaimResult};

pub fn christmas(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 12, 25)
}

/// Days from `today` until Christmas of `year`; negative once it has passed.
pub fn days_until_christmas(year: i32, today: NaiveDate) -> i64 {
    christmas(year)
        .map(|xmas| (xmas - today).num_days())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Season {
    config: SeasonConfig,
}

impl Season {
    pub fn new(config: SeasonConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> SeasonConfig {
        self.config
    }

    pub fn days_until_christmas(&self, today: NaiveDate) -> i64 {
        days_until_christmas(self.config.year, today)
    }

    /// Days until next year's Christmas, for the end-of-event countdown.
    pub fn days_until_next_christmas(&self, today: NaiveDate) -> i64 {
        days_until_christmas(self.config.year + 1, today)
    }

    /// Zero-based event week, saturating at zero before the start week.
    pub fn week_offset(&self, today: NaiveDate) -> usize {
        let week = today.iso_week().week();
        week.saturating_sub(self.config.start_week) as usize
    }

    /// Open when the ISO year is the season year, the ISO week falls inside
    /// `[start_week, end_week]` and Christmas has not passed.
    pub fn check_open(&self, today: NaiveDate) -> ClaimResult<usize> {
        let iso = today.iso_week();
        if iso.year() < self.config.year {
            return Err(ClaimError::EventNotStarted);
        }
        if iso.year() > self.config.year || self.days_until_christmas(today) < 0 {
            return Err(ClaimError::EventEnded);
        }
        if iso.week() < self.config.start_week {
            return Err(ClaimError::EventNotStarted);
        }
        if iso.week() > self.config.end_week {
            return Err(ClaimError::EventEnded);
        }
        Ok(self.week_offset(today))
    }

    pub fn is_open(&self, today: NaiveDate) -> bool {
        self.check_open(today).is_ok()
    }
}
