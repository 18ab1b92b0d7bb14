//! User profile: weekly routine, work schedule, and timezone.
//!
//! All routine times are local wall-clock times; the profile's IANA timezone
//! resolves them to UTC instants. Sleep spans may cross midnight (e.g. bed at
//! 23:00, wake at 07:00), mirroring how people actually describe their day.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::InvariantError;

/// Day of the week as an exhaustive tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    /// Convert from chrono's weekday.
    pub fn from_weekday(weekday: chrono::Weekday) -> Self {
        match weekday {
            chrono::Weekday::Mon => DayOfWeek::Monday,
            chrono::Weekday::Tue => DayOfWeek::Tuesday,
            chrono::Weekday::Wed => DayOfWeek::Wednesday,
            chrono::Weekday::Thu => DayOfWeek::Thursday,
            chrono::Weekday::Fri => DayOfWeek::Friday,
            chrono::Weekday::Sat => DayOfWeek::Saturday,
            chrono::Weekday::Sun => DayOfWeek::Sunday,
        }
    }

    /// The weekday of a calendar date.
    pub fn of(date: NaiveDate) -> Self {
        Self::from_weekday(date.weekday())
    }
}

impl std::fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
        };
        write!(f, "{name}")
    }
}

/// A local wall-clock span within a day.
///
/// `start` may be later than `end`, in which case the span crosses midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSpan {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl LocalSpan {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Whether the span wraps past midnight into the next day.
    pub fn crosses_midnight(&self) -> bool {
        self.end <= self.start
    }
}

/// A named routine activity (breakfast, lunch, dinner, or custom).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineBlock {
    pub name: String,
    pub span: LocalSpan,
    /// Skipped blocks stay in the routine but reserve no time.
    #[serde(default)]
    pub skip: bool,
}

/// Routine for one weekday.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayRoutine {
    /// Sleep span: `start` is bedtime, `end` is wake time.
    #[serde(default)]
    pub sleep: Option<LocalSpan>,
    #[serde(default)]
    pub activities: Vec<RoutineBlock>,
}

/// The full weekly routine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeekRoutine {
    #[serde(default)]
    pub monday: DayRoutine,
    #[serde(default)]
    pub tuesday: DayRoutine,
    #[serde(default)]
    pub wednesday: DayRoutine,
    #[serde(default)]
    pub thursday: DayRoutine,
    #[serde(default)]
    pub friday: DayRoutine,
    #[serde(default)]
    pub saturday: DayRoutine,
    #[serde(default)]
    pub sunday: DayRoutine,
}

impl WeekRoutine {
    /// The routine for a weekday.
    pub fn day(&self, day: DayOfWeek) -> &DayRoutine {
        match day {
            DayOfWeek::Monday => &self.monday,
            DayOfWeek::Tuesday => &self.tuesday,
            DayOfWeek::Wednesday => &self.wednesday,
            DayOfWeek::Thursday => &self.thursday,
            DayOfWeek::Friday => &self.friday,
            DayOfWeek::Saturday => &self.saturday,
            DayOfWeek::Sunday => &self.sunday,
        }
    }

    /// Mutable access, for building routines programmatically.
    pub fn day_mut(&mut self, day: DayOfWeek) -> &mut DayRoutine {
        match day {
            DayOfWeek::Monday => &mut self.monday,
            DayOfWeek::Tuesday => &mut self.tuesday,
            DayOfWeek::Wednesday => &mut self.wednesday,
            DayOfWeek::Thursday => &mut self.thursday,
            DayOfWeek::Friday => &mut self.friday,
            DayOfWeek::Saturday => &mut self.saturday,
            DayOfWeek::Sunday => &mut self.sunday,
        }
    }

    /// Set the same sleep span on every weekday.
    pub fn with_sleep_all(mut self, span: LocalSpan) -> Self {
        for day in DayOfWeek::ALL {
            self.day_mut(day).sleep = Some(span);
        }
        self
    }
}

/// Declared working days and hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkSchedule {
    pub days: Vec<DayOfWeek>,
    pub span: LocalSpan,
}

impl WorkSchedule {
    pub fn is_work_day(&self, day: DayOfWeek) -> bool {
        self.days.contains(&day)
    }
}

/// A user's profile: routine, work schedule, and timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    /// IANA timezone name (e.g. "America/New_York").
    pub timezone: String,
    #[serde(default)]
    pub routine: WeekRoutine,
    #[serde(default)]
    pub work: Option<WorkSchedule>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>, timezone: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            timezone: timezone.into(),
            routine: WeekRoutine::default(),
            work: None,
        }
    }

    /// Parse the profile's timezone, falling back to UTC if unknown.
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }

    /// Resolve wake and bed instants for a calendar date.
    ///
    /// The wake instant is the sleep span's end on `date`; the bed instant is
    /// the span's start, shifted to the next date when bedtime precedes wake
    /// time on the clock (a midnight-crossing night).
    pub fn day_bounds(
        &self,
        date: NaiveDate,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), InvariantError> {
        let day = DayOfWeek::of(date);
        let sleep = self
            .routine
            .day(day)
            .sleep
            .ok_or_else(|| InvariantError::MissingSleepSpan {
                user_id: self.user_id.clone(),
                day,
            })?;

        let tz = self.tz();
        let wake = local_to_utc(tz, date, sleep.end);
        let bed_date = if sleep.start < sleep.end {
            // Bedtime before wake time on the clock: bed belongs to the next date.
            date + Duration::days(1)
        } else {
            date
        };
        let bed = local_to_utc(tz, bed_date, sleep.start);
        Ok((wake, bed))
    }
}

/// Resolve a local wall-clock time on a date to a UTC instant.
///
/// Ambiguous times (fall-back) take the earlier instant; nonexistent times
/// (spring-forward) shift one hour later.
pub fn local_to_utc(tz: Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(instant) => instant.with_timezone(&Utc),
        LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = naive + Duration::hours(1);
            tz.from_local_datetime(&shifted)
                .earliest()
                .map(|instant| instant.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn day_bounds_midnight_crossing_sleep() {
        let mut profile = UserProfile::new("u1", "UTC");
        profile.routine = WeekRoutine::default().with_sleep_all(LocalSpan::new(t(23, 0), t(7, 0)));

        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(); // a Monday
        let (wake, bed) = profile.day_bounds(date).unwrap();

        assert_eq!(wake, Utc.with_ymd_and_hms(2025, 6, 2, 7, 0, 0).unwrap());
        assert_eq!(bed, Utc.with_ymd_and_hms(2025, 6, 2, 23, 0, 0).unwrap());
    }

    #[test]
    fn day_bounds_bedtime_after_midnight() {
        let mut profile = UserProfile::new("u1", "UTC");
        profile.routine = WeekRoutine::default().with_sleep_all(LocalSpan::new(t(0, 30), t(8, 0)));

        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let (wake, bed) = profile.day_bounds(date).unwrap();

        assert_eq!(wake, Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap());
        // Bed at 00:30 belongs to the following date.
        assert_eq!(bed, Utc.with_ymd_and_hms(2025, 6, 3, 0, 30, 0).unwrap());
    }

    #[test]
    fn day_bounds_missing_sleep_is_invariant_error() {
        let profile = UserProfile::new("u1", "UTC");
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        assert!(matches!(
            profile.day_bounds(date),
            Err(InvariantError::MissingSleepSpan { .. })
        ));
    }

    #[test]
    fn local_to_utc_respects_timezone() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(); // EST, UTC-5
        let instant = local_to_utc(tz, date, t(9, 0));
        assert_eq!(instant, Utc.with_ymd_and_hms(2025, 1, 15, 14, 0, 0).unwrap());
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        let profile = UserProfile::new("u1", "Not/AZone");
        assert_eq!(profile.tz(), chrono_tz::UTC);
    }
}
