//! In-world time as seen by the decision layer.

use std::time::Duration;

use strum::{Display, EnumIter, EnumString};

use crate::common::Tick;

/// Snapshot of the simulation clock for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Clock {
    pub tick: Tick,
    /// Zero-based in-world day counter.
    pub day: u32,
    /// Fraction of the current day in `[0.0, 1.0)`; 0.0 is midnight.
    pub time_of_day: f32,
    /// Simulated wall time since the world started, in milliseconds.
    pub elapsed_ms: u64,
}

impl Clock {
    /// Days in one season; four seasons per year.
    pub const DAYS_PER_SEASON: u32 = 7;

    pub fn new(tick: Tick, day: u32, time_of_day: f32, elapsed_ms: u64) -> Self {
        Self {
            tick,
            day,
            time_of_day: time_of_day.rem_euclid(1.0),
            elapsed_ms,
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    pub fn season(&self) -> Season {
        Season::from_day(self.day)
    }

    pub fn time_slot(&self) -> TimeSlot {
        TimeSlot::from_day_fraction(self.time_of_day)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(Tick::ZERO, 0, 0.3, 0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn from_day(day: u32) -> Self {
        match (day / Clock::DAYS_PER_SEASON) % 4 {
            0 => Season::Spring,
            1 => Season::Summer,
            2 => Season::Autumn,
            _ => Season::Winter,
        }
    }
}

/// Discrete phase of the day cycle; second dimension of the pattern cache key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TimeSlot {
    Dawn,
    Morning,
    Noon,
    Afternoon,
    Evening,
    Night,
}

impl TimeSlot {
    /// Buckets a day fraction (0.0 = midnight) into a slot.
    pub fn from_day_fraction(fraction: f32) -> Self {
        let f = fraction.rem_euclid(1.0);
        if f < 0.20 {
            TimeSlot::Night
        } else if f < 0.30 {
            TimeSlot::Dawn
        } else if f < 0.45 {
            TimeSlot::Morning
        } else if f < 0.55 {
            TimeSlot::Noon
        } else if f < 0.70 {
            TimeSlot::Afternoon
        } else if f < 0.85 {
            TimeSlot::Evening
        } else {
            TimeSlot::Night
        }
    }

    pub fn is_dark(self) -> bool {
        matches!(self, TimeSlot::Night)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn day_fraction_covers_every_slot() {
        let mut seen: Vec<TimeSlot> = (0..100)
            .map(|i| TimeSlot::from_day_fraction(i as f32 / 100.0))
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen, TimeSlot::iter().collect::<Vec<_>>());
    }

    #[test]
    fn seasons_cycle_yearly() {
        assert_eq!(Season::from_day(0), Season::Spring);
        assert_eq!(Season::from_day(Clock::DAYS_PER_SEASON), Season::Summer);
        assert_eq!(Season::from_day(Clock::DAYS_PER_SEASON * 3), Season::Winter);
        assert_eq!(Season::from_day(Clock::DAYS_PER_SEASON * 4), Season::Spring);
    }

    #[test]
    fn slot_names_parse_back() {
        assert_eq!("Morning".parse::<TimeSlot>().unwrap(), TimeSlot::Morning);
        assert_eq!(TimeSlot::Afternoon.to_string(), "afternoon");
    }
}
