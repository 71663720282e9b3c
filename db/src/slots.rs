//! Wall-clock interval helpers shared by the scheduler and the importer.
//!
//! All arithmetic is done in minutes since midnight. Intervals are half-open:
//! a class ending at 10:30 does not collide with one starting at 10:30.

use chrono::{NaiveTime, Timelike};

/// Legacy discrete slot labels for courses with 2 or fewer credit hours.
pub const SLOTS_TWO_OR_LESS: [&str; 6] = [
    "07:30-09:15",
    "09:15-11:00",
    "11:00-13:15",
    "13:15-15:00",
    "15:00-16:45",
    "16:45-18:00",
];

/// Legacy discrete slot labels for courses with 3 or more credit hours.
pub const SLOTS_THREE_OR_MORE: [&str; 4] = [
    "07:30-10:10",
    "10:15-13:30",
    "13:30-16:00",
    "16:00-18:30",
];

pub fn minutes_of(t: NaiveTime) -> i64 {
    i64::from(t.hour()) * 60 + i64::from(t.minute())
}

/// Duration between two wall-clock times in minutes.
///
/// When `end <= start` the interval is treated as crossing midnight and
/// 24 hours are added. Validators reject wrap-around separately; this
/// keeps the raw arithmetic total.
pub fn duration_minutes(start: NaiveTime, end: NaiveTime) -> i64 {
    let mut end_min = minutes_of(end);
    let start_min = minutes_of(start);
    if end_min <= start_min {
        end_min += 24 * 60;
    }
    end_min - start_min
}

/// Half-open overlap test for two same-day intervals.
///
/// Back-to-back intervals (one ending exactly when the other starts) do not
/// overlap, so 08:00-10:30 followed by 10:30-12:00 is a legal pairing.
pub fn overlaps(a_start: NaiveTime, a_end: NaiveTime, b_start: NaiveTime, b_end: NaiveTime) -> bool {
    a_start < b_end && b_start < a_end
}

pub fn format_time_range(start: NaiveTime, end: NaiveTime) -> String {
    format!("{}-{}", start.format("%H:%M"), end.format("%H:%M"))
}

/// Derives the legacy slot label for a start/end pair.
///
/// Returns the formatted label only when it matches one of the fixed
/// predefined slots; arbitrary ranges stay unlabelled. Best-effort shim for
/// data written before flexible start/end times existed.
pub fn derive_time_slot(start: NaiveTime, end: NaiveTime) -> Option<&'static str> {
    let label = format_time_range(start, end);
    SLOTS_TWO_OR_LESS
        .iter()
        .chain(SLOTS_THREE_OR_MORE.iter())
        .find(|slot| **slot == label)
        .copied()
}
