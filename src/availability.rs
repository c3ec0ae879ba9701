//! Slot conflict detection.
//!
//! Intervals are half-open `[start, start + duration)` in minutes since
//! midnight, so an appointment ending at 11:00 never blocks one starting at
//! 11:00.

use crate::types::{Appointment, TimeOfDay};
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Duration applied by callers while no service is selected yet.
pub const DEFAULT_DURATION_MINUTES: i32 = 30;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidDurationError {
    #[error("Duration must be positive, got {0} minutes")]
    NonPositiveDuration(i32),

    #[error("Start time must lie within a day (0..=1439 minutes), got {0}")]
    StartOutOfRange(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotAvailability {
    pub time: TimeOfDay,
    pub available: bool,
}

/// Rejects a malformed candidate before any appointment is looked at.
pub fn validate(start_minutes: i32, duration_minutes: i32) -> Result<(), InvalidDurationError> {
    if duration_minutes <= 0 {
        return Err(InvalidDurationError::NonPositiveDuration(duration_minutes));
    }
    if !(0..TimeOfDay::MINUTES_PER_DAY).contains(&start_minutes) {
        return Err(InvalidDurationError::StartOutOfRange(start_minutes));
    }
    Ok(())
}

fn overlaps(a_start: i32, a_end: i32, b_start: i32, b_end: i32) -> bool {
    a_start < b_end && b_start < a_end
}

/// Returns the first appointment of `staff_id` on `date` that still holds its
/// slot and overlaps the candidate interval.
pub fn conflicting_appointment<'a>(
    staff_id: Uuid,
    date: NaiveDate,
    start_minutes: i32,
    duration_minutes: i32,
    same_day: &'a [Appointment],
) -> Result<Option<&'a Appointment>, InvalidDurationError> {
    validate(start_minutes, duration_minutes)?;
    let end_minutes = start_minutes + duration_minutes;

    Ok(same_day
        .iter()
        .filter(|appointment| appointment.staff_id == staff_id && appointment.date == date)
        .filter(|appointment| appointment.status.holds_slot())
        .find(|appointment| {
            overlaps(
                start_minutes,
                end_minutes,
                appointment.start_minutes(),
                appointment.end_minutes(),
            )
        }))
}

pub fn is_slot_available(
    staff_id: Uuid,
    date: NaiveDate,
    start_minutes: i32,
    duration_minutes: i32,
    same_day: &[Appointment],
) -> Result<bool, InvalidDurationError> {
    conflicting_appointment(staff_id, date, start_minutes, duration_minutes, same_day)
        .map(|conflict| conflict.is_none())
}

/// Start times from `first` to `last` inclusive, `step_minutes` apart.
pub fn slot_menu(first: TimeOfDay, last: TimeOfDay, step_minutes: i32) -> Vec<TimeOfDay> {
    if step_minutes <= 0 {
        return vec![first];
    }
    (first.minutes()..=last.minutes())
        .step_by(step_minutes as usize)
        .filter_map(TimeOfDay::from_minutes)
        .collect()
}

pub fn menu_availability(
    staff_id: Uuid,
    date: NaiveDate,
    duration_minutes: i32,
    menu: &[TimeOfDay],
    same_day: &[Appointment],
) -> Result<Vec<SlotAvailability>, InvalidDurationError> {
    menu.iter()
        .map(|&time| {
            is_slot_available(staff_id, date, time.minutes(), duration_minutes, same_day)
                .map(|available| SlotAvailability { time, available })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::status::AppointmentStatus;
    use test_case::test_case;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 2).unwrap()
    }

    fn appointment(staff_id: Uuid, time: &str, duration: i32, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            staff_id,
            service_id: Uuid::new_v4(),
            date: date(),
            time: time.parse().unwrap(),
            duration_minutes: duration,
            status,
            notes: None,
        }
    }

    fn minutes(time: &str) -> i32 {
        time.parse::<TimeOfDay>().unwrap().minutes()
    }

    #[test_case("10:30", 30, false; "starts inside existing")]
    #[test_case("09:30", 60, false; "ends inside existing")]
    #[test_case("09:00", 180, false; "encloses existing")]
    #[test_case("10:15", 15, false; "enclosed by existing")]
    #[test_case("10:00", 60, false; "identical interval")]
    #[test_case("11:00", 30, true; "starts when existing ends")]
    #[test_case("09:00", 60, true; "ends when existing starts")]
    #[test_case("13:00", 45, true; "later in the day")]
    fn candidate_against_ten_o_clock_hour(start: &str, duration: i32, expected: bool) {
        let staff = Uuid::new_v4();
        let existing = vec![appointment(staff, "10:00", 60, AppointmentStatus::Scheduled)];

        let available = is_slot_available(staff, date(), minutes(start), duration, &existing).unwrap();
        assert_eq!(available, expected);
    }

    #[test]
    fn other_staff_never_conflicts() {
        let staff_1 = Uuid::new_v4();
        let staff_2 = Uuid::new_v4();
        let existing = vec![appointment(staff_1, "10:00", 60, AppointmentStatus::Scheduled)];

        assert!(is_slot_available(staff_2, date(), minutes("10:00"), 60, &existing).unwrap());
    }

    #[test]
    fn cancelled_appointment_frees_slot() {
        let staff = Uuid::new_v4();
        let existing = vec![appointment(staff, "10:00", 60, AppointmentStatus::Cancelled)];

        assert!(is_slot_available(staff, date(), minutes("10:00"), 60, &existing).unwrap());
    }

    #[test]
    fn completed_appointment_keeps_slot() {
        let staff = Uuid::new_v4();
        let existing = vec![appointment(staff, "10:00", 60, AppointmentStatus::Completed)];

        assert!(!is_slot_available(staff, date(), minutes("10:30"), 15, &existing).unwrap());
    }

    #[test]
    fn other_date_never_conflicts() {
        let staff = Uuid::new_v4();
        let mut existing = appointment(staff, "10:00", 60, AppointmentStatus::Scheduled);
        existing.date = date().succ_opt().unwrap();

        assert!(is_slot_available(staff, date(), minutes("10:00"), 60, &[existing]).unwrap());
    }

    #[test]
    fn empty_day_is_available() {
        assert!(is_slot_available(Uuid::new_v4(), date(), 0, 1439, &[]).unwrap());
    }

    #[test_case(0)]
    #[test_case(-15)]
    fn non_positive_duration_is_rejected(duration: i32) {
        let err = is_slot_available(Uuid::new_v4(), date(), 600, duration, &[]).unwrap_err();
        assert_eq!(err, InvalidDurationError::NonPositiveDuration(duration));
    }

    #[test]
    fn invalid_duration_wins_over_conflict() {
        let staff = Uuid::new_v4();
        let existing = vec![appointment(staff, "10:00", 60, AppointmentStatus::Scheduled)];

        let err = is_slot_available(staff, date(), minutes("10:00"), 0, &existing).unwrap_err();
        assert_eq!(err, InvalidDurationError::NonPositiveDuration(0));
    }

    #[test_case(-1)]
    #[test_case(1440)]
    fn start_outside_day_is_rejected(start: i32) {
        let err = is_slot_available(Uuid::new_v4(), date(), start, 30, &[]).unwrap_err();
        assert_eq!(err, InvalidDurationError::StartOutOfRange(start));
    }

    #[test]
    fn reports_conflicting_appointment() {
        let staff = Uuid::new_v4();
        let blocking = appointment(staff, "14:00", 45, AppointmentStatus::Scheduled);
        let existing = vec![
            appointment(staff, "14:00", 45, AppointmentStatus::Cancelled),
            blocking.clone(),
        ];

        let conflict = conflicting_appointment(staff, date(), minutes("14:30"), 30, &existing).unwrap();
        assert_eq!(conflict.map(|appointment| appointment.id), Some(blocking.id));
    }

    #[test]
    fn default_menu_has_nineteen_slots() {
        let menu = slot_menu("09:00".parse().unwrap(), "18:00".parse().unwrap(), 30);
        assert_eq!(menu.len(), 19);
        assert_eq!(menu[0].to_string(), "09:00");
        assert_eq!(menu[1].to_string(), "09:30");
        assert_eq!(menu[18].to_string(), "18:00");
    }

    #[test]
    fn menu_availability_marks_blocked_slots() {
        let staff = Uuid::new_v4();
        let existing = vec![appointment(staff, "10:00", 60, AppointmentStatus::Scheduled)];
        let menu = slot_menu("09:00".parse().unwrap(), "11:00".parse().unwrap(), 30);

        let slots = menu_availability(staff, date(), DEFAULT_DURATION_MINUTES, &menu, &existing).unwrap();
        let available: Vec<bool> = slots.iter().map(|slot| slot.available).collect();
        assert_eq!(available, vec![true, true, false, false, true]);
    }
}
