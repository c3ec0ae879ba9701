//! Appointment booking on top of an injected [`SalonBackend`].
//!
//! Every check-then-write sequence runs under a lock scoped to one staff
//! member and date, so concurrent requests for overlapping slots can't both
//! be persisted by this process. Changes to an existing appointment hold the
//! lock of the slot it currently occupies, and an edit that moves it to
//! another staff member or date holds the target's lock as well.

use crate::{
    availability::{self, InvalidDurationError, SlotAvailability},
    backend::SalonBackend,
    status::{AppointmentStatus, InvalidTransitionError},
    types::{Appointment, TimeOfDay},
};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Customer,
    Staff,
    Service,
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Customer => "customer",
            Self::Staff => "staff",
            Self::Service => "service",
        })
    }
}

#[derive(Error, Debug)]
pub enum BookingError {
    #[error(transparent)]
    InvalidDuration(#[from] InvalidDurationError),

    #[error("No {0} selected, complete all required fields")]
    MissingReference(Reference),

    #[error("Time unavailable, overlaps appointment {conflicting_id}")]
    SlotConflict { conflicting_id: Uuid },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransitionError),

    #[error("Appointment not found: {id}")]
    NotFound { id: Uuid },

    #[error("Backend error: {message}")]
    Backend { message: String },
}

impl From<String> for BookingError {
    fn from(message: String) -> Self {
        Self::Backend { message }
    }
}

/// A booking as entered in the form. References stay optional until resolved.
#[derive(Debug, Clone)]
pub struct AppointmentDraft {
    pub customer_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: TimeOfDay,
    pub notes: Option<String>,
}

/// Field edits for an existing appointment; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct AppointmentChanges {
    pub customer_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub time: Option<TimeOfDay>,
    pub notes: Option<String>,
}

type SlotKey = (Uuid, NaiveDate);

fn slot_of(appointment: &Appointment) -> SlotKey {
    (appointment.staff_id, appointment.date)
}

/// Entries only live while a request holds or waits for them.
#[derive(Debug, Clone, Default)]
struct ReservationLocks(Arc<Mutex<HashMap<SlotKey, Arc<Mutex<()>>>>>);

impl ReservationLocks {
    fn table(&self) -> MutexGuard<'_, HashMap<SlotKey, Arc<Mutex<()>>>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `work` with all `slots` locked. Locks are taken in key order.
    fn hold<R>(&self, slots: &[SlotKey], work: impl FnOnce() -> R) -> R {
        let mut slots = slots.to_vec();
        slots.sort_unstable();
        slots.dedup();

        let locks: Vec<Arc<Mutex<()>>> = {
            let mut table = self.table();
            slots
                .iter()
                .map(|slot| table.entry(*slot).or_default().clone())
                .collect()
        };
        let guards: Vec<MutexGuard<'_, ()>> = locks
            .iter()
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner))
            .collect();
        let result = work();
        drop(guards);
        drop(locks);

        let mut table = self.table();
        for slot in &slots {
            if table.get(slot).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                table.remove(slot);
            }
        }
        result
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table().len()
    }
}

#[derive(Debug, Clone)]
pub struct BookingService<T> {
    backend: T,
    reservations: ReservationLocks,
}

fn non_empty(notes: Option<String>) -> Option<String> {
    notes.filter(|notes| !notes.trim().is_empty())
}

fn resolve<R>(
    id: Option<Uuid>,
    reference: Reference,
    lookup: impl FnOnce(Uuid) -> Result<Option<R>, String>,
) -> Result<R, BookingError> {
    let Some(id) = id else {
        warn!(%reference, "Reference not provided");
        return Err(BookingError::MissingReference(reference));
    };
    lookup(id)?.ok_or_else(|| {
        warn!(%reference, %id, "Reference does not resolve");
        BookingError::MissingReference(reference)
    })
}

fn ensure_free(
    staff_id: Uuid,
    date: NaiveDate,
    time: TimeOfDay,
    duration_minutes: i32,
    same_day: &[Appointment],
) -> Result<(), BookingError> {
    match availability::conflicting_appointment(staff_id, date, time.minutes(), duration_minutes, same_day)? {
        Some(conflict) => {
            warn!(%staff_id, %date, %time, conflicting_id = %conflict.id, "Slot is taken");
            Err(BookingError::SlotConflict {
                conflicting_id: conflict.id,
            })
        }
        None => Ok(()),
    }
}

impl<T: SalonBackend> BookingService<T> {
    pub fn new(backend: T) -> Self {
        Self {
            backend,
            reservations: ReservationLocks::default(),
        }
    }

    pub fn backend(&self) -> &T {
        &self.backend
    }

    fn existing(&self, id: Uuid) -> Result<Appointment, BookingError> {
        self.backend
            .appointment(id)?
            .ok_or(BookingError::NotFound { id })
    }

    /// Runs `work` on a fresh copy of appointment `id` while its current slot
    /// and `target` are locked. Starts over when a concurrent edit moved the
    /// appointment before the locks were taken.
    fn with_appointment_held<R>(
        &self,
        id: Uuid,
        target: impl Fn(&Appointment) -> SlotKey,
        mut work: impl FnMut(Appointment) -> Result<R, BookingError>,
    ) -> Result<R, BookingError> {
        loop {
            let seen = self.existing(id)?;
            let held = slot_of(&seen);
            let outcome = self.reservations.hold(&[held, target(&seen)], || -> Result<Option<R>, BookingError> {
                let current = self.existing(id)?;
                if slot_of(&current) != held {
                    return Ok(None);
                }
                work(current).map(Some)
            })?;
            match outcome {
                Some(result) => return Ok(result),
                None => debug!(%id, "Appointment moved while waiting for its slot"),
            }
        }
    }

    pub fn book(&self, draft: AppointmentDraft) -> Result<Appointment, BookingError> {
        let customer = resolve(draft.customer_id, Reference::Customer, |id| self.backend.customer(id))?;
        let staff = resolve(draft.staff_id, Reference::Staff, |id| self.backend.staff_member(id))?;
        let service = resolve(draft.service_id, Reference::Service, |id| self.backend.service(id))?;
        availability::validate(draft.time.minutes(), service.duration_minutes)?;

        let appointment = self.reservations.hold(&[(staff.id, draft.date)], || {
            let same_day = self.backend.appointments_by_staff_and_date(staff.id, draft.date)?;
            ensure_free(staff.id, draft.date, draft.time, service.duration_minutes, &same_day)?;

            let appointment = Appointment {
                id: Uuid::new_v4(),
                customer_id: customer.id,
                staff_id: staff.id,
                service_id: service.id,
                date: draft.date,
                time: draft.time,
                duration_minutes: service.duration_minutes,
                status: AppointmentStatus::Scheduled,
                notes: non_empty(draft.notes),
            };
            self.backend.insert_appointment(appointment.clone())?;
            Ok::<_, BookingError>(appointment)
        })?;

        info!(
            id = %appointment.id,
            staff = %staff.name,
            service = %service.name,
            date = %appointment.date,
            time = %appointment.time,
            "Appointment booked"
        );
        Ok(appointment)
    }

    pub fn update(&self, id: Uuid, changes: AppointmentChanges) -> Result<Appointment, BookingError> {
        let customer = changes
            .customer_id
            .map(|customer_id| resolve(Some(customer_id), Reference::Customer, |id| self.backend.customer(id)))
            .transpose()?;
        let staff = changes
            .staff_id
            .map(|staff_id| resolve(Some(staff_id), Reference::Staff, |id| self.backend.staff_member(id)))
            .transpose()?;
        let service = changes
            .service_id
            .map(|service_id| resolve(Some(service_id), Reference::Service, |id| self.backend.service(id)))
            .transpose()?;

        let target = |seen: &Appointment| {
            (
                staff.as_ref().map_or(seen.staff_id, |staff| staff.id),
                changes.date.unwrap_or(seen.date),
            )
        };
        let updated = self.with_appointment_held(id, target, |mut updated| {
            if let Some(customer) = &customer {
                updated.customer_id = customer.id;
            }
            if let Some(staff) = &staff {
                updated.staff_id = staff.id;
            }
            if let Some(service) = &service {
                updated.service_id = service.id;
                updated.duration_minutes = service.duration_minutes;
            }
            if let Some(date) = changes.date {
                updated.date = date;
            }
            if let Some(time) = changes.time {
                updated.time = time;
            }
            if changes.notes.is_some() {
                updated.notes = non_empty(changes.notes.clone());
            }

            if updated.status.holds_slot() {
                availability::validate(updated.time.minutes(), updated.duration_minutes)?;
                let others: Vec<Appointment> = self
                    .backend
                    .appointments_by_staff_and_date(updated.staff_id, updated.date)?
                    .into_iter()
                    .filter(|appointment| appointment.id != id)
                    .collect();
                ensure_free(updated.staff_id, updated.date, updated.time, updated.duration_minutes, &others)?;
            }
            self.backend.update_appointment(updated.clone())?;
            Ok(updated)
        })?;

        info!(%id, date = %updated.date, time = %updated.time, "Appointment updated");
        Ok(updated)
    }

    pub fn change_status(&self, id: Uuid, next: AppointmentStatus) -> Result<Appointment, BookingError> {
        let appointment = self.with_appointment_held(id, slot_of, |mut appointment| {
            appointment.status = appointment.status.transition(next).map_err(|err| {
                warn!(%id, %err, "Rejected status change");
                err
            })?;
            self.backend.update_appointment(appointment.clone())?;
            Ok(appointment)
        })?;

        info!(%id, status = %appointment.status, "Appointment status changed");
        Ok(appointment)
    }

    pub fn remove(&self, id: Uuid) -> Result<(), BookingError> {
        self.with_appointment_held(id, slot_of, |_| Ok(self.backend.remove_appointment(id)?))?;
        info!(%id, "Appointment removed");
        Ok(())
    }

    pub fn appointments(&self) -> Result<Vec<Appointment>, BookingError> {
        Ok(self.backend.appointments()?)
    }

    /// The day's schedule ordered by start time.
    pub fn appointments_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, BookingError> {
        let mut appointments = self.backend.appointments_on(date)?;
        appointments.sort_by_key(|appointment| appointment.time);
        Ok(appointments)
    }

    /// Scheduled appointments later today, soonest first.
    pub fn upcoming(&self, now: NaiveDateTime, limit: usize) -> Result<Vec<Appointment>, BookingError> {
        let minutes_now = (now.hour() * 60 + now.minute()) as i32;
        Ok(self
            .appointments_on(now.date())?
            .into_iter()
            .filter(|appointment| appointment.status == AppointmentStatus::Scheduled)
            .filter(|appointment| appointment.start_minutes() > minutes_now)
            .take(limit)
            .collect())
    }

    /// Duration of the chosen service, or `fallback` while none is chosen.
    pub fn candidate_duration(&self, service_id: Option<Uuid>, fallback: i32) -> Result<i32, BookingError> {
        match service_id {
            None => Ok(fallback),
            some => Ok(resolve(some, Reference::Service, |id| self.backend.service(id))?.duration_minutes),
        }
    }

    pub fn availability(
        &self,
        staff_id: Uuid,
        date: NaiveDate,
        duration_minutes: i32,
        menu: &[TimeOfDay],
    ) -> Result<Vec<SlotAvailability>, BookingError> {
        let staff = resolve(Some(staff_id), Reference::Staff, |id| self.backend.staff_member(id))?;
        let same_day = self.backend.appointments_by_staff_and_date(staff.id, date)?;
        Ok(availability::menu_availability(staff_id, date, duration_minutes, menu, &same_day)?)
    }
}
