use crate::{
    backend::{AppointmentBackend, CatalogBackend},
    types::{Appointment, Customer, Service, Staff},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::sync::watch::{self, Sender};
use tokio_stream::wrappers::WatchStream;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    appointments: HashMap<Uuid, Appointment>,
    customers: HashMap<Uuid, Customer>,
    staff: HashMap<Uuid, Staff>,
    services: HashMap<Uuid, Service>,
}

/// In-memory salon data, optionally mirrored to a JSON snapshot file so the
/// schedule survives restarts without a database.
#[derive(Debug, Clone)]
pub struct LocalStore {
    state: Arc<Mutex<StoreState>>,
    snapshot_path: Option<PathBuf>,
    sender: Sender<Vec<Appointment>>,
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::from_state(StoreState::default(), None)
    }
}

impl LocalStore {
    fn from_state(state: StoreState, snapshot_path: Option<PathBuf>) -> Self {
        let (sender, _) = watch::channel(sorted(state.appointments.values().cloned().collect()));
        Self {
            state: Arc::new(Mutex::new(state)),
            snapshot_path,
            sender,
        }
    }

    /// Opens the snapshot at `path`, starting empty when the file does not exist yet.
    pub fn with_snapshot(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = fs::read_to_string(&path)
                .map_err(|err| format!("Failed to read snapshot {}: {err}", path.display()))?;
            serde_json::from_str(&contents)
                .map_err(|err| format!("Snapshot {} is corrupt: {err}", path.display()))?
        } else {
            StoreState::default()
        };
        info!(path = %path.display(), appointments = state.appointments.len(), "Loaded local snapshot");
        Ok(Self::from_state(state, Some(path)))
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `change` to a copy of the state and only commits it once the
    /// snapshot was written.
    fn mutate<R>(&self, change: impl FnOnce(&mut StoreState) -> Result<R, String>) -> Result<R, String> {
        let mut state = self.lock();
        let mut next = state.clone();
        let result = change(&mut next)?;
        self.persist(&next)?;
        *state = next;
        drop(state);
        self.send_appointments();
        Ok(result)
    }

    fn persist(&self, state: &StoreState) -> Result<(), String> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let contents = serde_json::to_string_pretty(state).map_err(|err| {
            error!(?err, "Failed to serialize snapshot");
            format!("Failed to serialize snapshot: {err}")
        })?;
        fs::write(path, contents).map_err(|err| {
            error!(?err, path = %path.display(), "Failed to write snapshot");
            format!("Failed to write snapshot: {err}")
        })
    }

    fn send_appointments(&self) {
        let appointments = sorted(self.lock().appointments.values().cloned().collect());
        self.sender.send_replace(appointments);
    }

    fn filtered(&self, predicate: impl Fn(&Appointment) -> bool) -> Vec<Appointment> {
        sorted(
            self.lock()
                .appointments
                .values()
                .filter(|appointment| predicate(appointment))
                .cloned()
                .collect(),
        )
    }
}

fn sorted(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_unstable_by_key(|appointment| (appointment.date, appointment.time, appointment.id));
    appointments
}

impl AppointmentBackend for LocalStore {
    fn appointment_stream(&self) -> WatchStream<Vec<Appointment>> {
        WatchStream::new(self.sender.subscribe())
    }

    fn appointments(&self) -> Result<Vec<Appointment>, String> {
        Ok(self.filtered(|_| true))
    }

    fn appointments_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, String> {
        Ok(self.filtered(|appointment| appointment.date == date))
    }

    fn appointments_by_staff_and_date(
        &self,
        staff_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, String> {
        Ok(self.filtered(|appointment| appointment.staff_id == staff_id && appointment.date == date))
    }

    fn appointment(&self, id: Uuid) -> Result<Option<Appointment>, String> {
        Ok(self.lock().appointments.get(&id).cloned())
    }

    fn insert_appointment(&self, appointment: Appointment) -> Result<(), String> {
        self.mutate(|state| {
            if state.appointments.contains_key(&appointment.id) {
                let err = "Appointment already exists";
                error!(id = %appointment.id, err);
                return Err(err.into());
            }
            state.appointments.insert(appointment.id, appointment);
            Ok(())
        })
    }

    fn update_appointment(&self, appointment: Appointment) -> Result<(), String> {
        self.mutate(|state| match state.appointments.get_mut(&appointment.id) {
            Some(stored) => {
                *stored = appointment;
                Ok(())
            }
            None => {
                let err = "Appointment does not exist and can't therefore not be updated";
                error!(id = %appointment.id, err);
                Err(err.into())
            }
        })
    }

    fn remove_appointment(&self, id: Uuid) -> Result<(), String> {
        self.mutate(|state| {
            if state.appointments.remove(&id).is_none() {
                let err = "Appointment does not exist and can't therefore not be removed";
                error!(%id, err);
                return Err(err.into());
            }
            Ok(())
        })
    }
}

impl CatalogBackend for LocalStore {
    fn customers(&self) -> Result<Vec<Customer>, String> {
        let mut customers: Vec<Customer> = self.lock().customers.values().cloned().collect();
        customers.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        Ok(customers)
    }

    fn customer(&self, id: Uuid) -> Result<Option<Customer>, String> {
        Ok(self.lock().customers.get(&id).cloned())
    }

    fn add_customer(&self, customer: Customer) -> Result<(), String> {
        self.mutate(|state| {
            if state.customers.contains_key(&customer.id) {
                return Err("Customer already exists".into());
            }
            state.customers.insert(customer.id, customer);
            Ok(())
        })
    }

    fn staff_members(&self) -> Result<Vec<Staff>, String> {
        let mut staff: Vec<Staff> = self.lock().staff.values().cloned().collect();
        staff.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        Ok(staff)
    }

    fn staff_member(&self, id: Uuid) -> Result<Option<Staff>, String> {
        Ok(self.lock().staff.get(&id).cloned())
    }

    fn add_staff_member(&self, staff: Staff) -> Result<(), String> {
        self.mutate(|state| {
            if state.staff.contains_key(&staff.id) {
                return Err("Staff member already exists".into());
            }
            state.staff.insert(staff.id, staff);
            Ok(())
        })
    }

    fn services(&self) -> Result<Vec<Service>, String> {
        let mut services: Vec<Service> = self.lock().services.values().cloned().collect();
        services.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        Ok(services)
    }

    fn service(&self, id: Uuid) -> Result<Option<Service>, String> {
        Ok(self.lock().services.get(&id).cloned())
    }

    fn add_service(&self, service: Service) -> Result<(), String> {
        self.mutate(|state| {
            if state.services.contains_key(&service.id) {
                return Err("Service already exists".into());
            }
            state.services.insert(service.id, service);
            Ok(())
        })
    }
}
