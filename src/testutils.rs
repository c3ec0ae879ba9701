use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use chrono::NaiveDate;
use futures::StreamExt;
use tokio::sync::watch::{self, Sender};
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

use crate::{
    backend::{AppointmentBackend, CatalogBackend},
    types::{Appointment, Customer, Service, Staff},
};

pub async fn read_from_appointment_stream(
    stream: &mut WatchStream<Vec<Appointment>>,
) -> Vec<Appointment> {
    tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("No appointments were published in time")
        .expect("Appointment stream ended")
}

/// Counts backend calls and serves whatever the test placed in its maps.
pub struct MockBackendInner {
    pub success: AtomicBool,
    pub calls_to_appointments: AtomicU64,
    pub calls_to_appointments_by_staff_and_date: AtomicU64,
    pub calls_to_insert_appointment: AtomicU64,
    pub calls_to_update_appointment: AtomicU64,
    pub calls_to_remove_appointment: AtomicU64,
    pub calls_to_add_customer: AtomicU64,
    pub calls_to_add_staff_member: AtomicU64,
    pub calls_to_add_service: AtomicU64,
    pub appointments: Mutex<HashMap<Uuid, Appointment>>,
    pub customers: Mutex<HashMap<Uuid, Customer>>,
    pub staff: Mutex<HashMap<Uuid, Staff>>,
    pub services: Mutex<HashMap<Uuid, Service>>,
    pub sender: Sender<Vec<Appointment>>,
}

#[derive(Clone)]
pub struct MockBackend(pub Arc<MockBackendInner>);

impl MockBackendInner {
    fn new() -> Self {
        let (sender, _) = watch::channel(vec![]);
        Self {
            success: AtomicBool::new(true),
            calls_to_appointments: AtomicU64::default(),
            calls_to_appointments_by_staff_and_date: AtomicU64::default(),
            calls_to_insert_appointment: AtomicU64::default(),
            calls_to_update_appointment: AtomicU64::default(),
            calls_to_remove_appointment: AtomicU64::default(),
            calls_to_add_customer: AtomicU64::default(),
            calls_to_add_staff_member: AtomicU64::default(),
            calls_to_add_service: AtomicU64::default(),
            appointments: Mutex::default(),
            customers: Mutex::default(),
            staff: Mutex::default(),
            services: Mutex::default(),
            sender,
        }
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self(Arc::new(MockBackendInner::new()))
    }

    fn result(&self) -> Result<(), String> {
        match self.0.success.load(Ordering::SeqCst) {
            true => Ok(()),
            false => Err("Supposed to fail".into()),
        }
    }

    pub fn calls(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::SeqCst)
    }
}

impl AppointmentBackend for MockBackend {
    fn appointment_stream(&self) -> WatchStream<Vec<Appointment>> {
        WatchStream::new(self.0.sender.subscribe())
    }

    fn appointments(&self) -> Result<Vec<Appointment>, String> {
        self.0.calls_to_appointments.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        Ok(self.0.appointments.lock().unwrap().values().cloned().collect())
    }

    fn appointments_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, String> {
        Ok(self
            .appointments()?
            .into_iter()
            .filter(|appointment| appointment.date == date)
            .collect())
    }

    fn appointments_by_staff_and_date(
        &self,
        staff_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, String> {
        self.0
            .calls_to_appointments_by_staff_and_date
            .fetch_add(1, Ordering::SeqCst);
        self.result()?;
        Ok(self
            .0
            .appointments
            .lock()
            .unwrap()
            .values()
            .filter(|appointment| appointment.staff_id == staff_id && appointment.date == date)
            .cloned()
            .collect())
    }

    fn appointment(&self, id: Uuid) -> Result<Option<Appointment>, String> {
        Ok(self.0.appointments.lock().unwrap().get(&id).cloned())
    }

    fn insert_appointment(&self, appointment: Appointment) -> Result<(), String> {
        self.0
            .calls_to_insert_appointment
            .fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0
            .appointments
            .lock()
            .unwrap()
            .insert(appointment.id, appointment);
        Ok(())
    }

    fn update_appointment(&self, appointment: Appointment) -> Result<(), String> {
        self.0
            .calls_to_update_appointment
            .fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0
            .appointments
            .lock()
            .unwrap()
            .insert(appointment.id, appointment);
        Ok(())
    }

    fn remove_appointment(&self, id: Uuid) -> Result<(), String> {
        self.0
            .calls_to_remove_appointment
            .fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.appointments.lock().unwrap().remove(&id);
        Ok(())
    }
}

impl CatalogBackend for MockBackend {
    fn customers(&self) -> Result<Vec<Customer>, String> {
        Ok(self.0.customers.lock().unwrap().values().cloned().collect())
    }

    fn customer(&self, id: Uuid) -> Result<Option<Customer>, String> {
        Ok(self.0.customers.lock().unwrap().get(&id).cloned())
    }

    fn add_customer(&self, customer: Customer) -> Result<(), String> {
        self.0.calls_to_add_customer.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.customers.lock().unwrap().insert(customer.id, customer);
        Ok(())
    }

    fn staff_members(&self) -> Result<Vec<Staff>, String> {
        Ok(self.0.staff.lock().unwrap().values().cloned().collect())
    }

    fn staff_member(&self, id: Uuid) -> Result<Option<Staff>, String> {
        Ok(self.0.staff.lock().unwrap().get(&id).cloned())
    }

    fn add_staff_member(&self, staff: Staff) -> Result<(), String> {
        self.0
            .calls_to_add_staff_member
            .fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.staff.lock().unwrap().insert(staff.id, staff);
        Ok(())
    }

    fn services(&self) -> Result<Vec<Service>, String> {
        Ok(self.0.services.lock().unwrap().values().cloned().collect())
    }

    fn service(&self, id: Uuid) -> Result<Option<Service>, String> {
        Ok(self.0.services.lock().unwrap().get(&id).cloned())
    }

    fn add_service(&self, service: Service) -> Result<(), String> {
        self.0.calls_to_add_service.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.services.lock().unwrap().insert(service.id, service);
        Ok(())
    }
}
