use crate::types::{Appointment, Customer, Service, Staff};
use chrono::NaiveDate;
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

/// Name, price and duration of the services offered before the salon
/// configures its own catalog.
const DEFAULT_SERVICES: [(&str, i64, i32); 5] = [
    ("Potong Rambut", 50_000, 30),
    ("Creambath", 100_000, 60),
    ("Hair Coloring", 350_000, 120),
    ("Facial", 150_000, 60),
    ("Manicure", 80_000, 45),
];

pub trait AppointmentBackend: Clone + Send + Sync + 'static {
    fn appointment_stream(&self) -> WatchStream<Vec<Appointment>>;
    fn appointments(&self) -> Result<Vec<Appointment>, String>;
    fn appointments_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, String>;
    fn appointments_by_staff_and_date(
        &self,
        staff_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, String>;
    fn appointment(&self, id: Uuid) -> Result<Option<Appointment>, String>;
    fn insert_appointment(&self, appointment: Appointment) -> Result<(), String>;
    fn update_appointment(&self, appointment: Appointment) -> Result<(), String>;
    fn remove_appointment(&self, id: Uuid) -> Result<(), String>;
}

pub trait CatalogBackend: Clone + Send + Sync + 'static {
    fn customers(&self) -> Result<Vec<Customer>, String>;
    fn customer(&self, id: Uuid) -> Result<Option<Customer>, String>;
    fn add_customer(&self, customer: Customer) -> Result<(), String>;
    fn staff_members(&self) -> Result<Vec<Staff>, String>;
    fn staff_member(&self, id: Uuid) -> Result<Option<Staff>, String>;
    fn add_staff_member(&self, staff: Staff) -> Result<(), String>;
    fn services(&self) -> Result<Vec<Service>, String>;
    fn service(&self, id: Uuid) -> Result<Option<Service>, String>;
    fn add_service(&self, service: Service) -> Result<(), String>;

    /// Seeds the default service list when the catalog has no services yet.
    fn insert_default_services(&self) -> Result<(), String> {
        if !self.services()?.is_empty() {
            return Ok(());
        }
        for (name, price, duration_minutes) in DEFAULT_SERVICES {
            self.add_service(Service {
                id: Uuid::new_v4(),
                name: name.into(),
                price,
                duration_minutes,
            })?;
        }
        Ok(())
    }
}

pub trait SalonBackend: AppointmentBackend + CatalogBackend {}

impl<T: AppointmentBackend + CatalogBackend> SalonBackend for T {}
