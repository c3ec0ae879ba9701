use crate::availability::slot_menu;
use crate::backend::SalonBackend;
use crate::booking::{AppointmentChanges, AppointmentDraft, BookingError, BookingService};
use crate::configuration::Configuration;
use crate::status::AppointmentStatus;
use crate::types::{Customer, Service, Staff, TimeOfDay};
use axum::extract::{Query, Request};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Response;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum::{
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDate};
use futures::{Stream, StreamExt};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, warn};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

const UPCOMING_LIMIT: usize = 3;

lazy_static! {
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9][0-9 \-]{5,19}$").unwrap();
}

#[derive(Clone)]
pub struct AppState<T, C> {
    booking: BookingService<T>,
    configuration: C,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct BookingRequest {
    customer_id: Option<Uuid>,
    staff_id: Option<Uuid>,
    service_id: Option<Uuid>,
    date: NaiveDate,
    time: TimeOfDay,
    #[validate(length(max = 500))]
    notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct UpdateRequest {
    id: Uuid,
    customer_id: Option<Uuid>,
    staff_id: Option<Uuid>,
    service_id: Option<Uuid>,
    date: Option<NaiveDate>,
    time: Option<TimeOfDay>,
    #[validate(length(max = 500))]
    notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StatusRequest {
    id: Uuid,
    status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RemoveRequest {
    id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
struct AppointmentsQuery {
    date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
struct AvailabilityQuery {
    staff_id: Uuid,
    date: NaiveDate,
    service_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct AddCustomerRequest {
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[validate(regex(path = *PHONE_REGEX))]
    phone: String,
    #[validate(email)]
    email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct AddStaffRequest {
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[validate(length(min = 1, max = 100))]
    role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct AddServiceRequest {
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[validate(range(min = 0))]
    price: i64,
    #[validate(range(min = 1, max = 1440))]
    duration_minutes: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

enum ApiError {
    Booking(BookingError),
    Invalid(ValidationErrors),
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        Self::Booking(err)
    }
}

impl From<String> for ApiError {
    fn from(message: String) -> Self {
        Self::Booking(BookingError::from(message))
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        Self::Invalid(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            Self::Invalid(err) => (StatusCode::BAD_REQUEST, "invalid_request", err.to_string()),
            Self::Booking(err) => {
                let (status, error) = match &err {
                    BookingError::InvalidDuration(_) => (StatusCode::BAD_REQUEST, "invalid_duration"),
                    BookingError::MissingReference(_) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "missing_reference")
                    }
                    BookingError::SlotConflict { .. } => (StatusCode::CONFLICT, "slot_conflict"),
                    BookingError::InvalidTransition(_) => (StatusCode::CONFLICT, "invalid_transition"),
                    BookingError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
                    BookingError::Backend { .. } => {
                        error!(%err, "Request failed in backend");
                        (StatusCode::INTERNAL_SERVER_ERROR, "backend")
                    }
                };
                (status, error, err.to_string())
            }
        };
        let body = ErrorBody {
            error: error.into(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

pub fn create_app<T: SalonBackend, C: Configuration>(backend: T, configuration: C) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState {
        booking: BookingService::new(backend),
        configuration,
    };

    let public = Router::new()
        .route("/appointments", get(get_appointments::<T, C>))
        .route("/appointments/stream", get(appointment_stream::<T, C>))
        .route("/appointments/upcoming", get(get_upcoming::<T, C>))
        .route("/availability", get(get_availability::<T, C>))
        .route("/book", post(book_appointment::<T, C>))
        .route("/update", post(update_appointment::<T, C>))
        .route("/status", post(change_status::<T, C>))
        .route("/customers", get(get_customers::<T, C>))
        .route("/staff", get(get_staff::<T, C>))
        .route("/services", get(get_services::<T, C>));

    let admin = Router::new()
        .route("/remove", post(remove_appointment::<T, C>))
        .route("/customers/add", post(add_customer::<T, C>))
        .route("/staff/add", post(add_staff::<T, C>))
        .route("/services/add", post(add_service::<T, C>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth::<T, C>,
        ));

    Router::new()
        .merge(public)
        .merge(admin)
        .with_state(state)
        .layer(cors)
}

/// Runs a booking operation that waits on slot locks off the async workers.
async fn run_blocking<T, R>(
    booking: BookingService<T>,
    operation: impl FnOnce(&BookingService<T>) -> Result<R, BookingError> + Send + 'static,
) -> Result<R, ApiError>
where
    T: SalonBackend,
    R: Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || operation(&booking))
        .await
        .map_err(|err| {
            error!(?err, "Booking task failed");
            ApiError::from(format!("Booking task failed: {err}"))
        })?;
    Ok(result?)
}

async fn admin_auth<T: SalonBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    if let Some(auth_header) = request.headers().get("x-admin-password") {
        if auth_header.to_str().unwrap_or("") != state.configuration.password() {
            warn!(path = %request.uri().path(), "Rejected admin request with wrong password");
            return Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()));
        }
    } else {
        return Err((StatusCode::UNAUTHORIZED, "Missing credentials".to_string()));
    }
    Ok(next.run(request).await)
}

async fn get_appointments<T: SalonBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Query(query): Query<AppointmentsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let appointments = match query.date {
        Some(date) => state.booking.appointments_on(date)?,
        None => state.booking.appointments()?,
    };
    Ok(Json(appointments))
}

async fn appointment_stream<T: SalonBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = state
        .booking
        .backend()
        .appointment_stream()
        .map(|appointments| Event::default().json_data(appointments));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn get_upcoming<T: SalonBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Local::now().naive_local();
    Ok(Json(state.booking.upcoming(now, UPCOMING_LIMIT)?))
}

async fn get_availability<T: SalonBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let configuration = &state.configuration;
    let duration = state
        .booking
        .candidate_duration(query.service_id, configuration.default_duration_minutes())?;
    let menu = slot_menu(
        configuration.slot_menu_start(),
        configuration.slot_menu_end(),
        configuration.slot_interval_minutes(),
    );
    let slots = state
        .booking
        .availability(query.staff_id, query.date, duration, &menu)?;
    Ok(Json(slots))
}

async fn book_appointment<T: SalonBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Json(booking): Json<BookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    booking.validate()?;
    let draft = AppointmentDraft {
        customer_id: booking.customer_id,
        staff_id: booking.staff_id,
        service_id: booking.service_id,
        date: booking.date,
        time: booking.time,
        notes: booking.notes,
    };
    let appointment = run_blocking(state.booking, move |booking| booking.book(draft)).await?;
    Ok(Json(appointment))
}

async fn update_appointment<T: SalonBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Json(update): Json<UpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    update.validate()?;
    let id = update.id;
    let changes = AppointmentChanges {
        customer_id: update.customer_id,
        staff_id: update.staff_id,
        service_id: update.service_id,
        date: update.date,
        time: update.time,
        notes: update.notes,
    };
    let appointment = run_blocking(state.booking, move |booking| booking.update(id, changes)).await?;
    Ok(Json(appointment))
}

async fn change_status<T: SalonBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Json(request): Json<StatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let appointment = run_blocking(state.booking, move |booking| {
        booking.change_status(request.id, request.status)
    })
    .await?;
    Ok(Json(appointment))
}

async fn remove_appointment<T: SalonBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Json(request): Json<RemoveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(state.booking, move |booking| booking.remove(request.id)).await?;
    Ok((StatusCode::OK, "Appointment removed successfully".to_string()))
}

async fn get_customers<T: SalonBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.booking.backend().customers()?))
}

async fn get_staff<T: SalonBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.booking.backend().staff_members()?))
}

async fn get_services<T: SalonBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.booking.backend().services()?))
}

async fn add_customer<T: SalonBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Json(request): Json<AddCustomerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    let customer = Customer {
        id: Uuid::new_v4(),
        name: request.name,
        phone: request.phone,
        email: request.email.filter(|email| !email.is_empty()),
    };
    state.booking.backend().add_customer(customer.clone())?;
    Ok(Json(customer))
}

async fn add_staff<T: SalonBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Json(request): Json<AddStaffRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    let staff = Staff {
        id: Uuid::new_v4(),
        name: request.name,
        role: request.role,
    };
    state.booking.backend().add_staff_member(staff.clone())?;
    Ok(Json(staff))
}

async fn add_service<T: SalonBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Json(request): Json<AddServiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    let service = Service {
        id: Uuid::new_v4(),
        name: request.name,
        price: request.price,
        duration_minutes: request.duration_minutes,
    };
    state.booking.backend().add_service(service.clone())?;
    Ok(Json(service))
}
