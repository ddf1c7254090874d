// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub doctor_id: Uuid,
    pub date: DateTime<Utc>,
    pub status: AppointmentStatus,
    /// Consultation price in won. Set by staff before the patient can pay.
    pub price: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<DoctorSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<PatientSummary>,
}

impl Appointment {
    pub fn doctor_name(&self) -> Option<&str> {
        self.doctor.as_ref().map(|doctor| doctor.name.as_str())
    }

    pub fn is_payment_pending(&self) -> bool {
        self.status == AppointmentStatus::AwaitingPayment
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorSummary {
    pub id: Uuid,
    pub name: String,
    pub specialty: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// PostgREST `select` that embeds the doctor and patient summaries.
pub const APPOINTMENT_SELECT: &str =
    "select=*,doctor:doctors(id,name,specialty),user:profiles(id,name,email)";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    /// Requested by the patient, waiting for staff to set a price.
    Pending,
    AwaitingPayment,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "PENDING",
            AppointmentStatus::AwaitingPayment => "AWAITING_PAYMENT",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
        }
    }

    /// Statuses the confirmation watcher announces.
    pub fn notifiable() -> [AppointmentStatus; 2] {
        [AppointmentStatus::AwaitingPayment, AppointmentStatus::Confirmed]
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub user_id: Uuid,
    pub doctor_id: Uuid,
    pub date: DateTime<Utc>,
    pub status: Option<AppointmentStatus>,
    pub price: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub date: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
    pub price: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    /// Matched against patient name, patient email and doctor name.
    pub search: Option<String>,
    /// A status name, or `ALL` for no status filter.
    pub status: Option<String>,
}

impl AppointmentSearchQuery {
    pub fn status_filter(&self) -> Result<Option<AppointmentStatus>, AppointmentError> {
        match self.status.as_deref() {
            None | Some("") | Some("ALL") => Ok(None),
            Some(status) => serde_json::from_value(serde_json::Value::String(status.to_string()))
                .map(Some)
                .map_err(|_| AppointmentError::ValidationError(format!("Unknown status: {}", status))),
        }
    }
}

/// Patients and doctors offered when staff create an appointment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppointmentOptions {
    pub users: Vec<PatientSummary>,
    pub doctors: Vec<DoctorSummary>,
}

/// The patient's appointments grouped the way the dashboard shows them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppointmentGroups {
    pub pending: Vec<Appointment>,
    pub awaiting_payment: Vec<Appointment>,
    /// Confirmed or completed, scheduled from now on.
    pub upcoming: Vec<Appointment>,
    /// Confirmed or completed, scheduled before now.
    pub past: Vec<Appointment>,
}

impl AppointmentGroups {
    pub fn split(appointments: &[Appointment], now: DateTime<Utc>) -> Self {
        let mut groups = Self::default();

        for appointment in appointments {
            let group = match appointment.status {
                AppointmentStatus::Pending => &mut groups.pending,
                AppointmentStatus::AwaitingPayment => &mut groups.awaiting_payment,
                AppointmentStatus::Confirmed | AppointmentStatus::Completed => {
                    if appointment.date >= now { &mut groups.upcoming } else { &mut groups.past }
                }
                AppointmentStatus::Cancelled => continue,
            };
            group.push(appointment.clone());
        }

        groups
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfirmationCheckRequest {
    #[serde(default)]
    pub known_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationCheckResponse {
    pub appointments: Vec<Appointment>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Not authorized to access this appointment")]
    Unauthorized,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Failures of a single confirmation poll. Never surfaced to the user.
#[derive(Debug, thiserror::Error)]
pub enum PollerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}
