use chrono::Utc;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error, info};
use uuid::Uuid;

use doctor_cell::{DoctorError, DoctorService};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentOptions, AppointmentSearchQuery,
    AppointmentStatus, BookAppointmentRequest, CreateAppointmentRequest,
    UpdateAppointmentRequest, APPOINTMENT_SELECT,
};

pub struct AppointmentService {
    supabase: SupabaseClient,
    doctor_service: DoctorService,
}

impl AppointmentService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctor_service: DoctorService::new(config),
        }
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}&{}", appointment_id, APPOINTMENT_SELECT);
        let rows = self.fetch_rows(Method::GET, &path, auth_token, None).await?;

        let row = rows.into_iter().next().ok_or(AppointmentError::NotFound)?;
        parse_appointment(row)
    }

    /// Staff listing: newest date first, optional status and free-text filters.
    pub async fn list_appointments(
        &self,
        query: &AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut path = format!("/rest/v1/appointments?{}&order=date.desc", APPOINTMENT_SELECT);
        if let Some(status) = query.status_filter()? {
            path.push_str(&format!("&status=eq.{}", status));
        }

        let rows = self.fetch_rows(Method::GET, &path, auth_token, None).await?;
        let appointments = rows.into_iter()
            .map(parse_appointment)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(match query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => appointments.into_iter()
                .filter(|appointment| matches_search(appointment, term))
                .collect(),
            None => appointments,
        })
    }

    pub async fn list_user_appointments(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?user_id=eq.{}&{}&order=date.desc",
            user_id, APPOINTMENT_SELECT
        );

        let rows = self.fetch_rows(Method::GET, &path, auth_token, None).await?;
        rows.into_iter().map(parse_appointment).collect()
    }

    /// Patient-initiated booking. The request starts without a price.
    pub async fn book_appointment(
        &self,
        user_id: Uuid,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        if request.date <= Utc::now() {
            return Err(AppointmentError::InvalidTime(
                "Appointment date must be in the future".to_string(),
            ));
        }

        self.doctor_service.get_doctor(request.doctor_id, Some(auth_token)).await
            .map_err(|e| match e {
                DoctorError::NotFound => AppointmentError::DoctorNotFound,
                DoctorError::DatabaseError(msg) => AppointmentError::DatabaseError(msg),
            })?;

        self.create_appointment(CreateAppointmentRequest {
            user_id,
            doctor_id: request.doctor_id,
            date: request.date,
            status: Some(AppointmentStatus::Pending),
            price: None,
        }, auth_token).await
    }

    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        if matches!(request.price, Some(price) if price < 0) {
            return Err(AppointmentError::ValidationError("Price cannot be negative".to_string()));
        }

        let now = Utc::now().to_rfc3339();
        let appointment_data = json!({
            "user_id": request.user_id,
            "doctor_id": request.doctor_id,
            "date": request.date.to_rfc3339(),
            "status": request.status.unwrap_or(AppointmentStatus::Pending),
            "price": request.price,
            "created_at": now,
            "updated_at": now
        });

        let path = format!("/rest/v1/appointments?{}", APPOINTMENT_SELECT);
        let rows = self.fetch_rows(Method::POST, &path, auth_token, Some(appointment_data)).await?;

        let row = rows.into_iter().next().ok_or_else(|| {
            AppointmentError::DatabaseError("Failed to create appointment".to_string())
        })?;
        let appointment = parse_appointment(row)?;

        info!("Appointment {} created for user {}", appointment.id, appointment.user_id);
        Ok(appointment)
    }

    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let mut update_data = serde_json::Map::new();

        if let Some(date) = request.date {
            update_data.insert("date".to_string(), json!(date.to_rfc3339()));
        }
        if let Some(status) = request.status {
            update_data.insert("status".to_string(), json!(status));
        }
        if let Some(price) = request.price {
            if price < 0 {
                return Err(AppointmentError::ValidationError("Price cannot be negative".to_string()));
            }
            update_data.insert("price".to_string(), json!(price));
        }

        if update_data.is_empty() {
            return Err(AppointmentError::ValidationError("No fields to update".to_string()));
        }

        // The watcher orders by this column to find fresh confirmations.
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/appointments?id=eq.{}&{}", appointment_id, APPOINTMENT_SELECT);
        let rows = self.fetch_rows(Method::PATCH, &path, auth_token, Some(Value::Object(update_data))).await?;

        let row = rows.into_iter().next().ok_or(AppointmentError::NotFound)?;
        let appointment = parse_appointment(row)?;

        info!("Appointment {} updated (status: {})", appointment.id, appointment.status);
        Ok(appointment)
    }

    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        self.update_appointment(appointment_id, UpdateAppointmentRequest {
            status: Some(status),
            ..Default::default()
        }, auth_token).await
    }

    /// Patients and doctors for the staff create form, fetched concurrently.
    pub async fn list_appointment_options(
        &self,
        auth_token: &str,
    ) -> Result<AppointmentOptions, AppointmentError> {
        let (users, doctors) = tokio::try_join!(
            self.fetch_rows(Method::GET, "/rest/v1/profiles?select=id,name,email&order=name.asc", auth_token, None),
            self.fetch_rows(Method::GET, "/rest/v1/doctors?select=id,name,specialty&order=name.asc", auth_token, None),
        )?;

        let options = AppointmentOptions {
            users: parse_rows(users, "users")?,
            doctors: parse_rows(doctors, "doctors")?,
        };

        debug!("Loaded {} users and {} doctors for appointment options", options.users.len(), options.doctors.len());
        Ok(options)
    }

    pub async fn delete_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows = self.fetch_rows(Method::DELETE, &path, auth_token, None).await?;

        if rows.is_empty() {
            return Err(AppointmentError::NotFound);
        }

        info!("Appointment {} deleted", appointment_id);
        Ok(())
    }

    async fn fetch_rows(
        &self,
        method: Method,
        path: &str,
        auth_token: &str,
        body: Option<Value>,
    ) -> Result<Vec<Value>, AppointmentError> {
        self.supabase.request_with_headers(
            method,
            path,
            Some(auth_token),
            body,
            Some(SupabaseClient::return_representation()),
        ).await.map_err(|e| {
            error!("Appointment query failed: {}", e);
            AppointmentError::DatabaseError(e.to_string())
        })
    }
}

pub(crate) fn parse_appointment(row: Value) -> Result<Appointment, AppointmentError> {
    serde_json::from_value(row).map_err(|e| {
        AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e))
    })
}

fn parse_rows<T: DeserializeOwned>(rows: Vec<Value>, what: &str) -> Result<Vec<T>, AppointmentError> {
    serde_json::from_value(Value::Array(rows)).map_err(|e| {
        AppointmentError::DatabaseError(format!("Failed to parse {}: {}", what, e))
    })
}

fn matches_search(appointment: &Appointment, term: &str) -> bool {
    let term = term.to_lowercase();
    let contains = |value: Option<&str>| {
        value.map(|v| v.to_lowercase().contains(&term)).unwrap_or(false)
    };

    let patient = appointment.user.as_ref();
    contains(patient.and_then(|p| p.name.as_deref()))
        || contains(patient.and_then(|p| p.email.as_deref()))
        || contains(appointment.doctor_name())
}
