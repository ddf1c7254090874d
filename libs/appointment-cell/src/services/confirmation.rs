use reqwest::Method;
use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, APPOINTMENT_SELECT};
use crate::services::appointment::parse_appointment;

/// Server side of the confirmation watcher: finds a patient's appointments
/// that reached a payable or confirmed state and are not yet known to the
/// caller.
pub struct ConfirmationService {
    supabase: SupabaseClient,
}

impl ConfirmationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn check_new_confirmations(
        &self,
        user_id: Uuid,
        known_ids: &[Uuid],
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = Self::build_check_path(user_id, known_ids);
        debug!("Checking new confirmations for user {} ({} known)", user_id, known_ids.len());

        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| {
            error!("Confirmation check failed: {}", e);
            AppointmentError::DatabaseError(e.to_string())
        })?;

        let appointments = rows.into_iter()
            .map(parse_appointment)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(appointments.into_iter()
            .filter(|appointment| !known_ids.contains(&appointment.id))
            .collect())
    }

    pub fn build_check_path(user_id: Uuid, known_ids: &[Uuid]) -> String {
        let statuses = AppointmentStatus::notifiable()
            .iter()
            .map(AppointmentStatus::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let mut path = format!(
            "/rest/v1/appointments?user_id=eq.{}&status=in.({})&{}&order=updated_at.desc",
            user_id, statuses, APPOINTMENT_SELECT
        );

        if !known_ids.is_empty() {
            let excluded = known_ids.iter()
                .map(Uuid::to_string)
                .collect::<Vec<_>>()
                .join(",");
            path.push_str(&format!("&id=not.in.({})", excluded));
        }

        path
    }
}
