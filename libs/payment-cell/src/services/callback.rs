use tracing::{info, warn};

use appointment_cell::{AppointmentError, AppointmentService, AppointmentStatus};
use shared_config::AppConfig;

use crate::models::{PaymentCallbackRequest, PaymentCallbackResponse, PaymentError};

/// Applies gateway results (and the manual simulation) to appointments.
pub struct PaymentCallbackService {
    appointment_service: AppointmentService,
}

impl PaymentCallbackService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            appointment_service: AppointmentService::new(config),
        }
    }

    pub async fn handle_callback(
        &self,
        request: &PaymentCallbackRequest,
        auth_token: &str,
    ) -> Result<PaymentCallbackResponse, PaymentError> {
        let appointment = self.appointment_service
            .get_appointment(request.appointment_id, auth_token)
            .await
            .map_err(map_appointment_error)?;

        if !request.is_success() {
            warn!(
                "Payment for appointment {} not completed (result: {})",
                appointment.id, request.result
            );
            return Ok(PaymentCallbackResponse {
                appointment_id: appointment.id,
                confirmed: false,
                status: appointment.status,
            });
        }

        let updated = self.appointment_service
            .update_status(appointment.id, AppointmentStatus::Confirmed, auth_token)
            .await
            .map_err(map_appointment_error)?;

        info!("Payment confirmed for appointment {}", updated.id);

        Ok(PaymentCallbackResponse {
            appointment_id: updated.id,
            confirmed: true,
            status: updated.status,
        })
    }
}

fn map_appointment_error(e: AppointmentError) -> PaymentError {
    match e {
        AppointmentError::NotFound => PaymentError::NotFound,
        other => PaymentError::DatabaseError(other.to_string()),
    }
}
