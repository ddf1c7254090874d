use reqwest::Method;
use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{specialty_for_category, Doctor, DoctorError, DoctorFilter, DoctorSearchQuery};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn search_doctors(
        &self,
        query: &DoctorSearchQuery,
        auth_token: Option<&str>,
    ) -> Result<Vec<Doctor>, DoctorError> {
        let path = Self::build_search_path(query);
        debug!("Searching doctors: {}", path);

        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| {
            error!("Doctor search failed: {}", e);
            DoctorError::DatabaseError(e.to_string())
        })?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| DoctorError::DatabaseError(e.to_string())))
            .collect()
    }

    pub async fn get_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(DoctorError::NotFound)?;
        serde_json::from_value(row).map_err(|e| DoctorError::DatabaseError(e.to_string()))
    }

    /// Builds the PostgREST path for a doctor search.
    pub fn build_search_path(query: &DoctorSearchQuery) -> String {
        let mut query_parts = vec!["select=*".to_string()];

        if let Some(text) = query.query.as_deref().map(sanitize_term).filter(|t| !t.is_empty()) {
            let term = urlencoding::encode(&text);
            query_parts.push(format!(
                "or=(name.ilike.*{term}*,specialty.ilike.*{term}*,hospital.ilike.*{term}*,bio.ilike.*{term}*)"
            ));
        }

        if let Some(specialty) = query.category.as_deref().and_then(specialty_for_category) {
            let specialty = sanitize_term(&specialty);
            query_parts.push(format!("specialty=ilike.*{}*", urlencoding::encode(&specialty)));
        }

        match query.filter {
            Some(DoctorFilter::Available) => query_parts.push("is_available=eq.true".to_string()),
            Some(DoctorFilter::Female) => query_parts.push("gender=eq.female".to_string()),
            _ => {}
        }

        query_parts.push(format!("order={}", DoctorFilter::order_clause(query.filter)));

        format!("/rest/v1/doctors?{}", query_parts.join("&"))
    }
}

/// Drops characters that carry meaning inside a PostgREST filter expression.
fn sanitize_term(term: &str) -> String {
    term.trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '"'))
        .collect()
}
