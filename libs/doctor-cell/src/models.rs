use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialty: String,
    pub hospital: Option<String>,
    pub bio: Option<String>,
    pub gender: Option<String>,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub patients: i32,
    pub experience_years: Option<i32>,
    #[serde(default)]
    pub is_available: bool,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorSearchQuery {
    /// Free text matched against name, specialty, hospital and bio.
    pub query: Option<String>,
    /// Home-screen category, mapped onto a specialty.
    pub category: Option<String>,
    pub filter: Option<DoctorFilter>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DoctorFilter {
    Available,
    Female,
    Rating,
    Nearest,
    Popular,
}

impl DoctorFilter {
    /// PostgREST `order` clause for this filter.
    pub fn order_clause(filter: Option<DoctorFilter>) -> &'static str {
        match filter {
            Some(DoctorFilter::Rating) => "rating.desc",
            // No coordinates are stored, so "nearest" falls back to a stable order.
            Some(DoctorFilter::Nearest) => "id.asc",
            Some(DoctorFilter::Popular) => "patients.desc",
            _ => "is_available.desc",
        }
    }
}

/// Maps a home-screen category onto the specialty it should match.
/// Categories without a mapping are matched as the specialty text itself.
/// `None` means the category does not narrow the search.
pub fn specialty_for_category(category: &str) -> Option<String> {
    match category.trim() {
        "" => None,
        "telemedicine" => Some("Telemedicine".to_string()),
        "health-check" => Some("Family Medicine".to_string()),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_categories_are_matched_verbatim() {
        for category in ["hospital", "pharmacy", "symptoms", "supplements", "lab-test", "events"] {
            assert_eq!(specialty_for_category(category).as_deref(), Some(category));
        }
        assert_eq!(specialty_for_category("health-check").as_deref(), Some("Family Medicine"));
        assert_eq!(specialty_for_category(" "), None);
    }
}
