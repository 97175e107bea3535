use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use schedule_cell::{Horizon, ScheduleError, Slot, TimingRule};

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Therapist {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialization: String,
    pub gender: String,
    #[serde(default)]
    pub educational_qualifications: Vec<String>,
    pub counselling_qualification: Option<String>,
    #[serde(default)]
    pub professional_experience: u32,
    pub establishment: Option<String>,
    pub location: Option<String>,
    pub fees: Option<f64>,
    pub photo: Option<String>,
    pub identity_proof: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub timings: Vec<TimingRule>,
    #[serde(default)]
    pub is_blocked: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// What the public listing shows; identity documents stay private.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TherapistSummary {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialization: String,
    pub gender: String,
    pub professional_experience: u32,
    pub location: Option<String>,
    pub fees: Option<f64>,
    pub photo: Option<String>,
}

impl From<&Therapist> for TherapistSummary {
    fn from(therapist: &Therapist) -> Self {
        Self {
            id: therapist.id,
            name: therapist.name.clone(),
            email: therapist.email.clone(),
            phone: therapist.phone.clone(),
            specialization: therapist.specialization.clone(),
            gender: therapist.gender.clone(),
            professional_experience: therapist.professional_experience,
            location: therapist.location.clone(),
            fees: therapist.fees,
            photo: therapist.photo.clone(),
        }
    }
}

/// Public profile page. Contact details, identity proof and the raw weekly
/// timings are left out; availability is served through the slots route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TherapistProfile {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    pub gender: String,
    pub educational_qualifications: Vec<String>,
    pub counselling_qualification: Option<String>,
    pub professional_experience: u32,
    pub establishment: Option<String>,
    pub location: Option<String>,
    pub fees: Option<f64>,
    pub photo: Option<String>,
    pub timezone: String,
}

impl From<Therapist> for TherapistProfile {
    fn from(therapist: Therapist) -> Self {
        Self {
            id: therapist.id,
            name: therapist.name,
            specialization: therapist.specialization,
            gender: therapist.gender,
            educational_qualifications: therapist.educational_qualifications,
            counselling_qualification: therapist.counselling_qualification,
            professional_experience: therapist.professional_experience,
            establishment: therapist.establishment,
            location: therapist.location,
            fees: therapist.fees,
            photo: therapist.photo,
            timezone: therapist.timezone,
        }
    }
}

/// Profile details a therapist submits after registering. Photo and identity
/// proof arrive as URLs of files that were already uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTherapistRequest {
    pub name: String,
    pub phone: Option<String>,
    pub specialization: String,
    pub gender: String,
    /// Comma separated, e.g. "MSc Psychology, PhD Clinical Psychology".
    #[serde(default)]
    pub educational_qualifications: String,
    pub counselling_qualification: Option<String>,
    #[serde(default)]
    pub professional_experience: u32,
    pub establishment: Option<String>,
    pub location: Option<String>,
    pub fees: Option<f64>,
    pub photo_url: Option<String>,
    pub identity_proof_url: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub timings: Vec<TimingRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOption {
    #[default]
    Experience,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderFilter {
    #[default]
    All,
    Male,
    Female,
}

impl GenderFilter {
    pub fn matches(&self, gender: &str) -> bool {
        match self {
            GenderFilter::All => true,
            GenderFilter::Male => gender.eq_ignore_ascii_case("male"),
            GenderFilter::Female => gender.eq_ignore_ascii_case("female"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TherapistListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub sort: SortOption,
    #[serde(default)]
    pub gender: GenderFilter,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlotQuery {
    pub weeks: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailableSlots {
    pub therapist_id: Uuid,
    pub timezone: String,
    pub horizon: Horizon,
    pub slots: Vec<Slot>,
    /// Set when the horizon ran past the end of the yearly recurrence.
    pub truncated_at: Option<DateTime<Utc>>,
}

/// Start/end of a confirmed booking, as far as availability cares.
#[derive(Debug, Clone, Deserialize)]
pub struct BookedWindow {
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum TherapistError {
    #[error("Therapist not found")]
    NotFound,

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
