use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header::{HeaderMap, HeaderValue}, Method};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use schedule_cell::{
    Clock, CompiledSchedule, Horizon, RecurringRuleCompiler, SlotMaterializer,
};
use shared_config::AppConfig;
use shared_database::supabase::{prefer_exact_count, SupabaseClient};
use shared_models::pagination::{offset_for, Page};

use crate::models::{
    AvailableSlots, BookedWindow, SubmitTherapistRequest, Therapist, TherapistError,
    TherapistListQuery, TherapistSummary,
};
use crate::services::directory::directory_request;

pub struct TherapistService {
    supabase: SupabaseClient,
    clock: Arc<dyn Clock>,
    horizon_weeks: u32,
}

impl TherapistService {
    pub fn new(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            clock,
            horizon_weeks: config.slot_horizon_weeks,
        }
    }

    pub async fn get_therapist(
        &self,
        therapist_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Therapist, TherapistError> {
        debug!("Fetching therapist: {}", therapist_id);

        let path = format!("/rest/v1/therapists?id=eq.{}", therapist_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(TherapistError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| TherapistError::DatabaseError(format!("Failed to parse therapist: {}", e)))
    }

    /// Public directory listing. Filtering, ordering and paging run in
    /// PostgREST; the total comes from `Content-Range`.
    pub async fn list_therapists(
        &self,
        query: &TherapistListQuery,
    ) -> Result<Page<TherapistSummary>, TherapistError> {
        let request = directory_request(query);
        debug!("Listing therapists: {:?} -> {}", query, request.path);

        let response = self.supabase.request_with_status(
            Method::GET,
            &request.path,
            None,
            None,
            Some(prefer_exact_count()),
        ).await.map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        if !response.status.is_success() {
            return Err(TherapistError::DatabaseError(format!(
                "Therapist listing failed with status {}",
                response.status
            )));
        }

        let total = response.total_count();
        let therapists: Vec<Therapist> = serde_json::from_value(response.body)
            .map_err(|e| TherapistError::DatabaseError(format!("Failed to parse therapists: {}", e)))?;
        let total = total.unwrap_or_else(|| offset_for(request.page, request.limit) + therapists.len() as u64);

        let items = therapists.iter().map(TherapistSummary::from).collect();
        Ok(Page::new(items, total, request.page, request.limit))
    }

    /// Save the therapist's profile. Timings are compiled first, so a single
    /// invalid rule rejects the submission before anything is written.
    pub async fn submit_details(
        &self,
        therapist_id: Uuid,
        request: SubmitTherapistRequest,
        auth_token: &str,
    ) -> Result<Therapist, TherapistError> {
        debug!("Submitting details for therapist: {}", therapist_id);

        if request.name.trim().is_empty() {
            return Err(TherapistError::ValidationError("Name is required".to_string()));
        }
        if request.specialization.trim().is_empty() {
            return Err(TherapistError::ValidationError("Specialization is required".to_string()));
        }

        RecurringRuleCompiler::new(self.clock.clone())
            .compile_in(therapist_id, &request.timings, &request.timezone)?;

        let qualifications = split_qualifications(&request.educational_qualifications);
        let now = self.clock.now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let therapist_data = json!({
            "id": therapist_id,
            "name": request.name.trim(),
            "phone": request.phone,
            "specialization": request.specialization.trim(),
            "gender": request.gender.to_lowercase(),
            "educational_qualifications": qualifications,
            "counselling_qualification": request.counselling_qualification,
            "professional_experience": request.professional_experience,
            "establishment": request.establishment,
            "location": request.location,
            "fees": request.fees,
            "photo": request.photo_url,
            "identity_proof": request.identity_proof_url,
            "timezone": request.timezone.trim(),
            "timings": request.timings,
            "updated_at": now
        });

        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("resolution=merge-duplicates,return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/therapists",
            Some(auth_token),
            Some(therapist_data),
            Some(headers),
        ).await.map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next()
            .ok_or_else(|| TherapistError::DatabaseError("Failed to save therapist data".to_string()))?;
        let therapist: Therapist = serde_json::from_value(row)
            .map_err(|e| TherapistError::DatabaseError(format!("Failed to parse therapist: {}", e)))?;

        info!("Saved details for therapist {} ({} timing rules)", therapist.id, therapist.timings.len());
        Ok(therapist)
    }

    /// Compile the therapist's stored timings in their own timezone.
    pub async fn get_schedule(
        &self,
        therapist_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<CompiledSchedule, TherapistError> {
        let therapist = self.get_therapist(therapist_id, auth_token).await?;
        self.compile_schedule(&therapist)
    }

    pub fn compile_schedule(&self, therapist: &Therapist) -> Result<CompiledSchedule, TherapistError> {
        let schedule = RecurringRuleCompiler::new(self.clock.clone())
            .compile_in(therapist.id, &therapist.timings, &therapist.timezone)?;
        Ok(schedule)
    }

    /// Open slots for the next `weeks` (config default when `None`), minus
    /// windows already covered by confirmed bookings. This is a read-only
    /// view; the reservation itself decides whether a slot is still free.
    pub async fn available_slots(
        &self,
        therapist_id: Uuid,
        weeks: Option<u32>,
        auth_token: Option<&str>,
    ) -> Result<AvailableSlots, TherapistError> {
        let therapist = self.get_therapist(therapist_id, auth_token).await?;
        if therapist.is_blocked {
            return Err(TherapistError::NotFound);
        }

        let schedule = self.compile_schedule(&therapist)?;
        let horizon = Horizon::weeks_from(self.clock.now(), weeks.unwrap_or(self.horizon_weeks));

        let materialized = SlotMaterializer::materialize(&schedule, horizon);
        let truncated_at = materialized.truncated_at();
        let candidates = materialized.collect::<Vec<_>>();

        // A slot starting inside the horizon may end after it, and a booking
        // that started before `now` may still be running.
        let booked = match candidates.iter().map(|slot| slot.end_date_time).max() {
            Some(until) => self.confirmed_bookings(therapist_id, horizon.start(), until, auth_token).await?,
            None => Vec::new(),
        };

        let slots = candidates
            .into_iter()
            .filter(|slot| !booked.iter().any(|b| slot.overlaps(b.start_date_time, b.end_date_time)))
            .collect::<Vec<_>>();

        debug!("Therapist {} has {} open slots ({} booked windows)", therapist_id, slots.len(), booked.len());

        Ok(AvailableSlots {
            therapist_id,
            timezone: therapist.timezone,
            horizon,
            slots,
            truncated_at,
        })
    }

    /// Confirmed bookings overlapping `[from, until)`.
    async fn confirmed_bookings(
        &self,
        therapist_id: Uuid,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        auth_token: Option<&str>,
    ) -> Result<Vec<BookedWindow>, TherapistError> {
        let path = format!(
            "/rest/v1/bookings?select=start_date_time,end_date_time&therapist_id=eq.{}&status=eq.confirmed&end_date_time=gt.{}&start_date_time=lt.{}",
            therapist_id,
            query_instant(from),
            query_instant(until)
        );

        match self.supabase.request::<Vec<BookedWindow>>(Method::GET, &path, auth_token, None).await {
            Ok(windows) => Ok(windows),
            Err(e) => {
                warn!("Could not load bookings for therapist {}: {}", therapist_id, e);
                Err(TherapistError::DatabaseError(e.to_string()))
            }
        }
    }
}

/// RFC 3339 with a `Z` suffix so the instant survives a query string unescaped.
pub fn query_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn split_qualifications(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .collect()
}
