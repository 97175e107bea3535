use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{prefer_exact_count, prefer_representation, SupabaseClient};
use shared_models::pagination::{normalize_paging, offset_for, Page};

use crate::models::{AccountError, ChangePasswordRequest, Notification, UserCredentials, UserListQuery, UserSummary};
use crate::services::password::PasswordSecurityService;

pub const DEFAULT_USERS_PER_PAGE: u32 = 8;

const USER_COLUMNS: &str = "id,name,email,phone,role,is_blocked,created_at";

pub struct AccountService {
    supabase: SupabaseClient,
}

impl AccountService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Replace the stored password hash once the current password checks out.
    #[instrument(skip(self, request, auth_token), fields(email = %request.email))]
    pub async fn change_password(&self, request: ChangePasswordRequest, auth_token: &str) -> Result<(), AccountError> {
        if request.new_password != request.confirm_password {
            return Err(AccountError::PasswordMismatch);
        }
        if request.new_password == request.current_password {
            return Err(AccountError::ValidationError(
                "New password must differ from the current password".to_string(),
            ));
        }

        let strength = PasswordSecurityService::validate_password_strength(&request.new_password);
        if !strength.is_acceptable() {
            return Err(AccountError::WeakPassword(strength.issues));
        }

        let user = self.find_credentials(&request.email, auth_token).await?;
        let stored_hash = user.password_hash.as_deref().ok_or(AccountError::IncorrectPassword)?;

        let matches = PasswordSecurityService::verify_password(&request.current_password, stored_hash)
            .map_err(|e| {
                warn!("Stored password hash for user {} is unreadable: {}", user.id, e);
                AccountError::IncorrectPassword
            })?;
        if !matches {
            return Err(AccountError::IncorrectPassword);
        }

        let new_hash = PasswordSecurityService::hash_password(&request.new_password)
            .map_err(|e| AccountError::HashingError(e.to_string()))?;

        let path = format!("/rest/v1/users?id=eq.{}", user.id);
        let updated: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({ "password_hash": new_hash })),
            Some(prefer_representation()),
        ).await.map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        if updated.is_empty() {
            return Err(AccountError::UserNotFound);
        }

        info!("Password changed for user {}", user.id);
        Ok(())
    }

    async fn find_credentials(&self, email: &str, auth_token: &str) -> Result<UserCredentials, AccountError> {
        let path = format!(
            "/rest/v1/users?select=id,email,password_hash&email=eq.{}",
            urlencoding::encode(email.trim())
        );
        let rows: Vec<UserCredentials> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        rows.into_iter().next().ok_or(AccountError::UserNotFound)
    }

    /// Client accounts, newest first. An empty page is not an error.
    pub async fn list_users(&self, query: &UserListQuery, auth_token: &str) -> Result<Page<UserSummary>, AccountError> {
        let (page, limit) = normalize_paging(query.page, query.limit, DEFAULT_USERS_PER_PAGE);
        debug!("Listing users: page {} limit {}", page, limit);

        let path = format!(
            "/rest/v1/users?select={}&role=eq.user&order=created_at.desc&offset={}&limit={}",
            USER_COLUMNS,
            offset_for(page, limit),
            limit
        );

        let response = self.supabase.request_with_status(
            Method::GET,
            &path,
            Some(auth_token),
            None,
            Some(prefer_exact_count()),
        ).await.map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        if !response.status.is_success() {
            return Err(AccountError::DatabaseError(format!(
                "User listing failed with status {}",
                response.status
            )));
        }

        let total = response.total_count();
        let users: Vec<UserSummary> = serde_json::from_value(response.body)
            .map_err(|e| AccountError::DatabaseError(format!("Failed to parse users: {}", e)))?;
        let total = total.unwrap_or_else(|| offset_for(page, limit) + users.len() as u64);

        Ok(Page::new(users, total, page, limit))
    }

    pub async fn user_notifications(&self, user_id: Uuid, auth_token: &str) -> Result<Vec<Notification>, AccountError> {
        let path = format!("/rest/v1/notifications?user_id=eq.{}&order=created_at.desc", user_id);
        let mut notifications: Vec<Notification> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }
}
