//! Authentication and authorization primitives.
//!
//! Two strategies feed the rest of the API: Basic credentials verified
//! against the stored argon2 hash, and signed bearer tokens carrying a
//! `{id, username}` snapshot with a 24 hour expiry. Token validation is a
//! pure function of the token, the clock and the signing secret; the bearer
//! strategy additionally re-fetches the user so tokens issued for accounts
//! deleted afterwards stop working.

use crate::{errors::ApiError, models::user::User};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

pub const TOKEN_VALIDITY_HOURS: i64 = 24;

/// Identity snapshot embedded in the token payload.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenUser {
    pub id: Uuid,
    pub username: String,
}

/// JWT claims: the user snapshot and a unix-seconds expiry.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub user: TokenUser,
    pub exp: i64,
}

/// Issues and validates bearer tokens and verifies Basic credentials.
///
/// The signing keys are derived once at startup from the process-wide
/// secret; the service holds no other mutable state.
#[derive(Clone)]
pub struct AuthService {
    db: Arc<SqlitePool>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(db: Arc<SqlitePool>, jwt_secret: &str) -> Self {
        Self {
            db,
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
        }
    }

    /// Basic strategy: look the user up by username and verify the password
    /// against the stored hash. Both failure modes collapse into the same
    /// undifferentiated error so usernames cannot be enumerated.
    pub async fn authenticate_basic(
        &self,
        username: &str,
        password: &str,
    ) -> Result<User, ApiError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, birth_date, contact_name, contact_email, contact_phone
             FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(ApiError::Authentication)?;

        verify_password(password, &user.password_hash)?;
        Ok(user)
    }

    /// Issue a signed token embedding `{id, username}`, valid for 24 hours.
    pub fn issue_token(&self, user: &User) -> Result<String, ApiError> {
        let exp = Utc::now() + Duration::hours(TOKEN_VALIDITY_HOURS);
        let claims = Claims {
            user: TokenUser {
                id: user.id,
                username: user.username.clone(),
            },
            exp: exp.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| ApiError::internal(format!("token signing failed: {err}")))
    }

    /// Verify signature and expiry. Expiry is checked by hand: a token whose
    /// `exp` equals the current second is already rejected, which is stricter
    /// than the library default.
    pub fn validate_token(&self, token: &str) -> Result<Claims, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims::<&str>(&[]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| ApiError::Authentication)?;

        if data.claims.exp <= Utc::now().timestamp() {
            return Err(ApiError::Authentication);
        }
        Ok(data.claims)
    }

    /// Bearer strategy: validate the token, then re-fetch the user by the
    /// embedded id and username pair rather than trusting the payload.
    pub async fn authenticate_bearer(&self, token: &str) -> Result<User, ApiError> {
        let claims = self.validate_token(token)?;

        sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, birth_date, contact_name, contact_email, contact_phone
             FROM users WHERE id = ? AND username = ?",
        )
        .bind(claims.user.id)
        .bind(&claims.user.username)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(ApiError::Authentication)
    }
}

/// Hash a plaintext secret with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::internal(format!("password hashing failed: {err}")))
}

fn verify_password(password: &str, hash: &str) -> Result<(), ApiError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| ApiError::internal(format!("stored password hash invalid: {err}")))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| ApiError::Authentication)
}

/// The single ownership predicate: the authenticated principal must be the
/// resource owner. Runs after the existence lookup (a missing resource
/// reports NotFound first) and before any mutation.
pub fn authorize(principal: &User, owner_id: Uuid) -> Result<(), ApiError> {
    if principal.id == owner_id {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_util::{memory_pool, seed_user};

    fn service(db: &Arc<SqlitePool>) -> AuthService {
        AuthService::new(db.clone(), "test-signing-secret")
    }

    #[tokio::test]
    async fn basic_auth_accepts_correct_credentials() {
        let db = memory_pool().await;
        let user = seed_user(&db, "mattimei", "MKO098UHB").await;
        let auth = service(&db);

        let found = auth.authenticate_basic("mattimei", "MKO098UHB").await.unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.username, "mattimei");
    }

    #[tokio::test]
    async fn basic_auth_rejects_wrong_password_and_unknown_user() {
        let db = memory_pool().await;
        seed_user(&db, "mattimei", "MKO098UHB").await;
        let auth = service(&db);

        let wrong = auth.authenticate_basic("mattimei", "nope").await;
        assert!(matches!(wrong, Err(ApiError::Authentication)));

        let unknown = auth.authenticate_basic("ghost", "MKO098UHB").await;
        assert!(matches!(unknown, Err(ApiError::Authentication)));
    }

    #[tokio::test]
    async fn token_round_trip_authenticates_same_user() {
        let db = memory_pool().await;
        let user = seed_user(&db, "mattimei", "MKO098UHB").await;
        let auth = service(&db);

        let token = auth.issue_token(&user).unwrap();
        let found = auth.authenticate_bearer(&token).await.unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn token_expiring_now_is_rejected_but_future_token_passes() {
        let db = memory_pool().await;
        let user = seed_user(&db, "mattimei", "MKO098UHB").await;
        let auth = service(&db);

        let claims_now = Claims {
            user: TokenUser {
                id: user.id,
                username: user.username.clone(),
            },
            exp: Utc::now().timestamp(),
        };
        let expired = encode(
            &Header::default(),
            &claims_now,
            &EncodingKey::from_secret(b"test-signing-secret"),
        )
        .unwrap();
        assert!(matches!(
            auth.validate_token(&expired),
            Err(ApiError::Authentication)
        ));

        let claims_future = Claims {
            exp: Utc::now().timestamp() + 2,
            ..claims_now
        };
        let valid = encode(
            &Header::default(),
            &claims_future,
            &EncodingKey::from_secret(b"test-signing-secret"),
        )
        .unwrap();
        assert!(auth.validate_token(&valid).is_ok());
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_is_rejected() {
        let db = memory_pool().await;
        let user = seed_user(&db, "mattimei", "MKO098UHB").await;
        let auth = service(&db);

        let forged = AuthService::new(db.clone(), "other-secret")
            .issue_token(&user)
            .unwrap();
        assert!(matches!(
            auth.validate_token(&forged),
            Err(ApiError::Authentication)
        ));
    }

    #[tokio::test]
    async fn token_for_deleted_account_stops_working() {
        let db = memory_pool().await;
        let user = seed_user(&db, "mattimei", "MKO098UHB").await;
        let auth = service(&db);
        let token = auth.issue_token(&user).unwrap();

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user.id)
            .execute(&*db)
            .await
            .unwrap();

        let result = auth.authenticate_bearer(&token).await;
        assert!(matches!(result, Err(ApiError::Authentication)));
    }

    #[tokio::test]
    async fn ownership_predicate_only_allows_the_owner() {
        let db = memory_pool().await;
        let owner = seed_user(&db, "owner", "pw-one-123").await;
        let other = seed_user(&db, "other", "pw-two-456").await;

        assert!(authorize(&owner, owner.id).is_ok());
        assert!(matches!(
            authorize(&other, owner.id),
            Err(ApiError::Unauthorized)
        ));
    }
}
