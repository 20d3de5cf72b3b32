//! User accounts: registration, profile reads and updates, and the
//! cascading deletion of a user's postings and their images.

use crate::{
    errors::{ApiError, is_unique_violation},
    models::{posting::Posting, user::User},
    services::auth_service::hash_password,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Registration request body.
///
/// All fields are optional at the type level so a missing field becomes a
/// 400 with a message instead of a deserialization rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: Option<String>,
    pub password: Option<String>,
    pub birth_date: Option<String>,
    pub contact_information: Option<ContactFields>,
}

/// Contact block used by both registration and profile patches.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactFields {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

/// Partial profile update. Top-level fields replace wholesale; the contact
/// block merges field by field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub username: Option<String>,
    pub password: Option<String>,
    pub birth_date: Option<String>,
    pub contact_information: Option<ContactFields>,
}

#[derive(Clone)]
pub struct UserService {
    db: Arc<SqlitePool>,
}

impl UserService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Register a new account. The secret is hashed at write time and the
    /// returned row is the only place the hash ever lives.
    pub async fn create(&self, req: NewUser) -> Result<User, ApiError> {
        let username = required(req.username)?;
        let password = required(req.password)?;
        let birth_date = required(req.birth_date)?;
        let contact = req
            .contact_information
            .ok_or_else(|| ApiError::validation("Incorrect request body"))?;
        let contact_name = required(contact.name)?;

        if contact.email.is_none() && contact.phone_number.is_none() {
            return Err(ApiError::validation(
                "Contact information must include an email or a phone number",
            ));
        }

        let taken = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(&username)
            .fetch_one(&*self.db)
            .await?;
        if taken > 0 {
            return Err(ApiError::Conflict);
        }

        let user = User {
            id: Uuid::new_v4(),
            username,
            password_hash: hash_password(&password)?,
            birth_date,
            contact_name,
            contact_email: contact.email,
            contact_phone: contact.phone_number,
        };

        let insert = sqlx::query(
            "INSERT INTO users (id, username, password_hash, birth_date, contact_name, contact_email, contact_phone)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.birth_date)
        .bind(&user.contact_name)
        .bind(&user.contact_email)
        .bind(&user.contact_phone)
        .execute(&*self.db)
        .await;

        match insert {
            Ok(_) => Ok(user),
            // Lost the race against a concurrent registration.
            Err(err) if is_unique_violation(&err) => Err(ApiError::Conflict),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, birth_date, contact_name, contact_email, contact_phone
             FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(ApiError::NotFound("User not found"))
    }

    /// Shallow merge of the patch onto the stored row. The contact block is
    /// the one nested structure that merges per field instead of being
    /// replaced wholesale. A password change re-hashes; nothing else touches
    /// the hash.
    pub async fn update(&self, user: User, patch: UserPatch) -> Result<User, ApiError> {
        let mut user = user;

        if let Some(username) = patch.username {
            user.username = username;
        }
        if let Some(password) = patch.password {
            user.password_hash = hash_password(&password)?;
        }
        if let Some(birth_date) = patch.birth_date {
            user.birth_date = birth_date;
        }
        if let Some(contact) = patch.contact_information {
            if let Some(name) = contact.name {
                user.contact_name = name;
            }
            if let Some(email) = contact.email {
                user.contact_email = Some(email);
            }
            if let Some(phone) = contact.phone_number {
                user.contact_phone = Some(phone);
            }
        }

        let update = sqlx::query(
            "UPDATE users SET username = ?, password_hash = ?, birth_date = ?,
                    contact_name = ?, contact_email = ?, contact_phone = ?
             WHERE id = ?",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.birth_date)
        .bind(&user.contact_name)
        .bind(&user.contact_email)
        .bind(&user.contact_phone)
        .bind(user.id)
        .execute(&*self.db)
        .await;

        match update {
            Ok(_) => Ok(user),
            Err(err) if is_unique_violation(&err) => Err(ApiError::Conflict),
            Err(err) => Err(err.into()),
        }
    }

    /// Delete the account and cascade into owned postings and their images.
    ///
    /// Three separate statements, no transaction: a crash between them can
    /// leave orphaned posting or image rows. Accepted, consistent with the
    /// rest of the cascade design.
    pub async fn delete(&self, user: &User) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user.id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("User not found"));
        }

        // Images first while the postings subquery still resolves.
        sqlx::query(
            "DELETE FROM images WHERE posting_id IN (SELECT id FROM postings WHERE seller_id = ?)",
        )
        .bind(user.id)
        .execute(&*self.db)
        .await?;

        sqlx::query("DELETE FROM postings WHERE seller_id = ?")
            .bind(user.id)
            .execute(&*self.db)
            .await?;

        Ok(())
    }

    /// Postings owned by the given user, in creation order.
    pub async fn list_postings(&self, user_id: Uuid) -> Result<Vec<Posting>, ApiError> {
        Ok(sqlx::query_as::<_, Posting>(
            "SELECT id, slug, title, description, category, country, city, postal_code,
                    asking_price, shipping, pickup, seller_id, created_at, updated_at
             FROM postings WHERE seller_id = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&*self.db)
        .await?)
    }

    /// A single posting, but only if the given user owns it.
    pub async fn get_posting(&self, user_id: Uuid, slug: &str) -> Result<Posting, ApiError> {
        sqlx::query_as::<_, Posting>(
            "SELECT id, slug, title, description, category, country, city, postal_code,
                    asking_price, shipping, pickup, seller_id, created_at, updated_at
             FROM postings WHERE seller_id = ? AND slug = ?",
        )
        .bind(user_id)
        .bind(slug)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(ApiError::NotFound("Posting not found"))
    }
}

fn required(field: Option<String>) -> Result<String, ApiError> {
    field
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::validation("Incorrect request body"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_util::{memory_pool, seed_user};

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: Some(username.to_string()),
            password: Some("MKO098UHB".to_string()),
            birth_date: Some("1999-02-20".to_string()),
            contact_information: Some(ContactFields {
                name: Some("Matti Meikäläinen".to_string()),
                email: Some("matti.m@mail.com".to_string()),
                phone_number: None,
            }),
        }
    }

    #[tokio::test]
    async fn registration_round_trip_and_no_secret_in_projection() {
        let db = memory_pool().await;
        let service = UserService::new(db);

        let user = service.create(new_user("mattimei")).await.unwrap();
        assert_eq!(user.username, "mattimei");

        let json = serde_json::to_string(&user.public()).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains(&user.password_hash));
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let db = memory_pool().await;
        let service = UserService::new(db);

        service.create(new_user("mattimei")).await.unwrap();
        let second = service.create(new_user("mattimei")).await;
        assert!(matches!(second, Err(ApiError::Conflict)));
    }

    #[tokio::test]
    async fn contact_info_requires_email_or_phone() {
        let db = memory_pool().await;
        let service = UserService::new(db);

        let mut req = new_user("mattimei");
        req.contact_information = Some(ContactFields {
            name: Some("Matti Meikäläinen".to_string()),
            email: None,
            phone_number: None,
        });
        assert!(matches!(
            service.create(req).await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn missing_required_fields_fail_validation() {
        let db = memory_pool().await;
        let service = UserService::new(db);

        let mut req = new_user("mattimei");
        req.password = None;
        assert!(matches!(
            service.create(req).await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn patch_merges_contact_fields_individually() {
        let db = memory_pool().await;
        let service = UserService::new(db.clone());
        let user = seed_user(&db, "mattimei", "MKO098UHB").await;

        let updated = service
            .update(
                user.clone(),
                UserPatch {
                    contact_information: Some(ContactFields {
                        name: None,
                        email: Some("new.address@mail.com".to_string()),
                        phone_number: None,
                    }),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap();

        // Email replaced, the rest of the contact block untouched.
        assert_eq!(updated.contact_email.as_deref(), Some("new.address@mail.com"));
        assert_eq!(updated.contact_name, user.contact_name);
        assert_eq!(updated.contact_phone, user.contact_phone);
        assert_eq!(updated.birth_date, user.birth_date);
    }

    #[tokio::test]
    async fn deleting_a_user_cascades_to_postings_and_images() {
        use crate::models::posting::{DeliveryTypes, Location};
        use crate::services::image_service::ImageService;
        use crate::services::posting_service::{NewPosting, PostingService};

        let db = memory_pool().await;
        let service = UserService::new(db.clone());
        let postings = PostingService::new(db.clone());
        let images = ImageService::new(db.clone());
        let user = seed_user(&db, "mattimei", "MKO098UHB").await;

        let mut slugs = Vec::new();
        for title in ["Old sofa", "Hybrid bike"] {
            let view = postings
                .create(
                    &user,
                    NewPosting {
                        title: Some(title.to_string()),
                        description: Some("desc".to_string()),
                        category: Some("misc".to_string()),
                        location: Some(Location {
                            country: "FI".to_string(),
                            city: "Oulu".to_string(),
                            postal_code: None,
                        }),
                        asking_price: Some(10.0),
                        delivery_types: Some(DeliveryTypes {
                            shipping: true,
                            pickup: false,
                        }),
                    },
                )
                .await
                .unwrap();
            slugs.push(view.slug);
        }
        let first = postings.get_by_slug(&slugs[0]).await.unwrap();
        let image_id = images
            .attach(&first, None, "image/png".to_string(), vec![1])
            .await
            .unwrap();

        service.delete(&user).await.unwrap();

        assert!(service.list_postings(user.id).await.unwrap().is_empty());
        for slug in &slugs {
            assert!(matches!(
                postings.get_by_slug(slug).await,
                Err(ApiError::NotFound(_))
            ));
        }
        assert!(matches!(
            images.get(image_id).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            service.get(user.id).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn password_change_rehashes_and_old_secret_stops_working() {
        let db = memory_pool().await;
        let service = UserService::new(db.clone());
        let user = seed_user(&db, "mattimei", "MKO098UHB").await;
        let old_hash = user.password_hash.clone();

        let updated = service
            .update(
                user,
                UserPatch {
                    password: Some("fresh-secret-42".to_string()),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap();
        assert_ne!(updated.password_hash, old_hash);

        let auth = crate::services::auth_service::AuthService::new(db, "s");
        assert!(auth.authenticate_basic("mattimei", "fresh-secret-42").await.is_ok());
        assert!(matches!(
            auth.authenticate_basic("mattimei", "MKO098UHB").await,
            Err(ApiError::Authentication)
        ));
    }
}
