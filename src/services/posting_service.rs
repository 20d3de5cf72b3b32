//! Posting lifecycle: create with slug assignment, public reads, shallow
//! merge updates, owner-scoped deletion with image cascade, and public
//! filtered search with fixed-size pagination.

use crate::{
    errors::{ApiError, is_check_violation},
    models::{
        posting::{DeliveryTypes, Location, Posting, PostingView, Seller},
        user::User,
    },
};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use uuid::Uuid;

/// Fixed page size for search results.
pub const SEARCH_PAGE_SIZE: i64 = 10;

const SLUG_MAX_LEN: usize = 40;

const POSTING_COLUMNS: &str = "id, slug, title, description, category, country, city, postal_code, \
     asking_price, shipping, pickup, seller_id, created_at, updated_at";

/// Posting creation body. Required fields are validated by hand so the
/// caller gets a 400 with a description rather than a deserialization error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPosting {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<Location>,
    pub asking_price: Option<f64>,
    pub delivery_types: Option<DeliveryTypes>,
}

/// Partial update. Present fields replace the stored value wholesale,
/// nested objects included. `slug` has no field here on purpose: it can
/// never be overwritten, and an incoming `slug` key is silently dropped.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<Location>,
    pub asking_price: Option<f64>,
    pub delivery_types: Option<DeliveryTypes>,
}

/// Search filters, all optional and combined conjunctively.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub category: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    /// Inclusive lower bound over createdAt, as a UTC calendar date.
    pub start_date: Option<String>,
    /// Inclusive upper bound over createdAt, as a UTC calendar date.
    pub end_date: Option<String>,
    /// 1-based page number, default 1.
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub postings: Vec<PostingView>,
    pub page: i64,
}

#[derive(Clone)]
pub struct PostingService {
    db: Arc<SqlitePool>,
}

impl PostingService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Create a posting owned by `seller`.
    ///
    /// The delivery-type invariant is validated here and again by the table's
    /// CHECK constraint. The returned projection takes the seller's contact
    /// details from the request-time principal record, not a re-fetch.
    pub async fn create(&self, seller: &User, req: NewPosting) -> Result<PostingView, ApiError> {
        let title = req
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ApiError::validation("Title missing or in wrong format"))?;
        let delivery = req
            .delivery_types
            .filter(|d| d.is_valid())
            .ok_or_else(|| ApiError::validation("Posting must have a valid delivery type"))?;
        let description = req
            .description
            .ok_or_else(|| ApiError::validation("Incorrect request body"))?;
        let category = req
            .category
            .ok_or_else(|| ApiError::validation("Incorrect request body"))?;
        let location = req
            .location
            .ok_or_else(|| ApiError::validation("Incorrect request body"))?;
        let asking_price = req
            .asking_price
            .ok_or_else(|| ApiError::validation("Incorrect request body"))?;

        let slug = self.generate_slug(&title).await?;
        let now = Utc::now();
        let posting = Posting {
            id: Uuid::new_v4(),
            slug,
            title,
            description,
            category,
            country: location.country,
            city: location.city,
            postal_code: location.postal_code,
            asking_price,
            shipping: delivery.shipping,
            pickup: delivery.pickup,
            seller_id: seller.id,
            created_at: now,
            updated_at: now,
        };

        let insert = sqlx::query(
            "INSERT INTO postings (id, slug, title, description, category, country, city,
                                   postal_code, asking_price, shipping, pickup, seller_id,
                                   created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(posting.id)
        .bind(&posting.slug)
        .bind(&posting.title)
        .bind(&posting.description)
        .bind(&posting.category)
        .bind(&posting.country)
        .bind(&posting.city)
        .bind(&posting.postal_code)
        .bind(posting.asking_price)
        .bind(posting.shipping)
        .bind(posting.pickup)
        .bind(posting.seller_id)
        .bind(posting.created_at)
        .bind(posting.updated_at)
        .execute(&*self.db)
        .await;

        match insert {
            Ok(_) => Ok(posting.view(
                Seller {
                    contact_information: seller.contact_information(),
                    id: seller.id,
                },
                Vec::new(),
            )),
            Err(err) if is_check_violation(&err) => Err(ApiError::validation(
                "Posting must have a valid delivery type",
            )),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Posting, ApiError> {
        sqlx::query_as::<_, Posting>(&format!(
            "SELECT {POSTING_COLUMNS} FROM postings WHERE slug = ?"
        ))
        .bind(slug)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(ApiError::NotFound("Posting not found"))
    }

    /// Build the normalized projection: seller shown as contact details and
    /// id only, plus the ordered image id list.
    pub async fn view(&self, posting: &Posting) -> Result<PostingView, ApiError> {
        let seller = self
            .seller_projection(posting)
            .await?
            // Seller row gone mid-cascade; treat the posting as gone too.
            .ok_or(ApiError::NotFound("Posting not found"))?;
        let images = self.image_ids(posting.id).await?;
        Ok(posting.view(seller, images))
    }

    /// Shallow merge of the patch onto the stored posting. Nested objects
    /// (location, deliveryTypes) are replaced as a whole; the delivery
    /// invariant is re-validated on the merged result; updatedAt is bumped.
    pub async fn update(
        &self,
        posting: Posting,
        patch: PostingPatch,
    ) -> Result<PostingView, ApiError> {
        let mut posting = posting;

        if let Some(title) = patch.title {
            posting.title = title;
        }
        if let Some(description) = patch.description {
            posting.description = description;
        }
        if let Some(category) = patch.category {
            posting.category = category;
        }
        if let Some(location) = patch.location {
            posting.country = location.country;
            posting.city = location.city;
            posting.postal_code = location.postal_code;
        }
        if let Some(asking_price) = patch.asking_price {
            posting.asking_price = asking_price;
        }
        if let Some(delivery) = patch.delivery_types {
            posting.shipping = delivery.shipping;
            posting.pickup = delivery.pickup;
        }

        if !posting.delivery_types().is_valid() {
            return Err(ApiError::validation(
                "Posting must have a valid delivery type",
            ));
        }

        posting.updated_at = Utc::now();

        let update = sqlx::query(
            "UPDATE postings SET title = ?, description = ?, category = ?, country = ?,
                    city = ?, postal_code = ?, asking_price = ?, shipping = ?, pickup = ?,
                    updated_at = ?
             WHERE id = ?",
        )
        .bind(&posting.title)
        .bind(&posting.description)
        .bind(&posting.category)
        .bind(&posting.country)
        .bind(&posting.city)
        .bind(&posting.postal_code)
        .bind(posting.asking_price)
        .bind(posting.shipping)
        .bind(posting.pickup)
        .bind(posting.updated_at)
        .bind(posting.id)
        .execute(&*self.db)
        .await;

        match update {
            Ok(_) => self.view(&posting).await,
            Err(err) if is_check_violation(&err) => Err(ApiError::validation(
                "Posting must have a valid delivery type",
            )),
            Err(err) => Err(err.into()),
        }
    }

    /// Delete the posting, then cascade into its images.
    ///
    /// The image sweep is a separate best-effort statement: a crash in
    /// between leaves orphaned image rows. Accepted, so the failure is
    /// logged rather than surfaced once the posting itself is gone.
    pub async fn delete(&self, posting: &Posting) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM postings WHERE id = ?")
            .bind(posting.id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Posting not found"));
        }

        if let Err(err) = sqlx::query("DELETE FROM images WHERE posting_id = ?")
            .bind(posting.id)
            .execute(&*self.db)
            .await
        {
            tracing::warn!(
                "image cascade failed for deleted posting {}: {}",
                posting.slug,
                err
            );
        }

        Ok(())
    }

    /// Public search. Filters are conjunctive; dates are inclusive UTC
    /// calendar-date bounds over createdAt; ordering is creation order so
    /// pagination stays stable.
    pub async fn search(&self, filters: SearchFilters) -> Result<SearchResult, ApiError> {
        let page = filters.page.unwrap_or(1);
        if page < 1 {
            return Err(ApiError::validation("Page must be 1 or greater"));
        }

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {POSTING_COLUMNS} FROM postings WHERE 1 = 1"
        ));

        if let Some(category) = &filters.category {
            builder.push(" AND category = ");
            builder.push_bind(category);
        }
        if let Some(city) = &filters.city {
            builder.push(" AND city = ");
            builder.push_bind(city);
        }
        if let Some(country) = &filters.country {
            builder.push(" AND country = ");
            builder.push_bind(country);
        }
        if let Some(start) = &filters.start_date {
            let day = parse_filter_date(start)?;
            builder.push(" AND created_at >= ");
            builder.push_bind(day.and_time(NaiveTime::MIN).and_utc());
        }
        if let Some(end) = &filters.end_date {
            let day = parse_filter_date(end)?;
            let next = day
                .succ_opt()
                .ok_or_else(|| ApiError::validation("Date out of range"))?;
            builder.push(" AND created_at < ");
            builder.push_bind(next.and_time(NaiveTime::MIN).and_utc());
        }

        builder.push(" ORDER BY created_at ASC, id ASC LIMIT ");
        builder.push_bind(SEARCH_PAGE_SIZE);
        builder.push(" OFFSET ");
        builder.push_bind((page - 1) * SEARCH_PAGE_SIZE);

        let rows: Vec<Posting> = builder.build_query_as().fetch_all(&*self.db).await?;

        let mut postings = Vec::with_capacity(rows.len());
        for posting in &rows {
            // Skip rows dangling from an interrupted user-deletion cascade.
            if let Some(seller) = self.seller_projection(posting).await? {
                let images = self.image_ids(posting.id).await?;
                postings.push(posting.view(seller, images));
            }
        }

        Ok(SearchResult { postings, page })
    }

    async fn seller_projection(&self, posting: &Posting) -> Result<Option<Seller>, ApiError> {
        let seller = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, birth_date, contact_name, contact_email, contact_phone
             FROM users WHERE id = ?",
        )
        .bind(posting.seller_id)
        .fetch_optional(&*self.db)
        .await?;

        Ok(seller.map(|user| Seller {
            contact_information: user.contact_information(),
            id: user.id,
        }))
    }

    async fn image_ids(&self, posting_id: Uuid) -> Result<Vec<Uuid>, ApiError> {
        Ok(sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM images WHERE posting_id = ? ORDER BY position ASC, created_at ASC",
        )
        .bind(posting_id)
        .fetch_all(&*self.db)
        .await?)
    }

    /// Derive a slug from the title: slugified, capped at 40 characters,
    /// uuid-suffixed when the candidate is already taken.
    async fn generate_slug(&self, title: &str) -> Result<String, ApiError> {
        let mut candidate = slug::slugify(title);
        candidate.truncate(SLUG_MAX_LEN);
        let candidate = candidate.trim_end_matches('-').to_string();
        let candidate = if candidate.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            candidate
        };

        let taken = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM postings WHERE slug = ?")
            .bind(&candidate)
            .fetch_one(&*self.db)
            .await?;

        if taken > 0 {
            Ok(format!("{}-{}", candidate, Uuid::new_v4()))
        } else {
            Ok(candidate)
        }
    }
}

fn parse_filter_date(value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ApiError::validation("Dates must be in YYYY-MM-DD format"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_util::{memory_pool, seed_user};
    use std::time::Duration;

    fn new_posting(title: &str, category: &str, city: &str, country: &str) -> NewPosting {
        NewPosting {
            title: Some(title.to_string()),
            description: Some("Lightly used, works fine".to_string()),
            category: Some(category.to_string()),
            location: Some(Location {
                country: country.to_string(),
                city: city.to_string(),
                postal_code: Some("90100".to_string()),
            }),
            asking_price: Some(250.0),
            delivery_types: Some(DeliveryTypes {
                shipping: true,
                pickup: false,
            }),
        }
    }

    #[tokio::test]
    async fn create_and_read_back_by_slug() {
        let db = memory_pool().await;
        let seller = seed_user(&db, "seller", "MKO098UHB").await;
        let service = PostingService::new(db);

        let created = service
            .create(&seller, new_posting("Hybrid bike 28\"", "cycling", "Oulu", "FI"))
            .await
            .unwrap();
        assert_eq!(created.slug, "hybrid-bike-28");
        assert_eq!(created.seller.id, seller.id);
        assert_eq!(created.seller.contact_information.name, seller.contact_name);
        assert!(created.images.is_empty());

        let fetched = service.get_by_slug(&created.slug).await.unwrap();
        let view = service.view(&fetched).await.unwrap();
        assert_eq!(view.title, created.title);
        assert_eq!(view.description, created.description);
        assert_eq!(view.category, created.category);
        assert_eq!(view.location, created.location);
        assert_eq!(view.asking_price, created.asking_price);
        assert_eq!(view.delivery_types, created.delivery_types);
        assert_eq!(view.id, created.id);
    }

    #[tokio::test]
    async fn rejects_missing_title_and_invalid_delivery_types() {
        let db = memory_pool().await;
        let seller = seed_user(&db, "seller", "MKO098UHB").await;
        let service = PostingService::new(db);

        let mut no_title = new_posting("x", "cycling", "Oulu", "FI");
        no_title.title = None;
        assert!(matches!(
            service.create(&seller, no_title).await,
            Err(ApiError::Validation(_))
        ));

        let mut no_delivery = new_posting("Bike", "cycling", "Oulu", "FI");
        no_delivery.delivery_types = Some(DeliveryTypes {
            shipping: false,
            pickup: false,
        });
        assert!(matches!(
            service.create(&seller, no_delivery).await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn slug_collision_gets_a_suffix() {
        let db = memory_pool().await;
        let seller = seed_user(&db, "seller", "MKO098UHB").await;
        let service = PostingService::new(db);

        let first = service
            .create(&seller, new_posting("Old sofa", "furniture", "Oulu", "FI"))
            .await
            .unwrap();
        let second = service
            .create(&seller, new_posting("Old sofa", "furniture", "Oulu", "FI"))
            .await
            .unwrap();

        assert_eq!(first.slug, "old-sofa");
        assert_ne!(second.slug, first.slug);
        assert!(second.slug.starts_with("old-sofa-"));
    }

    #[tokio::test]
    async fn partial_update_merges_and_bumps_updated_at() {
        let db = memory_pool().await;
        let seller = seed_user(&db, "seller", "MKO098UHB").await;
        let service = PostingService::new(db);

        let created = service
            .create(&seller, new_posting("Old sofa", "furniture", "Oulu", "FI"))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;

        let posting = service.get_by_slug(&created.slug).await.unwrap();
        let updated = service
            .update(
                posting,
                PostingPatch {
                    asking_price: Some(180.0),
                    ..PostingPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.asking_price, 180.0);
        assert_eq!(updated.title, created.title);
        assert_eq!(updated.location, created.location);
        assert!(updated.updated_at > updated.created_at);
    }

    #[tokio::test]
    async fn slug_key_in_patch_body_is_dropped() {
        let db = memory_pool().await;
        let seller = seed_user(&db, "seller", "MKO098UHB").await;
        let service = PostingService::new(db);

        let created = service
            .create(&seller, new_posting("Old sofa", "furniture", "Oulu", "FI"))
            .await
            .unwrap();

        let patch: PostingPatch = serde_json::from_value(serde_json::json!({
            "slug": "hijacked",
            "title": "Older sofa"
        }))
        .unwrap();

        let posting = service.get_by_slug(&created.slug).await.unwrap();
        let updated = service.update(posting, patch).await.unwrap();
        assert_eq!(updated.slug, "old-sofa");
        assert_eq!(updated.title, "Older sofa");
        assert!(service.get_by_slug("hijacked").await.is_err());
    }

    #[tokio::test]
    async fn update_cannot_clear_both_delivery_flags() {
        let db = memory_pool().await;
        let seller = seed_user(&db, "seller", "MKO098UHB").await;
        let service = PostingService::new(db);

        let created = service
            .create(&seller, new_posting("Old sofa", "furniture", "Oulu", "FI"))
            .await
            .unwrap();
        let posting = service.get_by_slug(&created.slug).await.unwrap();

        let result = service
            .update(
                posting,
                PostingPatch {
                    delivery_types: Some(DeliveryTypes {
                        shipping: false,
                        pickup: false,
                    }),
                    ..PostingPatch::default()
                },
            )
            .await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn search_filters_are_conjunctive() {
        let db = memory_pool().await;
        let seller = seed_user(&db, "seller", "MKO098UHB").await;
        let service = PostingService::new(db);

        service
            .create(&seller, new_posting("Hybrid bike", "cycling", "Oulu", "FI"))
            .await
            .unwrap();
        service
            .create(&seller, new_posting("Road bike", "cycling", "Helsinki", "FI"))
            .await
            .unwrap();
        service
            .create(&seller, new_posting("Sofa", "furniture", "Oulu", "FI"))
            .await
            .unwrap();

        let result = service
            .search(SearchFilters {
                country: Some("FI".to_string()),
                city: Some("Oulu".to_string()),
                category: Some("cycling".to_string()),
                ..SearchFilters::default()
            })
            .await
            .unwrap();

        assert_eq!(result.postings.len(), 1);
        assert_eq!(result.postings[0].title, "Hybrid bike");
        assert_eq!(result.page, 1);
    }

    #[tokio::test]
    async fn page_beyond_results_is_empty_but_echoes_page() {
        let db = memory_pool().await;
        let seller = seed_user(&db, "seller", "MKO098UHB").await;
        let service = PostingService::new(db);

        service
            .create(&seller, new_posting("Sofa", "furniture", "Oulu", "FI"))
            .await
            .unwrap();

        let result = service
            .search(SearchFilters {
                page: Some(2),
                ..SearchFilters::default()
            })
            .await
            .unwrap();
        assert!(result.postings.is_empty());
        assert_eq!(result.page, 2);
    }

    #[tokio::test]
    async fn pagination_is_stable_in_creation_order() {
        let db = memory_pool().await;
        let seller = seed_user(&db, "seller", "MKO098UHB").await;
        let service = PostingService::new(db);

        for i in 0..12 {
            service
                .create(&seller, new_posting(&format!("Item {i}"), "misc", "Oulu", "FI"))
                .await
                .unwrap();
        }

        let first = service.search(SearchFilters::default()).await.unwrap();
        assert_eq!(first.postings.len(), 10);
        assert_eq!(first.postings[0].title, "Item 0");

        let second = service
            .search(SearchFilters {
                page: Some(2),
                ..SearchFilters::default()
            })
            .await
            .unwrap();
        assert_eq!(second.postings.len(), 2);
        assert_eq!(second.postings[0].title, "Item 10");
    }

    #[tokio::test]
    async fn malformed_date_filter_fails_validation() {
        let db = memory_pool().await;
        let service = PostingService::new(db);

        let result = service
            .search(SearchFilters {
                start_date: Some("not-a-date".to_string()),
                ..SearchFilters::default()
            })
            .await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn date_range_is_inclusive_of_both_ends() {
        let db = memory_pool().await;
        let seller = seed_user(&db, "seller", "MKO098UHB").await;
        let service = PostingService::new(db);

        service
            .create(&seller, new_posting("Sofa", "furniture", "Oulu", "FI"))
            .await
            .unwrap();

        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        let result = service
            .search(SearchFilters {
                start_date: Some(today.clone()),
                end_date: Some(today),
                ..SearchFilters::default()
            })
            .await
            .unwrap();
        assert_eq!(result.postings.len(), 1);
    }

    #[tokio::test]
    async fn delete_cascades_to_images() {
        let db = memory_pool().await;
        let seller = seed_user(&db, "seller", "MKO098UHB").await;
        let service = PostingService::new(db.clone());
        let images = crate::services::image_service::ImageService::new(db.clone());

        let created = service
            .create(&seller, new_posting("Sofa", "furniture", "Oulu", "FI"))
            .await
            .unwrap();
        let posting = service.get_by_slug(&created.slug).await.unwrap();
        let image_id = images
            .attach(&posting, None, "image/jpeg".to_string(), vec![1, 2, 3])
            .await
            .unwrap();

        service.delete(&posting).await.unwrap();
        assert!(matches!(
            service.get_by_slug(&created.slug).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            images.get(image_id).await,
            Err(ApiError::NotFound(_))
        ));
    }
}
