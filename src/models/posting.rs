//! Represents a sale posting and its normalized JSON projection.

use crate::models::user::ContactInformation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A posting row. Location and delivery flags are flattened into columns;
/// the nested JSON shapes are rebuilt by [`Posting::location`] and
/// [`Posting::delivery_types`].
#[derive(Clone, FromRow, Debug)]
pub struct Posting {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Unique URL-safe identifier derived from the title. Immutable.
    pub slug: String,

    pub title: String,
    pub description: String,
    pub category: String,

    pub country: String,
    pub city: String,
    pub postal_code: Option<String>,

    pub asking_price: f64,

    /// Delivery flags. The schema enforces shipping OR pickup via CHECK.
    pub shipping: bool,
    pub pickup: bool,

    /// Owning user. Immutable after creation.
    pub seller_id: Uuid,

    pub created_at: DateTime<Utc>,

    /// Bumped on every successful mutation.
    pub updated_at: DateTime<Utc>,
}

/// Where the item is located.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub country: String,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

/// How the item can change hands. At least one flag must be true.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryTypes {
    pub shipping: bool,
    pub pickup: bool,
}

impl DeliveryTypes {
    pub fn is_valid(self) -> bool {
        self.shipping || self.pickup
    }
}

/// Seller projection embedded in posting responses: contact details and id
/// only, never the username, birth date or secret.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Seller {
    pub contact_information: ContactInformation,
    pub id: Uuid,
}

/// Normalized posting shape returned by create/read/update/search.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PostingView {
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: Location,
    pub asking_price: f64,
    pub delivery_types: DeliveryTypes,
    pub seller: Seller,
    pub images: Vec<Uuid>,
    pub slug: String,
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Posting {
    pub fn location(&self) -> Location {
        Location {
            country: self.country.clone(),
            city: self.city.clone(),
            postal_code: self.postal_code.clone(),
        }
    }

    pub fn delivery_types(&self) -> DeliveryTypes {
        DeliveryTypes {
            shipping: self.shipping,
            pickup: self.pickup,
        }
    }

    pub fn view(&self, seller: Seller, images: Vec<Uuid>) -> PostingView {
        PostingView {
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            location: self.location(),
            asking_price: self.asking_price,
            delivery_types: self.delivery_types(),
            seller,
            images,
            slug: self.slug.clone(),
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
