//! Represents a registered account and its public projections.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered user as stored in the database.
///
/// The password hash never leaves this struct; API responses go through
/// [`UserPublic`].
#[derive(Clone, FromRow, Debug)]
pub struct User {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Globally unique login name.
    pub username: String,

    /// Argon2 hash of the account secret. Never serialized.
    pub password_hash: String,

    /// Birth date as submitted (plain string, not validated as a date).
    pub birth_date: String,

    /// Display name shown to buyers. Required.
    pub contact_name: String,

    /// Optional contact email. At least one of email/phone is present.
    pub contact_email: Option<String>,

    /// Optional contact phone number.
    pub contact_phone: Option<String>,
}

/// Contact details nested under `contactInformation` in the JSON surface.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContactInformation {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// Public projection of a user returned by registration and profile reads.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserPublic {
    pub username: String,
    pub birth_date: String,
    pub contact_information: ContactInformation,
    pub id: Uuid,
}

impl User {
    pub fn contact_information(&self) -> ContactInformation {
        ContactInformation {
            name: self.contact_name.clone(),
            email: self.contact_email.clone(),
            phone_number: self.contact_phone.clone(),
        }
    }

    pub fn public(&self) -> UserPublic {
        UserPublic {
            username: self.username.clone(),
            birth_date: self.birth_date.clone(),
            contact_information: self.contact_information(),
            id: self.id,
        }
    }
}
