//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: i64,
    pub title: String,
    pub author: AuthorRecord,
    pub genres: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    pub price: f64,
    pub stock: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// One line of an order, carrying just enough of the book to report on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItemRecord {
    pub book_id: i64,
    pub title: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRecord {
    pub id: i64,
    pub customer: CustomerRecord,
    pub items: Vec<OrderItemRecord>,
    pub total_price: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
}

/// Fields accepted when creating or replacing a book.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BookDraft {
    pub title: String,
    pub author_id: i64,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    pub price: f64,
    pub stock: i32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthorDraft {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub bio: String,
}

/// Join genres into the single text column they are stored in.
pub fn join_genres(genres: &[String]) -> String {
    genres.join(",")
}

/// Split the stored genre column back into a list.
pub fn split_genres(stored: &str) -> Vec<String> {
    if stored.is_empty() {
        return Vec::new();
    }
    stored.split(',').map(str::to_string).collect()
}
