//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::{
    AuthorDraft, AuthorRecord, BookDraft, BookRecord, OrderRecord, UserRecord,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Filters accepted by the book search.
///
/// `title` and `author` are matched case-insensitively against the whole
/// title and the author's first name; `genre` matches any substring of the
/// stored genre list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookSearch {
    pub title: String,
    pub author: String,
    pub genre: String,
}

impl BookSearch {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.author.is_empty() && self.genre.is_empty()
    }
}

#[async_trait]
pub trait BooksRepo: Send + Sync {
    async fn list_books(&self) -> Result<Vec<BookRecord>, RepoError>;

    async fn search_books(&self, search: &BookSearch) -> Result<Vec<BookRecord>, RepoError>;

    async fn find_book(&self, id: i64) -> Result<Option<BookRecord>, RepoError>;

    async fn create_book(&self, draft: &BookDraft) -> Result<BookRecord, RepoError>;

    /// Replace every field of book `id`; `NotFound` when it does not exist.
    async fn update_book(&self, id: i64, draft: &BookDraft) -> Result<BookRecord, RepoError>;

    async fn delete_book(&self, id: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait AuthorsRepo: Send + Sync {
    async fn list_authors(&self) -> Result<Vec<AuthorRecord>, RepoError>;

    async fn find_author(&self, id: i64) -> Result<Option<AuthorRecord>, RepoError>;

    async fn create_author(&self, draft: &AuthorDraft) -> Result<AuthorRecord, RepoError>;

    async fn update_author(&self, id: i64, draft: &AuthorDraft)
    -> Result<AuthorRecord, RepoError>;

    async fn delete_author(&self, id: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    /// Insert a user; `Duplicate` when the email is already registered.
    async fn create_user(&self, email: &str, password_hash: &str)
    -> Result<UserRecord, RepoError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError>;
}

#[async_trait]
pub trait OrdersRepo: Send + Sync {
    /// Orders created within `[start, end]`, each with its items and customer.
    async fn orders_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<OrderRecord>, RepoError>;
}
