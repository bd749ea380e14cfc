//! Book and author catalogue operations.

use std::sync::Arc;

use thiserror::Error;

use crate::application::repos::{AuthorsRepo, BookSearch, BooksRepo, RepoError};
use crate::domain::entities::{AuthorDraft, AuthorRecord, BookDraft, BookRecord};
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error(transparent)]
    Repo(RepoError),
}

impl CatalogError {
    fn from_repo(entity: &'static str, err: RepoError) -> Self {
        match err {
            RepoError::NotFound => Self::NotFound(entity),
            other => Self::Repo(other),
        }
    }

    /// Book writes only reference authors, so an integrity failure there
    /// means the author id is unknown.
    fn from_book_write(err: RepoError) -> Self {
        match err {
            RepoError::Integrity { .. } => {
                Self::Invalid(DomainError::validation("author does not exist"))
            }
            other => Self::from_repo("book", other),
        }
    }
}

#[derive(Clone)]
pub struct CatalogService {
    books: Arc<dyn BooksRepo>,
    authors: Arc<dyn AuthorsRepo>,
}

impl CatalogService {
    pub fn new(books: Arc<dyn BooksRepo>, authors: Arc<dyn AuthorsRepo>) -> Self {
        Self { books, authors }
    }

    /// All books when `search` is empty, otherwise the filtered search.
    pub async fn books(&self, search: &BookSearch) -> Result<Vec<BookRecord>, CatalogError> {
        let result = if search.is_empty() {
            self.books.list_books().await
        } else {
            self.books.search_books(search).await
        };
        result.map_err(|err| CatalogError::from_repo("book", err))
    }

    pub async fn book(&self, id: i64) -> Result<BookRecord, CatalogError> {
        self.books
            .find_book(id)
            .await
            .map_err(|err| CatalogError::from_repo("book", err))?
            .ok_or(CatalogError::NotFound("book"))
    }

    pub async fn create_book(&self, draft: BookDraft) -> Result<BookRecord, CatalogError> {
        validate_book(&draft)?;
        self.books
            .create_book(&draft)
            .await
            .map_err(CatalogError::from_book_write)
    }

    pub async fn update_book(&self, id: i64, draft: BookDraft) -> Result<BookRecord, CatalogError> {
        validate_book(&draft)?;
        self.books
            .update_book(id, &draft)
            .await
            .map_err(CatalogError::from_book_write)
    }

    pub async fn delete_book(&self, id: i64) -> Result<(), CatalogError> {
        self.books
            .delete_book(id)
            .await
            .map_err(|err| CatalogError::from_repo("book", err))
    }

    pub async fn authors(&self) -> Result<Vec<AuthorRecord>, CatalogError> {
        self.authors
            .list_authors()
            .await
            .map_err(|err| CatalogError::from_repo("author", err))
    }

    pub async fn author(&self, id: i64) -> Result<AuthorRecord, CatalogError> {
        self.authors
            .find_author(id)
            .await
            .map_err(|err| CatalogError::from_repo("author", err))?
            .ok_or(CatalogError::NotFound("author"))
    }

    pub async fn create_author(&self, draft: AuthorDraft) -> Result<AuthorRecord, CatalogError> {
        validate_author(&draft)?;
        self.authors
            .create_author(&draft)
            .await
            .map_err(|err| CatalogError::from_repo("author", err))
    }

    pub async fn update_author(
        &self,
        id: i64,
        draft: AuthorDraft,
    ) -> Result<AuthorRecord, CatalogError> {
        validate_author(&draft)?;
        self.authors
            .update_author(id, &draft)
            .await
            .map_err(|err| CatalogError::from_repo("author", err))
    }

    pub async fn delete_author(&self, id: i64) -> Result<(), CatalogError> {
        self.authors
            .delete_author(id)
            .await
            .map_err(|err| CatalogError::from_repo("author", err))
    }
}

fn validate_book(draft: &BookDraft) -> Result<(), DomainError> {
    if draft.title.trim().is_empty() {
        return Err(DomainError::validation("title must not be empty"));
    }
    if !draft.price.is_finite() || draft.price < 0.0 {
        return Err(DomainError::validation("price must be a non-negative number"));
    }
    if draft.stock < 0 {
        return Err(DomainError::validation("stock must not be negative"));
    }
    if draft.genres.iter().any(|genre| genre.contains(',')) {
        return Err(DomainError::validation("genres must not contain commas"));
    }
    Ok(())
}

fn validate_author(draft: &AuthorDraft) -> Result<(), DomainError> {
    if draft.first_name.trim().is_empty() || draft.last_name.trim().is_empty() {
        return Err(DomainError::validation("author names must not be empty"));
    }
    Ok(())
}
