use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{BookSearch, BooksRepo, RepoError},
    domain::entities::{AuthorRecord, BookDraft, BookRecord, join_genres, split_genres},
};

use super::{PostgresRepositories, map_sqlx_error};

const BOOK_SELECT: &str = r#"
    SELECT b.id, b.title, b.genres, b.published_at, b.price, b.stock,
           a.id AS author_id, a.first_name AS author_first_name,
           a.last_name AS author_last_name, a.bio AS author_bio
"#;

#[derive(sqlx::FromRow)]
struct BookRow {
    id: i64,
    title: String,
    genres: String,
    published_at: OffsetDateTime,
    price: f64,
    stock: i32,
    author_id: i64,
    author_first_name: String,
    author_last_name: String,
    author_bio: String,
}

impl From<BookRow> for BookRecord {
    fn from(row: BookRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            author: AuthorRecord {
                id: row.author_id,
                first_name: row.author_first_name,
                last_name: row.author_last_name,
                bio: row.author_bio,
            },
            genres: split_genres(&row.genres),
            published_at: row.published_at,
            price: row.price,
            stock: row.stock,
        }
    }
}

#[async_trait]
impl BooksRepo for PostgresRepositories {
    async fn list_books(&self) -> Result<Vec<BookRecord>, RepoError> {
        let sql = format!(
            "{BOOK_SELECT} FROM books b JOIN authors a ON b.author_id = a.id ORDER BY b.id"
        );
        let rows = sqlx::query_as::<_, BookRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(BookRecord::from).collect())
    }

    async fn search_books(&self, search: &BookSearch) -> Result<Vec<BookRecord>, RepoError> {
        let sql = format!(
            r#"{BOOK_SELECT}
            FROM books b
            JOIN authors a ON b.author_id = a.id
            WHERE ($1 = '' OR b.title ILIKE $1)
              AND ($2 = '' OR a.first_name ILIKE $2)
              AND b.genres ILIKE $3
            ORDER BY b.title
            "#
        );
        let rows = sqlx::query_as::<_, BookRow>(&sql)
            .bind(&search.title)
            .bind(&search.author)
            .bind(format!("%{}%", search.genre))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(BookRecord::from).collect())
    }

    async fn find_book(&self, id: i64) -> Result<Option<BookRecord>, RepoError> {
        let sql = format!(
            "{BOOK_SELECT} FROM books b JOIN authors a ON b.author_id = a.id WHERE b.id = $1"
        );
        let row = sqlx::query_as::<_, BookRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(BookRecord::from))
    }

    async fn create_book(&self, draft: &BookDraft) -> Result<BookRecord, RepoError> {
        let sql = format!(
            r#"
            WITH b AS (
                INSERT INTO books (title, author_id, genres, published_at, price, stock)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            {BOOK_SELECT} FROM b JOIN authors a ON b.author_id = a.id
            "#
        );
        let row = sqlx::query_as::<_, BookRow>(&sql)
            .bind(&draft.title)
            .bind(draft.author_id)
            .bind(join_genres(&draft.genres))
            .bind(draft.published_at)
            .bind(draft.price)
            .bind(draft.stock)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_book(&self, id: i64, draft: &BookDraft) -> Result<BookRecord, RepoError> {
        let sql = format!(
            r#"
            WITH b AS (
                UPDATE books
                SET title = $1, author_id = $2, genres = $3, published_at = $4,
                    price = $5, stock = $6
                WHERE id = $7
                RETURNING *
            )
            {BOOK_SELECT} FROM b JOIN authors a ON b.author_id = a.id
            "#
        );
        let row = sqlx::query_as::<_, BookRow>(&sql)
            .bind(&draft.title)
            .bind(draft.author_id)
            .bind(join_genres(&draft.genres))
            .bind(draft.published_at)
            .bind(draft.price)
            .bind(draft.stock)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(BookRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_book(&self, id: i64) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
