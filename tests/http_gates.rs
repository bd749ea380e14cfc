use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tower::ServiceExt;

use bookstore::application::auth::AuthService;
use bookstore::application::catalog::CatalogService;
use bookstore::application::repos::{AuthorsRepo, BookSearch, BooksRepo, RepoError, UsersRepo};
use bookstore::cache::{AdmissionController, AdmissionPolicy, ResponseCache, TokenRegistry};
use bookstore::domain::entities::{AuthorDraft, AuthorRecord, BookDraft, BookRecord, UserRecord};
use bookstore::infra::http::{AppState, build_router};

#[derive(Default)]
struct MemoryCatalog {
    authors: Mutex<Vec<AuthorRecord>>,
    books: Mutex<Vec<BookRecord>>,
}

impl MemoryCatalog {
    async fn author_by_id(&self, id: i64) -> Result<AuthorRecord, RepoError> {
        self.authors
            .lock()
            .await
            .iter()
            .find(|author| author.id == id)
            .cloned()
            .ok_or_else(|| RepoError::Integrity {
                message: "books_author_id_fkey".into(),
            })
    }
}

#[async_trait]
impl BooksRepo for MemoryCatalog {
    async fn list_books(&self) -> Result<Vec<BookRecord>, RepoError> {
        Ok(self.books.lock().await.clone())
    }

    async fn search_books(&self, search: &BookSearch) -> Result<Vec<BookRecord>, RepoError> {
        let books = self.books.lock().await;
        Ok(books
            .iter()
            .filter(|book| search.title.is_empty() || book.title.eq_ignore_ascii_case(&search.title))
            .filter(|book| {
                search.author.is_empty()
                    || book.author.first_name.eq_ignore_ascii_case(&search.author)
            })
            .filter(|book| book.genres.join(",").contains(&search.genre))
            .cloned()
            .collect())
    }

    async fn find_book(&self, id: i64) -> Result<Option<BookRecord>, RepoError> {
        Ok(self.books.lock().await.iter().find(|b| b.id == id).cloned())
    }

    async fn create_book(&self, draft: &BookDraft) -> Result<BookRecord, RepoError> {
        let author = self.author_by_id(draft.author_id).await?;
        let mut books = self.books.lock().await;
        let book = BookRecord {
            id: books.len() as i64 + 1,
            title: draft.title.clone(),
            author,
            genres: draft.genres.clone(),
            published_at: draft.published_at,
            price: draft.price,
            stock: draft.stock,
        };
        books.push(book.clone());
        Ok(book)
    }

    async fn update_book(&self, id: i64, draft: &BookDraft) -> Result<BookRecord, RepoError> {
        let author = self.author_by_id(draft.author_id).await?;
        let mut books = self.books.lock().await;
        let book = books
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(RepoError::NotFound)?;
        book.title = draft.title.clone();
        book.author = author;
        book.genres = draft.genres.clone();
        book.published_at = draft.published_at;
        book.price = draft.price;
        book.stock = draft.stock;
        Ok(book.clone())
    }

    async fn delete_book(&self, id: i64) -> Result<(), RepoError> {
        let mut books = self.books.lock().await;
        let before = books.len();
        books.retain(|b| b.id != id);
        if books.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl AuthorsRepo for MemoryCatalog {
    async fn list_authors(&self) -> Result<Vec<AuthorRecord>, RepoError> {
        Ok(self.authors.lock().await.clone())
    }

    async fn find_author(&self, id: i64) -> Result<Option<AuthorRecord>, RepoError> {
        Ok(self.authors.lock().await.iter().find(|a| a.id == id).cloned())
    }

    async fn create_author(&self, draft: &AuthorDraft) -> Result<AuthorRecord, RepoError> {
        let mut authors = self.authors.lock().await;
        let author = AuthorRecord {
            id: authors.len() as i64 + 1,
            first_name: draft.first_name.clone(),
            last_name: draft.last_name.clone(),
            bio: draft.bio.clone(),
        };
        authors.push(author.clone());
        Ok(author)
    }

    async fn update_author(
        &self,
        id: i64,
        draft: &AuthorDraft,
    ) -> Result<AuthorRecord, RepoError> {
        let mut authors = self.authors.lock().await;
        let author = authors
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(RepoError::NotFound)?;
        author.first_name = draft.first_name.clone();
        author.last_name = draft.last_name.clone();
        author.bio = draft.bio.clone();
        Ok(author.clone())
    }

    async fn delete_author(&self, id: i64) -> Result<(), RepoError> {
        let mut authors = self.authors.lock().await;
        let before = authors.len();
        authors.retain(|a| a.id != id);
        if authors.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[derive(Default)]
struct MemoryUsers {
    rows: Mutex<Vec<UserRecord>>,
}

#[async_trait]
impl UsersRepo for MemoryUsers {
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<UserRecord, RepoError> {
        let mut rows = self.rows.lock().await;
        if rows.iter().any(|u| u.email == email) {
            return Err(RepoError::Duplicate {
                constraint: "users_email_key".into(),
            });
        }
        let user = UserRecord {
            id: rows.len() as i64 + 1,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.rows.lock().await.iter().find(|u| u.email == email).cloned())
    }
}

/// Books repo whose reads never finish in time.
struct StalledBooks;

#[async_trait]
impl BooksRepo for StalledBooks {
    async fn list_books(&self) -> Result<Vec<BookRecord>, RepoError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }

    async fn search_books(&self, _search: &BookSearch) -> Result<Vec<BookRecord>, RepoError> {
        self.list_books().await
    }

    async fn find_book(&self, _id: i64) -> Result<Option<BookRecord>, RepoError> {
        Ok(None)
    }

    async fn create_book(&self, _draft: &BookDraft) -> Result<BookRecord, RepoError> {
        Err(RepoError::Timeout)
    }

    async fn update_book(&self, _id: i64, _draft: &BookDraft) -> Result<BookRecord, RepoError> {
        Err(RepoError::Timeout)
    }

    async fn delete_book(&self, _id: i64) -> Result<(), RepoError> {
        Err(RepoError::Timeout)
    }
}

struct Harness {
    router: Router,
    state: AppState,
}

fn harness_with(policy: AdmissionPolicy, books: Option<Arc<dyn BooksRepo>>) -> Harness {
    let catalog = Arc::new(MemoryCatalog::default());
    let books_repo: Arc<dyn BooksRepo> = books.unwrap_or_else(|| catalog.clone());
    let authors_repo: Arc<dyn AuthorsRepo> = catalog;
    let tokens = Arc::new(TokenRegistry::new());

    let state = AppState {
        auth: Arc::new(AuthService::new(
            Arc::new(MemoryUsers::default()),
            tokens.clone(),
        )),
        catalog: Arc::new(CatalogService::new(books_repo, authors_repo)),
        tokens,
        admission: Arc::new(AdmissionController::new(policy)),
        responses: Arc::new(ResponseCache::new()),
        cache_ttl: Duration::from_secs(600),
        request_timeout: Duration::from_secs(5),
    };

    Harness {
        router: build_router(state.clone()),
        state,
    }
}

fn generous_policy() -> AdmissionPolicy {
    AdmissionPolicy {
        rate: 1_000.0,
        burst: 1_000,
        window: Duration::from_secs(1_000),
    }
}

fn harness() -> Harness {
    harness_with(generous_policy(), None)
}

impl Harness {
    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    fn token(&self) -> String {
        self.state.tokens.issue(1).token.to_string()
    }
}

fn authed(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn book_body(title: &str, author_id: i64) -> Value {
    json!({
        "title": title,
        "author_id": author_id,
        "genres": ["scifi", "classic"],
        "published_at": "1965-08-01T00:00:00Z",
        "price": 9.99,
        "stock": 3,
    })
}

async fn seed_book(harness: &Harness, token: &str) -> i64 {
    let author = harness
        .send(authed(
            "POST",
            "/authors",
            token,
            Some(json!({"first_name": "Frank", "last_name": "Herbert"})),
        ))
        .await;
    assert_eq!(author.status(), StatusCode::CREATED);
    let author_id = body_json(author).await["id"].as_i64().unwrap();

    let book = harness
        .send(authed("POST", "/books", token, Some(book_body("Dune", author_id))))
        .await;
    assert_eq!(book.status(), StatusCode::CREATED);
    body_json(book).await["id"].as_i64().unwrap()
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() {
    let harness = harness();

    let missing = harness
        .send(Request::get("/books").body(Body::empty()).unwrap())
        .await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(missing).await["error"]["code"], "unauthorized");

    let unknown = harness.send(authed("GET", "/authors", "not-a-token", None)).await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);

    let token = harness.token();
    let bare = harness
        .send(
            Request::get("/books")
                .header(header::AUTHORIZATION, token.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(bare.status(), StatusCode::UNAUTHORIZED);

    let ok = harness.send(authed("GET", "/books", &token, None)).await;
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(body_json(ok).await, json!([]));
}

#[tokio::test]
async fn signup_and_login_issue_working_tokens() {
    let harness = harness();
    let credentials = json!({"email": "reader@example.com", "password": "Secret12!"});

    let signup = harness.send(post_json("/signup", credentials.clone())).await;
    assert_eq!(signup.status(), StatusCode::OK);
    let first = String::from_utf8(body_bytes(signup).await).unwrap();

    let again = harness.send(post_json("/signup", credentials.clone())).await;
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let login = harness.send(post_json("/login", credentials)).await;
    assert_eq!(login.status(), StatusCode::OK);
    let second = String::from_utf8(body_bytes(login).await).unwrap();
    assert_ne!(first, second);

    let stale = harness.send(authed("GET", "/books", &first, None)).await;
    assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);
    let fresh = harness.send(authed("GET", "/books", &second, None)).await;
    assert_eq!(fresh.status(), StatusCode::OK);

    let wrong = harness
        .send(post_json(
            "/login",
            json!({"email": "reader@example.com", "password": "Wrong123!"}),
        ))
        .await;
    assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(wrong).await["error"]["code"], "invalid_credentials");
}

#[tokio::test]
async fn signup_rejects_credentials_that_could_never_log_in() {
    let harness = harness();

    for body in [
        json!({"email": "reader@example.com", "password": "weak"}),
        json!({"email": "reader@example.com", "password": "alllowercase1!"}),
        json!({"email": "not-an-email", "password": "Secret12!"}),
    ] {
        let response = harness.send(post_json("/signup", body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
    assert!(harness.state.tokens.is_empty());

    let accepted = harness
        .send(post_json(
            "/signup",
            json!({"email": "reader@example.com", "password": "Secret12!"}),
        ))
        .await;
    assert_eq!(accepted.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_rejects_malformed_credentials() {
    let harness = harness();

    let bad_email = harness
        .send(post_json(
            "/login",
            json!({"email": "not-an-email", "password": "Secret12!"}),
        ))
        .await;
    assert_eq!(bad_email.status(), StatusCode::BAD_REQUEST);

    let weak_password = harness
        .send(post_json(
            "/login",
            json!({"email": "reader@example.com", "password": "short"}),
        ))
        .await;
    assert_eq!(weak_password.status(), StatusCode::BAD_REQUEST);

    let unknown_user = harness
        .send(post_json(
            "/login",
            json!({"email": "nobody@example.com", "password": "Secret12!"}),
        ))
        .await;
    assert_eq!(unknown_user.status(), StatusCode::BAD_REQUEST);

    let not_json = harness
        .send(
            Request::post("/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{"))
                .unwrap(),
        )
        .await;
    assert_eq!(not_json.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admission_gate_rejects_after_burst_with_retry_after() {
    let harness = harness_with(
        AdmissionPolicy {
            rate: 1.0,
            burst: 3,
            window: Duration::from_secs(1_000),
        },
        None,
    );
    let token = harness.token();

    for _ in 0..3 {
        let response = harness.send(authed("GET", "/books", &token, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let limited = harness.send(authed("GET", "/books", &token, None)).await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = limited.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=1_000).contains(&retry_after));
    assert_eq!(body_json(limited).await["error"]["code"], "rate_limited");

    // Public routes pass the same gate.
    let signup = harness
        .send(post_json(
            "/signup",
            json!({"email": "late@example.com", "password": "Secret12!"}),
        ))
        .await;
    assert_eq!(signup.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn admission_is_tracked_per_peer_ip() {
    let harness = harness_with(
        AdmissionPolicy {
            rate: 1.0,
            burst: 1,
            window: Duration::from_secs(1_000),
        },
        None,
    );
    let token = harness.token();

    let from = |addr: &str| {
        let mut request = authed("GET", "/books", &token, None);
        let addr: SocketAddr = addr.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    };

    assert_eq!(harness.send(from("10.0.0.1:4000")).await.status(), StatusCode::OK);
    assert_eq!(
        harness.send(from("10.0.0.1:4001")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(harness.send(from("10.0.0.2:4000")).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn cached_book_reads_stay_stale_after_writes() {
    let harness = harness();
    let token = harness.token();
    let book_id = seed_book(&harness, &token).await;
    let uri = format!("/books/{book_id}");

    let first = harness.send(authed("GET", &uri, &token, None)).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(body_json(first).await["title"], "Dune");

    let listing = harness.send(authed("GET", "/books", &token, None)).await;
    assert_eq!(body_json(listing).await[0]["title"], "Dune");

    let author_id = harness.state.catalog.book(book_id).await.unwrap().author.id;
    let updated = harness
        .send(authed(
            "PUT",
            &uri,
            &token,
            Some(book_body("Dune Messiah", author_id)),
        ))
        .await;
    assert_eq!(updated.status(), StatusCode::OK);
    assert_eq!(body_json(updated).await["title"], "Dune Messiah");

    let cached = harness.send(authed("GET", &uri, &token, None)).await;
    assert_eq!(cached.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(body_json(cached).await["title"], "Dune");

    let cached_listing = harness.send(authed("GET", "/books", &token, None)).await;
    assert_eq!(body_json(cached_listing).await[0]["title"], "Dune");

    let search = harness
        .send(authed("GET", "/books?genre=classic", &token, None))
        .await;
    assert_eq!(body_json(search).await[0]["title"], "Dune Messiah");
}

#[tokio::test]
async fn catalogue_routes_report_client_errors() {
    let harness = harness();
    let token = harness.token();
    let book_id = seed_book(&harness, &token).await;

    let non_numeric = harness.send(authed("GET", "/books/abc", &token, None)).await;
    assert_eq!(non_numeric.status(), StatusCode::BAD_REQUEST);

    let missing = harness.send(authed("GET", "/books/999", &token, None)).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let missing_author = harness
        .send(authed("POST", "/books", &token, Some(book_body("Orphan", 42))))
        .await;
    assert_eq!(missing_author.status(), StatusCode::BAD_REQUEST);

    let patch = harness
        .send(authed("PATCH", &format!("/books/{book_id}"), &token, None))
        .await;
    assert_eq!(patch.status(), StatusCode::METHOD_NOT_ALLOWED);

    let deleted = harness
        .send(authed("DELETE", &format!("/books/{book_id}"), &token, None))
        .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let deleted_again = harness
        .send(authed("DELETE", &format!("/books/{book_id}"), &token, None))
        .await;
    assert_eq!(deleted_again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn author_crud_round_trip() {
    let harness = harness();
    let token = harness.token();

    let created = harness
        .send(authed(
            "POST",
            "/authors",
            &token,
            Some(json!({"first_name": "Ursula", "last_name": "Le Guin", "bio": "Earthsea"})),
        ))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let id = body_json(created).await["id"].as_i64().unwrap();

    let renamed = harness
        .send(authed(
            "PUT",
            &format!("/authors/{id}"),
            &token,
            Some(json!({"first_name": "Ursula K.", "last_name": "Le Guin"})),
        ))
        .await;
    assert_eq!(renamed.status(), StatusCode::OK);

    let fetched = harness
        .send(authed("GET", &format!("/authors/{id}"), &token, None))
        .await;
    assert_eq!(body_json(fetched).await["first_name"], "Ursula K.");

    let blank = harness
        .send(authed(
            "POST",
            "/authors",
            &token,
            Some(json!({"first_name": "", "last_name": "X"})),
        ))
        .await;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let deleted = harness
        .send(authed("DELETE", &format!("/authors/{id}"), &token, None))
        .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let listing = harness.send(authed("GET", "/authors", &token, None)).await;
    assert_eq!(body_json(listing).await, json!([]));
}

#[tokio::test(start_paused = true)]
async fn slow_handlers_hit_the_request_deadline() {
    let harness = harness_with(generous_policy(), Some(Arc::new(StalledBooks)));
    let token = harness.token();

    let response = harness.send(authed("GET", "/books", &token, None)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"]["code"], "request_timeout");
}
