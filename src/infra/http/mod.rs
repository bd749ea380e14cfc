//! HTTP surface: router assembly, gates, and handlers.

pub mod error;
mod handlers;
mod middleware;
mod state;

use axum::Router;
use axum::middleware as axum_middleware;
use axum::routing::{get, post};

pub use error::ApiError;
pub use middleware::{AuthenticatedUser, RequestContext};
pub use state::AppState;

use handlers::{auth, authors, books};

/// Build the application router.
///
/// Every route passes the admission gate. Catalogue routes also require a
/// bearer token; `/signup` and `/login` do not.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/{id}",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        .route(
            "/authors",
            get(authors::list_authors).post(authors::create_author),
        )
        .route(
            "/authors/{id}",
            get(authors::get_author)
                .put(authors::update_author)
                .delete(authors::delete_author),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::bearer_auth,
        ));

    Router::new()
        .route("/signup", post(auth::sign_up))
        .route("/login", post(auth::login))
        .merge(protected)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_deadline,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::admission_gate,
        ))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
        .with_state(state)
}
