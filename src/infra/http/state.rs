use std::sync::Arc;
use std::time::Duration;

use crate::application::auth::AuthService;
use crate::application::catalog::CatalogService;
use crate::cache::{AdmissionController, ResponseCache, TokenRegistry};

/// Process-wide handles shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub catalog: Arc<CatalogService>,
    pub tokens: Arc<TokenRegistry>,
    pub admission: Arc<AdmissionController>,
    pub responses: Arc<ResponseCache>,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
}
