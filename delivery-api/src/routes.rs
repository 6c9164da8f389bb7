//! Route registration. The resource list is built explicitly at startup and
//! handed to [`app`]; there is no global registry.

use std::sync::Arc;

use axum::{
    routing::{get, MethodRouter},
    Extension, Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{self, AppState};

pub const API_PREFIX: &str = "/api";

/// One resource exposed under `/api/{name}/` and `/api/{name}/{id}/`.
pub struct ResourceRoutes {
    pub name: &'static str,
    pub collection: MethodRouter<AppState>,
    pub item: MethodRouter<AppState>,
}

impl ResourceRoutes {
    pub fn new(name: &'static str, collection: MethodRouter<AppState>, item: MethodRouter<AppState>) -> Self {
        Self { name, collection, item }
    }
}

/// Names of the registered resources, served by the API root.
#[derive(Debug, Clone)]
pub struct ApiIndex {
    pub resources: Arc<[&'static str]>,
}

pub fn registrations() -> Vec<ResourceRoutes> {
    vec![
        ResourceRoutes::new(
            "users",
            get(handlers::list_users).post(handlers::create_user),
            get(handlers::get_user).put(handlers::replace_user).patch(handlers::patch_user).delete(handlers::delete_user),
        ),
        ResourceRoutes::new(
            "parcels",
            get(handlers::list_parcels).post(handlers::create_parcel),
            get(handlers::get_parcel).put(handlers::replace_parcel).patch(handlers::patch_parcel).delete(handlers::delete_parcel),
        ),
        ResourceRoutes::new(
            "delivery_proof",
            get(handlers::list_proofs).post(handlers::create_proof),
            get(handlers::get_proof).put(handlers::replace_proof).patch(handlers::patch_proof).delete(handlers::delete_proof),
        ),
    ]
}

/// Build the router from `registrations`. Every path answers with and
/// without its trailing slash.
pub fn app(state: AppState, registrations: Vec<ResourceRoutes>) -> Router {
    let index = ApiIndex { resources: registrations.iter().map(|r| r.name).collect() };

    let mut router = Router::new()
        .route("/healthz", get(handlers::health))
        .route(API_PREFIX, get(handlers::api_root))
        .route(&format!("{API_PREFIX}/"), get(handlers::api_root));

    for resource in registrations {
        tracing::debug!(resource = resource.name, "registering routes");
        let collection = format!("{API_PREFIX}/{}", resource.name);
        let item = format!("{API_PREFIX}/{}/:id", resource.name);
        router = router
            .route(&format!("{collection}/"), resource.collection.clone())
            .route(&collection, resource.collection)
            .route(&format!("{item}/"), resource.item.clone())
            .route(&item, resource.item);
    }

    router.layer(Extension(index)).with_state(state).layer(TraceLayer::new_for_http())
}
