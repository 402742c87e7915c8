//! HTTP surface: one route group per record collection plus a health probe.

mod error;
mod handlers;
mod middleware;
mod state;

pub use error::{ApiError, ApiErrorBody, ApiErrorMessage, codes};
pub use handlers::CountResponse;
pub use state::HttpState;

use axum::{
    Router,
    extract::FromRef,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::get,
};
use tower_http::cors::CorsLayer;

use crate::application::records::RecordService;
use crate::domain::entities::{OrderRecord, ProductRecord, Record, UserRecord};

use middleware::{log_responses, set_request_context};

pub fn build_router(state: HttpState, allowed_origin: HeaderValue) -> Router {
    let router = Router::new().route("/health", get(handlers::health));
    let router = record_routes::<UserRecord>(router);
    let router = record_routes::<ProductRecord>(router);
    let router = record_routes::<OrderRecord>(router);

    router
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
        .layer(cors_layer(allowed_origin))
}

/// `/{collection}`, `/{collection}/{id}`, `/{entity}-count` and `/{entity}-statistics`.
fn record_routes<E: Record>(router: Router<HttpState>) -> Router<HttpState>
where
    RecordService<E>: FromRef<HttpState>,
{
    let collection = E::COLLECTION;
    router
        .route(
            &format!("/{}", collection.as_str()),
            get(handlers::list::<E>).post(handlers::create::<E>),
        )
        .route(
            &format!("/{}/{{id}}", collection.as_str()),
            get(handlers::read::<E>)
                .put(handlers::update::<E>)
                .delete(handlers::delete::<E>),
        )
        .route(
            &format!("/{}-count", collection.entity()),
            get(handlers::count::<E>),
        )
        .route(
            &format!("/{}-statistics", collection.entity()),
            get(handlers::statistics::<E>),
        )
}

fn cors_layer(allowed_origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}
