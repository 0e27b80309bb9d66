pub mod config;
pub mod err;
pub mod models;
pub mod normalize;
pub mod registry;
pub mod store;
pub mod students;
pub mod users;
pub mod validate;

use axum::handler::Handler;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;

pub use crate::config::Config;
use crate::err::Error;
use crate::models::Registry;
use crate::store::SharedStore;
use crate::validate::Rules;

pub type Payload<T> = Result<(StatusCode, Json<Success<T>>), Error>;

#[derive(Debug, Clone, Serialize)]
pub struct Success<V> {
    success: bool,
    #[serde(flatten)]
    value: V,
}

impl<V: Serialize> Success<V> {
    pub fn of(value: V) -> Self {
        Self {
            success: true,
            value,
        }
    }
}

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok((StatusCode::OK, Json(Success::of(value))))
}

pub fn created<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok((StatusCode::CREATED, Json(Success::of(value))))
}

async fn banner() -> &'static str {
    "SSAAM Registration System API is running"
}

/// Builds the full HTTP surface over `store`.
pub fn app(store: SharedStore, rules: Rules) -> Router {
    Router::new()
        .route("/", get(banner))
        .merge(students::routes())
        .merge(registry::routes(Registry::Programs))
        .merge(registry::routes(Registry::Courses))
        .merge(users::routes())
        .fallback(err::handler404.into_service())
        .layer(
            ServiceBuilder::new()
                .layer(Extension(store))
                .layer(Extension(rules)),
        )
}
