//! Acting user extractor
//!
//! Authentication happens upstream; the caller's uid arrives in the
//! `x-user-id` header and is recorded as `createdBy` and as the recipient
//! of the notifications a write emits.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::error::ApiError;

pub const ACTOR_HEADER: &str = "x-user-id";

/// The uid from `x-user-id`; rejects with 401 when missing or blank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl Actor {
    pub fn uid(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|uid| !uid.is_empty())
            .map(|uid| Actor(uid.to_string()))
            .ok_or(ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<Actor, ApiError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(ACTOR_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_actor_from_header() {
        assert_eq!(extract(Some(" u1 ")).await.unwrap().uid(), "u1");
        assert!(matches!(extract(Some("  ")).await, Err(ApiError::Unauthorized)));
        assert!(matches!(extract(None).await, Err(ApiError::Unauthorized)));
    }
}
