//! Bearer token check for the admin routes.

use axum::{
    extract::Request,
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
    Extension,
};
use sha2::{Digest, Sha256};

use super::error::AppError;

/// SHA-256 digest of the admin token. Presented tokens are hashed and
/// compared digest to digest in constant time.
#[derive(Clone)]
pub struct BearerAuth {
    digest: [u8; 32],
}

impl BearerAuth {
    pub fn new(token: &str) -> Self {
        Self {
            digest: Sha256::digest(token.as_bytes()).into(),
        }
    }

    pub fn verify(&self, presented: &str) -> bool {
        let presented: [u8; 32] = Sha256::digest(presented.as_bytes()).into();
        self.digest
            .iter()
            .zip(presented.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }

    /// Check an `Authorization` header value.
    pub fn verify_header(&self, header: Option<&str>) -> bool {
        header
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .is_some_and(|token| !token.is_empty() && self.verify(token))
    }
}

pub async fn bearer_auth(
    Extension(auth): Extension<BearerAuth>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    if !auth.verify_header(header) {
        tracing::warn!(path = %request.uri().path(), "rejected unauthenticated request");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
