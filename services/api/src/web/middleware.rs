//! services/api/src/web/middleware.rs
//!
//! Identity middleware for protecting routes.

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use course_viewer_core::{Identity, Role};
use tracing::debug;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Reads the acting user from the identity headers.
///
/// The display name falls back to the user id and an unknown role to
/// `student`. Without a user id the request is rejected with 401.
pub fn identity_from_headers(headers: &HeaderMap) -> Option<Identity> {
    let user_id = header(headers, USER_ID_HEADER)?.to_string();
    let display_name = header(headers, USER_NAME_HEADER)
        .map(str::to_string)
        .unwrap_or_else(|| user_id.clone());
    let role = Role::parse_or_student(header(headers, USER_ROLE_HEADER));

    Some(Identity {
        user_id,
        display_name,
        role,
    })
}

/// Middleware that resolves the caller's `Identity` and inserts it into the
/// request extensions for handlers to use.
pub async fn require_identity(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let identity = identity_from_headers(req.headers()).ok_or_else(|| {
        debug!("Rejected {} without {}", req.uri().path(), USER_ID_HEADER);
        StatusCode::UNAUTHORIZED
    })?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn identity_defaults_name_and_role() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u1"));
        let identity = identity_from_headers(&headers).unwrap();
        assert_eq!(identity.display_name, "u1");
        assert_eq!(identity.role, Role::Student);

        headers.insert(USER_NAME_HEADER, HeaderValue::from_static("Ada"));
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("Teacher"));
        let identity = identity_from_headers(&headers).unwrap();
        assert_eq!(identity.display_name, "Ada");
        assert_eq!(identity.role, Role::Teacher);
    }

    #[test]
    fn blank_user_id_is_no_identity() {
        let mut headers = HeaderMap::new();
        assert!(identity_from_headers(&headers).is_none());
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("  "));
        assert!(identity_from_headers(&headers).is_none());
    }
}
