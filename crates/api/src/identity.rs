//! Caller identity.
//!
//! Authentication happens upstream; the proxy forwards the verified user as
//! `x-user-id` and its role as `x-user-role`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{Identity, UserId};

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Role value that grants staff privilege.
pub const STAFF_ROLE: &str = "staff";

/// An authenticated caller. Rejects with 401 when the headers are absent.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Identity);

impl Caller {
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if !self.0.is_staff {
            return Err(ApiError::Forbidden);
        }
        Ok(())
    }
}

/// A caller who may be anonymous.
#[derive(Debug, Clone, Copy)]
pub struct MaybeCaller(pub Option<Identity>);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_from(parts)?
            .map(Caller)
            .ok_or(ApiError::Unauthenticated)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for MaybeCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_from(parts).map(MaybeCaller)
    }
}

/// A present but unparsable user id is rejected rather than treated as
/// anonymous.
fn identity_from(parts: &Parts) -> Result<Option<Identity>, ApiError> {
    let Some(raw) = parts.headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };
    let user_id = raw
        .to_str()
        .ok()
        .and_then(|v| v.parse::<UserId>().ok())
        .ok_or(ApiError::Unauthenticated)?;
    let is_staff = parts
        .headers
        .get(USER_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|role| role.trim().eq_ignore_ascii_case(STAFF_ROLE));

    Ok(Some(Identity { user_id, is_staff }))
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_staff_role() {
        let identity = identity_from(&parts(&[("x-user-id", "7"), ("x-user-role", "Staff")]))
            .unwrap()
            .unwrap();
        assert_eq!(identity, Identity::staff(UserId::new(7)));
    }

    #[test]
    fn test_other_roles_are_customers() {
        let identity = identity_from(&parts(&[("x-user-id", "7"), ("x-user-role", "admin?")]))
            .unwrap()
            .unwrap();
        assert!(!identity.is_staff);
    }

    #[test]
    fn test_anonymous_and_malformed() {
        assert!(identity_from(&parts(&[])).unwrap().is_none());
        assert!(matches!(
            identity_from(&parts(&[("x-user-id", "abc")])),
            Err(ApiError::Unauthenticated)
        ));
    }
}
