// src/middleware/auth_extractor.rs - bearer identity and the per-area gate extractor
use std::marker::PhantomData;

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::debug;
use uuid::Uuid;

use crate::models::user::{JwtClaims, Profile};
use crate::services::access_gate::{self, GateError, RouteGroup};
use crate::services::auth_services::AuthError;
use crate::AppState;

/// Raw token from `Authorization: Bearer <token>`.
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verifies a Supabase access token (HS256, project JWT secret) and returns its subject.
pub fn verify_token(token: &str, secret: &str) -> Result<Uuid, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&["authenticated"]);

    let data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        debug!("token rejected: {}", e);
        AuthError::InvalidToken
    })?;

    Ok(Uuid::parse_str(&data.claims.sub)?)
}

/// The caller's user id, if the request carries a valid session token.
pub fn identity_from_request(req: &HttpRequest, secret: &str) -> Option<Uuid> {
    let token = bearer_token(req)?;
    verify_token(token, secret).ok()
}

/// A protected route group, named at the type level so handlers declare
/// their gate in their signature.
pub trait Area: 'static {
    const GROUP: RouteGroup;
}

pub struct DashboardArea;
pub struct AdminArea;
pub struct SuperAdminArea;

impl Area for DashboardArea {
    const GROUP: RouteGroup = RouteGroup::Dashboard;
}

impl Area for AdminArea {
    const GROUP: RouteGroup = RouteGroup::Admin;
}

impl Area for SuperAdminArea {
    const GROUP: RouteGroup = RouteGroup::SuperAdmin;
}

/// Admitted caller. Extraction runs the access check; a failure answers
/// with the redirect before the handler body runs.
pub struct Gate<A: Area> {
    pub profile: Profile,
    _area: PhantomData<A>,
}

impl<A: Area> FromRequest for Gate<A> {
    type Error = GateError;
    type Future = LocalBoxFuture<'static, Result<Self, GateError>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let identity = state
            .as_ref()
            .and_then(|s| identity_from_request(req, &s.jwt_secret));

        Box::pin(async move {
            let state = state
                .ok_or_else(|| GateError::Unavailable("application state not configured".into()))?;
            let profile =
                access_gate::check(state.store.as_ref(), &state.policy, identity, A::GROUP).await?;
            Ok(Gate {
                profile,
                _area: PhantomData,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{token_for, JWT_SECRET};
    use actix_web::test::TestRequest;
    use jsonwebtoken::{encode, EncodingKey, Header};

    #[test]
    fn valid_token_yields_subject() {
        let id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {}", token_for(id))))
            .to_http_request();
        assert_eq!(identity_from_request(&req, JWT_SECRET), Some(id));
    }

    #[test]
    fn missing_or_malformed_header_has_no_identity() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(bearer_token(&req), None);

        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic abc"))
            .to_http_request();
        assert_eq!(identity_from_request(&req, JWT_SECRET), None);
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let token = token_for(Uuid::new_v4());
        assert!(matches!(
            verify_token(&token, "some-other-secret"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = JwtClaims {
            sub: Uuid::new_v4().to_string(),
            aud: Some("authenticated".into()),
            exp: 1_000_000,
            iat: None,
            role: Some("authenticated".into()),
            email: None,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .unwrap();
        assert!(verify_token(&token, JWT_SECRET).is_err());
    }
}
