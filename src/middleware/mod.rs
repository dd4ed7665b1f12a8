use actix_web::{dev, http::header, web, FromRequest, HttpRequest};
use std::convert::Infallible;
use std::future::{ready, Ready};

use crate::error::ApiError;
use crate::helper::{admin_helpers, identity_helpers};
use crate::models::Identity;
use crate::AppState;

/// The raw token from `Authorization: Bearer <token>`, if any.
pub struct BearerToken(pub Option<String>);

impl BearerToken {
    fn from_headers(req: &HttpRequest) -> Self {
        let token = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split_once(' '))
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token.trim().to_string())
            .filter(|token| !token.is_empty());
        BearerToken(token)
    }
}

impl FromRequest for BearerToken {
    type Error = Infallible;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        ready(Ok(BearerToken::from_headers(req)))
    }
}

fn app_state(req: &HttpRequest) -> Result<&web::Data<AppState>, ApiError> {
    req.app_data::<web::Data<AppState>>().ok_or_else(|| {
        log::error!("AppState is not registered on the application");
        ApiError::Internal
    })
}

/// A caller holding a valid access token.
pub struct AuthenticatedUser(pub Identity);

impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let token = BearerToken::from_headers(req);
        let result = app_state(req)
            .and_then(|state| identity_helpers::authenticate(state.identity.as_ref(), token.0.as_deref()))
            .map(AuthenticatedUser);
        ready(result)
    }
}

/// A caller whose token resolves to a user holding the admin role.
pub struct AdminUser(pub Identity);

impl FromRequest for AdminUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let token = BearerToken::from_headers(req);
        let result = app_state(req)
            .and_then(|state| {
                admin_helpers::require_admin(state.identity.as_ref(), state.authorizer.as_ref(), token.0.as_deref())
            })
            .map(AdminUser);
        ready(result)
    }
}
