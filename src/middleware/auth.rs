use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    error::AppError,
    session::{read_cookie, SessionClaims, ROLE_ADMIN, SESSION_COOKIE},
    state::AppState,
    store::settings,
};

/// The authenticated caller, placed in request extensions by [`auth_required_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: i64,
    pub username: String,
    pub role: String,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

impl From<SessionClaims> for CurrentUser {
    fn from(c: SessionClaims) -> Self {
        Self { user_id: c.user_id, username: c.username, role: c.role }
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains("text/html"))
        .unwrap_or(false)
}

/// Validates the `glou_session` cookie.
///
/// Browsers navigating to a page get a 303 to `/login`; API clients get a 401 JSON body.
/// While `maintenance_mode` is set, sessions of non-admins get a 503.
pub async fn auth_required_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let claims = read_cookie(req.headers(), SESSION_COOKIE).and_then(|token| state.sessions.validate(&token));

    match claims {
        Some(claims) => {
            if claims.role != ROLE_ADMIN {
                match settings::get_settings(&state.db).await {
                    Ok(current) if current.maintenance_mode => return AppError::maintenance().into_response(),
                    Ok(_) => {}
                    Err(e) => return e.into_response(),
                }
            }
            req.extensions_mut().insert(CurrentUser::from(claims));
            next.run(req).await
        }
        None if wants_html(req.headers()) => Redirect::to("/login").into_response(),
        None => AppError::Unauthorized("Authentication required".to_string()).into_response(),
    }
}

/// Requires `role == "admin"`. Must run inside [`auth_required_middleware`].
pub async fn admin_required_middleware(req: Request, next: Next) -> Response {
    match req.extensions().get::<CurrentUser>() {
        Some(user) if user.is_admin() => next.run(req).await,
        Some(user) => {
            tracing::warn!(user_id = user.user_id, path = %req.uri().path(), "admin access denied");
            AppError::forbidden("ADMIN_REQUIRED", "Admin access required").into_response()
        }
        None => AppError::Unauthorized("Authentication required".to_string()).into_response(),
    }
}
