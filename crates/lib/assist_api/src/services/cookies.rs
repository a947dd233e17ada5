//! Refresh-token cookie.
//!
//! The refresh token travels in an httpOnly cookie scoped to `/auth`, so it
//! is only ever sent to the login, refresh and logout endpoints.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE: &str = "assist_refresh";

const COOKIE_PATH: &str = "/auth";

/// Build an httpOnly cookie for the refresh token.
pub fn refresh_cookie(token: &str, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE.to_string(), token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path(COOKIE_PATH)
        .max_age(Duration::seconds(max_age_secs.max(0)))
        .build()
}

/// Build an expired cookie to clear the refresh token.
pub fn clear_refresh_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE.to_string(), String::new()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path(COOKIE_PATH)
        .max_age(Duration::ZERO)
        .build()
}
