//! Upload-ticket codec: the phase-1/phase-2 handoff from the design notes,
//! carried as an `axum-extra` private (encrypted + signed) cookie rather
//! than a server-side ticket store.

use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use chrono::Utc;
use cookie::time::Duration as CookieDuration;
use relay_core::types::UploadTicket;

const COOKIE_NAME: &str = "relay_ticket";

/// Store `ticket` in the jar, replacing any prior ticket cookie. The cookie
/// expires with the ticket itself, so a stale browser never resends a
/// ticket the server has already forgotten about.
pub fn store(jar: PrivateCookieJar, ticket: &UploadTicket) -> PrivateCookieJar {
    let payload = serde_json::to_string(ticket).expect("UploadTicket serializes");
    let ttl = (ticket.expiry - Utc::now()).num_seconds().max(0);
    let cookie = Cookie::build((COOKIE_NAME, payload))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(CookieDuration::seconds(ttl))
        .build();
    jar.add(cookie)
}

/// Remove and parse the ticket cookie, if present. Removal happens
/// regardless of whether the payload parses, so a corrupt cookie can't be
/// replayed either.
pub fn take(jar: PrivateCookieJar) -> (PrivateCookieJar, Option<UploadTicket>) {
    match jar.get(COOKIE_NAME) {
        Some(cookie) => {
            let ticket = serde_json::from_str(cookie.value()).ok();
            (jar.remove(Cookie::from(COOKIE_NAME)), ticket)
        }
        None => (jar, None),
    }
}
