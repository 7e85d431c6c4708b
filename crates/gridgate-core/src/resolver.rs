//! Client identity resolution for rate-limit bucketing.

use crate::auth::Principal;

/// Derive the rate-limit key for a request.
///
/// Authenticated callers are throttled per identity (`user:<id>`);
/// anonymous callers per network address (`ip:<addr>`), preferring the
/// first hop of a forwarded-address chain over the direct connection
/// address. Falls back to the literal `unknown` when no address is
/// available at all. Stateless and total: every input maps to a key.
#[must_use]
pub fn resolve_client_key(
    principal: Option<&Principal>,
    forwarded_for: Option<&str>,
    remote_addr: Option<&str>,
) -> String {
    if let Some(principal) = principal {
        return format!("user:{}", principal.id);
    }

    let forwarded = forwarded_for
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|entry| !entry.is_empty());

    if let Some(addr) = forwarded {
        return format!("ip:{addr}");
    }

    match remote_addr {
        Some(addr) if !addr.is_empty() => format!("ip:{addr}"),
        _ => "unknown".to_string(),
    }
}
