//! Builds the Engine.IO request URI from the user's server URI.

use url::Url;

use crate::SessionError;

/// Returns whether `scheme` is a TLS scheme.
///
/// # Errors
/// [`SessionError::UnsupportedScheme`] for anything but http, https, ws
/// or wss.
pub(crate) fn is_secure_scheme(scheme: &str) -> Result<bool, SessionError> {
    match scheme {
        "http" | "ws" => Ok(false),
        "https" | "wss" => Ok(true),
        other => Err(SessionError::UnsupportedScheme(other.to_owned())),
    }
}

/// Rewrites `server_uri` for one transport.
///
/// The scheme becomes `scheme_for(secure)`, an empty path becomes
/// `default_path`, and `queries` are appended after any query the caller
/// already had.
pub(crate) fn build_uri(
    server_uri: &str,
    scheme_for: impl FnOnce(bool) -> &'static str,
    default_path: &str,
    queries: &[(String, String)],
) -> Result<String, SessionError> {
    let mut url =
        Url::parse(server_uri).map_err(|e| SessionError::InvalidUri(e.to_string()))?;

    let secure = is_secure_scheme(url.scheme())?;
    let scheme = scheme_for(secure);
    url.set_scheme(scheme).map_err(|()| {
        SessionError::InvalidUri(format!("cannot switch {server_uri} to {scheme}"))
    })?;

    if url.path().is_empty() || url.path() == "/" {
        url.set_path(default_path);
    }

    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in queries {
            pairs.append_pair(key, value);
        }
    }
    url.set_fragment(None);

    Ok(url.to_string())
}
