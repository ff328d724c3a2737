//! Request URI routing.
//!
//! A request names its target as `/<archive-id>/<entry-path>`. The archive id
//! is resolved against the `HOST_URI` parameter; the entry path is matched
//! verbatim against the paths stored in the archive.

use thiserror::Error;

use crate::gateway::GatewayRequest;

/// Why a request was turned away before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("request URI is missing or empty")]
    MissingUri,

    #[error("request URI {0:?} does not name an archive and an entry")]
    MalformedUri(String),

    #[error("HOST_URI parameter is missing")]
    MissingHost,
}

impl RequestError {
    /// Gateway status reported to the client.
    pub fn status(&self) -> u16 {
        match self {
            Self::MissingUri => 404,
            Self::MalformedUri(_) | Self::MissingHost => 500,
        }
    }
}

/// The two segments of a request URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTarget<'a> {
    pub archive_id: &'a str,
    pub entry_path: &'a str,
}

/// Split `/<archive-id>/<entry-path>` at its first two slashes.
///
/// The entry path keeps any further slashes and is not percent-decoded.
pub fn parse_request_uri(uri: Option<&str>) -> Result<RequestTarget<'_>, RequestError> {
    let uri = match uri {
        Some(uri) if uri.len() > 1 => uri,
        _ => return Err(RequestError::MissingUri),
    };
    let malformed = || RequestError::MalformedUri(uri.to_string());

    let rest = uri.strip_prefix('/').ok_or_else(malformed)?;
    let (archive_id, entry_path) = rest.split_once('/').ok_or_else(malformed)?;
    if archive_id.is_empty() || entry_path.is_empty() {
        return Err(malformed());
    }

    Ok(RequestTarget {
        archive_id,
        entry_path,
    })
}

/// Archive location: the host URI with the archive id appended as-is.
pub fn resolve_url(host_uri: &str, archive_id: &str) -> String {
    format!("{host_uri}{archive_id}")
}

/// Everything a worker needs to serve one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub url: String,
    pub entry_path: String,
}

/// Validate `request` and resolve where its entry lives.
pub fn route(request: &GatewayRequest) -> Result<Route, RequestError> {
    let target = parse_request_uri(request.request_uri())?;
    let host = request.host_uri().ok_or(RequestError::MissingHost)?;
    Ok(Route {
        url: resolve_url(host, target.archive_id),
        entry_path: target.entry_path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{HOST_URI, REQUEST_URI};

    #[test]
    fn test_splits_at_second_slash() {
        let target = parse_request_uri(Some("/bundle.zip/docs/guide/intro.md")).unwrap();
        assert_eq!(target.archive_id, "bundle.zip");
        assert_eq!(target.entry_path, "docs/guide/intro.md");
    }

    #[test]
    fn test_missing_or_degenerate_uri() {
        assert_eq!(parse_request_uri(None), Err(RequestError::MissingUri));
        assert_eq!(parse_request_uri(Some("")), Err(RequestError::MissingUri));
        assert_eq!(parse_request_uri(Some("/")), Err(RequestError::MissingUri));
        assert_eq!(RequestError::MissingUri.status(), 404);
    }

    #[test]
    fn test_malformed_uri() {
        for uri in ["/bundle.zip", "/bundle.zip/", "//a.txt", "bundle.zip/a.txt"] {
            let err = parse_request_uri(Some(uri)).unwrap_err();
            assert!(matches!(err, RequestError::MalformedUri(_)), "{uri}");
            assert_eq!(err.status(), 500);
        }
    }

    #[test]
    fn test_entry_path_is_not_decoded() {
        let target = parse_request_uri(Some("/a.zip/with%20space.txt")).unwrap();
        assert_eq!(target.entry_path, "with%20space.txt");
    }

    #[test]
    fn test_route_appends_archive_id() {
        let request: GatewayRequest = [
            (REQUEST_URI, "/data.zip/a/b.txt"),
            (HOST_URI, "http://archives.test/files/"),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            route(&request).unwrap(),
            Route {
                url: "http://archives.test/files/data.zip".into(),
                entry_path: "a/b.txt".into(),
            }
        );
    }

    #[test]
    fn test_route_without_host() {
        let request: GatewayRequest = [(REQUEST_URI, "/data.zip/a.txt")].into_iter().collect();
        let err = route(&request).unwrap_err();
        assert_eq!(err, RequestError::MissingHost);
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_uri_checked_before_host() {
        let request: GatewayRequest = [(REQUEST_URI, "/")].into_iter().collect();
        assert_eq!(route(&request).unwrap_err(), RequestError::MissingUri);
    }
}
