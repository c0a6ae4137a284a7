//! Push notification delivery to a user-supplied Bark-style endpoint.
//!
//! The endpoint is a URL the user pastes in (e.g.
//! `https://api.day.app/<key>`); a notification is delivered by requesting
//! `{endpoint}/{title}/{body}?url={deep_link}`, with the title and body as
//! percent-encoded path segments. An empty endpoint means "no push
//! configured" and is the caller's no-op, not an error here.

use std::time::Duration;

use url::Url;

use crate::error::PushError;
use crate::http;

/// Content of one push notification.
#[derive(Debug, Clone)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    /// Deep link the notification opens when tapped.
    pub url: String,
}

/// A delivery channel for push notifications.
pub trait PushSink: Send + Sync {
    fn send(&self, message: &PushMessage, endpoint: &str) -> Result<(), PushError>;
}

/// Production sink speaking the Bark URL convention.
pub struct BarkPush {
    agent: ureq::Agent,
}

impl BarkPush {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: http::agent(timeout),
        }
    }
}

impl Default for BarkPush {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl PushSink for BarkPush {
    fn send(&self, message: &PushMessage, endpoint: &str) -> Result<(), PushError> {
        let url = build_bark_url(endpoint, message)?;

        self.agent
            .get(url.as_str())
            .header("User-Agent", "pickup-watch")
            .call()
            .map_err(|e| PushError::Delivery(e.to_string()))?;

        Ok(())
    }
}

/// Build the Bark request URL for `message` against `endpoint`.
///
/// Rejects endpoints that are not absolute http(s) URLs; title and body
/// become encoded path segments, the deep link goes in the query string.
pub(crate) fn build_bark_url(endpoint: &str, message: &PushMessage) -> Result<Url, PushError> {
    let mut url = Url::parse(endpoint.trim())
        .map_err(|e| PushError::InvalidEndpoint(format!("'{}': {}", endpoint, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(PushError::InvalidEndpoint(format!(
            "'{}': only http(s) endpoints are supported",
            endpoint
        )));
    }

    url.path_segments_mut()
        .map_err(|_| PushError::InvalidEndpoint(format!("'{}': cannot-be-a-base URL", endpoint)))?
        .pop_if_empty()
        .push(&message.title)
        .push(&message.body);

    url.query_pairs_mut().append_pair("url", &message.url);

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> PushMessage {
        PushMessage {
            title: "Pickup available".to_string(),
            body: "iPhone 16 Pro @ Fifth Avenue".to_string(),
            url: "https://www.apple.com/shop/bag".to_string(),
        }
    }

    #[test]
    fn test_build_bark_url_shape() {
        let url = build_bark_url("https://api.day.app/abc123", &message()).unwrap();
        assert_eq!(url.host_str(), Some("api.day.app"));
        let segments: Vec<&str> = url.path_segments().unwrap().collect();
        assert_eq!(segments[0], "abc123");
        assert_eq!(segments[1], "Pickup%20available");
        assert!(url.query().unwrap().starts_with("url=https"));
    }

    #[test]
    fn test_build_bark_url_trailing_slash() {
        let url = build_bark_url("https://api.day.app/abc123/", &message()).unwrap();
        let segments: Vec<&str> = url.path_segments().unwrap().collect();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], "abc123");
    }

    #[test]
    fn test_build_bark_url_rejects_garbage() {
        assert!(matches!(
            build_bark_url("not a url", &message()),
            Err(PushError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            build_bark_url("ftp://api.day.app/abc", &message()),
            Err(PushError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_build_bark_url_encodes_body() {
        let msg = PushMessage {
            title: "a/b".to_string(),
            body: "c d".to_string(),
            url: "https://example.com".to_string(),
        };
        let url = build_bark_url("https://api.day.app/k", &msg).unwrap();
        let path = url.path();
        // '/' inside a segment must not create an extra segment
        assert!(path.contains("a%2Fb"));
        assert!(path.contains("c%20d"));
    }
}
