//! Mastodon post source
//!
//! This module reads and writes posts through the Mastodon API using the
//! megalodon library. Any instance that speaks the Mastodon API (Mastodon,
//! Pleroma, Akkoma, GoToSocial) works.

use async_trait::async_trait;
use chrono::Utc;
use megalodon::entities::Status;
use megalodon::megalodon::{GetAccountStatusesInputOptions, PostStatusOutput};
use megalodon::{Megalodon, SNS};
use scraper::{Html, Node};
use secrecy::ExposeSecret;

use crate::config::SourceConfig;
use crate::error::{ConfigError, Result, SourceError};
use crate::sources::PostSource;
use crate::types::{Post, PublishedPost, TimelineQuery};

/// Which [`SourceError`] variant a failure maps to when the response
/// carries no more specific signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Lookup,
    Fetch,
    Publish,
}

/// Mastodon-API post source
pub struct MastodonSource {
    /// The megalodon client for API interactions
    client: Box<dyn Megalodon + Send + Sync>,

    /// The instance URL (e.g., "https://mastodon.social")
    instance_url: String,
}

impl MastodonSource {
    /// Create a new source for `instance_url` authenticated with `access_token`
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use libdupcast::sources::mastodon::MastodonSource;
    ///
    /// # fn example() -> libdupcast::error::Result<()> {
    /// let source = MastodonSource::new(
    ///     "https://mastodon.social".to_string(),
    ///     "your-access-token".to_string(),
    /// )?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(instance_url: String, access_token: String) -> Result<Self> {
        let client = megalodon::generator(
            SNS::Mastodon,
            instance_url.clone(),
            Some(access_token),
            None,
        )
        .map_err(|e| {
            SourceError::Authentication(format!("Failed to create Mastodon client: {:?}", e))
        })?;

        Ok(Self {
            client,
            instance_url,
        })
    }

    /// Create a source from configuration
    ///
    /// Uses the access token, falling back to the bearer token. The instance
    /// URL gets an `https://` prefix when no scheme is given.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` if neither token is configured.
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let token = config
            .credentials
            .access_token
            .as_ref()
            .or(config.credentials.bearer_token.as_ref())
            .map(|secret| secret.expose_secret().trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ConfigError::MissingField("credentials.access_token".to_string()))?;

        Self::new(normalize_instance_url(&config.instance), token)
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }
}

#[async_trait]
impl PostSource for MastodonSource {
    fn name(&self) -> &str {
        "mastodon"
    }

    async fn lookup_account_id(&self, handle: &str) -> Result<String> {
        let response = self
            .client
            .lookup_account(handle.trim_start_matches('@').to_string())
            .await
            .map_err(|e| map_megalodon_error(e, Operation::Lookup))?;

        Ok(response.json.id)
    }

    async fn fetch_timeline(&self, account_id: &str, query: &TimelineQuery) -> Result<Vec<Post>> {
        let options = GetAccountStatusesInputOptions {
            limit: Some(query.count),
            exclude_replies: Some(query.exclude_replies),
            ..Default::default()
        };

        let response = self
            .client
            .get_account_statuses(account_id.to_string(), Some(&options))
            .await
            .map_err(|e| map_megalodon_error(e, Operation::Fetch))?;

        Ok(response.json.into_iter().map(status_to_post).collect())
    }

    async fn publish_post(&self, text: &str) -> Result<PublishedPost> {
        let response = self
            .client
            .post_status(text.to_string(), None)
            .await
            .map_err(|e| map_megalodon_error(e, Operation::Publish))?;

        // PostStatusOutput is an enum, we need to match on it
        let published = match response.json {
            PostStatusOutput::Status(status) => PublishedPost {
                id: status.id,
                text: text.to_string(),
                created_at: status.created_at,
                url: status.url,
            },
            PostStatusOutput::ScheduledStatus(scheduled) => PublishedPost {
                id: scheduled.id,
                text: text.to_string(),
                created_at: Utc::now(),
                url: None,
            },
        };

        Ok(published)
    }
}

/// Convert a Mastodon status into a [`Post`]
///
/// Mastodon returns HTML content; `plain_content` (when the instance sends
/// it) becomes the authoritative full text. Attachments are not spliced
/// into the text on Mastodon, so no media offsets are recorded.
fn status_to_post(status: Status) -> Post {
    Post {
        id: status.id,
        text: html_to_text(&status.content),
        full_text: status.plain_content,
        created_at: status.created_at,
        in_reply_to_id: status.in_reply_to_id,
        media: Vec::new(),
    }
}

fn normalize_instance_url(instance: &str) -> String {
    if instance.starts_with("http://") || instance.starts_with("https://") {
        instance.to_string()
    } else {
        format!("https://{}", instance)
    }
}

/// Reduce status HTML to plain text
///
/// Paragraph boundaries become a blank line and `<br>` a newline. Character
/// references are decoded by the HTML parser.
fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut text = String::with_capacity(html.len());
    let mut seen_paragraph = false;

    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(el) if el.name() == "br" => text.push('\n'),
            Node::Element(el) if el.name() == "p" => {
                if seen_paragraph {
                    text.push_str("\n\n");
                }
                seen_paragraph = true;
            }
            _ => {}
        }
    }

    text
}

/// Map megalodon errors to SourceError
///
/// # Error Mapping
///
/// - HTTP 401/403 → `SourceError::Authentication`
/// - HTTP 404 on lookup → `SourceError::Lookup`
/// - HTTP 429 → `SourceError::RateLimit`
/// - HTTP 5xx → `SourceError::Network`
/// - Anything else → the variant for the operation that failed
fn map_megalodon_error(error: megalodon::error::Error, operation: Operation) -> SourceError {
    classify_error(&error.to_string(), operation)
}

fn classify_error(error_str: &str, operation: Operation) -> SourceError {
    let error_lower = error_str.to_lowercase();
    let context = match operation {
        Operation::Lookup => "lookup account",
        Operation::Fetch => "fetch timeline",
        Operation::Publish => "post status",
    };

    match extract_http_status(error_str) {
        Some(401) | Some(403) => SourceError::Authentication(format!(
            "Mastodon authentication failed ({}): {}. \
                Suggestion: Verify your access token is valid and has not expired.",
            context, error_str
        )),
        Some(404) if operation == Operation::Lookup => {
            SourceError::Lookup(format!("Mastodon account not found ({}): {}", context, error_str))
        }
        Some(429) => SourceError::RateLimit(format!(
            "Mastodon rate limit exceeded ({}): {}",
            context, error_str
        )),
        Some(500..=599) => SourceError::Network(format!(
            "Mastodon server error ({}): {}",
            context, error_str
        )),
        None if error_lower.contains("unauthorized") || error_lower.contains("forbidden") => {
            SourceError::Authentication(format!(
                "Mastodon authentication failed ({}): {}",
                context, error_str
            ))
        }
        None if error_lower.contains("rate limit") || error_lower.contains("too many requests") => {
            SourceError::RateLimit(format!(
                "Mastodon rate limit exceeded ({}): {}",
                context, error_str
            ))
        }
        _ => {
            let message = format!("Mastodon error ({}): {}", context, error_str);
            match operation {
                Operation::Lookup => SourceError::Lookup(message),
                Operation::Fetch => SourceError::Fetch(message),
                Operation::Publish => SourceError::Publish(message),
            }
        }
    }
}

/// Extract HTTP status code from error message
///
/// Looks for patterns like "HTTP 401", "status 403", "401:", etc.
fn extract_http_status(error_str: &str) -> Option<u16> {
    let prefixes = ["HTTP ", "status ", "code: ", "status_code: "];

    for prefix in &prefixes {
        if let Some(pos) = error_str.find(prefix) {
            let after_prefix = &error_str[pos + prefix.len()..];
            if let Some(code_str) = after_prefix.get(0..3) {
                if let Ok(code) = code_str.parse::<u16>() {
                    if (100..=599).contains(&code) {
                        return Some(code);
                    }
                }
            }
        }
    }

    // Also check for standalone 3-digit codes followed by colon or space
    for (i, window) in error_str.as_bytes().windows(4).enumerate() {
        if window[0].is_ascii_digit()
            && window[1].is_ascii_digit()
            && window[2].is_ascii_digit()
            && (window[3] == b':' || window[3] == b' ')
        {
            if let Ok(code_str) = std::str::from_utf8(&window[0..3]) {
                if let Ok(code) = code_str.parse::<u16>() {
                    // Make sure it's not part of a larger number
                    if (100..=599).contains(&code)
                        && (i == 0 || !error_str.as_bytes()[i - 1].is_ascii_digit())
                    {
                        return Some(code);
                    }
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CredentialsConfig;

    fn source_config(instance: &str, access_token: Option<&str>) -> SourceConfig {
        SourceConfig {
            instance: instance.to_string(),
            credentials: CredentialsConfig {
                access_token: access_token.map(|t| t.to_string().into()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_mastodon_source_creation() {
        let source = MastodonSource::new(
            "https://mastodon.social".to_string(),
            "test-token".to_string(),
        )
        .expect("Failed to create source");

        assert_eq!(source.name(), "mastodon");
        assert_eq!(source.instance_url(), "https://mastodon.social");
    }

    #[test]
    fn test_from_config_normalizes_instance_url() {
        let source = MastodonSource::from_config(&source_config("mastodon.social", Some("tok")))
            .expect("Failed to create source");
        assert_eq!(source.instance_url(), "https://mastodon.social");

        let source =
            MastodonSource::from_config(&source_config("http://localhost:3000", Some("tok")))
                .expect("Failed to create source");
        assert_eq!(source.instance_url(), "http://localhost:3000");
    }

    #[test]
    fn test_from_config_requires_token() {
        let result = MastodonSource::from_config(&source_config("mastodon.social", None));
        match result {
            Err(crate::error::DupcastError::Config(ConfigError::MissingField(field))) => {
                assert!(field.contains("access_token"));
            }
            _ => panic!("Expected missing field error"),
        }

        let result = MastodonSource::from_config(&source_config("mastodon.social", Some("   ")));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_config_falls_back_to_bearer_token() {
        let mut config = source_config("mastodon.social", None);
        config.credentials.bearer_token = Some("bearer".to_string().into());

        assert!(MastodonSource::from_config(&config).is_ok());
    }

    #[test]
    fn test_html_to_text() {
        assert_eq!(html_to_text("<p>Hello world</p>"), "Hello world");
        assert_eq!(
            html_to_text("<p>First</p><p>Second<br>line</p>"),
            "First\n\nSecond\nline"
        );
        assert_eq!(
            html_to_text(r#"<p>See <a href="https://example.com">example</a> &amp; more</p>"#),
            "See example & more"
        );
        assert_eq!(html_to_text("<p>a &lt; b &gt; c</p>"), "a < b > c");
    }

    #[test]
    fn test_html_to_text_decodes_character_references() {
        assert_eq!(
            html_to_text("<p>&#34;hi&#34; &#x27;x&#x27; a&nbsp;b</p>"),
            "\"hi\" 'x' a\u{a0}b"
        );
        assert_eq!(html_to_text("<p>caf&eacute; &#8212; ok</p>"), "café \u{2014} ok");
    }

    #[test]
    fn test_html_to_text_plain_input() {
        assert_eq!(html_to_text("no markup here"), "no markup here");
        assert_eq!(html_to_text(""), "");
    }

    #[test]
    fn test_classify_error_by_status() {
        assert!(matches!(
            classify_error("HTTP 401 Unauthorized", Operation::Fetch),
            SourceError::Authentication(_)
        ));
        assert!(matches!(
            classify_error("HTTP 404 Not Found", Operation::Lookup),
            SourceError::Lookup(_)
        ));
        assert!(matches!(
            classify_error("HTTP 404 Not Found", Operation::Fetch),
            SourceError::Fetch(_)
        ));
        assert!(matches!(
            classify_error("HTTP 429 Too Many Requests", Operation::Publish),
            SourceError::RateLimit(_)
        ));
        assert!(matches!(
            classify_error("HTTP 502 Bad Gateway", Operation::Publish),
            SourceError::Network(_)
        ));
    }

    #[test]
    fn test_classify_error_falls_back_to_operation() {
        assert!(matches!(
            classify_error("connection reset", Operation::Lookup),
            SourceError::Lookup(_)
        ));
        assert!(matches!(
            classify_error("connection reset", Operation::Fetch),
            SourceError::Fetch(_)
        ));
        let err = classify_error("HTTP 422 Validation failed", Operation::Publish);
        match err {
            SourceError::Publish(msg) => {
                assert!(msg.contains("post status"));
                assert!(msg.contains("422"));
            }
            other => panic!("Expected publish error, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_http_status_with_prefixes() {
        assert_eq!(extract_http_status("HTTP 401 Unauthorized"), Some(401));
        assert_eq!(extract_http_status("status 404 not found"), Some(404));
        assert_eq!(extract_http_status("code: 401"), Some(401));
        assert_eq!(extract_http_status("status_code: 429"), Some(429));
    }

    #[test]
    fn test_extract_http_status_with_colon() {
        assert_eq!(extract_http_status("Error: 401: Unauthorized"), Some(401));
        assert_eq!(
            extract_http_status("Failed with 422: validation error"),
            Some(422)
        );
    }

    #[test]
    fn test_extract_http_status_no_code() {
        assert_eq!(extract_http_status("Network error"), None);
        assert_eq!(extract_http_status("HTTP 999"), None);
        assert_eq!(extract_http_status("1234"), None);
    }
}
