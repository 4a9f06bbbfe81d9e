//! Publisher landing-page rewrite.
//!
//! Some publishers answer a PDF link with an HTML page that embeds the real
//! CDN asset URL. For those origins the body is read in full and scanned for
//! the asset pattern; a match replaces the request target.

use crate::config::PublisherQuirk;
use crate::error::{Error, Result};
use regex::Regex;

/// Compiled DFA limit for quirk patterns
const PATTERN_SIZE_LIMIT: usize = 1024 * 1024;

/// One compiled [`PublisherQuirk`]
#[derive(Debug, Clone)]
pub(crate) struct LandingRewrite {
    origin: String,
    pattern: Regex,
}

impl LandingRewrite {
    /// Compile every configured quirk; an invalid pattern is a configuration error
    pub(crate) fn compile_all(quirks: &[PublisherQuirk]) -> Result<Vec<Self>> {
        quirks
            .iter()
            .map(|quirk| {
                let pattern = regex::RegexBuilder::new(&quirk.asset_pattern)
                    .size_limit(PATTERN_SIZE_LIMIT)
                    .build()
                    .map_err(|e| {
                        Error::config(
                            "http.publisher_quirks",
                            format!("invalid asset pattern '{}': {}", quirk.asset_pattern, e),
                        )
                    })?;
                Ok(Self {
                    origin: quirk.origin.clone(),
                    pattern,
                })
            })
            .collect()
    }

    /// Whether responses for `url` must be inspected
    pub(crate) fn applies_to(&self, url: &str) -> bool {
        !self.origin.is_empty() && url.starts_with(&self.origin)
    }

    /// First embedded asset URL in a landing page body
    pub(crate) fn extract(&self, body: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(body);
        self.pattern.find(&text).map(|m| m.as_str().to_string())
    }
}

/// First rewrite matching either the requested or the final (post-redirect) URL
pub(crate) fn find<'a>(
    rewrites: &'a [LandingRewrite],
    requested: &str,
    landed: &str,
) -> Option<&'a LandingRewrite> {
    rewrites
        .iter()
        .find(|rewrite| rewrite.applies_to(requested) || rewrite.applies_to(landed))
}
