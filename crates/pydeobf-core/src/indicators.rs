//! Indicator extraction from deobfuscated output.

use std::sync::LazyLock;

use regex::Regex;
use regex::bytes::Regex as BytesRegex;

/// Discord webhook endpoints, including the `canary` and `ptb` hosts and the
/// legacy `discordapp.com` domain.
pub const WEBHOOK_PATTERN: &str =
    r"https?://(?:(?:canary|ptb)\.)?discord(?:app)?\.com/api/webhooks/\d+/[\w-]+";

static WEBHOOK: LazyLock<Regex> = LazyLock::new(|| compile(WEBHOOK_PATTERN));
static BYTES_WEBHOOK: LazyLock<BytesRegex> = LazyLock::new(|| compile_bytes(WEBHOOK_PATTERN));

#[expect(clippy::expect_used, reason = "the pattern is a compile-time literal")]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("webhook pattern compiles")
}

#[expect(clippy::expect_used, reason = "the pattern is a compile-time literal")]
fn compile_bytes(pattern: &str) -> BytesRegex {
    BytesRegex::new(pattern).expect("webhook pattern compiles")
}

/// Webhook URLs in `text`, in order of appearance, without repeats.
#[must_use]
pub fn find_webhooks(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for hit in WEBHOOK.find_iter(text) {
        let url = hit.as_str();
        if !found.iter().any(|known| known == url) {
            tracing::info!(url, "found webhook");
            found.push(url.to_owned());
        }
    }
    found
}

/// Webhook URLs in a byte buffer, such as a marshalled code object.
#[must_use]
pub fn find_webhooks_in_bytes(data: &[u8]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for hit in BYTES_WEBHOOK.find_iter(data) {
        let url = String::from_utf8_lossy(hit.as_bytes()).into_owned();
        if !found.contains(&url) {
            tracing::info!(url = %url, "found webhook");
            found.push(url);
        }
    }
    found
}

/// Renders found webhooks as a report section.
#[must_use]
pub fn webhook_report(webhooks: &[String]) -> String {
    if webhooks.is_empty() {
        "No webhooks found.".to_owned()
    } else {
        format!("Webhooks:\n{}", webhooks.join("\n"))
    }
}
