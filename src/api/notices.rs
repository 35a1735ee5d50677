use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use url::Url;

use super::types::NoticeItem;

static LISTING_INTENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(상장|리스트|listing|마켓\s*추가|market\s*support|new\s*listing)")
        .expect("listing pattern is valid")
});

static ANCHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("anchor selector is valid"));

/// Local-language names a quote currency may appear under in notice titles.
fn currency_aliases(symbol: &str) -> &'static [&'static str] {
    match symbol {
        "KRW" => &["원화"],
        "USDT" => &["테더", "유에스디티"],
        "BTC" => &["비트코인"],
        _ => &[],
    }
}

/// First 16 hex chars of SHA-256 over `title|url`.
pub fn fingerprint(title: &str, url: &str) -> String {
    let digest = Sha256::digest(format!("{}|{}", title, url).as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Extracts listing announcements for the configured quote currencies from
/// the notice index page.
#[derive(Debug, Clone)]
pub struct NoticeParser {
    base: Url,
    /// `None` when no quote currency is configured; nothing matches then.
    currency: Option<Regex>,
}

impl NoticeParser {
    /// `quote_prefixes` are market prefixes such as `KRW-`; the trailing
    /// separator is ignored.
    pub fn new(page_url: &str, quote_prefixes: &[String]) -> Result<Self, url::ParseError> {
        let base = Url::parse(page_url)?;

        let mut terms: Vec<String> = Vec::new();
        for prefix in quote_prefixes {
            let symbol = prefix.trim_end_matches('-').to_uppercase();
            if symbol.is_empty() {
                continue;
            }
            terms.push(regex::escape(&symbol));
            terms.extend(currency_aliases(&symbol).iter().map(|a| regex::escape(a)));
        }

        let currency = (!terms.is_empty()).then(|| {
            Regex::new(&format!("(?i)({})", terms.join("|")))
                .expect("escaped currency terms form a valid pattern")
        });

        Ok(Self { base, currency })
    }

    pub fn is_listing_title(&self, title: &str) -> bool {
        LISTING_INTENT.is_match(title)
            && self.currency.as_ref().is_some_and(|c| c.is_match(title))
    }

    pub fn resolve(&self, href: &str) -> Option<String> {
        self.base.join(href).ok().map(|u| u.to_string())
    }

    /// Matching notices in page order, de-duplicated by fingerprint.
    pub fn parse(&self, html: &str) -> Vec<NoticeItem> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for anchor in document.select(&ANCHOR) {
            let title = anchor.text().collect::<String>().trim().to_string();
            let href = anchor.value().attr("href").unwrap_or("").trim();
            if title.is_empty() || href.is_empty() {
                continue;
            }

            if !self.is_listing_title(&title) {
                continue;
            }

            let Some(url) = self.resolve(href) else {
                tracing::debug!("Skipping notice with unresolvable href: {}", href);
                continue;
            };

            let id = fingerprint(&title, &url);
            if seen.insert(id.clone()) {
                items.push(NoticeItem { id, title, url });
            }
        }

        items
    }
}
