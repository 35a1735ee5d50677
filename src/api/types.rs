use serde::{Deserialize, Serialize};

/// One entry of the exchange market catalog. Identity is `code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRecord {
    #[serde(rename = "market")]
    pub code: String,
    #[serde(default)]
    pub english_name: String,
    #[serde(default)]
    pub korean_name: String,
}

impl MarketRecord {
    pub fn new(code: &str, english_name: &str, korean_name: &str) -> Self {
        Self {
            code: code.to_string(),
            english_name: english_name.to_string(),
            korean_name: korean_name.to_string(),
        }
    }
}

/// A listing-related announcement scraped from the notice page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeItem {
    /// Content fingerprint of `(title, url)`.
    pub id: String,
    pub title: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_entry_decoding() {
        let payload = r#"[
            {"market": "KRW-BTC", "korean_name": "비트코인", "english_name": "Bitcoin", "market_warning": "NONE"},
            {"market": "USDT-XRP"}
        ]"#;

        let records: Vec<MarketRecord> = serde_json::from_str(payload).unwrap();
        assert_eq!(records[0], MarketRecord::new("KRW-BTC", "Bitcoin", "비트코인"));
        assert_eq!(records[1].code, "USDT-XRP");
        assert!(records[1].english_name.is_empty());
    }
}
