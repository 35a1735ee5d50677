use std::collections::BTreeSet;

use crate::api::MarketRecord;

/// Result of comparing a fresh catalog against the known baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketDiff {
    /// Codes absent from the baseline, sorted, before any prefix filtering.
    pub new_markets: Vec<String>,
    /// Every code in the fetched catalog.
    pub current: BTreeSet<String>,
}

impl MarketDiff {
    pub fn has_new(&self) -> bool {
        !self.new_markets.is_empty()
    }
}

pub fn detect_new_markets(known: &BTreeSet<String>, markets: &[MarketRecord]) -> MarketDiff {
    let current: BTreeSet<String> = markets.iter().map(|m| m.code.clone()).collect();
    let new_markets = current.difference(known).cloned().collect();

    MarketDiff {
        new_markets,
        current,
    }
}

/// Allow-list of quote-currency prefixes gating which new markets are alerted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketFilter {
    prefixes: Vec<String>,
}

impl MarketFilter {
    /// Prefixes are upper-cased; each is expected to carry its separator (`KRW-`).
    pub fn new(prefixes: &[String]) -> Self {
        Self {
            prefixes: prefixes.iter().map(|p| p.to_uppercase()).collect(),
        }
    }

    pub fn passes(&self, market_code: &str) -> bool {
        let code = market_code.to_uppercase();
        self.prefixes.iter().any(|p| code.starts_with(p.as_str()))
    }

    pub fn apply(&self, codes: &[String]) -> Vec<String> {
        codes.iter().filter(|c| self.passes(c)).cloned().collect()
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Currency names without separators, e.g. `KRW,USDT`.
    pub fn label(&self) -> String {
        self.prefixes
            .iter()
            .map(|p| p.trim_end_matches('-'))
            .collect::<Vec<_>>()
            .join(",")
    }
}
