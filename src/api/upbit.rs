use async_trait::async_trait;

use super::error::FetchError;
use super::http::HttpClient;
use super::notices::NoticeParser;
use super::types::{MarketRecord, NoticeItem};
use crate::core::config::UpbitConfig;

/// The exchange market catalog. Failures here are always critical.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn fetch_markets(&self) -> Result<Vec<MarketRecord>, FetchError>;
}

/// The public notice feed. Failures here are never critical.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NoticeSource: Send + Sync {
    async fn fetch_listing_notices(&self) -> Result<Vec<NoticeItem>, FetchError>;
}

pub struct UpbitClient {
    http: HttpClient,
    markets_url: String,
    notices_url: String,
    parser: NoticeParser,
}

impl UpbitClient {
    pub fn new(http: HttpClient, config: &UpbitConfig, parser: NoticeParser) -> Self {
        Self {
            http,
            markets_url: config.markets_url.clone(),
            notices_url: config.notices_url.clone(),
            parser,
        }
    }
}

#[async_trait]
impl MarketSource for UpbitClient {
    async fn fetch_markets(&self) -> Result<Vec<MarketRecord>, FetchError> {
        let markets: Vec<MarketRecord> = self
            .http
            .get_json(&self.markets_url)
            .await
            .map_err(FetchError::Critical)?;

        tracing::debug!("Fetched {} markets from catalog", markets.len());
        Ok(markets)
    }
}

#[async_trait]
impl NoticeSource for UpbitClient {
    async fn fetch_listing_notices(&self) -> Result<Vec<NoticeItem>, FetchError> {
        let html = match self.http.get_text(&self.notices_url).await {
            Ok(html) => html,
            Err(e) => {
                if e.is_timeout() {
                    tracing::warn!("Notice timeout: {}", self.notices_url);
                } else {
                    tracing::warn!("Notice request error: {}", e);
                }
                return Err(FetchError::NonCritical(e));
            }
        };

        let items = self.parser.parse(&html);
        tracing::debug!("Parsed {} listing notices", items.len());
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::SourceError;
    use std::time::Duration;
    use warp::Filter;

    fn serve_fixture() -> String {
        let markets = warp::path!("v1" / "market" / "all").map(|| {
            warp::reply::json(&serde_json::json!([
                {"market": "KRW-BTC", "korean_name": "비트코인", "english_name": "Bitcoin"},
                {"market": "USDT-ETH", "korean_name": "이더리움", "english_name": "Ethereum"}
            ]))
        });
        let notices = warp::path!("service_center" / "notice").map(|| {
            warp::reply::html(
                r#"<ul><li><a href="/service_center/notice?id=7">KRW 마켓 추가 안내 (ABC)</a></li>
                   <li><a href="/service_center/notice?id=8">Maintenance</a></li></ul>"#,
            )
        });
        let broken = warp::path("broken").map(|| "not json");

        let (addr, server) =
            warp::serve(markets.or(notices).or(broken)).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        format!("http://{}", addr)
    }

    fn client(base: &str, markets_path: &str) -> UpbitClient {
        let config = UpbitConfig {
            markets_url: format!("{}{}", base, markets_path),
            notices_url: format!("{}/service_center/notice", base),
            request_timeout: Duration::from_secs(5),
        };
        let parser = NoticeParser::new(&config.notices_url, &["KRW-".to_string()]).unwrap();
        UpbitClient::new(HttpClient::new(config.request_timeout).unwrap(), &config, parser)
    }

    #[tokio::test]
    async fn test_fetch_markets() {
        let base = serve_fixture();
        let markets = client(&base, "/v1/market/all").fetch_markets().await.unwrap();

        assert_eq!(markets.len(), 2);
        assert_eq!(markets[1], MarketRecord::new("USDT-ETH", "Ethereum", "이더리움"));
    }

    #[tokio::test]
    async fn test_malformed_catalog_is_critical() {
        let base = serve_fixture();
        let err = client(&base, "/broken").fetch_markets().await.unwrap_err();

        assert!(err.is_critical());
        assert!(matches!(err.source_error(), SourceError::Decode(_)));
    }

    #[tokio::test]
    async fn test_fetch_listing_notices_resolves_links() {
        let base = serve_fixture();
        let notices = client(&base, "/v1/market/all")
            .fetch_listing_notices()
            .await
            .unwrap();

        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].url, format!("{}/service_center/notice?id=7", base));
    }

    #[tokio::test]
    async fn test_unreachable_notice_feed_is_not_critical() {
        let config = UpbitConfig {
            markets_url: "http://127.0.0.1:9/v1/market/all".to_string(),
            notices_url: "http://127.0.0.1:9/service_center/notice".to_string(),
            request_timeout: Duration::from_secs(1),
        };
        let parser = NoticeParser::new(&config.notices_url, &["KRW-".to_string()]).unwrap();
        let http = HttpClient::with_retry_policy(
            config.request_timeout,
            crate::api::http::RetryPolicy {
                max_retries: 0,
                backoff_factor: Duration::from_millis(1),
            },
        )
        .unwrap();
        let client = UpbitClient::new(http, &config, parser);

        let err = client.fetch_listing_notices().await.unwrap_err();
        assert!(!err.is_critical());
    }
}
