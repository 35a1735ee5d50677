use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::api::{MarketRecord, NoticeItem};
use crate::core::config::TelegramConfig;
use crate::scanner::MarketFilter;

pub const STARTUP_MESSAGE: &str = "🚀 Upbit listing watcher started";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("telegram request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("telegram rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Destination for alert text. Delivery is best-effort.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}

/// Sends through the Telegram Bot API `sendMessage` method.
pub struct TelegramSink {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: Option<String>,
}

impl TelegramSink {
    pub fn new(config: &TelegramConfig) -> Result<Self, NotifyError> {
        Self::with_api_base(config, "https://api.telegram.org")
    }

    pub fn with_api_base(config: &TelegramConfig, api_base: &str) -> Result<Self, NotifyError> {
        // Sends run inline in the poll loop
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }
}

#[async_trait]
impl MessageSink for TelegramSink {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let Some(chat_id) = &self.chat_id else {
            tracing::warn!("TG_CHAT_ID is empty, skipping message: {}", text);
            return Ok(());
        };

        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let params = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });

        let response = self.client.post(&url).json(&params).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        // Telegram can answer 200 with `"ok": false`
        let accepted = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("ok").and_then(|ok| ok.as_bool()))
            .unwrap_or(true);
        if !status.is_success() || !accepted {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!("Telegram message delivered to chat {}", chat_id);
        Ok(())
    }
}

pub fn format_new_markets(
    codes: &[String],
    markets: &[MarketRecord],
    filter: &MarketFilter,
    source_url: &str,
) -> String {
    let info: HashMap<&str, &MarketRecord> =
        markets.iter().map(|m| (m.code.as_str(), m)).collect();

    let lines: Vec<String> = codes
        .iter()
        .map(|code| {
            let (eng, kor) = info
                .get(code.as_str())
                .map(|m| (m.english_name.as_str(), m.korean_name.as_str()))
                .unwrap_or(("", ""));
            format!("• {} — {} / {}", code, eng, kor)
        })
        .collect();

    format!(
        "🆕 Upbit: new markets ({})\n{}\n\nSource API: {}",
        filter.label(),
        lines.join("\n"),
        source_url
    )
}

pub fn format_new_notices(items: &[NoticeItem], filter: &MarketFilter) -> String {
    let lines: Vec<String> = items
        .iter()
        .map(|it| format!("• {}\n  {}", it.title, it.url))
        .collect();

    format!(
        "📢 Upbit: new listing notice ({}):\n{}",
        filter.label().replace(',', "/"),
        lines.join("\n\n")
    )
}

/// Formats alerts and hands them to the sink. Send failures are logged and
/// swallowed; callers never roll back state because of them.
pub struct ListingNotifier {
    sink: Arc<dyn MessageSink>,
    filter: MarketFilter,
    source_url: String,
}

impl ListingNotifier {
    pub fn new(sink: Arc<dyn MessageSink>, filter: MarketFilter, source_url: String) -> Self {
        Self {
            sink,
            filter,
            source_url,
        }
    }

    pub fn filter(&self) -> &MarketFilter {
        &self.filter
    }

    /// One message for the whole batch; no-op when `filtered_codes` is empty.
    pub async fn notify_new_markets(&self, filtered_codes: &[String], markets: &[MarketRecord]) {
        if filtered_codes.is_empty() {
            return;
        }
        let text = format_new_markets(filtered_codes, markets, &self.filter, &self.source_url);
        self.dispatch(&text).await;
    }

    pub async fn notify_new_notices(&self, items: &[NoticeItem]) {
        if items.is_empty() {
            return;
        }
        let text = format_new_notices(items, &self.filter);
        self.dispatch(&text).await;
    }

    pub async fn notify_started(&self) {
        self.dispatch(STARTUP_MESSAGE).await;
    }

    async fn dispatch(&self, text: &str) {
        if let Err(e) = self.sink.send(text).await {
            tracing::error!("Failed to deliver Telegram message: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::*;
    use std::time::Duration;
    use warp::Filter;

    fn filter() -> MarketFilter {
        MarketFilter::new(&["KRW-".to_string(), "USDT-".to_string()])
    }

    fn notice(title: &str, url: &str) -> NoticeItem {
        NoticeItem {
            id: crate::api::notices::fingerprint(title, url),
            title: title.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_market_message_layout() {
        let markets = vec![
            MarketRecord::new("KRW-ETH", "Ethereum", "이더리움"),
            MarketRecord::new("KRW-BTC", "Bitcoin", "비트코인"),
        ];
        let text = format_new_markets(
            &["KRW-ETH".to_string(), "KRW-NEW".to_string()],
            &markets,
            &filter(),
            "https://api.upbit.com/v1/market/all",
        );

        assert_eq!(
            text,
            "🆕 Upbit: new markets (KRW,USDT)\n\
             • KRW-ETH — Ethereum / 이더리움\n\
             • KRW-NEW —  / \n\n\
             Source API: https://api.upbit.com/v1/market/all"
        );
    }

    #[test]
    fn test_notice_message_layout() {
        let text = format_new_notices(
            &[
                notice("KRW listing A", "https://upbit.com/n/1"),
                notice("USDT listing B", "https://upbit.com/n/2"),
            ],
            &filter(),
        );

        assert_eq!(
            text,
            "📢 Upbit: new listing notice (KRW/USDT):\n\
             • KRW listing A\n  https://upbit.com/n/1\n\n\
             • USDT listing B\n  https://upbit.com/n/2"
        );
    }

    #[tokio::test]
    async fn test_empty_batches_do_not_send() {
        let mut sink = MockMessageSink::new();
        sink.expect_send().never();

        let notifier = ListingNotifier::new(Arc::new(sink), filter(), String::new());
        notifier.notify_new_markets(&[], &[]).await;
        notifier.notify_new_notices(&[]).await;
    }

    #[tokio::test]
    async fn test_batch_is_a_single_send() {
        let mut sink = MockMessageSink::new();
        sink.expect_send()
            .withf(|text: &str| text.contains("KRW-ETH") && text.contains("KRW-SOL"))
            .times(1)
            .returning(|_| Ok(()));

        let notifier = ListingNotifier::new(Arc::new(sink), filter(), String::new());
        let markets = vec![
            MarketRecord::new("KRW-ETH", "Ethereum", "이더리움"),
            MarketRecord::new("KRW-SOL", "Solana", "솔라나"),
        ];
        notifier
            .notify_new_markets(&["KRW-ETH".to_string(), "KRW-SOL".to_string()], &markets)
            .await;
    }

    #[tokio::test]
    async fn test_send_failure_is_swallowed() {
        let mut sink = MockMessageSink::new();
        sink.expect_send()
            .with(eq(STARTUP_MESSAGE))
            .times(1)
            .returning(|_| {
                Err(NotifyError::Rejected {
                    status: 400,
                    body: "chat not found".to_string(),
                })
            });

        let notifier = ListingNotifier::new(Arc::new(sink), filter(), String::new());
        notifier.notify_started().await;
    }

    #[tokio::test]
    async fn test_missing_chat_id_is_a_logged_noop() {
        let sink = TelegramSink::with_api_base(
            &TelegramConfig {
                bot_token: "TOKEN".to_string(),
                chat_id: None,
                request_timeout: Duration::from_secs(5),
            },
            "http://127.0.0.1:9",
        )
        .unwrap();

        assert!(sink.send("hello").await.is_ok());
    }

    #[tokio::test]
    async fn test_telegram_sink_posts_send_message() {
        let route = warp::post()
            .and(warp::path!("botTOKEN" / "sendMessage"))
            .and(warp::body::json())
            .map(|body: serde_json::Value| {
                assert_eq!(body["chat_id"], "42");
                assert_eq!(body["text"], "hello");
                warp::reply::json(&serde_json::json!({"ok": true}))
            });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let sink = TelegramSink::with_api_base(
            &TelegramConfig {
                bot_token: "TOKEN".to_string(),
                chat_id: Some("42".to_string()),
                request_timeout: Duration::from_secs(5),
            },
            &format!("http://{}", addr),
        )
        .unwrap();

        tokio::time::timeout(Duration::from_secs(5), sink.send("hello"))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_telegram_sink_reports_rejection() {
        let route = warp::any().map(|| {
            warp::reply::with_status(
                r#"{"ok":false,"description":"Bad Request: chat not found"}"#,
                warp::http::StatusCode::BAD_REQUEST,
            )
        });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let sink = TelegramSink::with_api_base(
            &TelegramConfig {
                bot_token: "TOKEN".to_string(),
                chat_id: Some("42".to_string()),
                request_timeout: Duration::from_secs(5),
            },
            &format!("http://{}", addr),
        )
        .unwrap();

        let err = sink.send("hello").await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_telegram_sink_treats_ok_false_as_rejection() {
        let route = warp::any().map(|| {
            warp::reply::json(&serde_json::json!({"ok": false, "description": "Forbidden"}))
        });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let sink = TelegramSink::with_api_base(
            &TelegramConfig {
                bot_token: "TOKEN".to_string(),
                chat_id: Some("42".to_string()),
                request_timeout: Duration::from_secs(5),
            },
            &format!("http://{}", addr),
        )
        .unwrap();

        let err = sink.send("hello").await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 200, .. }));
    }

    #[tokio::test]
    async fn test_telegram_sink_times_out_on_silent_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let sink = TelegramSink::with_api_base(
            &TelegramConfig {
                bot_token: "TOKEN".to_string(),
                chat_id: Some("42".to_string()),
                request_timeout: Duration::from_millis(300),
            },
            &format!("http://{}", addr),
        )
        .unwrap();

        let err = tokio::time::timeout(Duration::from_secs(10), sink.send("hello"))
            .await
            .expect("send must give up on its own")
            .unwrap_err();
        assert!(matches!(err, NotifyError::Network(ref e) if e.is_timeout()));
    }
}
