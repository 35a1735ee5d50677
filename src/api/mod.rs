pub mod error;
pub mod http;
pub mod notices;
pub mod types;
pub mod upbit;

pub use error::{FetchError, SourceError};
pub use http::{HttpClient, RetryPolicy};
pub use notices::NoticeParser;
pub use types::*;
pub use upbit::{MarketSource, NoticeSource, UpbitClient};
