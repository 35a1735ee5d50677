pub mod new_listings;
pub mod notices;

pub use new_listings::{detect_new_markets, MarketDiff, MarketFilter};
pub use notices::fresh_notices;
