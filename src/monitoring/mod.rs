pub mod baseline;
pub mod notifier;
pub mod watcher;

pub use baseline::{BaselineKey, BaselineStore, KnownMarkets, KnownNoticeIds, StoreError};
pub use notifier::{ListingNotifier, MessageSink, NotifyError, TelegramSink};
pub use watcher::{BootstrapReport, CycleError, CycleReport, ListingWatcher};
