//! Watches the Upbit market catalog and notice board for new listings and
//! pushes Telegram alerts.

pub mod api;
pub mod core;
pub mod monitoring;
pub mod scanner;
