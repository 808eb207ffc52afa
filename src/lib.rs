//! On-chain guestbook backend.
//!
//! Serves the guestbook feed read from the contract, builds unsigned
//! contract calls for posting and withdrawing, and fronts the AI
//! moderation and generation endpoints behind a per-client admission guard.

pub mod abi;
pub mod assistant;
pub mod chain;
pub mod config;
pub mod error;
pub mod feed;
pub mod rate_limiter;
pub mod server;
pub mod time_ago;

pub use config::Config;
pub use feed::{derive_view, Address, FeedState, FeedView, GuestbookMessage};
pub use rate_limiter::{Admission, RateLimiter};
pub use time_ago::time_ago;
