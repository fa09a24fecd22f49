// Use cases layer: client workflows over the economy backend.

pub mod dashboard;
pub mod feed;
pub mod join;
pub mod polling;
pub mod queries;
pub mod transfer;

#[cfg(test)]
pub(crate) mod test_support;

pub use dashboard::{AppState, Dashboard, DashboardFeeds, HistoryScope};
pub use feed::{EventLog, FeedState, LiveFeed};
pub use join::JoinClient;
pub use polling::{Poller, Snapshot};
pub use queries::{LedgerQueries, ListingCache, SharedCache};
pub use transfer::TransferClient;
