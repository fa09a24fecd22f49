// The clients defined here are reqwest clients for the economy backend.

pub mod auth;
pub(crate) mod http;
pub mod ledger;

pub use auth::AuthClient;
pub use ledger::LedgerClient;
