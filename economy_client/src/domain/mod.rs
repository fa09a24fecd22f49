// Domain layer: ledger entities, the error taxonomy and the ports adapters implement.

pub mod amount;
pub mod entities;
pub mod errors;
pub mod ports;

// Re-export the domain boundary types and ports.
pub use amount::TransferLimits;
pub use entities::{
    Counterparty, JoinCode, LiveEvent, Player, PlayerId, Role, Session, Transaction,
};
pub use errors::{ClientError, FailureHint};
pub use ports::{
    AuthGateway, Clock, HubConnection, HubTransport, JoinRequest, LedgerGateway,
    ReconnectPolicy, SessionStore,
};
