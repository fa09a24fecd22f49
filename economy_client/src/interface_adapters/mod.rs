// Interface adapters: wire protocol, backend clients, persistence and presentation.

pub mod clients;
pub mod display;
pub mod hub;
pub mod protocol;
pub mod session_store;
