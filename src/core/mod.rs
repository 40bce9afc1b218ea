//! Core business logic module
//!
//! This module contains the transaction processing components:
//! - `traits` - Persistence gateway and completion callback abstractions
//! - `memory_gateway` - In-memory persistence gateway with atomic scopes
//! - `coordinator` - All-or-nothing two-account transfers
//! - `engine` - Single-worker asynchronous transaction engine
//! - `audit` - Periodic read-only audit

pub mod audit;
pub mod coordinator;
pub mod engine;
pub mod memory_gateway;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use audit::{AuditConfig, AuditHandle, AuditProcess, AuditReport};
pub use coordinator::{TransferCoordinator, TransferReceipt};
pub use engine::{EngineConfig, ShutdownMode, ShutdownReport, TransactionEngine};
pub use memory_gateway::InMemoryGateway;
pub use traits::{reply_channel, PersistenceGateway, ReplyCallback, TransactionCallback};
