//! Ports: what the subsystem offers (inbound) and what it drives (outbound).

pub mod inbound;
pub mod outbound;

pub use inbound::{ChannelLifecycleApi, ChannelReceipt, TransferDestination};
pub use outbound::{ChannelUsage, Coordinator, LedgerContract, Store, TxHandle};
