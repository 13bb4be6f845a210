//! tlc-core — the Transfer List container used to hand data between boot stages.
//! The `tlc` tool and any other producer or consumer of lists build on this crate.

pub mod config;
pub mod entry;
pub mod list;
pub mod payload;
pub mod wire;

pub use entry::TransferEntry;
pub use list::{TlOps, TransferList, TransferListOptions};
pub use payload::{EntryPayload, EntryPointInfo, EntryPointParams, ExecutionState};
pub use wire::{tag, Endianness, TlError};
