//! Impls - in-process and local implementations of the ports.
//!
//! # Included
//! - **InMemoryBroker**: queues, prefetch and redelivery in one process
//! - **InMemoryMatchStore**: MatchStore behind a single lock
//! - **InMemoryBlobStore** / **LocalBlobStore**: blobs in a map or on disk
//! - **ScriptedBoardFactory**: fixed-length games with a preset outcome
//!
//! # Production implementations
//! AMQP, SQL and cloud blob adapters implement the same ports in their own
//! crates.

pub mod inmem_blob;
pub mod inmem_broker;
pub mod inmem_store;
pub mod local_blob;
pub mod scripted_board;

pub use self::inmem_blob::InMemoryBlobStore;
pub use self::inmem_broker::InMemoryBroker;
pub use self::inmem_store::InMemoryMatchStore;
pub use self::local_blob::LocalBlobStore;
pub use self::scripted_board::{ActionLog, ActionRecord, ScriptedBoard, ScriptedBoardFactory};
