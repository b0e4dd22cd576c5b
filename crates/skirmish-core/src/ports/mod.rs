//! Ports - the seams to every external collaborator.
//!
//! Each trait hides one system the orchestrator talks to: the message broker,
//! the relational store, the blob store, the rule engine and the agents'
//! decision functions. In-memory and local implementations live in
//! `crate::impls`; production adapters live outside this crate.

pub mod blob_store;
pub mod board;
pub mod broker;
pub mod clock;
pub mod decider;
pub mod id_generator;
pub mod match_store;
pub mod move_source;

pub use self::blob_store::{BlobError, BlobStore, blob_url, strip_bucket_prefix};
pub use self::board::{Board, BoardError, BoardFactory, Frame};
pub use self::broker::{
    Broker, BrokerError, Connector, Consumer, Delivery, Message, MessageProperties, QueueOptions,
};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::decider::Decider;
pub use self::id_generator::{IdGenerator, IdGeneratorExt, UlidGenerator};
pub use self::match_store::{Listing, MatchStore, NewMatch, StoreError};
pub use self::move_source::MoveSource;
