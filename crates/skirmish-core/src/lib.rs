//! skirmish-core
//!
//! Match orchestration for pelican/panther agents: games are played turn by
//! turn, each decision is fetched from an agent process over a message broker,
//! and results are persisted once per game.
//!
//! # Modules
//! - **domain**: ids, roles, game states, action tokens, records, config
//! - **codec**: observation tree ⇄ transport JSON
//! - **ports**: broker, stores, rule engine, deciders, clock, ids
//! - **rpc**: request/reply client, agent server, readiness handshake
//! - **app**: game loop, video, persistence gateway, coordinator, scheduling
//! - **impls**: in-memory and local implementations of the ports

pub mod app;
pub mod codec;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod rpc;
