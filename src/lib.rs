//! # Abacus — Distributed Expression Calculator
//!
//! A two-tier calculator: a central orchestrator and a fleet of stateless
//! compute agents. Submitted expressions are validated, lowered into a
//! dependency DAG of binary operations, and persisted; agents lease
//! eligible operations over a server-streaming gRPC dispatch, sleep
//! through the declared operation duration, and report results that the
//! store merges back into dependent tasks until the final value lands on
//! the expression.
//!
//! ## Module Organization
//!
//! **Core pipeline:**
//! - [`validate`] — syntactic validation with typed rejection kinds
//! - [`planner`] — shunting-yard lowering to the task DAG
//! - [`db`] — PostgreSQL task store: transactional create, `SKIP LOCKED`
//!   leasing, dependency resolution, expiry recovery
//! - [`service`] — policy layer: durations, ownership, error translation
//!
//! **Transports:**
//! - [`http`] — user-facing JSON API (register, login, calculate, poll)
//! - [`dispatch`] — orchestrator↔agent gRPC (task stream + result ingest)
//! - [`agent`] — the worker side: client, compute, pool
//!
//! **Shared:**
//! - [`model`], [`auth`], [`config`]

pub mod agent;
pub mod auth;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod http;
pub mod model;
pub mod planner;
pub mod service;
pub mod validate;

/// Generated gRPC types for the dispatch service.
pub mod rpc {
    tonic::include_proto!("dispatch.v1");
}
