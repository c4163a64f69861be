//! # Embedsync
//!
//! Keeps derived vector embeddings synchronized with mutable source
//! documents.
//!
//! Embedsync watches a document store for content changes, enqueues
//! regeneration jobs into a durable visibility-timeout queue, and drains that
//! queue with an adaptive, time-budgeted worker loop until every document's
//! sidecar embedding matches its current content fingerprint: eventual
//! consistency despite partial failures, with at-least-once processing.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐ mutation  ┌──────────┐        ┌──────────┐
//! │ Documents │──────────▶│ Enqueuer │───────▶│ JobQueue │
//! └─────┬─────┘ fast path └──────────┘        └────┬─────┘
//!       │                       ▲                  │ claim
//!       │ stale scan      ┌─────┴─────┐       ┌────▼──────┐
//!       └────────────────▶│ Detector  │       │ DrainLoop │
//!                         └───────────┘       └────┬──────┘
//!                               ▲                  │ embed + upsert
//!                         ┌─────┴─────┐       ┌────▼──────┐
//!                         │ Autopilot │       │  Sidecar  │
//!                         └───────────┘       └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! esy init                        # create database
//! esy put doc-1 --content "..."   # write a document (enqueues a job)
//! esy drain                       # process pending jobs once
//! esy autopilot                   # run the periodic scheduler
//! esy status                      # check coverage and backlog
//! esy serve                       # start the HTTP trigger/monitoring server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`fingerprint`] | Content fingerprinting and staleness check |
//! | [`documents`] | Source document store + mutation hook |
//! | [`sidecar`] | Derived embedding store |
//! | [`queue`] | Durable visibility-timeout job queue |
//! | [`detector`] | Stale-set detection |
//! | [`enqueue`] | Scan-path and fast-path enqueue |
//! | [`drain`] | Adaptive drain loop |
//! | [`autopilot`] | Periodic scheduler with load shedding |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`status`] | Monitoring aggregates |
//! | [`server`] | HTTP trigger + monitoring server |
//! | [`errlog`] | Append-only error log |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod autopilot;
pub mod config;
pub mod db;
pub mod detector;
pub mod documents;
pub mod drain;
pub mod embedding;
pub mod enqueue;
pub mod errlog;
pub mod fingerprint;
pub mod migrate;
pub mod models;
pub mod queue;
pub mod server;
pub mod sidecar;
pub mod status;
