//! docuchat: the document-chat core behind a "chat with your PDF" product.
//!
//! Two pipelines share one SQLite-backed store:
//!
//! ```text
//! upload event ──> dedup ──> PROCESSING ──> fetch ──> extract ──> quota ──> index ──> SUCCESS
//!                                                                    │
//!                                                                    └──────────────> FAILED
//!
//! question ──> ownership check ──> persist user turn ──> retrieve top-k
//!          ──> bounded history ──> prompt ──> stream fragments ──> persist assistant turn
//! ```
//!
//! # Modules
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`config`] | TOML configuration with validated defaults |
//! | [`models`] | Core types: file artifacts, text units, messages, plans |
//! | [`error`] | Ingestion and answer-path error taxonomies |
//! | [`db`] / [`migrate`] | SQLite pool and idempotent schema migrations |
//! | [`store`] | Record store: files and messages |
//! | [`extract`] | PDF, CSV, and spreadsheet extraction into ordered text units |
//! | [`quota`] | Per-file unit limits by subscription plan |
//! | [`embedding`] | Embedding provider trait, OpenAI client, vector codecs |
//! | [`index`] | Namespaced vector index: atomic writes, cosine top-k reads |
//! | [`ingest`] | Ingestion orchestrator (upload event → terminal status) |
//! | [`prompt`] | Grounding prompt assembly from passages and history |
//! | [`llm`] | Streaming language-model trait and OpenAI SSE client |
//! | [`answer`] | Answer engine: retrieve, stream, persist the turn |
//! | [`auth`] | HMAC bearer tokens for request identity |
//! | [`server`] | axum HTTP edge |

pub mod answer;
pub mod auth;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod quota;
pub mod server;
pub mod store;
