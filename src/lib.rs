//! vds-gateway: a tool-oriented data access gateway for seismic volume datasets.
//!
//! Exposes a catalog of MCP tools over stdio so an LLM-driven chat front end
//! can discover, extract, visualize, and validate claims about a corpus of
//! seismic volumes without ever touching the native volume library directly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              MCP Server (rmcp)              │
//! │         JSON-RPC over stdin/stdout          │
//! └─────────────────┬───────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────┐
//! │         Bulk Router → Tool Router            │
//! │  search, extract, validate, agent control    │
//! └───────┬─────────┬─────────┬─────────┬───────┘
//!         │         │         │         │
//!    ┌────▼───┐ ┌───▼───┐ ┌───▼────┐ ┌──▼─────┐
//!    │ Volume │ │ Index │ │ Agent  │ │Integrity│
//!    │ Access │ │ Client│ │Manager │ │ Engine │
//!    └────┬───┘ └───┬───┘ └───┬────┘ └──┬─────┘
//!         │         │         │         │
//!    ┌────▼─────────▼─────────▼─────────▼────┐
//!    │   Query Cache (C3) · Mount Health (C4)  │
//!    └──────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod cache;
pub mod chatproxy;
pub mod config;
pub mod error;
pub mod index;
pub mod integrity;
pub mod mount;
pub mod profiling;
pub mod router;
pub mod server;
pub mod types;
pub mod volume;
pub mod warnings;

pub use config::Config;
pub use error::{GatewayError, Result};
pub use types::SurveyId;
