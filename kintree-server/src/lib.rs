//! Kintree Server - JSON-RPC over WebSocket for family trees
//!
//! This crate exposes an [`EngineContext`] to external renderers and
//! editors. Clients send JSON-RPC 2.0 requests (`render`,
//! `collapse.toggle`, `person.add`, `relationship.parentChild`, ...) and
//! receive a `document.changed` notification whenever any client edits
//! the document.
//!
//! The server supports:
//! - Multiple concurrent connections sharing one engine
//! - Write-back of every edit to the document file
//! - Dry-run deletes and cycle checks for confirmation prompts

use kintree_graph::EngineContext;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Engine state shared across connections.
pub type SharedEngine = Arc<RwLock<EngineContext>>;

mod handlers;
mod protocol;
mod server;

pub use protocol::{Notification, Request, Response, RpcError};
pub use server::{KintreeServer, ServerConfig, ServerError};
