//! WebSocket server implementation.
//!
//! Handles client connections, routes messages to handlers and, after
//! each successful edit, saves the document (when a path is configured)
//! and tells every connected client that it changed.

use crate::handlers::{
    handle_collapse_toggle, handle_cycle_check, handle_document_get, handle_document_load,
    handle_document_meta, handle_info, handle_parent_child, handle_person_add,
    handle_person_delete, handle_person_search, handle_person_update, handle_relationship_delete,
    handle_render, handle_spouse,
};
use crate::protocol::{
    CollapseParams, CycleCheckParams, DocumentLoadParams, MetaParams, Notification,
    ParentChildParams, PersonDeleteParams, PersonUpdateParams, RenderParams, Request, Response,
    SearchParams, SpouseParams, INTERNAL_ERROR,
};
use crate::SharedEngine;
use futures_util::{SinkExt, StreamExt};
use kintree_core::{DocumentError, PersonFields, RelationshipKey};
use kintree_graph::EngineContext;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::{accept_async, tungstenite, tungstenite::Message};
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub addr: SocketAddr,
    /// Where edits are written back to. `None` keeps them in memory.
    pub document_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 7432)),
            document_path: None,
        }
    }
}

/// The Kintree WebSocket server.
pub struct KintreeServer {
    config: ServerConfig,
    engine: SharedEngine,
    events: broadcast::Sender<Notification>,
}

impl KintreeServer {
    /// Creates a new server around an engine.
    pub fn new(engine: EngineContext, config: ServerConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            config,
            engine: Arc::new(RwLock::new(engine)),
            events,
        }
    }

    /// Runs the server, accepting connections forever.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        info!("Kintree server listening on {}", self.config.addr);

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("New connection from {}", addr);
                    let connection = Connection {
                        engine: self.engine.clone(),
                        events: self.events.clone(),
                        document_path: self.config.document_path.clone(),
                    };
                    tokio::spawn(async move {
                        if let Err(e) = connection.serve(stream, addr).await {
                            error!("Connection error from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Per-connection state.
struct Connection {
    engine: SharedEngine,
    events: broadcast::Sender<Notification>,
    document_path: Option<PathBuf>,
}

impl Connection {
    async fn serve(self, stream: TcpStream, addr: SocketAddr) -> Result<(), ServerError> {
        let ws_stream = accept_async(stream).await?;
        info!("WebSocket connection established with {}", addr);

        let (mut write, mut read) = ws_stream.split();
        let mut events = self.events.subscribe();

        loop {
            tokio::select! {
                msg = read.next() => {
                    let msg = match msg {
                        Some(Ok(m)) => m,
                        Some(Err(e)) => {
                            warn!("Message error from {}: {}", addr, e);
                            break;
                        }
                        None => break,
                    };

                    if msg.is_close() {
                        debug!("Client {} disconnected", addr);
                        break;
                    }

                    if msg.is_ping() {
                        write.send(Message::Pong(msg.into_data())).await?;
                        continue;
                    }

                    if msg.is_text() {
                        let text = msg.to_text().unwrap_or("");
                        let response = self.respond(text).await;
                        let json = serde_json::to_string(&response)?;
                        write.send(Message::Text(json)).await?;
                    }
                }

                event = events.recv() => {
                    match event {
                        Ok(notification) => {
                            let json = serde_json::to_string(&notification)?;
                            if write.send(Message::Text(json)).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Client {} lagged by {} notifications", addr, n);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }

        info!("Connection closed: {}", addr);
        Ok(())
    }

    /// Handles one request. Edits are saved before the answer goes out,
    /// and a failed save turns the answer into an error.
    async fn respond(&self, text: &str) -> Response {
        let (response, changed) = process_message(text, self.engine.clone()).await;
        if !changed {
            return response;
        }
        match self.commit().await {
            Ok(()) => response,
            Err(e) => {
                error!("Failed to save document: {}", e);
                Response::error(
                    response.id,
                    INTERNAL_ERROR,
                    format!("Edit applied in memory but not saved: {}", e),
                )
            }
        }
    }

    /// Persists the document and announces the change.
    ///
    /// The notification goes out even when the save fails, since the
    /// in-memory document has changed either way.
    async fn commit(&self) -> Result<(), DocumentError> {
        let engine = self.engine.read().await;
        let doc = engine.document();

        let saved = match &self.document_path {
            Some(path) => doc.save(path).map(|()| debug!("Saved {}", path.display())),
            None => Ok(()),
        };

        let notification = Notification::new(
            "document.changed",
            json!({
                "modified": doc.meta.modified,
                "peopleCount": doc.people.len(),
                "relationshipCount": doc.relationships.len(),
            }),
        );
        // no subscribers is fine
        let _ = self.events.send(notification);
        saved
    }
}

fn parse_params<T: DeserializeOwned>(id: &Option<Value>, params: Value) -> Result<T, Response> {
    serde_json::from_value(params).map_err(|e| Response::invalid_params(id.clone(), e.to_string()))
}

/// Processes a JSON-RPC message.
///
/// Returns the response and whether the document was changed.
pub(crate) async fn process_message(text: &str, engine: SharedEngine) -> (Response, bool) {
    // Parse the request
    let request: Request = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(_) => return (Response::parse_error(), false),
    };

    let id = request.id.clone();
    if request.jsonrpc != "2.0" {
        return (
            Response::invalid_request(id, "Only JSON-RPC 2.0 is supported"),
            false,
        );
    }
    let method = request.method.as_str();

    debug!("Processing method: {}", method);

    macro_rules! call {
        ($handler:ident, $params:ty) => {
            match parse_params::<$params>(&id, request.params) {
                Ok(params) => $handler(engine, id, params).await,
                Err(response) => response,
            }
        };
    }

    // Route to handler
    let (response, mutates) = match method {
        "document.info" => (handle_info(engine, id).await, false),
        "document.get" => (handle_document_get(engine, id).await, false),
        "document.load" => (call!(handle_document_load, DocumentLoadParams), true),
        "document.meta" => (call!(handle_document_meta, MetaParams), true),

        "render" => {
            let params = if request.params.is_null() {
                Ok(RenderParams::default())
            } else {
                parse_params::<RenderParams>(&id, request.params)
            };
            match params {
                Ok(params) => (handle_render(engine, id, params).await, false),
                Err(response) => (response, false),
            }
        }
        "collapse.toggle" => (call!(handle_collapse_toggle, CollapseParams), false),
        "cycle.check" => (call!(handle_cycle_check, CycleCheckParams), false),

        "person.add" => (call!(handle_person_add, PersonFields), true),
        "person.update" => (call!(handle_person_update, PersonUpdateParams), true),
        "person.delete" => match parse_params::<PersonDeleteParams>(&id, request.params) {
            Ok(params) => {
                let mutates = !params.dry_run;
                (handle_person_delete(engine, id, params).await, mutates)
            }
            Err(response) => (response, false),
        },
        "person.search" => (call!(handle_person_search, SearchParams), false),

        "relationship.parentChild" => (call!(handle_parent_child, ParentChildParams), true),
        "relationship.spouse" => (call!(handle_spouse, SpouseParams), true),
        "relationship.delete" => (call!(handle_relationship_delete, RelationshipKey), true),

        _ => (Response::method_not_found(id, method), false),
    };

    let changed = mutates && response.is_success();
    (response, changed)
}
