//! Request handlers for protocol methods.
//!
//! Each handler implements one method. Reads take the engine's read lock;
//! edits take the write lock for the whole call, so every edit is seen
//! by other connections either completely or not at all.

use crate::protocol::{
    CollapseParams, CycleCheckParams, DocumentLoadParams, MetaParams, ParentChildParams,
    PersonDeleteParams, PersonUpdateParams, RenderParams, Response, SearchParams, SpouseParams,
    CONFLICT, INVALID_DATA, NOT_FOUND,
};
use crate::SharedEngine;
use kintree_core::{PersonFields, RelationshipKey};
use kintree_graph::{RenderError, StoreError};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, info};

/// Maps an edit failure to a JSON-RPC error.
///
/// A rejected cycle carries `{"cycle": true}` in `data` so the client
/// can ask for confirmation and retry with `force`.
fn store_error(id: Option<Value>, e: StoreError) -> Response {
    match &e {
        StoreError::PersonNotFound(_) | StoreError::RelationshipNotFound(_) => {
            Response::error(id, NOT_FOUND, e.to_string())
        }
        StoreError::InvalidPerson(_) | StoreError::NoParents => {
            Response::error(id, INVALID_DATA, e.to_string())
        }
        StoreError::WouldCreateCycle { parent, child } => Response::error_with_data(
            id,
            CONFLICT,
            e.to_string(),
            json!({ "cycle": true, "parent": parent, "child": child }),
        ),
        StoreError::DuplicatePersonId(_)
        | StoreError::SelfParent(_)
        | StoreError::SelfSpouse(_)
        | StoreError::SameParents(_) => Response::error(id, CONFLICT, e.to_string()),
    }
}

/// Handles the document.info method.
pub async fn handle_info(engine: SharedEngine, id: Option<Value>) -> Response {
    let e = engine.read().await;
    let doc = e.document();

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct InfoResult<'a> {
        title: &'a str,
        root_person_id: Option<&'a str>,
        people_count: usize,
        relationship_count: usize,
        collapsed: Vec<&'a str>,
        issue_count: usize,
        modified: Option<&'a str>,
        version: &'static str,
    }

    Response::success(
        id,
        InfoResult {
            title: &doc.meta.title,
            root_person_id: e.default_root(),
            people_count: doc.people.len(),
            relationship_count: doc.relationships.len(),
            collapsed: e.collapsed().iter().collect(),
            issue_count: e.issues().len(),
            modified: doc.meta.modified.as_deref(),
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}

/// Handles the document.get method.
pub async fn handle_document_get(engine: SharedEngine, id: Option<Value>) -> Response {
    let e = engine.read().await;
    Response::success(id, e.document())
}

/// Handles the document.meta method.
pub async fn handle_document_meta(
    engine: SharedEngine,
    id: Option<Value>,
    params: MetaParams,
) -> Response {
    let mut e = engine.write().await;
    e.update_meta(params.title, params.notes);
    info!("Updated document metadata");
    Response::success(id, &e.document().meta)
}

/// Handles the document.load method.
pub async fn handle_document_load(
    engine: SharedEngine,
    id: Option<Value>,
    params: DocumentLoadParams,
) -> Response {
    let mut document = params.document;
    document.ensure_timestamps();

    let mut e = engine.write().await;
    e.load(document);
    let issues = e.issues();
    info!("Document replaced by client: {} issues", issues.len());

    Response::success(
        id,
        json!({
            "peopleCount": e.document().people.len(),
            "relationshipCount": e.document().relationships.len(),
            "issues": issues,
        }),
    )
}

/// Handles the render method.
pub async fn handle_render(
    engine: SharedEngine,
    id: Option<Value>,
    params: RenderParams,
) -> Response {
    let start = Instant::now();
    let e = engine.read().await;

    let root = match params.root.as_deref().or_else(|| e.default_root()) {
        Some(root) => root.to_string(),
        None => return Response::error(id, NOT_FOUND, RenderError::EmptyDocument.to_string()),
    };
    debug!("Render from {}", root);

    let tree = match e.rooted_view(&root) {
        Ok(tree) => tree,
        Err(err) => return Response::error(id, NOT_FOUND, err.to_string()),
    };
    let positions = kintree_graph::assign_positions(&tree, e.layout());
    let edges = e.rendered_edges(&positions);

    Response::success(
        id,
        json!({
            "root": root,
            "positions": positions.positions,
            "levels": positions.levels,
            "edges": edges,
            "collapsed": e.collapsed(),
            "tree": if params.include_tree { Some(&tree) } else { None },
            "queryTime": start.elapsed().as_millis() as u64,
        }),
    )
}

/// Handles the collapse.toggle method.
pub async fn handle_collapse_toggle(
    engine: SharedEngine,
    id: Option<Value>,
    params: CollapseParams,
) -> Response {
    let mut e = engine.write().await;
    if e.store().person(&params.id).is_none() {
        return Response::error(id, NOT_FOUND, format!("Person not found: {}", params.id));
    }
    let collapsed = e.toggle_collapse(&params.id);
    Response::success(id, json!({ "id": params.id, "collapsed": collapsed }))
}

/// Handles the cycle.check method.
pub async fn handle_cycle_check(
    engine: SharedEngine,
    id: Option<Value>,
    params: CycleCheckParams,
) -> Response {
    let e = engine.read().await;
    let would_create_cycle = e.check_cycle(&params.parent, &params.child);
    Response::success(
        id,
        json!({
            "parent": params.parent,
            "child": params.child,
            "wouldCreateCycle": would_create_cycle,
        }),
    )
}

/// Handles the person.add method.
pub async fn handle_person_add(
    engine: SharedEngine,
    id: Option<Value>,
    params: PersonFields,
) -> Response {
    let mut e = engine.write().await;
    match e.add_person(params) {
        Ok(person_id) => Response::success(id, json!({ "id": person_id })),
        Err(err) => store_error(id, err),
    }
}

/// Handles the person.update method.
pub async fn handle_person_update(
    engine: SharedEngine,
    id: Option<Value>,
    params: PersonUpdateParams,
) -> Response {
    let mut e = engine.write().await;
    match e.update_person(&params.id, params.person) {
        Ok(()) => Response::success(id, e.store().person(&params.id)),
        Err(err) => store_error(id, err),
    }
}

/// Handles the person.delete method.
///
/// With `dryRun` the impact is reported and nothing is removed.
pub async fn handle_person_delete(
    engine: SharedEngine,
    id: Option<Value>,
    params: PersonDeleteParams,
) -> Response {
    let result = if params.dry_run {
        engine.read().await.deletion_impact(&params.id)
    } else {
        engine.write().await.delete_person(&params.id)
    };

    match result {
        Ok(impact) => Response::success(
            id,
            json!({ "deleted": !params.dry_run, "impact": impact }),
        ),
        Err(err) => store_error(id, err),
    }
}

/// Handles the person.search method.
pub async fn handle_person_search(
    engine: SharedEngine,
    id: Option<Value>,
    params: SearchParams,
) -> Response {
    let start = Instant::now();
    let e = engine.read().await;

    debug!("Search: {}", params.query);

    let mut matches = e.search(&params.query);
    let total = matches.len();
    matches.truncate(params.limit);

    Response::success(
        id,
        json!({
            "people": matches,
            "total": total,
            "queryTime": start.elapsed().as_millis() as u64,
        }),
    )
}

/// Handles the relationship.parentChild method.
pub async fn handle_parent_child(
    engine: SharedEngine,
    id: Option<Value>,
    params: ParentChildParams,
) -> Response {
    let mut e = engine.write().await;
    let result = e.add_parents(
        params.father.as_deref(),
        params.mother.as_deref(),
        &params.child,
        params.biological,
        params.notes,
        params.force,
    );
    match result {
        Ok(outcomes) => Response::success(id, json!({ "outcomes": outcomes })),
        Err(err) => store_error(id, err),
    }
}

/// Handles the relationship.spouse method.
pub async fn handle_spouse(
    engine: SharedEngine,
    id: Option<Value>,
    params: SpouseParams,
) -> Response {
    let [a, b] = &params.people;
    let mut e = engine.write().await;
    match e.add_or_update_spouse(a, b, params.start_year, params.end_year, params.notes) {
        Ok(outcome) => Response::success(id, json!({ "outcome": outcome })),
        Err(err) => store_error(id, err),
    }
}

/// Handles the relationship.delete method.
pub async fn handle_relationship_delete(
    engine: SharedEngine,
    id: Option<Value>,
    key: RelationshipKey,
) -> Response {
    let mut e = engine.write().await;
    match e.delete_relationship(&key) {
        Ok(removed) => Response::success(id, json!({ "removed": removed })),
        Err(err) => store_error(id, err),
    }
}
