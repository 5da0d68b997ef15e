//! Generation levels and slot positions.
//!
//! The expansion tree is flattened into per-level buckets, and each
//! bucket is spread horizontally around the configured center. Layout is
//! deterministic: the same expansion always yields the same positions.
//! It does not try to avoid overlaps between unrelated branches.

use crate::traversal::ExpansionNode;
use kintree_core::{Relationship, RelationshipKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canvas geometry used to turn slots into coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    pub center_x: f64,
    pub center_y: f64,
    pub horizontal_spacing: f64,
    pub vertical_spacing: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            center_x: 800.0,
            center_y: 600.0,
            horizontal_spacing: 200.0,
            vertical_spacing: 150.0,
        }
    }
}

/// Where one person is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub level: i32,
}

/// Positions of every rendered person, plus the per-level buckets they
/// were laid out from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionMap {
    pub positions: BTreeMap<String, Position>,
    /// Level → ids in slot order.
    pub levels: BTreeMap<i32, Vec<String>>,
}

impl PositionMap {
    pub fn get(&self, id: &str) -> Option<&Position> {
        self.positions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Ids on the given level, in slot order.
    pub fn level(&self, level: i32) -> &[String] {
        self.levels.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Assigns a level and a slot to every person in the expansion.
///
/// The walk visits a node, then its spouses, its sibling subtrees, its
/// children and finally its parents. An id keeps the level of the first
/// place it is met; later sightings are ignored.
pub fn assign_positions(root: &ExpansionNode, config: &LayoutConfig) -> PositionMap {
    let mut map = PositionMap::default();
    collect(root, &mut map);

    for (level, ids) in &map.levels {
        let n = ids.len() as f64;
        let start_x = config.center_x - (n - 1.0) * config.horizontal_spacing / 2.0;
        let y = config.center_y + f64::from(*level) * config.vertical_spacing;
        for (i, id) in ids.iter().enumerate() {
            map.positions.insert(
                id.clone(),
                Position {
                    x: start_x + i as f64 * config.horizontal_spacing,
                    y,
                    level: *level,
                },
            );
        }
    }

    map
}

fn place(map: &mut PositionMap, placed: &str, level: i32) {
    if map.positions.contains_key(placed) {
        return;
    }
    // placeholder until coordinates are computed
    map.positions.insert(
        placed.to_string(),
        Position {
            x: 0.0,
            y: 0.0,
            level,
        },
    );
    map.levels.entry(level).or_default().push(placed.to_string());
}

fn collect(node: &ExpansionNode, map: &mut PositionMap) {
    place(map, &node.id, node.level);
    for spouse in &node.spouses {
        place(map, &spouse.id, node.level);
    }
    for sibling in &node.siblings {
        collect(sibling, map);
    }
    for child in &node.children {
        collect(child, map);
    }
    for parent in &node.parents {
        collect(parent, map);
    }
}

/// An edge whose two endpoints are both on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutEdge {
    pub kind: RelationshipKind,
    pub source: String,
    pub target: String,
}

/// Selects the relationships to draw for a layout, in relationship order.
///
/// Parent-child edges go from parent to child; spouse edges keep their
/// stored order. Anything with an endpoint off screen is left out.
pub fn rendered_edges(relationships: &[Relationship], positions: &PositionMap) -> Vec<LayoutEdge> {
    relationships
        .iter()
        .filter_map(|rel| {
            let (source, target) = rel.endpoints();
            if positions.contains(source) && positions.contains(target) {
                Some(LayoutEdge {
                    kind: rel.kind(),
                    source: source.to_string(),
                    target: target.to_string(),
                })
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjacency::AdjacencyIndex;
    use crate::traversal::{build_rooted_view, CollapsedSet};
    use kintree_core::Person;

    fn layout(
        ids: &[&str],
        rels: &[Relationship],
        root: &str,
        collapsed: &CollapsedSet,
    ) -> PositionMap {
        let people: Vec<Person> = ids.iter().map(|id| Person::new(*id, *id)).collect();
        let adj = AdjacencyIndex::build(rels);
        let view = build_rooted_view(root, &people, &adj, collapsed).unwrap();
        assign_positions(&view, &LayoutConfig::default())
    }

    #[test]
    fn test_spouse_and_child_scenario() {
        let rels = vec![
            Relationship::spouse("A", "B"),
            Relationship::parent_child("A", "C"),
            Relationship::parent_child("B", "C"),
        ];
        let map = layout(&["A", "B", "C"], &rels, "A", &CollapsedSet::new());

        assert_eq!(map.len(), 3);
        assert_eq!(map.get("A").unwrap().level, 0);
        assert_eq!(map.get("B").unwrap().level, 0);
        assert_eq!(map.get("C").unwrap().level, 1);

        // two people on level 0 straddle the center
        assert_eq!(map.get("A").unwrap().x, 700.0);
        assert_eq!(map.get("B").unwrap().x, 900.0);
        assert_eq!(map.get("A").unwrap().y, 600.0);
        assert_eq!(map.get("C").unwrap().x, 800.0);
        assert_eq!(map.get("C").unwrap().y, 750.0);

        let edges = rendered_edges(&rels, &map);
        assert_eq!(edges.len(), 3);
        assert!(edges.contains(&LayoutEdge {
            kind: RelationshipKind::ParentChild,
            source: "A".into(),
            target: "C".into(),
        }));
        assert!(edges.contains(&LayoutEdge {
            kind: RelationshipKind::ParentChild,
            source: "B".into(),
            target: "C".into(),
        }));
    }

    #[test]
    fn test_levels_follow_parent_child_edges() {
        let rels = vec![
            Relationship::parent_child("grandpa", "dad"),
            Relationship::parent_child("grandpa", "uncle"),
            Relationship::parent_child("dad", "me"),
            Relationship::parent_child("uncle", "cousin"),
            Relationship::parent_child("me", "son"),
        ];
        let ids = ["grandpa", "dad", "uncle", "me", "cousin", "son"];
        let map = layout(&ids, &rels, "me", &CollapsedSet::new());

        assert_eq!(map.len(), 6);
        for rel in &rels {
            let (parent, child) = rel.endpoints();
            let parent_level = map.get(parent).unwrap().level;
            let child_level = map.get(child).unwrap().level;
            assert_eq!(child_level, parent_level + 1, "{} -> {}", parent, child);
        }
        assert_eq!(map.level(0), ["me", "cousin"]);
    }

    #[test]
    fn test_no_id_twice_in_a_level() {
        // spouse listed twice and a shared child reachable two ways
        let rels = vec![
            Relationship::spouse("a", "b"),
            Relationship::spouse("b", "a"),
            Relationship::parent_child("a", "c"),
            Relationship::parent_child("b", "c"),
            Relationship::parent_child("x", "a"),
            Relationship::parent_child("x", "b"),
        ];
        let map = layout(&["a", "b", "c", "x"], &rels, "a", &CollapsedSet::new());

        for ids in map.levels.values() {
            let mut sorted = ids.clone();
            sorted.sort();
            sorted.dedup();
            assert_eq!(sorted.len(), ids.len());
        }
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_rerender_is_identical() {
        let rels = vec![
            Relationship::parent_child("p", "a"),
            Relationship::parent_child("p", "b"),
            Relationship::spouse("a", "s"),
            Relationship::parent_child("a", "k"),
        ];
        let ids = ["p", "a", "b", "s", "k"];
        let first = layout(&ids, &rels, "a", &CollapsedSet::new());
        let second = layout(&ids, &rels, "a", &CollapsedSet::new());
        assert_eq!(first, second);
    }

    #[test]
    fn test_collapse_removes_only_descendants() {
        let rels = vec![
            Relationship::parent_child("root", "mid"),
            Relationship::parent_child("mid", "leaf"),
            Relationship::spouse("mid", "partner"),
            Relationship::parent_child("top", "root"),
        ];
        let ids = ["root", "mid", "leaf", "partner", "top"];
        let open = layout(&ids, &rels, "root", &CollapsedSet::new());
        let collapsed: CollapsedSet = ["mid"].into_iter().collect();
        let closed = layout(&ids, &rels, "root", &collapsed);

        let hidden: Vec<&String> = open
            .positions
            .keys()
            .filter(|id| !closed.contains(id))
            .collect();
        assert_eq!(hidden, [&"leaf".to_string()]);
        assert!(closed.contains("partner"));
        assert!(closed.contains("top"));

        let reopened = layout(&ids, &rels, "root", &CollapsedSet::new());
        assert_eq!(open, reopened);
    }

    #[test]
    fn test_collapse_with_two_recorded_parents() {
        let rels = vec![
            Relationship::parent_child("grandpa", "dad"),
            Relationship::parent_child("grandma", "dad"),
            Relationship::parent_child("grandpa", "uncle"),
            Relationship::parent_child("grandma", "uncle"),
            Relationship::parent_child("dad", "me"),
            Relationship::parent_child("uncle", "cousin"),
        ];
        let ids = ["grandpa", "grandma", "dad", "uncle", "me", "cousin"];
        let open = layout(&ids, &rels, "me", &CollapsedSet::new());
        let collapsed: CollapsedSet = ["grandpa"].into_iter().collect();
        let closed = layout(&ids, &rels, "me", &collapsed);

        let hidden: Vec<&str> = open
            .positions
            .keys()
            .map(String::as_str)
            .filter(|id| !closed.contains(id))
            .collect();
        assert_eq!(hidden, ["cousin", "uncle"]);
        assert_eq!(closed.level(-2), ["grandpa", "grandma"]);
    }

    #[test]
    fn test_edges_skip_offscreen_endpoints() {
        let rels = vec![
            Relationship::parent_child("a", "b"),
            Relationship::parent_child("ghost", "a"),
        ];
        let map = layout(&["a", "b"], &rels, "a", &CollapsedSet::new());
        let edges = rendered_edges(&rels, &map);

        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, "a");
    }

    #[test]
    fn test_custom_spacing() {
        let config = LayoutConfig {
            center_x: 0.0,
            center_y: 0.0,
            horizontal_spacing: 10.0,
            vertical_spacing: 20.0,
        };
        let people = vec![Person::new("p", "P"), Person::new("c", "C")];
        let rels = vec![Relationship::parent_child("p", "c")];
        let adj = AdjacencyIndex::build(&rels);
        let view = build_rooted_view("c", &people, &adj, &CollapsedSet::new()).unwrap();
        let map = assign_positions(&view, &config);

        assert_eq!(map.get("p").unwrap().y, -20.0);
        assert_eq!(map.get("c").unwrap().x, 0.0);
    }
}
