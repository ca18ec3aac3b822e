//! The pattern trie behind route lookup.
//!
//! One tree per HTTP method. Each node holds static children keyed by
//! segment, at most one named parameter edge, and an optional wildcard slot.
//! Lookup walks segment by segment with precedence static > parameter >
//! wildcard, and backtracks: a static branch that fails deeper in the tree
//! unwinds so the parameter edge at the same node still gets its turn, with
//! any bindings made on the dead branch popped on the way back up.

use std::collections::HashMap;

use crate::path::segments;

/// One trie node. The route index points into the router's route list.
#[derive(Default)]
pub(crate) struct Node {
    statics: HashMap<String, Node>,
    param: Option<Box<ParamEdge>>,
    wildcard: Option<usize>,
    route: Option<usize>,
}

/// The single parameter edge of a node, remembering the `:name` it binds.
struct ParamEdge {
    name: String,
    node: Node,
}

impl Node {
    /// Inserts a pattern. A `:name` segment adds or reuses the parameter
    /// edge (the first registered name is kept); a bare `*` takes the
    /// wildcard slot and ends the insertion — segments after it are ignored.
    /// The first route registered for a terminal wins.
    pub(crate) fn insert(&mut self, pattern: &str, route: usize) {
        let mut node = self;
        for seg in segments(pattern) {
            if seg == "*" {
                if node.wildcard.is_none() {
                    node.wildcard = Some(route);
                }
                return;
            }
            node = match seg.strip_prefix(':') {
                Some(name) => {
                    let edge = node.param.get_or_insert_with(|| {
                        Box::new(ParamEdge { name: name.to_owned(), node: Node::default() })
                    });
                    &mut edge.node
                }
                None => node.statics.entry(seg.to_owned()).or_default(),
            };
        }
        if node.route.is_none() {
            node.route = Some(route);
        }
    }

    /// Resolves a normalized path to a route index plus its parameter
    /// bindings, in pattern order.
    pub(crate) fn search(&self, path: &str) -> Option<(usize, Vec<(String, String)>)> {
        let segs = segments(path);
        let mut params = Vec::new();
        let route = self.walk(&segs, &mut params)?;
        Some((route, params))
    }

    /// Like [`search`](Node::search), without materializing bindings.
    pub(crate) fn matches(&self, path: &str) -> bool {
        self.search(path).is_some()
    }

    fn walk(&self, segs: &[&str], params: &mut Vec<(String, String)>) -> Option<usize> {
        let Some((&seg, rest)) = segs.split_first() else {
            return self.route;
        };
        if let Some(child) = self.statics.get(seg) {
            if let Some(route) = child.walk(rest, params) {
                return Some(route);
            }
        }
        if let Some(edge) = &self.param {
            // A parameter never matches an empty segment.
            if !seg.is_empty() {
                params.push((edge.name.clone(), seg.to_owned()));
                if let Some(route) = edge.node.walk(rest, params) {
                    return Some(route);
                }
                params.pop();
            }
        }
        if let Some(route) = self.wildcard {
            // The wildcard swallows the whole remaining tail.
            params.push(("*".to_owned(), segs.join("/")));
            return Some(route);
        }
        None
    }
}
