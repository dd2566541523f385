//! The compressed-trie (radix tree) backing the router.
//!
//! One tree exists per HTTP verb. Edges carry multi-character labels; labels
//! and child indices are kept as raw bytes so that prefix compression can
//! split anywhere, exactly like the classic httprouter layout this follows.
//!
//! Wildcard grammar: a `:name` segment matches one non-`/` segment, a `*name`
//! catch-all matches the whole remainder and must be the final segment.
//! Registration is strict; any ambiguity is a [`RouteError`].
//!
//! Each node counts the routes registered in its subtree (`priority`) and
//! keeps its children sorted by that count, biasing lookups toward the most
//! popular prefixes.

use crate::error::RouteError;
use crate::params::PathParams;
use crate::router::RouteHandler;

/// Returns the length of the common prefix of `a` and `b`.
fn longest_common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

struct WildcardResult<'a> {
    name: &'a [u8],
    pos: usize,
}

impl WildcardResult<'_> {
    // The name includes the `:`/`*` marker, so one char is not enough.
    fn valid_name(&self) -> bool {
        self.name.len() > 1
    }
}

/// Finds the first wildcard segment, if any.
///
/// A wildcard segment starts with `:` or `*`; its name may not contain `:` or
/// `*`. An offending name is reported as found-but-invalid (empty name).
fn find_wildcard(path: &[u8]) -> Option<WildcardResult<'_>> {
    let start = path.iter().position(|&c| c == b':' || c == b'*')?;

    match path[start + 1..].iter().position(|&c| matches!(c, b':' | b'*' | b'/')) {
        None => Some(WildcardResult { name: &path[start..], pos: start }),
        Some(offset) => {
            let stop = start + 1 + offset;
            if path[stop] == b'/' {
                Some(WildcardResult { name: &path[start..stop], pos: start })
            } else {
                Some(WildcardResult { name: &[], pos: start })
            }
        }
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum NodeKind {
    #[default]
    Plain,
    Root,
    Param,
    CatchAll,
}

/// A tree node. The root is just a node whose kind is `Root`.
#[derive(Default)]
pub(crate) struct Node {
    /// The (possibly multi-character) label of this node.
    path: Vec<u8>,
    /// First byte of each non-wild child, in lock-step with `children`.
    indices: Vec<u8>,
    /// When set, there is exactly one child and it is `Param` or `CatchAll`.
    has_wild_child: bool,
    kind: NodeKind,
    /// Number of routes registered in the subtree rooted here.
    priority: u32,
    children: Vec<Node>,
    handler: Option<RouteHandler>,
}

impl Node {
    /// Adds a route below this node. Fails with [`RouteError`] on conflicts.
    pub(crate) fn add_route(&mut self, path: &str, handler: RouteHandler) -> Result<(), RouteError> {
        // The sub-tree rooted by this node gains one route.
        self.priority += 1;

        if self.path.is_empty() && self.indices.is_empty() {
            self.insert_path(path.as_bytes(), path, handler)?;
            self.kind = NodeKind::Root;
            return Ok(());
        }

        self.insert_route(path.as_bytes(), path, handler)
    }

    /// Finds the handler for `path`, appending bound parameters to `params`.
    pub(crate) fn locate<'n>(&'n self, path: &[u8], params: &mut PathParams) -> Option<&'n RouteHandler> {
        if path.len() == self.path.len() {
            return self.handler.as_ref();
        }

        if path.len() > self.path.len() && path.starts_with(&self.path) {
            let path = &path[self.path.len()..];

            if !self.has_wild_child {
                let idxc = path[0];
                let pos = self.indices.iter().position(|&c| c == idxc)?;
                return self.children[pos].locate(path, params);
            }

            let child = &self.children[0];
            match child.kind {
                NodeKind::Param => {
                    let param_end = path.iter().position(|&c| c == b'/');
                    let segment = &path[..param_end.unwrap_or(path.len())];
                    params.add(lossy(&child.path[1..]), lossy(segment));

                    match param_end {
                        None => return child.handler.as_ref(),
                        Some(end) => {
                            // Go deeper.
                            if !child.children.is_empty() {
                                return child.children[0].locate(&path[end..], params);
                            }
                        }
                    }
                }
                NodeKind::CatchAll => {
                    // The whole remainder, including the leading `/`.
                    params.add(lossy(&child.path[2..]), lossy(path));
                    return child.handler.as_ref();
                }
                kind => unreachable!("wild child of kind {kind:?} is invalid"),
            }
        }

        None
    }

    /// Walks down to the node where `path` diverges and inserts it there.
    fn insert_route(&mut self, path: &[u8], full_path: &str, handler: RouteHandler) -> Result<(), RouteError> {
        let len = longest_common_prefix(path, &self.path);

        // Split this node so its label equals the common prefix.
        if len < self.path.len() {
            let child = Node {
                path: self.path[len..].to_vec(),
                indices: std::mem::take(&mut self.indices),
                has_wild_child: self.has_wild_child,
                kind: NodeKind::Plain,
                priority: self.priority - 1,
                children: std::mem::take(&mut self.children),
                handler: self.handler.take(),
            };

            self.indices = vec![self.path[len]];
            self.children.push(child);
            self.path.truncate(len);
            self.has_wild_child = false;
        }

        // `path` terminates at this node.
        if len == path.len() {
            if self.handler.is_some() {
                return Err(RouteError::handler_exists(full_path));
            }
            self.handler = Some(handler);
            return Ok(());
        }

        let path = &path[len..];

        // A wild child is an only child.
        if self.has_wild_child {
            let child = &mut self.children[0];
            child.priority += 1;

            if path.starts_with(&child.path)
                && child.kind != NodeKind::CatchAll
                && (child.path.len() == path.len() || path[child.path.len()] == b'/')
            {
                return child.insert_route(path, full_path, handler);
            }

            // Wildcard conflict.
            let segment = if child.kind == NodeKind::CatchAll {
                lossy(path)
            } else {
                let end = path.iter().position(|&c| c == b'/').unwrap_or(path.len());
                lossy(&path[..end])
            };
            let wildcard = lossy(&child.path);
            let prefix_end = full_path.find(&segment).unwrap_or(full_path.len());
            let prefix = format!("{}{}", &full_path[..prefix_end], wildcard);
            return Err(RouteError::wildcard_conflict(segment, full_path, wildcard, prefix));
        }

        let idxc = path[0];

        // A param node keeps empty indices and has at most one child, whose
        // label is `/` or starts with `/`.
        if self.kind == NodeKind::Param && idxc == b'/' && !self.children.is_empty() {
            let child = &mut self.children[0];
            child.priority += 1;
            return child.insert_route(path, full_path, handler);
        }

        // Descend into an existing child matching the next byte.
        if let Some(pos) = self.indices.iter().position(|&c| c == idxc) {
            let pos = self.increment_child_priority(pos);
            return self.children[pos].insert_route(path, full_path, handler);
        }

        if idxc != b':' && idxc != b'*' {
            self.indices.push(idxc);
            self.children.push(Node::default());
            let pos = self.increment_child_priority(self.indices.len() - 1);
            return self.children[pos].insert_path(path, full_path, handler);
        }

        self.insert_path(path, full_path, handler)
    }

    /// Installs `path` into this (label-less) node, expanding wildcards into
    /// their node structure.
    fn insert_path(&mut self, path: &[u8], full_path: &str, handler: RouteHandler) -> Result<(), RouteError> {
        let mut path = path;

        let wildcard = match find_wildcard(path) {
            None => {
                self.path = path.to_vec();
                self.handler = Some(handler);
                return Ok(());
            }
            Some(wildcard) => wildcard,
        };

        if !wildcard.valid_name() {
            return Err(RouteError::invalid_wildcard(full_path));
        }

        if !self.children.is_empty() {
            return Err(RouteError::wildcard_child_conflict(lossy(wildcard.name), full_path));
        }

        if wildcard.name[0] == b':' {
            // Plain segments preceding the wildcard stay on this node.
            if wildcard.pos > 0 {
                self.path = path[..wildcard.pos].to_vec();
                path = &path[wildcard.pos..];
            }

            self.has_wild_child = true;

            let mut child = Node {
                kind: NodeKind::Param,
                priority: 1,
                path: wildcard.name.to_vec(),
                ..Default::default()
            };

            // The path ends with the wildcard: the param node is the leaf.
            if path.len() == wildcard.name.len() {
                child.handler = Some(handler);
                self.children.push(child);
                return Ok(());
            }

            // Another non-wildcard subpath follows.
            let mut grand_child = Node { priority: 1, ..Default::default() };
            grand_child.insert_path(&path[wildcard.name.len()..], full_path, handler)?;
            child.children.push(grand_child);
            self.children.push(child);
            Ok(())
        } else {
            if wildcard.pos + wildcard.name.len() != path.len() {
                return Err(RouteError::catch_all_not_terminal(full_path));
            }

            // e.g. `/hello/*name` conflicts with `/hello/` but not `/hello`.
            if self.path.last() == Some(&b'/') {
                return Err(RouteError::catch_all_root_conflict(full_path));
            }

            // Step back to the leading `/`.
            if wildcard.pos == 0 || path[wildcard.pos - 1] != b'/' {
                return Err(RouteError::no_slash_before_catch_all(full_path));
            }
            let pos = wildcard.pos - 1;

            self.path = path[..pos].to_vec();

            // Two levels: an internal catch-all node with an empty label, and
            // its child holding `/*name` plus the handler.
            let grand_child = Node {
                path: path[pos..].to_vec(),
                kind: NodeKind::CatchAll,
                priority: 1,
                handler: Some(handler),
                ..Default::default()
            };

            let mut child = Node {
                has_wild_child: true,
                kind: NodeKind::CatchAll,
                priority: 1,
                ..Default::default()
            };
            child.children.push(grand_child);

            self.children.push(child);
            self.indices = vec![b'/'];
            Ok(())
        }
    }

    /// Increments the priority of `children[pos]` and reorders siblings so
    /// that priorities stay non-increasing left to right. Returns the child's
    /// new position.
    fn increment_child_priority(&mut self, pos: usize) -> usize {
        debug_assert_eq!(self.indices.len(), self.children.len());

        self.children[pos].priority += 1;
        let priority = self.children[pos].priority;

        // Insertion-sort style reordering.
        let mut new_pos = pos;
        while new_pos > 0 && self.children[new_pos - 1].priority < priority {
            new_pos -= 1;
        }

        if new_pos != pos {
            let child = self.children.remove(pos);
            self.children.insert(new_pos, child);

            let idxc = self.indices.remove(pos);
            self.indices.insert(new_pos, idxc);
        }

        new_pos
    }
}
