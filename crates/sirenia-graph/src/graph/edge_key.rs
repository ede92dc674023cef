//! Edge key types.
//!
//! An edge is identified by its ordered endpoint ids. Directed graphs may hold `a-b` and `b-a`
//! side by side; undirected graphs resolve either orientation to the edge that was added first.

use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Clone, Copy, Hash)]
pub(in crate::graph) struct EdgeKeyView<'a> {
    pub(in crate::graph) v: &'a str,
    pub(in crate::graph) w: &'a str,
}

impl<'a> hashbrown::Equivalent<EdgeKey> for EdgeKeyView<'a> {
    fn equivalent(&self, key: &EdgeKey) -> bool {
        key.v == self.v && key.w == self.w
    }
}

#[derive(Debug, Clone)]
pub struct EdgeKey {
    pub v: String,
    pub w: String,
}

impl EdgeKey {
    pub fn new(v: impl Into<String>, w: impl Into<String>) -> Self {
        Self {
            v: v.into(),
            w: w.into(),
        }
    }

    pub(in crate::graph) fn view(&self) -> EdgeKeyView<'_> {
        EdgeKeyView {
            v: &self.v,
            w: &self.w,
        }
    }

    pub fn touches(&self, id: &str) -> bool {
        self.v == id || self.w == id
    }
}

impl PartialEq for EdgeKey {
    fn eq(&self, other: &Self) -> bool {
        self.v == other.v && self.w == other.w
    }
}

impl Eq for EdgeKey {}

impl Hash for EdgeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.v.hash(state);
        self.w.hash(state);
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.v, self.w)
    }
}
