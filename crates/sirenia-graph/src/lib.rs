#![forbid(unsafe_code)]

//! Graph container used by the `sirenia` force layout.
//!
//! Nodes and edges are stored in insertion order (the order drives the flat buffers handed to
//! the physics engine) and addressed by string id through hash indexes. Every node carries a
//! [`NodeLayout`] and every edge an [`EdgeLayout`]; the caller's own payload rides along in
//! `data` and is never touched by the layout.

pub mod error;
mod graph;

pub use error::{GraphError, Result};
pub use graph::{
    Edge, EdgeKey, EdgeLayout, Graph, Node, NodeLayout, Point, TraverseDirection,
};
