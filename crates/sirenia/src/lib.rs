#![forbid(unsafe_code)]

//! Headless force-directed graph layout.
//!
//! A [`LayoutOrchestrator`] owns a [`Graph`] and drives a [`PhysicsEngine`] that resolves
//! repulsion (direct or Barnes-Hut), edge attraction and gravity under a cooling temperature.
//! The engine runs either on the calling thread or on a dedicated worker thread; both speak the
//! same flat-buffer messages and produce the same positions.

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod prepare;
mod rng;

pub use backend::{
    ExecutionMode, InProcessBackend, LayoutBuffers, OffloadedBackend, PhysicsBackend,
    StepRequest, StepResponse,
};
pub use config::{EngineParams, ForceConfig};
pub use engine::PhysicsEngine;
pub use error::{Error, Result};
pub use orchestrator::{CONVERGENCE_TEMPERATURE, LayoutOrchestrator, LayoutState};
pub use sirenia_graph::{Edge, EdgeKey, EdgeLayout, Graph, Node, NodeLayout, Point};
