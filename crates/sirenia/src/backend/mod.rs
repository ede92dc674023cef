//! Execution backends.
//!
//! Both backends run the same [`PhysicsEngine`](crate::engine::PhysicsEngine) and speak the
//! same message types; they differ only in where the engine lives. Buffers are owned values
//! moved into each message, so a request can never be mutated while it is in flight.

mod in_process;
mod offloaded;

pub use in_process::InProcessBackend;
pub use offloaded::OffloadedBackend;

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use sirenia_graph::Graph;

use crate::config::EngineParams;
use crate::engine::PhysicsEngine;
use crate::error::Result;

/// Where the simulation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// On the calling thread; `step` completes before it returns.
    #[default]
    InProcess,
    /// On a dedicated worker thread; results are collected with `poll` or `wait`.
    Offloaded,
}

/// Flat topology buffers handed to a backend at init time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutBuffers {
    /// `x, y` per node.
    pub positions: Vec<f32>,
    pub masses: Vec<f32>,
    pub sizes: Vec<f32>,
    /// `node1, node2` index per edge.
    pub edges: Vec<u32>,
    pub weights: Vec<f32>,
}

impl LayoutBuffers {
    /// Serializes a graph in node insertion order. Nodes without a position are placed at the
    /// origin.
    pub fn from_graph<N, E>(graph: &Graph<N, E>) -> Self {
        let n = graph.node_count();
        let mut buffers = Self {
            positions: Vec::with_capacity(2 * n),
            masses: Vec::with_capacity(n),
            sizes: Vec::with_capacity(n),
            edges: Vec::with_capacity(2 * graph.edge_count()),
            weights: Vec::with_capacity(graph.edge_count()),
        };
        write_positions(graph, &mut buffers.positions);
        for node in graph.nodes() {
            buffers.masses.push(node.layout.mass as f32);
            buffers.sizes.push(node.layout.size as f32);
        }
        for edge in graph.edges() {
            let (Some(a), Some(b)) = (graph.index_of(edge.node1()), graph.index_of(edge.node2()))
            else {
                continue;
            };
            buffers.edges.extend([a as u32, b as u32]);
            buffers.weights.push(edge.layout.weight as f32);
        }
        buffers
    }

    pub fn node_count(&self) -> usize {
        self.masses.len()
    }

    pub fn edge_count(&self) -> usize {
        self.weights.len()
    }
}

pub(crate) fn write_positions<N, E>(graph: &Graph<N, E>, out: &mut Vec<f32>) {
    out.clear();
    for node in graph.nodes() {
        let p = node.layout.position.unwrap_or_default();
        out.extend([p.x as f32, p.y as f32]);
    }
}

/// Hash of everything [`LayoutBuffers::from_graph`] uploads except positions: node ids,
/// masses and sizes, edge endpoints and weights. Positions and pins travel with every step.
pub(crate) fn topology_fingerprint<N, E>(graph: &Graph<N, E>) -> u64 {
    let mut hasher = FxHasher::default();
    graph.node_count().hash(&mut hasher);
    for node in graph.nodes() {
        node.id().hash(&mut hasher);
        node.layout.mass.to_bits().hash(&mut hasher);
        node.layout.size.to_bits().hash(&mut hasher);
    }
    graph.edge_count().hash(&mut hasher);
    for edge in graph.edges() {
        edge.node1().hash(&mut hasher);
        edge.node2().hash(&mut hasher);
        edge.layout.weight.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}

/// One batch of iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRequest {
    /// Generation of the layout that issued the request.
    pub token: u64,
    pub positions: Vec<f32>,
    /// Non-zero for pinned nodes.
    pub fixed: Vec<u8>,
    pub temperature: f64,
    pub cool_down: f64,
    pub iterations: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepResponse {
    pub token: u64,
    /// Empty when the backend had no engine to run.
    pub positions: Vec<f32>,
    pub temperature: f64,
}

/// A place where a [`PhysicsEngine`] can run.
pub trait PhysicsBackend {
    /// Replaces the topology and tunables of the engine.
    fn init(&mut self, buffers: LayoutBuffers, params: EngineParams) -> Result<()>;

    /// Updates tunables without touching topology or kinematic state.
    fn update_config(&mut self, params: EngineParams) -> Result<()>;

    /// Queues a step. The result becomes available through `try_recv`/`recv`.
    fn submit(&mut self, request: StepRequest) -> Result<()>;

    /// Returns a finished step if one is ready.
    fn try_recv(&mut self) -> Result<Option<StepResponse>>;

    /// Blocks until a step finishes.
    fn recv(&mut self) -> Result<StepResponse>;

    /// Releases the engine. Further calls fail or return nothing.
    fn dispose(&mut self);

    fn mode(&self) -> ExecutionMode;
}

/// Backend chosen once at init time.
#[derive(Debug)]
pub(crate) enum Backend {
    InProcess(InProcessBackend),
    Offloaded(OffloadedBackend),
}

impl Backend {
    /// Builds a backend for `mode`. A worker that cannot be spawned degrades to in-process.
    pub(crate) fn select(mode: ExecutionMode) -> Self {
        Self::select_with(mode, OffloadedBackend::spawn)
    }

    pub(crate) fn select_with<F>(mode: ExecutionMode, spawn: F) -> Self
    where
        F: FnOnce() -> Result<OffloadedBackend>,
    {
        match mode {
            ExecutionMode::InProcess => Self::InProcess(InProcessBackend::new()),
            ExecutionMode::Offloaded => match spawn() {
                Ok(worker) => Self::Offloaded(worker),
                Err(err) => {
                    tracing::warn!(%err, "layout worker unavailable; running in-process");
                    Self::InProcess(InProcessBackend::new())
                }
            },
        }
    }

    fn as_dyn(&mut self) -> &mut dyn PhysicsBackend {
        match self {
            Self::InProcess(b) => b,
            Self::Offloaded(b) => b,
        }
    }

    pub(crate) fn mode(&self) -> ExecutionMode {
        match self {
            Self::InProcess(b) => b.mode(),
            Self::Offloaded(b) => b.mode(),
        }
    }

    pub(crate) fn init(&mut self, buffers: LayoutBuffers, params: EngineParams) -> Result<()> {
        self.as_dyn().init(buffers, params)
    }

    pub(crate) fn update_config(&mut self, params: EngineParams) -> Result<()> {
        self.as_dyn().update_config(params)
    }

    pub(crate) fn submit(&mut self, request: StepRequest) -> Result<()> {
        self.as_dyn().submit(request)
    }

    pub(crate) fn try_recv(&mut self) -> Result<Option<StepResponse>> {
        self.as_dyn().try_recv()
    }

    pub(crate) fn recv(&mut self) -> Result<StepResponse> {
        self.as_dyn().recv()
    }

    pub(crate) fn dispose(&mut self) {
        self.as_dyn().dispose()
    }
}

/// Builds an engine from init buffers.
pub(crate) fn build_engine(buffers: &LayoutBuffers, params: EngineParams) -> Result<PhysicsEngine> {
    let mut engine = PhysicsEngine::new(params);
    engine.init_nodes(&buffers.positions, &buffers.masses, &buffers.sizes)?;
    engine.init_edges(&buffers.edges, &buffers.weights)?;
    Ok(engine)
}

/// Runs one request against `engine`, reusing the request's position buffer for the reply.
pub(crate) fn run_step(engine: &mut PhysicsEngine, request: StepRequest) -> Result<StepResponse> {
    let StepRequest {
        token,
        mut positions,
        fixed,
        temperature,
        cool_down,
        iterations,
    } = request;
    engine.sync_positions(&positions)?;
    engine.set_fixed(&fixed)?;
    let temperature = engine.run(iterations, temperature, cool_down);
    engine.write_positions(&mut positions)?;
    Ok(StepResponse {
        token,
        positions,
        temperature,
    })
}
