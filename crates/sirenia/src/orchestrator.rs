//! The public driver: owns a [`Graph`], picks a backend at init time and hands positions back
//! and forth between the graph and the engine.

use std::fmt;

use sirenia_graph::{Graph, Point};

use crate::backend::{
    self, Backend, ExecutionMode, LayoutBuffers, OffloadedBackend, StepRequest, StepResponse,
};
use crate::config::ForceConfig;
use crate::error::{Error, Result};
use crate::prepare;

/// Temperature below which a layout is considered settled.
pub const CONVERGENCE_TEMPERATURE: f64 = 0.01;

/// Share of the viewport used when placing nodes that have no position yet.
const PLACEMENT_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutState {
    Uninitialized,
    Initialized,
    /// A step has been submitted and its result has not been applied yet.
    Stepping,
    Disposed,
}

type UpdateCallback<N, E> = Box<dyn FnMut(&Graph<N, E>) + Send>;

pub struct LayoutOrchestrator<N = (), E = ()> {
    graph: Graph<N, E>,
    config: ForceConfig,
    backend: Option<Backend>,
    state: LayoutState,
    temperature: f64,
    /// Bumped on every `init`; responses carrying an older token are dropped.
    generation: u64,
    pending: Option<u64>,
    /// Topology uploaded by the last `init`.
    fingerprint: u64,
    on_update: Option<UpdateCallback<N, E>>,
}

impl<N: fmt::Debug, E: fmt::Debug> fmt::Debug for LayoutOrchestrator<N, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutOrchestrator")
            .field("graph", &self.graph)
            .field("config", &self.config)
            .field("backend", &self.backend)
            .field("state", &self.state)
            .field("temperature", &self.temperature)
            .field("generation", &self.generation)
            .field("pending", &self.pending)
            .field("on_update", &self.on_update.is_some())
            .finish()
    }
}

impl<N, E> LayoutOrchestrator<N, E> {
    pub fn new(graph: Graph<N, E>, config: ForceConfig) -> Self {
        Self {
            graph,
            config,
            backend: None,
            state: LayoutState::Uninitialized,
            temperature: 1.0,
            generation: 0,
            pending: None,
            fingerprint: 0,
            on_update: None,
        }
    }

    pub fn graph(&self) -> &Graph<N, E> {
        &self.graph
    }

    /// Mutable access to the graph. Positions and pins are picked up by every step. Any other
    /// change (nodes, edges, masses, sizes or weights) makes [`step`](Self::step) fail with
    /// [`Error::TopologyChanged`] until [`init`](Self::init) is called again.
    pub fn graph_mut(&mut self) -> &mut Graph<N, E> {
        &mut self.graph
    }

    pub fn into_graph(self) -> Graph<N, E> {
        self.graph
    }

    pub fn config(&self) -> &ForceConfig {
        &self.config
    }

    pub fn state(&self) -> LayoutState {
        self.state
    }

    /// Mode of the selected backend, once one exists.
    pub fn execution_mode(&self) -> Option<ExecutionMode> {
        self.backend.as_ref().map(Backend::mode)
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Overrides the temperature, typically to reheat a settled layout after user interaction.
    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature.max(0.0);
    }

    pub fn is_converged(&self) -> bool {
        self.temperature <= CONVERGENCE_TEMPERATURE
    }

    pub fn set_on_update<F>(&mut self, callback: F)
    where
        F: FnMut(&Graph<N, E>) + Send + 'static,
    {
        self.on_update = Some(Box::new(callback));
    }

    pub fn clear_on_update(&mut self) {
        self.on_update = None;
    }

    /// Pins a node at `position`. Returns `false` if the node does not exist.
    pub fn pin_node(&mut self, id: &str, position: Point) -> bool {
        let Some(node) = self.graph.node_mut(id) else {
            return false;
        };
        node.layout.position = Some(position);
        node.layout.fixed = true;
        true
    }

    pub fn unpin_node(&mut self, id: &str) -> bool {
        let Some(node) = self.graph.node_mut(id) else {
            return false;
        };
        node.layout.fixed = false;
        true
    }

    /// Replaces the tunables. A running backend picks them up without losing kinematic state.
    pub fn update_config(&mut self, config: ForceConfig) -> Result<()> {
        if self.state == LayoutState::Disposed {
            return Err(Error::Disposed);
        }
        config.validate()?;
        if let Some(backend) = self.backend.as_mut() {
            backend.update_config(config.engine_params())?;
            tracing::debug!("layout config pushed to backend");
        }
        self.config = config;
        Ok(())
    }

    /// Places unpositioned nodes, uploads the graph to a backend for `mode` and resets the
    /// temperature. May be called again to pick up topology changes; a step still in flight
    /// is abandoned.
    pub fn init(&mut self, mode: ExecutionMode) -> Result<()> {
        self.init_with(mode, OffloadedBackend::spawn)
    }

    fn init_with<F>(&mut self, mode: ExecutionMode, spawn: F) -> Result<()>
    where
        F: FnOnce() -> Result<OffloadedBackend>,
    {
        if self.state == LayoutState::Disposed {
            return Err(Error::Disposed);
        }
        self.config.validate()?;

        let center = self.config.center.unwrap_or_default();
        let side = PLACEMENT_RATIO * self.config.width.min(self.config.height);
        let placed =
            prepare::place_unpositioned(&mut self.graph, center, side, self.config.random_seed);

        let buffers = LayoutBuffers::from_graph(&self.graph);
        let (nodes, edges) = (buffers.node_count(), buffers.edge_count());

        let mut backend = match self.backend.take() {
            Some(backend) if backend.mode() == mode => backend,
            Some(mut stale) => {
                stale.dispose();
                Backend::select_with(mode, spawn)
            }
            None => Backend::select_with(mode, spawn),
        };
        let uploaded = backend.init(buffers, self.config.engine_params());
        let selected = backend.mode();
        self.backend = Some(backend);
        self.generation += 1;
        self.pending = None;
        uploaded?;

        self.fingerprint = backend::topology_fingerprint(&self.graph);
        self.temperature = 1.0;
        self.state = LayoutState::Initialized;
        tracing::debug!(
            nodes,
            edges,
            placed,
            mode = ?selected,
            generation = self.generation,
            "layout initialized"
        );
        Ok(())
    }

    /// Runs `iterations` simulation steps.
    ///
    /// In-process, the positions are applied (and the callback invoked) before this returns.
    /// Offloaded, the request is queued and the result is applied by [`poll`](Self::poll) or
    /// [`wait`](Self::wait).
    pub fn step(&mut self, iterations: u32) -> Result<()> {
        match self.state {
            LayoutState::Uninitialized => return Err(Error::NotInitialized),
            LayoutState::Disposed => return Err(Error::Disposed),
            LayoutState::Stepping => return Err(Error::StepInFlight),
            LayoutState::Initialized => {}
        }
        if backend::topology_fingerprint(&self.graph) != self.fingerprint {
            return Err(Error::TopologyChanged);
        }
        let node_count = self.graph.node_count();
        let backend = self.backend.as_mut().ok_or(Error::NotInitialized)?;

        let mut positions = Vec::with_capacity(2 * node_count);
        backend::write_positions(&self.graph, &mut positions);
        let fixed = self
            .graph
            .nodes()
            .iter()
            .map(|n| u8::from(n.layout.fixed))
            .collect();
        let request = StepRequest {
            token: self.generation,
            positions,
            fixed,
            temperature: self.temperature,
            cool_down: self.config.cool_down,
            iterations,
        };
        backend.submit(request)?;

        for _ in 0..iterations {
            self.temperature *= self.config.cool_down;
        }
        self.pending = Some(self.generation);
        self.state = LayoutState::Stepping;
        tracing::trace!(iterations, temperature = self.temperature, "layout step submitted");

        if backend.mode() == ExecutionMode::InProcess {
            self.wait()?;
        }
        Ok(())
    }

    /// Applies a finished step if one is available. Returns `true` when positions were updated.
    pub fn poll(&mut self) -> Result<bool> {
        if self.pending.is_none() {
            return Ok(false);
        }
        loop {
            let received = match self.backend.as_mut() {
                Some(backend) => backend.try_recv(),
                None => return Ok(false),
            };
            match received {
                Ok(Some(response)) => {
                    if self.accept(response) {
                        return Ok(true);
                    }
                }
                Ok(None) => return Ok(false),
                Err(err) => return Err(self.abandon(err)),
            }
        }
    }

    /// Blocks until the step in flight has been applied. Returns immediately if none is.
    pub fn wait(&mut self) -> Result<()> {
        while self.pending.is_some() {
            let received = match self.backend.as_mut() {
                Some(backend) => backend.recv(),
                None => return Ok(()),
            };
            match received {
                Ok(response) => {
                    self.accept(response);
                }
                Err(err) => return Err(self.abandon(err)),
            }
        }
        Ok(())
    }

    /// Stops the backend and drops engine state. Calling it again has no effect.
    pub fn dispose(&mut self) {
        if self.state == LayoutState::Disposed {
            return;
        }
        if let Some(mut backend) = self.backend.take() {
            backend.dispose();
        }
        self.pending = None;
        self.state = LayoutState::Disposed;
        tracing::debug!(generation = self.generation, "layout disposed");
    }

    fn abandon(&mut self, err: Error) -> Error {
        tracing::warn!(%err, "layout step abandoned");
        self.pending = None;
        self.state = LayoutState::Initialized;
        err
    }

    /// Copies a response into the graph. Returns `false` for responses that belong to an
    /// earlier generation.
    fn accept(&mut self, response: StepResponse) -> bool {
        if self.pending != Some(response.token) {
            tracing::debug!(
                token = response.token,
                generation = self.generation,
                "dropping stale layout response"
            );
            return false;
        }
        self.pending = None;
        self.state = LayoutState::Initialized;

        if response.positions.len() != 2 * self.graph.node_count() {
            tracing::warn!(
                expected = 2 * self.graph.node_count(),
                actual = response.positions.len(),
                "layout response does not match the graph; positions left unchanged"
            );
            return true;
        }
        for (node, xy) in self
            .graph
            .nodes_mut()
            .iter_mut()
            .zip(response.positions.chunks_exact(2))
        {
            if node.layout.fixed {
                continue;
            }
            node.layout.position = Some(Point::new(f64::from(xy[0]), f64::from(xy[1])));
        }
        if let Some(callback) = self.on_update.as_mut() {
            callback(&self.graph);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> Graph {
        let mut g = Graph::undirected();
        g.add_node("a", ()).layout.position = Some(Point::new(-10.0, 0.0));
        g.add_node("b", ()).layout.position = Some(Point::new(10.0, 0.0));
        g.add_edge("a", "b", ());
        g
    }

    #[test]
    fn step_requires_init() {
        let mut layout = LayoutOrchestrator::new(pair(), ForceConfig::default());
        assert!(matches!(layout.step(1), Err(Error::NotInitialized)));
        assert_eq!(layout.state(), LayoutState::Uninitialized);
        assert_eq!(layout.execution_mode(), None);
    }

    #[test]
    fn in_process_step_applies_before_returning() {
        let mut layout = LayoutOrchestrator::new(pair(), ForceConfig::default());
        layout.init(ExecutionMode::InProcess).unwrap();
        layout.step(3).unwrap();

        assert_eq!(layout.state(), LayoutState::Initialized);
        assert!(!layout.poll().unwrap());
        let expected = 0.99_f64 * 0.99 * 0.99;
        assert!((layout.temperature() - expected).abs() < 1e-12);
        let a = layout.graph().node("a").unwrap().layout.position.unwrap();
        assert_ne!(a, Point::new(-10.0, 0.0));
    }

    #[test]
    fn stale_responses_are_dropped() {
        let mut layout = LayoutOrchestrator::new(pair(), ForceConfig::default());
        layout.init(ExecutionMode::InProcess).unwrap();
        let before = layout.graph().node("a").unwrap().layout.position;

        let stale = StepResponse {
            token: layout.generation + 1,
            positions: vec![1.0, 2.0, 3.0, 4.0],
            temperature: 0.5,
        };
        layout.pending = Some(layout.generation);
        assert!(!layout.accept(stale));
        assert_eq!(layout.graph().node("a").unwrap().layout.position, before);
    }

    #[test]
    fn topology_changes_need_a_new_init() {
        let mut layout = LayoutOrchestrator::new(pair(), ForceConfig::default());
        layout.init(ExecutionMode::InProcess).unwrap();
        layout.graph_mut().add_node("c", ());
        assert!(matches!(layout.step(1), Err(Error::TopologyChanged)));

        layout.init(ExecutionMode::InProcess).unwrap();
        assert!(layout.graph().node("c").unwrap().layout.position.is_some());
        layout.step(1).unwrap();
    }

    #[test]
    fn swapping_a_node_is_detected() {
        let mut layout = LayoutOrchestrator::new(pair(), ForceConfig::default());
        layout.init(ExecutionMode::InProcess).unwrap();
        layout.graph_mut().remove_node("a");
        layout.graph_mut().add_node("z", ()).layout.position = Some(Point::new(1.0, 1.0));
        assert_eq!(layout.graph().node_count(), 2);
        assert!(matches!(layout.step(1), Err(Error::TopologyChanged)));
        assert_eq!(layout.state(), LayoutState::Initialized);

        layout.init(ExecutionMode::InProcess).unwrap();
        layout.step(1).unwrap();
    }

    #[test]
    fn mass_changes_need_a_new_init() {
        let mut layout = LayoutOrchestrator::new(pair(), ForceConfig::default());
        layout.init(ExecutionMode::InProcess).unwrap();
        assert!(layout.pin_node("a", Point::new(0.0, 0.0)));
        layout.step(1).unwrap();

        layout.graph_mut().node_mut("b").unwrap().layout.mass = 4.0;
        assert!(matches!(layout.step(1), Err(Error::TopologyChanged)));
    }

    #[test]
    fn failed_worker_spawn_runs_in_process() {
        let updates = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = std::sync::Arc::clone(&updates);
        let mut layout = LayoutOrchestrator::new(pair(), ForceConfig::default());
        layout.set_on_update(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        layout
            .init_with(ExecutionMode::Offloaded, || {
                Err(Error::WorkerSpawn(std::io::Error::other("thread limit reached")))
            })
            .unwrap();
        assert_eq!(layout.execution_mode(), Some(ExecutionMode::InProcess));

        let before = layout.graph().node("a").unwrap().layout.position;
        layout.step(2).unwrap();
        assert_eq!(layout.state(), LayoutState::Initialized);
        assert_ne!(layout.graph().node("a").unwrap().layout.position, before);
        assert_eq!(updates.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn update_config_validates() {
        let mut layout = LayoutOrchestrator::new(pair(), ForceConfig::default());
        let bad = ForceConfig {
            cool_down: 0.0,
            ..ForceConfig::default()
        };
        assert!(matches!(
            layout.update_config(bad),
            Err(Error::InvalidConfig {
                field: "coolDown",
                ..
            })
        ));
        layout.dispose();
        assert!(matches!(
            layout.update_config(ForceConfig::default()),
            Err(Error::Disposed)
        ));
    }
}
