use crate::config::EngineParams;
use crate::engine::PhysicsEngine;
use crate::error::{Error, Result};

use super::{ExecutionMode, LayoutBuffers, PhysicsBackend, StepRequest, StepResponse};

/// Runs the engine on the calling thread. `submit` does all the work; the response is parked
/// until it is collected.
#[derive(Debug, Default)]
pub struct InProcessBackend {
    engine: Option<PhysicsEngine>,
    ready: Option<StepResponse>,
}

impl InProcessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine(&self) -> Option<&PhysicsEngine> {
        self.engine.as_ref()
    }
}

impl PhysicsBackend for InProcessBackend {
    fn init(&mut self, buffers: LayoutBuffers, params: EngineParams) -> Result<()> {
        self.ready = None;
        self.engine = Some(super::build_engine(&buffers, params)?);
        Ok(())
    }

    fn update_config(&mut self, params: EngineParams) -> Result<()> {
        let engine = self.engine.as_mut().ok_or(Error::NotInitialized)?;
        engine.set_params(params);
        Ok(())
    }

    fn submit(&mut self, request: StepRequest) -> Result<()> {
        let engine = self.engine.as_mut().ok_or(Error::NotInitialized)?;
        self.ready = Some(super::run_step(engine, request)?);
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<StepResponse>> {
        Ok(self.ready.take())
    }

    fn recv(&mut self) -> Result<StepResponse> {
        self.ready.take().ok_or(Error::NotInitialized)
    }

    fn dispose(&mut self) {
        self.engine = None;
        self.ready = None;
    }

    fn mode(&self) -> ExecutionMode {
        ExecutionMode::InProcess
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffers() -> LayoutBuffers {
        LayoutBuffers {
            positions: vec![0.0, 0.0, 4.0, 3.0],
            masses: vec![1.0, 1.0],
            sizes: vec![1.0, 1.0],
            edges: vec![0, 1],
            weights: vec![1.0],
        }
    }

    fn request(token: u64, positions: Vec<f32>) -> StepRequest {
        StepRequest {
            token,
            positions,
            fixed: vec![0, 0],
            temperature: 1.0,
            cool_down: 0.99,
            iterations: 1,
        }
    }

    #[test]
    fn submit_before_init_fails() {
        let mut backend = InProcessBackend::new();
        assert!(matches!(
            backend.submit(request(1, vec![0.0; 4])),
            Err(Error::NotInitialized)
        ));
        assert!(backend.update_config(EngineParams::default()).is_err());
    }

    #[test]
    fn response_is_ready_right_after_submit() {
        let mut backend = InProcessBackend::new();
        backend.init(buffers(), EngineParams::default()).unwrap();
        backend.submit(request(3, buffers().positions)).unwrap();

        let response = backend.try_recv().unwrap().unwrap();
        assert_eq!(response.token, 3);
        assert!(backend.try_recv().unwrap().is_none());
    }

    #[test]
    fn update_config_reaches_the_engine() {
        let mut backend = InProcessBackend::new();
        backend.init(buffers(), EngineParams::default()).unwrap();
        let params = EngineParams {
            gravity: 0.25,
            ..EngineParams::default()
        };
        backend.update_config(params).unwrap();
        assert_eq!(backend.engine().map(|e| e.params().gravity), Some(0.25));

        backend.dispose();
        assert!(backend.engine().is_none());
    }
}
