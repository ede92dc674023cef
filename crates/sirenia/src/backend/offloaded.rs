use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use crate::config::EngineParams;
use crate::engine::PhysicsEngine;
use crate::error::{Error, Result};

use super::{ExecutionMode, LayoutBuffers, PhysicsBackend, StepRequest, StepResponse};

enum Command {
    Init {
        buffers: LayoutBuffers,
        params: EngineParams,
    },
    UpdateConfig(EngineParams),
    Step(StepRequest),
    Shutdown,
}

/// Runs the engine on a dedicated worker thread.
///
/// Commands and results travel over channels in submission order, so responses come back in
/// the order their requests were sent.
#[derive(Debug)]
pub struct OffloadedBackend {
    commands: Sender<Command>,
    results: Receiver<StepResponse>,
    handle: Option<JoinHandle<()>>,
}

impl OffloadedBackend {
    pub fn spawn() -> Result<Self> {
        let (commands, command_rx) = mpsc::channel::<Command>();
        let (result_tx, results) = mpsc::channel::<StepResponse>();
        let handle = thread::Builder::new()
            .name("sirenia-layout".to_string())
            .spawn(move || worker_loop(command_rx, result_tx))
            .map_err(Error::WorkerSpawn)?;
        tracing::debug!("layout worker started");
        Ok(Self {
            commands,
            results,
            handle: Some(handle),
        })
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::WorkerDisconnected)
    }
}

impl PhysicsBackend for OffloadedBackend {
    fn init(&mut self, buffers: LayoutBuffers, params: EngineParams) -> Result<()> {
        self.send(Command::Init { buffers, params })
    }

    fn update_config(&mut self, params: EngineParams) -> Result<()> {
        self.send(Command::UpdateConfig(params))
    }

    fn submit(&mut self, request: StepRequest) -> Result<()> {
        self.send(Command::Step(request))
    }

    fn try_recv(&mut self) -> Result<Option<StepResponse>> {
        match self.results.try_recv() {
            Ok(response) => Ok(Some(response)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::WorkerDisconnected),
        }
    }

    fn recv(&mut self) -> Result<StepResponse> {
        self.results.recv().map_err(|_| Error::WorkerDisconnected)
    }

    /// Asks the worker to stop and detaches it. A step that is already running finishes in the
    /// background and its result is discarded.
    fn dispose(&mut self) {
        if self.handle.take().is_some() {
            if self.commands.send(Command::Shutdown).is_err() {
                tracing::trace!("layout worker already exited");
            }
            tracing::debug!("layout worker released");
        }
    }

    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Offloaded
    }
}

impl Drop for OffloadedBackend {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn worker_loop(commands: Receiver<Command>, results: Sender<StepResponse>) {
    let mut engine: Option<PhysicsEngine> = None;
    for command in commands {
        match command {
            Command::Init { buffers, params } => {
                engine = match super::build_engine(&buffers, params) {
                    Ok(engine) => Some(engine),
                    Err(err) => {
                        tracing::warn!(%err, "layout worker rejected init buffers");
                        None
                    }
                };
            }
            Command::UpdateConfig(params) => {
                if let Some(engine) = engine.as_mut() {
                    engine.set_params(params);
                }
            }
            Command::Step(request) => {
                let token = request.token;
                let response = match engine.as_mut() {
                    Some(engine) => super::run_step(engine, request).unwrap_or_else(|err| {
                        tracing::warn!(%err, token, "layout step failed");
                        empty_response(token)
                    }),
                    None => empty_response(token),
                };
                if results.send(response).is_err() {
                    break;
                }
            }
            Command::Shutdown => break,
        }
    }
    tracing::trace!("layout worker exiting");
}

fn empty_response(token: u64) -> StepResponse {
    StepResponse {
        token,
        positions: Vec::new(),
        temperature: 0.0,
    }
}
