// Gantry service loop
// Drains commands from zenoh, applies them to the controller one at a time,
// then polls positions and velocities and publishes them. The controller
// blocks on serial I/O, so every call into it runs under `block_in_place`.

use std::time::Duration;
use tokio::task::block_in_place;
use tokio::time::interval;
use tracing::{error, info, warn};

// local imports
use crate::config::{GantryConfig, LOOP_HZ, TOPIC_CMD, TOPIC_HEALTH, TOPIC_MOVE, TOPIC_STATE};
use crate::gantry::{
    AxisController, AxisId, GantryControl, GantryError, MoveResult, SessionState,
    SimulatedController,
};
use crate::messages::{GantryCommand, GantryState, MoveReport, RuntimeHealth};

/// How the runtime reaches the motion controller
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    pub simulate: bool,
    pub port: Option<String>,
    pub velocity: Option<u32>,
}

pub struct Runtime<G: GantryControl> {
    gantry: G,
    health: RuntimeHealth,
}

impl<G: GantryControl> Runtime<G> {
    pub fn new(gantry: G) -> Self {
        let health = RuntimeHealth::from(gantry.state());
        Self { gantry, health }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    pub fn gantry(&self) -> &G {
        &self.gantry
    }

    fn record<T>(&mut self, result: Result<T, GantryError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.health = RuntimeHealth::from(self.gantry.state());
                Some(value)
            }
            Err(GantryError::NotInitialized { state }) => {
                warn!("Ignoring move while controller is {:?}", state);
                None
            }
            Err(e) => {
                error!("Gantry error: {}", e);
                self.health = RuntimeHealth::Fault;
                None
            }
        }
    }

    /// Apply one command, returning the move outcome if it was a move
    pub fn on_command(&mut self, cmd: GantryCommand) -> Option<MoveReport> {
        info!("Received command: {:?}", &cmd);
        let moved = match cmd {
            GantryCommand::Initialize => {
                let result = self.gantry.initialize();
                self.record(result);
                return None;
            }
            GantryCommand::Shutdown => {
                let result = self.gantry.shutdown();
                self.record(result);
                return None;
            }
            GantryCommand::Stop => {
                let result = self.gantry.stop();
                self.record(result);
                return None;
            }
            GantryCommand::SetEndVelocity { axis, velocity } => {
                let result = self.gantry.set_end_velocity(axis, velocity);
                self.record(result);
                return None;
            }
            GantryCommand::SetBeginVelocity { axis, velocity } => {
                let result = self.gantry.set_begin_velocity(axis, velocity);
                self.record(result);
                return None;
            }
            GantryCommand::MoveTo { axis, position_cm } => self.gantry.move_to(axis, position_cm),
            GantryCommand::MoveBy { axis, delta_cm } => self.gantry.move_by(axis, delta_cm),
        };

        let result = self.record(moved)?;
        if let MoveResult::LimitViolation { axis, min, max } = result {
            warn!("{} axis move rejected, valid range {}..={} cm", axis, min, max);
        }
        Some(MoveReport::from(result))
    }

    /// Read back positions and end velocities of every axis
    pub fn poll_state(&mut self) -> Option<GantryState> {
        if self.gantry.state() != SessionState::Initialized {
            self.health = RuntimeHealth::from(self.gantry.state());
            return None;
        }

        let mut state = GantryState::default();
        for axis in AxisId::ALL {
            let position = self.gantry.get_position(axis);
            state.position_cm[axis.index()] = self.record(position)?;
            let velocity = self.gantry.get_end_velocity(axis);
            state.end_velocity[axis.index()] = self.record(velocity)?;
        }
        Some(state)
    }

    /// Graceful return home before exit
    pub fn shutdown(&mut self) {
        if self.gantry.state() == SessionState::Closed {
            info!("Gantry already shut down");
            return;
        }
        let result = self.gantry.shutdown();
        self.record(result);
    }
}

pub async fn run(options: RuntimeOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = match options.velocity {
        Some(velocity) => GantryConfig::with_velocity(velocity),
        None => GantryConfig::default(),
    };

    if options.simulate {
        info!("Using simulated motion controller");
        let gantry = AxisController::new(config, SimulatedController::new())?;
        serve(gantry).await
    } else {
        let gantry = match options.port.as_deref() {
            Some(port) => AxisController::connect_port(config, port)?,
            None => AxisController::connect(config)?,
        };
        serve(gantry).await
    }
}

async fn serve<G: GantryControl>(mut gantry: G) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    block_in_place(|| gantry.initialize())?;

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD).await?;
    let pub_state = session.declare_publisher(TOPIC_STATE).await?;
    let pub_move = session.declare_publisher(TOPIC_MOVE).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut runtime = Runtime::new(gantry);
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!("Runtime started: {}Hz state poll", LOOP_HZ);
    info!("Subscribed to: {}", TOPIC_CMD);
    info!("Publishing to: {}, {}, {}", TOPIC_STATE, TOPIC_MOVE, TOPIC_HEALTH);

    // Registered once so a SIGINT during a blocking poll is not lost
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = &mut ctrl_c => {
                info!("Interrupted, returning gantry home");
                break;
            }
        }

        // 1. Drain all pending commands (non-blocking), apply in arrival order
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<GantryCommand>(&payload) {
                Ok(cmd) => {
                    if let Some(report) = block_in_place(|| runtime.on_command(cmd)) {
                        pub_move.put(serde_json::to_string(&report)?).await?;
                    }
                }
                Err(e) => {
                    warn!("Failed to parse command: {}", e);
                }
            }
        }

        // 2. Poll controller state
        if let Some(state) = block_in_place(|| runtime.poll_state()) {
            pub_state.put(serde_json::to_string(&state)?).await?;
        }

        // 3. Publish health
        let health_json = serde_json::to_string(&runtime.health())?;
        pub_health.put(health_json).await?;
    }

    block_in_place(|| runtime.shutdown());
    Ok(())
}
