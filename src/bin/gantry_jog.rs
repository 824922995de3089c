// Keyboard jog: arrows move X/Y, PgUp/PgDn move Z, R/F step size,
// H return all axes to zero, Space stop, Q quit.
// Jog moves are unchecked (move_by); the runtime still owns the serial link.
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::Duration;
use tracing::info;

use linact_gantry::config::TOPIC_CMD;
use linact_gantry::gantry::AxisId;
use linact_gantry::messages::GantryCommand;

const STEP_SIZES: [f64; 3] = [0.1, 1.0, 5.0]; // cm per key press

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD).await?;

    info!("Controls: arrows=X/Y, PgUp/PgDn=Z, R/F=step size, H=home, Space=stop, Q=quit");
    print_step(0);

    enable_raw_mode()?;
    let result = run_jog(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_jog(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut step_idx: usize = 0;

    loop {
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }

        let step = STEP_SIZES[step_idx];
        let jog = |axis, delta_cm| vec![GantryCommand::MoveBy { axis, delta_cm }];

        let commands = match code {
            KeyCode::Right => jog(AxisId::X, step),
            KeyCode::Left => jog(AxisId::X, -step),
            KeyCode::Up => jog(AxisId::Y, step),
            KeyCode::Down => jog(AxisId::Y, -step),
            KeyCode::PageUp => jog(AxisId::Z, step),
            KeyCode::PageDown => jog(AxisId::Z, -step),

            KeyCode::Char('h') => AxisId::ALL
                .into_iter()
                .map(|axis| GantryCommand::MoveTo {
                    axis,
                    position_cm: 0.0,
                })
                .collect(),
            KeyCode::Char(' ') => vec![GantryCommand::Stop],

            // Step size
            KeyCode::Char('r') => {
                step_idx = (step_idx + 1).min(STEP_SIZES.len() - 1);
                print_step(step_idx);
                continue;
            }
            KeyCode::Char('f') => {
                step_idx = step_idx.saturating_sub(1);
                print_step(step_idx);
                continue;
            }

            // Quit
            KeyCode::Char('q') | KeyCode::Esc => break,

            _ => continue,
        };

        for cmd in commands {
            info!("Sending {:?}", cmd);
            publisher.put(serde_json::to_string(&cmd)?).await?;
        }
    }

    Ok(())
}

fn print_step(idx: usize) {
    info!("Step: {} cm", STEP_SIZES[idx]);
}
