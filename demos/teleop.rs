// Keyboard teleop through the bridge: WASD move, R/F speed, 1-4 servo presets, Q quit
//
// Usage: cargo run --example teleop -- [host:port]
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use rover_bridge::RemoteClient;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const SPEED_STEP: i32 = 5; // percent
const INPUT_TIMEOUT_MS: u64 = 500; // Stop after this much time with no movement key
const SERVO_PRESETS: [i32; 2] = [130, 160];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Motion {
    Stopped,
    Forward,
    Backward,
    Left,
    Right,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "192.168.178.22:3000".to_string());
    let robot = RemoteClient::new(addr);

    info!("Controls: WASD=move, R/F=speed, 1-4=toggle servo, Q=quit");

    enable_raw_mode()?;
    let result = run_teleop(&robot).await;
    disable_raw_mode()?;

    robot.stop().await?;
    result
}

async fn run_teleop(robot: &RemoteClient) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed = 80;
    robot.set_speed(speed).await?;

    let mut motion = Motion::Stopped;
    let mut servo_up = [false; 4];
    let mut last_movement_input = Instant::now();

    loop {
        let mut wanted = motion;

        // Poll for key with 20ms timeout
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                let mut key_motion = None;

                match code {
                    KeyCode::Char('w') if pressed => key_motion = Some(Motion::Forward),
                    KeyCode::Char('s') if pressed => key_motion = Some(Motion::Backward),
                    KeyCode::Char('a') if pressed => key_motion = Some(Motion::Left),
                    KeyCode::Char('d') if pressed => key_motion = Some(Motion::Right),

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed = (speed + SPEED_STEP).min(100);
                        robot.set_speed(speed).await?;
                        info!("Speed: {}%", speed);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed = (speed - SPEED_STEP).max(0);
                        robot.set_speed(speed).await?;
                        info!("Speed: {}%", speed);
                    }

                    // Servo presets
                    KeyCode::Char(c @ '1'..='4') if pressed => {
                        let idx = (c as u8 - b'1') as usize;
                        servo_up[idx] = !servo_up[idx];
                        let value = SERVO_PRESETS[usize::from(servo_up[idx])];
                        robot.set_servo(idx as u8 + 1, value).await?;
                        info!("Servo {}: {}", idx + 1, value);
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }

                if let Some(m) = key_motion {
                    wanted = m;
                    last_movement_input = Instant::now();
                }
            }
        }

        // Stop if no movement key for INPUT_TIMEOUT_MS
        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            wanted = Motion::Stopped;
        }

        // Only send on change, every command is its own connection
        if wanted != motion {
            let sent = match wanted {
                Motion::Stopped => robot.stop().await,
                Motion::Forward => robot.set_wheel_speeds(1.0, 1.0).await,
                Motion::Backward => robot.set_wheel_speeds(-1.0, -1.0).await,
                Motion::Left => robot.set_wheel_speeds(-1.0, 1.0).await,
                Motion::Right => robot.set_wheel_speeds(1.0, -1.0).await,
            };
            match sent {
                Ok(()) => motion = wanted,
                Err(e) => warn!("Send failed: {}", e),
            }
        }
    }

    Ok(())
}
