// Serial demo: drive the vehicle directly over the serial port (no bridge)
//
// Usage: cargo run --example serial_demo -- [port]
// Example: cargo run --example serial_demo -- /dev/ttyUSB0
//
// Safety:
// - Explicit confirmation before anything is written
// - The watchdog runs for the whole demo; killing the process stops the motors

use std::io::{self, Write};
use std::time::Duration;

use rover_bridge::{DirectDriver, DriverConfig};
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush().unwrap();
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();
    input.trim().eq_ignore_ascii_case("y")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| rover_bridge::config::SERIAL_PORT.to_string());

    println!("Serial port: {}", port);
    if !confirm("This will move the vehicle. Are the wheels OFF THE GROUND?") {
        println!("Aborted.");
        return Ok(());
    }

    let robot = DirectDriver::open(DriverConfig::new(port)).await?;
    let result = run_sequence(&robot).await;

    // close() stops the motors before releasing the port
    robot.close().await?;
    result
}

async fn run_sequence(robot: &DirectDriver) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Forward for 2s");
    robot.drive_for(1.0, 1.0, Duration::from_secs(2)).await?;
    robot.stop().await?;
    sleep(Duration::from_secs(1)).await;

    info!("Turn left for 2s");
    robot.drive_for(-0.5, 0.5, Duration::from_secs(2)).await?;
    robot.stop().await?;
    sleep(Duration::from_secs(1)).await;

    info!("Servo 1 sweep");
    robot.servo_1(130).await?;
    sleep(Duration::from_secs(1)).await;
    robot.servo_1(160).await?;
    sleep(Duration::from_secs(1)).await;

    Ok(())
}
