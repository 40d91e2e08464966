// Socket demo: drive the vehicle through a running bridge
//
// Usage: cargo run --example socket_demo -- [host:port]
// Example: cargo run --example socket_demo -- 192.168.178.22:3000

use std::time::Duration;

use rover_bridge::RemoteClient;
use tokio::time::sleep;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "192.168.178.22:3000".to_string());
    let robot = RemoteClient::new(addr);
    info!("Sending commands to {}", robot.addr());

    let result = run_sequence(&robot).await;

    // Always try to stop, even if the sequence failed halfway
    robot.stop().await?;
    result
}

async fn run_sequence(robot: &RemoteClient) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    robot.set_speed(80).await?;

    info!("Forward");
    robot.set_wheel_speeds(1.0, 1.0).await?;
    sleep(Duration::from_secs(2)).await;

    robot.stop().await?;
    sleep(Duration::from_secs(1)).await;

    info!("Turn left in place");
    robot.set_wheel_speeds(-0.5, 0.5).await?;
    sleep(Duration::from_secs(2)).await;

    robot.stop().await?;
    sleep(Duration::from_secs(1)).await;

    info!("Servo 1 sweep");
    robot.servo_1(130).await?;
    sleep(Duration::from_secs(1)).await;
    robot.servo_1(160).await?;
    sleep(Duration::from_secs(1)).await;

    Ok(())
}
