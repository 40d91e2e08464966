// Serial side of the vehicle
//
// Provides:
// - ASCII command codec for motors, servos and the watchdog bit
// - A shared, lock-serialized serial link
// - The periodic watchdog task

pub mod link;
pub mod protocol;
pub mod watchdog;

pub use link::SerialLink;
pub use protocol::{
    encode_motor, encode_servo, encode_watchdog, speed_to_wire_bipolar, speed_to_wire_percent,
    ServoId, Side, WIRE_STOP,
};
