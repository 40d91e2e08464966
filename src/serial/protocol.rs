// Motor controller serial protocol
//
// ASCII commands, one per frame: ":<FIELD>=<value>!"
//   ML / MR  - left / right motor, 0..=310 (155 = stop)
//   S1..S4   - servo targets, range defined by the firmware
//   WD       - watchdog bit, 0 or 1
// The controller never replies.

use crate::error::{Error, Result};

/// Wire value that stops a motor
pub const WIRE_STOP: u16 = 155;
/// Largest wire value (full forward)
pub const WIRE_MAX: u16 = 310;

/// Normalized speeds closer than this to zero snap to a full stop
pub const DEAD_BAND: f32 = 0.05;

/// Servo indices accepted by the firmware
pub const SERVO_IDS: [u8; 4] = [1, 2, 3, 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    fn field(self) -> &'static str {
        match self {
            Side::Left => "ML",
            Side::Right => "MR",
        }
    }
}

/// A servo index known to be in 1..=4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoId(u8);

impl ServoId {
    pub fn new(id: u8) -> Result<Self> {
        if SERVO_IDS.contains(&id) {
            Ok(Self(id))
        } else {
            Err(Error::InvalidServo(id))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for ServoId {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        Self::new(id)
    }
}

pub fn encode_motor(side: Side, wire: u16) -> String {
    format!(":{}={}!", side.field(), wire.min(WIRE_MAX))
}

/// Encode a servo command, rejecting ids outside 1..=4
pub fn encode_servo(id: u8, value: i32) -> Result<String> {
    let id = ServoId::new(id)?;
    Ok(encode_servo_id(id, value))
}

pub fn encode_servo_id(id: ServoId, value: i32) -> String {
    format!(":S{}={}!", id.get(), value)
}

pub fn encode_watchdog(bit: bool) -> String {
    format!(":WD={}!", u8::from(bit))
}

/// Convert a normalized speed (-1.0 ..= 1.0) to a wire value (0 ..= 310)
///
/// Values inside the dead-band (and NaN) map to exactly 155.
pub fn speed_to_wire_bipolar(speed: f32) -> u16 {
    if speed.is_nan() || speed.abs() < DEAD_BAND {
        return WIRE_STOP;
    }
    let speed = speed.clamp(-1.0, 1.0);
    ((speed + 1.0) * WIRE_STOP as f32).round() as u16
}

/// Convert a percentage (-100 ..= 100) to a wire value (0 ..= 310)
///
/// Computed in integers, rounding halves up: 50 -> 232.5 -> 233.
pub fn speed_to_wire_percent(percent: i32) -> u16 {
    let shifted = percent.clamp(-100, 100) + 100; // 0..=200
    ((shifted * WIRE_MAX as i32 + 100) / 200) as u16
}
