// Network command grammar shared by the bridge server and the remote client
//
// One short ASCII command per TCP connection:
//   S<n>            set speed scale (0-100)
//   F / B / L / R   forward, backward, turn left, turn right at the current scale
//   S               stop
//   :S<id>=<v>!     servo position (id 1-4), re-encoded before it reaches the serial line

use std::fmt;
use std::num::IntErrorKind;
use std::str::FromStr;

use crate::serial::protocol::{encode_servo_id, ServoId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetSpeed(i32),
    Forward,
    Backward,
    Left,
    Right,
    Stop,
    Servo { id: ServoId, value: i32 },
}

/// Text that does not match the command grammar
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed command: {0:?}")]
pub struct MalformedCommand(pub String);

impl FromStr for Command {
    type Err = MalformedCommand;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let cmd = raw.trim();
        let malformed = || MalformedCommand(cmd.to_string());

        match cmd {
            "F" => return Ok(Command::Forward),
            "B" => return Ok(Command::Backward),
            "L" => return Ok(Command::Left),
            "R" => return Ok(Command::Right),
            "S" => return Ok(Command::Stop),
            _ => {}
        }

        if let Some(servo) = cmd.strip_prefix(":S") {
            return parse_servo(servo).ok_or_else(malformed);
        }

        // S<n>: only a numeric suffix sets the scale, anything else is dropped
        if let Some(speed) = cmd.strip_prefix('S') {
            // Out-of-range integers saturate instead of being rejected
            let speed = match speed.trim().parse::<i32>() {
                Ok(speed) => speed,
                Err(e) if *e.kind() == IntErrorKind::PosOverflow => 100,
                Err(e) if *e.kind() == IntErrorKind::NegOverflow => 0,
                Err(_) => return Err(malformed()),
            };
            return Ok(Command::SetSpeed(speed.clamp(0, 100)));
        }

        Err(malformed())
    }
}

// "<id>=<value>!" after the ":S" prefix
fn parse_servo(rest: &str) -> Option<Command> {
    let body = rest.strip_suffix('!')?;
    let (id, value) = body.split_once('=')?;
    let id = ServoId::new(id.parse().ok()?).ok()?;
    let value = value.parse().ok()?;
    Some(Command::Servo { id, value })
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetSpeed(speed) => write!(f, "S{}", speed),
            Command::Forward => f.write_str("F"),
            Command::Backward => f.write_str("B"),
            Command::Left => f.write_str("L"),
            Command::Right => f.write_str("R"),
            Command::Stop => f.write_str("S"),
            Command::Servo { id, value } => f.write_str(&encode_servo_id(*id, *value)),
        }
    }
}
