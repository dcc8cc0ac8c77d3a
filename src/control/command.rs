use crate::actuator::ActuatorState;
use crate::messaging::InboundMessage;

/// Command decoded from a control payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    On,
    Off,
    Unrecognized,
}

impl Command {
    /// Byte-exact, case-sensitive match against `on` and `off`.
    pub fn decode(payload: &[u8]) -> Self {
        match payload {
            b"on" => Command::On,
            b"off" => Command::Off,
            _ => Command::Unrecognized,
        }
    }

    /// Decodes the declared body of a message.
    pub fn from_message(message: &InboundMessage) -> Self {
        message
            .body()
            .map(Command::decode)
            .unwrap_or(Command::Unrecognized)
    }

    pub fn target_state(self) -> Option<ActuatorState> {
        match self {
            Command::On => Some(ActuatorState::On),
            Command::Off => Some(ActuatorState::Off),
            Command::Unrecognized => None,
        }
    }
}
