//! MIDI parsing for keypad input
//!
//! Only the channel messages a pad can send for a button are decoded.

use std::fmt;

use crate::config::TriggerConfig;

/// CC values at or above this count as pressed
const CC_PRESS_THRESHOLD: u8 = 64;

/// Button-relevant MIDI messages (channel is 0-15)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOff { channel: u8, note: u8, velocity: u8 },
    NoteOn { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, cc: u8, value: u8 },
}

/// A button going down or up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEdge {
    pub trigger: TriggerConfig,
    pub pressed: bool,
}

impl MidiMessage {
    /// Parse a MIDI message from raw bytes; other message types yield `None`
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;

        // Running status is not tracked
        if status < 0x80 || status >= 0xF0 || rest.len() < 2 {
            return None;
        }

        let channel = status & 0x0F;
        let first = rest[0] & 0x7F;
        let second = rest[1] & 0x7F;

        match status & 0xF0 {
            0x80 => Some(MidiMessage::NoteOff { channel, note: first, velocity: second }),
            // Velocity 0 is a Note Off
            0x90 if second == 0 => Some(MidiMessage::NoteOff { channel, note: first, velocity: 0 }),
            0x90 => Some(MidiMessage::NoteOn { channel, note: first, velocity: second }),
            0xB0 => Some(MidiMessage::ControlChange { channel, cc: first, value: second }),
            _ => None,
        }
    }

    /// Channel as configured by users (1-16)
    pub fn user_channel(&self) -> u8 {
        let channel = match *self {
            MidiMessage::NoteOff { channel, .. }
            | MidiMessage::NoteOn { channel, .. }
            | MidiMessage::ControlChange { channel, .. } => channel,
        };
        channel + 1
    }

    /// Interpret the message as a button press or release
    pub fn button_edge(&self) -> ButtonEdge {
        let channel = self.user_channel();
        match *self {
            MidiMessage::NoteOn { note, .. } => ButtonEdge {
                trigger: TriggerConfig::Note { note, channel },
                pressed: true,
            },
            MidiMessage::NoteOff { note, .. } => ButtonEdge {
                trigger: TriggerConfig::Note { note, channel },
                pressed: false,
            },
            MidiMessage::ControlChange { cc, value, .. } => ButtonEdge {
                trigger: TriggerConfig::Cc { cc, channel },
                pressed: value >= CC_PRESS_THRESHOLD,
            },
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch={} note={} vel={}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch={} note={} vel={}", channel + 1, note, velocity)
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch={} cc={} val={}", channel + 1, cc, value)
            }
        }
    }
}

/// Format MIDI bytes as hex string
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
