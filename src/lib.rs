//! VolMix GW - per-application volume from a MIDI macro keypad
//!
//! A held keypad button ramps one application's audio session volume up or
//! down in fixed steps until it is released.

pub mod actions;
pub mod audio;
pub mod config;
pub mod inspect;
pub mod keypad;
pub mod midi;
pub mod paths;
pub mod router;
