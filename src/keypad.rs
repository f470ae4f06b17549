//! MIDI keypad driver
//!
//! Listens on one MIDI input port and forwards button edges to the router.

use anyhow::{Context, Result};
use midir::{MidiInput, MidiInputConnection};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::midi::{format_hex, ButtonEdge, MidiMessage};

const CLIENT_NAME: &str = "VolMix-GW";

/// Button edge received from the keypad
#[derive(Debug, Clone)]
pub struct KeypadEvent {
    pub timestamp: Instant,
    pub edge: ButtonEdge,
    pub raw_data: Vec<u8>,
}

pub struct KeypadDriver {
    input_conn: Option<MidiInputConnection<()>>,
    event_tx: mpsc::Sender<KeypadEvent>,
    event_rx: Option<mpsc::Receiver<KeypadEvent>>,
    /// Case-insensitive substring of the port name
    input_port_name: String,
}

impl KeypadDriver {
    pub fn new(input_port_name: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            input_conn: None,
            event_tx,
            event_rx: Some(event_rx),
            input_port_name: input_port_name.into(),
        }
    }

    /// List available MIDI input ports
    pub fn list_input_ports() -> Result<Vec<String>> {
        let midi_in = MidiInput::new(&format!("{}-Scanner", CLIENT_NAME))?;
        Ok(midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect())
    }

    /// Connect to the first input port matching the configured name
    pub fn connect(&mut self) -> Result<()> {
        self.disconnect();

        let midi_in = MidiInput::new(&format!("{}-Input", CLIENT_NAME)).context("Failed to create MIDI input")?;
        let ports = midi_in.ports();
        let names: Vec<String> = ports
            .iter()
            .map(|port| midi_in.port_name(port).unwrap_or_default())
            .collect();
        debug!("Found {} MIDI input ports", names.len());

        let index = find_port(&names, &self.input_port_name)
            .ok_or_else(|| anyhow::anyhow!("Input port '{}' not found", self.input_port_name))?;
        info!("Connecting to keypad input port: {}", names[index]);

        let event_tx = self.event_tx.clone();
        let input_conn = midi_in
            .connect(
                &ports[index],
                CLIENT_NAME,
                move |_timestamp, data, _| {
                    let Some(message) = MidiMessage::parse(data) else {
                        trace!("Ignoring MIDI: {}", format_hex(data));
                        return;
                    };
                    let event = KeypadEvent {
                        timestamp: Instant::now(),
                        edge: message.button_edge(),
                        raw_data: data.to_vec(),
                    };
                    // Never block the MIDI callback thread
                    if event_tx.try_send(event).is_err() {
                        warn!("Keypad event dropped: {}", message);
                    }
                },
                (),
            )
            .map_err(|e| anyhow::anyhow!("Failed to connect to input port: {}", e))?;

        self.input_conn = Some(input_conn);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if let Some(conn) = self.input_conn.take() {
            conn.close();
            info!("Keypad disconnected from '{}'", self.input_port_name);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.input_conn.is_some()
    }

    pub fn input_port_name(&self) -> &str {
        &self.input_port_name
    }

    /// Take the event receiver; only the first call returns it
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<KeypadEvent>> {
        self.event_rx.take()
    }
}

impl Drop for KeypadDriver {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Index of the first port whose name contains `pattern`, ignoring case
pub fn find_port(names: &[String], pattern: &str) -> Option<usize> {
    let pattern = pattern.to_lowercase();
    names.iter().position(|name| name.to_lowercase().contains(&pattern))
}
