//! Console listings for `--list-ports` and `--list-sessions`

use colored::*;

use crate::audio::{SessionDirectory, SessionResult};
use crate::keypad::{find_port, KeypadDriver};

/// One audio application with its current state
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRow {
    pub name: String,
    pub executable_path: String,
    pub process_id: Option<u32>,
    /// `None` when the session vanished while listing
    pub level_percent: Option<f32>,
    pub muted: Option<bool>,
}

/// Snapshot every audio application with its level and mute state
pub fn session_rows(directory: &SessionDirectory) -> SessionResult<Vec<SessionRow>> {
    let mut rows = Vec::new();
    for app in directory.applications()? {
        let handle = directory.find_handle(app.executable_path())?;
        rows.push(SessionRow {
            name: app.display_name().to_string(),
            executable_path: app.executable_path().to_string(),
            process_id: handle.as_ref().map(|h| h.process_id()),
            level_percent: handle.as_ref().and_then(|h| h.level_percent()),
            muted: handle.as_ref().and_then(|h| h.mute()),
        });
    }
    Ok(rows)
}

pub fn list_sessions_formatted(directory: &SessionDirectory) {
    println!("\n{}", "=== Audio Applications ===".bold().cyan());

    match session_rows(directory) {
        Ok(rows) if rows.is_empty() => println!("  {}", "No audio sessions found".dimmed()),
        Ok(rows) => {
            for row in rows {
                let level = match row.level_percent {
                    Some(level) => format!("{:5.1}%", level).green(),
                    None => "  ?  ".yellow(),
                };
                let mute = if row.muted == Some(true) {
                    " [MUTED]".red()
                } else {
                    "".normal()
                };
                let pid = row.process_id.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
                println!("  {} {}{} (pid {})", level, row.name.bright_white(), mute, pid);
                println!("         {}", row.executable_path.dimmed());
            }
        }
        Err(e) => println!("  {} {}", "Audio service unavailable:".red(), e),
    }

    println!();
}

/// Print MIDI input ports, marking the one the config would pick
pub fn list_ports_formatted(configured: Option<&str>) {
    println!("\n{}", "=== MIDI Input Ports ===".bold().cyan());

    let ports = match KeypadDriver::list_input_ports() {
        Ok(ports) => ports,
        Err(e) => {
            println!("  {} {}", "Cannot list MIDI ports:".red(), e);
            return;
        }
    };

    if ports.is_empty() {
        println!("  {}", "No input ports found".dimmed());
    }

    let selected = configured.and_then(|pattern| find_port(&ports, pattern));
    for (index, name) in ports.iter().enumerate() {
        if Some(index) == selected {
            println!("  {} {}", "[KEYPAD]".green(), name.bright_white());
        } else {
            println!("  {} {}", "[      ]".dimmed(), name);
        }
    }

    if let (Some(pattern), None) = (configured, selected) {
        println!("\n  {} '{}'", "No port matches".yellow(), pattern);
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::MockSystem;

    #[test]
    fn test_session_rows() {
        let system = MockSystem::new();
        let session = system.add_session(42, r"C:\Apps\vlc.exe", 0.25);
        system.add_session(43, r"C:\Apps\spotify.exe", 1.0);
        let directory = SessionDirectory::new(system.clone(), system.clone());

        let rows = session_rows(&directory).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "vlc.exe");
        assert_eq!(rows[0].process_id, Some(42));
        assert_eq!(rows[0].level_percent, Some(25.0));
        assert_eq!(rows[0].muted, Some(false));
        assert_eq!(rows[1].level_percent, Some(100.0));
        assert_eq!(session.live_refs(), 0);
    }

    #[test]
    fn test_session_rows_unavailable() {
        let system = MockSystem::new();
        system.set_available(false);
        let directory = SessionDirectory::new(system.clone(), system.clone());
        assert!(session_rows(&directory).is_err());
    }
}
