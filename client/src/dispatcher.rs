//! Maps raw key transitions to drive-command writes.
//!
//! Browsers auto-repeat keydown while a key is held, so each command carries a
//! hold flag: the activate write goes out once per press, the deactivate write
//! once per release. Keys with no mapping are dropped here.

use vehiclestation_shared::{KeyAction, KeyEvent, KeySym};

use crate::protocol::DriveCommand;

/// What the session should do in response to one key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Command {
        command: DriveCommand,
        engage: bool,
        /// Stop also clears the speed-derived display state.
        reset_speed: bool,
    },
    /// The exit key; bypasses the hold machinery.
    Shutdown,
}

#[derive(Debug, Default)]
pub struct Dispatcher {
    held: [bool; DriveCommand::ALL.len()],
}

fn command_for(key: KeySym) -> Option<DriveCommand> {
    match key {
        KeySym::Up => Some(DriveCommand::Forward),
        KeySym::Down => Some(DriveCommand::Reverse),
        KeySym::Left => Some(DriveCommand::SteerLeft),
        KeySym::Right => Some(DriveCommand::SteerRight),
        KeySym::Space => Some(DriveCommand::Stop),
        KeySym::Escape => None,
    }
}

fn slot(command: DriveCommand) -> usize {
    DriveCommand::ALL
        .iter()
        .position(|c| *c == command)
        .expect("command is in ALL")
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, command: DriveCommand) -> bool {
        self.held[slot(command)]
    }

    /// Run one key transition through the per-command hold machine.
    /// Returns `None` for repeats, unmapped keys, and spurious releases.
    pub fn handle(&mut self, event: KeyEvent) -> Option<Dispatch> {
        let Some(command) = command_for(event.key) else {
            // Escape quits on release, like the listener it replaces.
            // Everything else unmapped is ignored.
            if event.key == KeySym::Escape && event.action == KeyAction::Release {
                return Some(Dispatch::Shutdown);
            }
            return None;
        };

        let held = &mut self.held[slot(command)];
        match event.action {
            KeyAction::Press => {
                if *held {
                    return None; // key auto-repeat
                }
                *held = true;
                Some(Dispatch::Command {
                    command,
                    engage: true,
                    reset_speed: command == DriveCommand::Stop,
                })
            }
            KeyAction::Release => {
                if !*held {
                    return None; // release without a tracked press
                }
                *held = false;
                Some(Dispatch::Command {
                    command,
                    engage: false,
                    reset_speed: false,
                })
            }
        }
    }
}
