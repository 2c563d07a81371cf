//! Link action that runs an external command (key combination injector)

use super::LinkAction;
use crate::core::config::ActionConfig;
use crate::core::state::LinkState;
use std::process::{Child, Command, Stdio};
use tracing::{debug, info, warn};

/// Spawns the configured command for the new state without waiting for it
pub struct CommandAction {
    on_connect: Vec<String>,
    on_disconnect: Vec<String>,
    /// Spawned commands not yet reaped
    children: Vec<Child>,
}

impl CommandAction {
    pub fn new(config: &ActionConfig) -> Self {
        Self {
            on_connect: config.on_connect.clone(),
            on_disconnect: config.on_disconnect.clone(),
            children: Vec::new(),
        }
    }

    fn argv_for(&self, state: LinkState) -> &[String] {
        match state {
            LinkState::Connected => &self.on_connect,
            LinkState::Disconnected => &self.on_disconnect,
            LinkState::Unknown => &[],
        }
    }

    /// Drop finished children so they don't linger as zombies
    fn reap(&mut self) {
        self.children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                debug!("Action command exited with {}", status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!("Failed to poll action command: {}", e);
                false
            }
        });
    }

    /// Commands spawned and still running (or not yet reaped)
    pub fn pending(&self) -> usize {
        self.children.len()
    }
}

impl LinkAction for CommandAction {
    fn notify_link_change(&mut self, state: LinkState) {
        self.reap();

        let argv = self.argv_for(state).to_vec();
        let Some((program, args)) = argv.split_first() else {
            debug!("No action configured for {}", state);
            return;
        };

        match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => {
                info!("Ran link action for {}: {}", state, program);
                self.children.push(child);
            }
            Err(e) => warn!("Failed to run link action {:?}: {}", program, e),
        }
    }
}

impl Drop for CommandAction {
    fn drop(&mut self) {
        self.reap();
    }
}
