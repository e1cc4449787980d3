use std::collections::HashMap;
use log::{debug, info};
use thiserror::Error;
use crate::metering_s0::S0Interface;

/// Name under which the S0 counter can be set from outside
pub const S0_SET_VALUE: &str = "s0Interface.setValue";

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("Unknown command {0}")]
    UnknownCommand(String),
    #[error("Missing parameter {0}")]
    MissingParameter(String),
}

pub type CommandFn = Box<dyn Fn(&HashMap<String, String>) -> Result<bool, CommandError> + Send + Sync>;

/// Commands that can be invoked by name with string parameters
pub struct CommandRegistry {
    commands: HashMap<String, CommandFn>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        CommandRegistry { commands: HashMap::new() }
    }

    pub fn insert(&mut self, name: &str, command: CommandFn) {
        debug!("Registering command {name}");
        self.commands.insert(name.to_string(), command);
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn invoke(&self, name: &str, params: &HashMap<String, String>) -> Result<bool, CommandError> {
        let command = self.commands.get(name)
            .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;
        info!("Running command {name}");
        command(params)
    }

    /// Make `s0Interface.setValue?value=<count>` available
    pub fn register_s0(&mut self, s0: S0Interface) {
        self.insert(S0_SET_VALUE, Box::new(move |params| {
            let value = params.get("value")
                .ok_or_else(|| CommandError::MissingParameter("value".to_string()))?;
            Ok(s0.set_value(value))
        }));
    }
}
