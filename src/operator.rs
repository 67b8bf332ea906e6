use crate::config::{parse_value, GateMode, TunableField};
use crate::error::ConfigError;
use crate::protocol::RelayCommand;
use serde::{Deserialize, Serialize};

/// A command typed at the operator console.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OperatorCommand {
    Relay(RelayCommand),
    Set { field: TunableField, value: f64 },
    Gate(GateMode),
    ToggleSimulation,
    Status,
    Quit,
}

impl OperatorCommand {
    /// Parses one console line, e.g. `max-temp 72.5` or `gate xor`.
    ///
    /// A numeric value that can't be read yields `ConfigError` and no
    /// command, so nothing downstream ever sees a half-edited value.
    pub fn parse(line: &str) -> Result<Self, ConfigError> {
        let mut parts = line.split_whitespace();
        let keyword = parts.next().unwrap_or("").to_ascii_lowercase();
        let argument = parts.next();

        let field = match keyword.as_str() {
            "on" | "activate" => return Ok(OperatorCommand::Relay(RelayCommand::On)),
            "off" | "shutdown" => return Ok(OperatorCommand::Relay(RelayCommand::Off)),
            "simulate" | "sim" => return Ok(OperatorCommand::ToggleSimulation),
            "status" => return Ok(OperatorCommand::Status),
            "quit" | "exit" => return Ok(OperatorCommand::Quit),
            "gate" => {
                let mode = argument.ok_or(ConfigError::MissingValue("gate"))?;
                return Ok(OperatorCommand::Gate(mode.parse()?));
            }
            "max-temp" => TunableField::MaxTemp,
            "max-current" => TunableField::MaxCurrent,
            "temp-offset" => TunableField::TempOffset,
            "curr-offset" => TunableField::CurrOffset,
            _ => return Err(ConfigError::UnknownCommand(line.trim().to_string())),
        };

        let input = argument.ok_or(ConfigError::MissingValue(field.name()))?;
        let value = parse_value(field, input)?;
        Ok(OperatorCommand::Set { field, value })
    }
}

pub const HELP: &str = "\
commands:
  on | off                 manual relay override
  max-temp <C>             over-temperature limit
  max-current <A>          short-circuit limit
  temp-offset <C>          temperature calibration offset
  curr-offset <A>          current calibration offset
  gate <or|and|xor>        protection gate
  simulate                 toggle short-circuit test
  status                   print trip log and statistics
  quit";
