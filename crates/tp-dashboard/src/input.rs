use std::str::FromStr;
use thiserror::Error;

use crate::dispatch::Action;
use crate::view::Modal;

pub const HELP: &str = "commands: refresh | logs <name> | refresh-logs | tab <index> | restart <name> | confirm [clean] | system | refresh-system | close [logs|restart|system] | quit";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("{command} needs {what}")]
    MissingArgument {
        command: &'static str,
        what: &'static str,
    },
    #[error("invalid argument {value:?} for {command}")]
    InvalidArgument {
        command: &'static str,
        value: String,
    },
}

pub fn parse_command(line: &str) -> Result<Action, InputError> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    match command.to_ascii_lowercase().as_str() {
        "" => Err(InputError::Empty),
        "refresh" => Ok(Action::RefreshTable),
        "refresh-logs" => Ok(Action::RefreshLogs),
        "logs" => worker_argument("logs", rest).map(Action::ViewLogs),
        "restart" => worker_argument("restart", rest).map(Action::PromptRestart),
        "confirm" => match rest {
            "" => Ok(Action::ConfirmRestart { clean: false }),
            "clean" => Ok(Action::ConfirmRestart { clean: true }),
            other => Err(InputError::InvalidArgument {
                command: "confirm",
                value: other.to_string(),
            }),
        },
        "tab" => {
            if rest.is_empty() {
                return Err(InputError::MissingArgument {
                    command: "tab",
                    what: "a tab index",
                });
            }
            rest.parse::<usize>()
                .map(Action::SelectBuildTab)
                .map_err(|_| InputError::InvalidArgument {
                    command: "tab",
                    value: rest.to_string(),
                })
        }
        "system" => Ok(Action::ViewSystemLogs),
        "refresh-system" => Ok(Action::RefreshSystemLogs),
        "close" => match rest {
            "" | "logs" => Ok(Action::CloseModal(Modal::WorkerLogs)),
            "restart" => Ok(Action::CloseModal(Modal::Restart)),
            "system" => Ok(Action::CloseModal(Modal::SystemLogs)),
            other => Err(InputError::InvalidArgument {
                command: "close",
                value: other.to_string(),
            }),
        },
        "quit" | "exit" => Ok(Action::Quit),
        other => Err(InputError::Unknown(other.to_string())),
    }
}

fn worker_argument(command: &'static str, rest: &str) -> Result<String, InputError> {
    if rest.is_empty() {
        return Err(InputError::MissingArgument {
            command,
            what: "a tentacle name",
        });
    }
    Ok(rest.to_string())
}

impl FromStr for Action {
    type Err = InputError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        parse_command(line)
    }
}
