//! Parsing chat messages into commands.

/// A command issued over chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status {
        game: String,
    },
    Start {
        game: String,
    },
    Stop {
        game: String,
    },
    Restart {
        game: String,
    },
    Add {
        nickname: String,
        app_id: String,
        process_name: String,
    },
    Remove {
        nickname: String,
    },
    List,
    PressKey {
        key: String,
    },
    /// Restart the configured login target and get it to its login prompt.
    RestartWithLogin,
    /// Status of the configured login target.
    LoginStatus,
    Help,
}

impl Command {
    /// Name of the command for logging.
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Status { .. } => "status",
            Command::Start { .. } => "start",
            Command::Stop { .. } => "stop",
            Command::Restart { .. } => "restart",
            Command::Add { .. } => "add",
            Command::Remove { .. } => "remove",
            Command::List => "list",
            Command::PressKey { .. } => "press",
            Command::RestartWithLogin => "restart_game",
            Command::LoginStatus => "status_game",
            Command::Help => "help",
        }
    }
}

/// A known command was given without its required arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageError {
    pub usage: String,
}
impl std::error::Error for UsageError {}
impl std::fmt::Display for UsageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "usage: `{}`", self.usage)
    }
}

/// Parse a chat message.
///
/// Returns `None` for messages that are not commands: ones without the
/// prefix and ones with an unknown verb. Verbs are case-insensitive,
/// arguments are separated by whitespace, and any surplus arguments are
/// ignored except for the process name of `add`, which takes the rest of the
/// message.
///
/// ```rust
/// use gamectl::parsing::{parse_command, Command};
///
/// assert_eq!(
///     parse_command("!", "!add valheim 892970 valheim_server.exe"),
///     Some(Ok(Command::Add {
///         nickname: "valheim".into(),
///         app_id: "892970".into(),
///         process_name: "valheim_server.exe".into(),
///     }))
/// );
/// assert_eq!(parse_command("!", "hello there"), None);
/// assert!(matches!(parse_command("!", "!start"), Some(Err(_))));
/// ```
pub fn parse_command(prefix: &str, content: &str) -> Option<Result<Command, UsageError>> {
    let body: &str = content.trim_start().strip_prefix(prefix)?;
    let mut words: std::str::SplitWhitespace = body.split_whitespace();
    let verb: String = words.next()?.to_lowercase();

    let usage = |args: &str| UsageError {
        usage: format!("{prefix}{verb} {args}"),
    };

    let command: Result<Command, UsageError> = match verb.as_str() {
        "status" => words
            .next()
            .map(|game| Command::Status { game: game.into() })
            .ok_or_else(|| usage("<game>")),
        "start" => words
            .next()
            .map(|game| Command::Start { game: game.into() })
            .ok_or_else(|| usage("<game>")),
        "stop" | "end" => words
            .next()
            .map(|game| Command::Stop { game: game.into() })
            .ok_or_else(|| usage("<game>")),
        "restart" => words
            .next()
            .map(|game| Command::Restart { game: game.into() })
            .ok_or_else(|| usage("<game>")),
        "add" | "add_game" => {
            let nickname: Option<&str> = words.next();
            let app_id: Option<&str> = words.next();
            let process_name: String = words.collect::<Vec<&str>>().join(" ");
            match (nickname, app_id, process_name.is_empty()) {
                (Some(nickname), Some(app_id), false) => Ok(Command::Add {
                    nickname: nickname.into(),
                    app_id: app_id.into(),
                    process_name,
                }),
                _ => Err(usage("<game> <appid> <process name>")),
            }
        }
        "remove" | "remove_game" => words
            .next()
            .map(|nickname| Command::Remove {
                nickname: nickname.into(),
            })
            .ok_or_else(|| usage("<game>")),
        "list" => Ok(Command::List),
        "press" => words
            .next()
            .map(|key| Command::PressKey { key: key.into() })
            .ok_or_else(|| usage("<key>")),
        "restart_game" => Ok(Command::RestartWithLogin),
        "status_game" => Ok(Command::LoginStatus),
        "help" => Ok(Command::Help),
        _ => return None,
    };

    return Some(command);
}
