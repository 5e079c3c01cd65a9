//! Static texts.

/// The program's version info text.
pub static INFOTEXT: &'static str =
    concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

/// Chat help text listing the commands, using the given command prefix.
pub fn chat_help(prefix: &str) -> String {
    return format!(
        r#"**{INFOTEXT}**
`{p}status <game>`: is the game running
`{p}list`: registered games
`{p}start <game>`: launch the game unless already running (owner)
`{p}stop <game>`: terminate the game (owner)
`{p}restart <game>`: stop, wait, start (owner)
`{p}add <game> <appid> <process name>`: register a game (owner)
`{p}remove <game>`: unregister a game (owner)
`{p}press <key>`: press a single character or one of {keys}
`{p}restart_game`: restart the login target and get it to its login prompt
`{p}status_game`: is the login target running"#,
        p = prefix,
        keys = crate::input::NAMED_KEYS.join(", "),
    );
}
