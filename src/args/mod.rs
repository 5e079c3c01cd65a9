//! Abstractions related to the inputs of the CLI program.

#[derive(clap::Parser)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version,
    about = "Start, stop and check game processes on this host over chat."
)]
pub struct Cli {
    #[arg(long, short, value_name = "PATH", global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Log at debug level regardless of configuration.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Cmd,
}

impl Cli {
    pub fn get_args() -> Self {
        return <Cli as clap::Parser>::parse();
    }
}

#[derive(clap::Subcommand, Debug, PartialEq, Eq)]
pub enum Cmd {
    #[command(about = "Connect to chat and serve commands until terminated.")]
    Run,

    #[command(about = "Manage the registered games without connecting to chat.")]
    Games {
        #[command(subcommand)]
        cmd: Games,
    },
}

#[derive(clap::Subcommand, Debug, PartialEq, Eq)]
pub enum Games {
    #[command(about = "List the registered games.")]
    List,

    #[command(about = "Register a game.")]
    Add {
        nickname: String,
        app_id: String,
        process_name: String,
    },

    #[command(about = "Unregister a game.")]
    Remove { nickname: String },
}
