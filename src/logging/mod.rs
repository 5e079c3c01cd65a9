//! Console logging for the bot.

/// Log targets of the chat library and its transport stack. They log every
/// gateway heartbeat at info level.
static QUIET_TARGETS: [&'static str; 3] = ["serenity", "tracing", "rustls"];

static PATTERN: &'static str = "[{d(%Y-%m-%dT%H:%M:%S)}] {h([{l}])} [{t}] - {m}{n}";

#[derive(Debug)]
pub enum Error {
    Build(log4rs::config::runtime::ConfigErrors),
    /// Some other logger was installed first.
    AlreadyInitialized(log::SetLoggerError),
}
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Build(err) => Some(err),
            Error::AlreadyInitialized(err) => Some(err),
        }
    }
}
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Build(_) => write!(f, "invalid logger configuration"),
            Error::AlreadyInitialized(_) => write!(f, "a logger is already installed"),
        }
    }
}

/// Records of [`QUIET_TARGETS`] are let through at warning level at most,
/// our own at the given level.
fn logger_config(
    level: log::LevelFilter,
) -> Result<log4rs::Config, log4rs::config::runtime::ConfigErrors> {
    let console: log4rs::append::console::ConsoleAppender =
        log4rs::append::console::ConsoleAppender::builder()
            .encoder(Box::new(log4rs::encode::pattern::PatternEncoder::new(PATTERN)))
            .build();
    let quiet_level: log::LevelFilter = std::cmp::min(level, log::LevelFilter::Warn);

    let mut builder: log4rs::config::runtime::ConfigBuilder = log4rs::Config::builder()
        .appender(log4rs::config::Appender::builder().build("console", Box::new(console)));
    for target in QUIET_TARGETS {
        builder = builder.logger(log4rs::config::Logger::builder().build(target, quiet_level));
    }

    return builder.build(
        log4rs::config::Root::builder()
            .appender("console")
            .build(level),
    );
}

/// Install the console logger for the rest of the program's lifetime.
pub fn init_logger(level: log::LevelFilter) -> Result<log4rs::Handle, Error> {
    let config: log4rs::Config = logger_config(level).map_err(Error::Build)?;
    return log4rs::init_config(config).map_err(Error::AlreadyInitialized);
}
