use gamectl::{
    args::{Cli, Cmd, Games},
    config::Config,
    core::{Dispatcher, Settings},
    error::FatalError,
    input::SystemKeyboard,
    proc::SystemProcesses,
    registry::GameRegistry,
};

fn main() -> std::process::ExitCode {
    let cli: Cli = Cli::get_args();

    match run(cli) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            let tree: String = gamectl::util::aggregate_error_tree(&err, 2);
            if log::log_enabled!(log::Level::Error) {
                log::error!("Unrecoverable error: {}", tree.trim_end());
            } else {
                eprint!("{tree}");
            }
            err.exit_code()
        }
    }
}

fn run(cli: Cli) -> Result<(), FatalError> {
    let config: Config = Config::get_from_fs(cli.config)?;
    let level: log::LevelFilter = match cli.verbose {
        true => log::LevelFilter::Debug,
        false => config.log_level(),
    };
    let _logger: log4rs::Handle = gamectl::logging::init_logger(level)?;
    log::debug!("{} starting", gamectl::text::INFOTEXT);

    match cli.cmd {
        Cmd::Run => serve(config),
        Cmd::Games { cmd } => manage_games(&config, cmd),
    }
}

fn serve(config: Config) -> Result<(), FatalError> {
    let token: String = gamectl::error::token_from_env()?;

    if config.owner_id.is_none() {
        log::info!("No owner_id configured, owners are looked up from the Discord application");
    }
    match &config.login_target {
        Some(target) => log::info!(
            "Login target: {} (AppID {}, process {})",
            target.name,
            target.app_id,
            target.process_name
        ),
        None => log::info!("No login target configured"),
    }

    let registry: GameRegistry = GameRegistry::load(config.registry_path.clone());
    let dispatcher: Dispatcher<SystemProcesses, SystemKeyboard> = Dispatcher::new(
        registry,
        SystemProcesses,
        SystemKeyboard,
        Settings::from(&config),
    );

    let runtime: tokio::runtime::Runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(FatalError::Runtime)?;

    runtime.block_on(gamectl::chat::run(&token, dispatcher))?;
    return Ok(());
}

fn manage_games(config: &Config, cmd: Games) -> Result<(), FatalError> {
    let mut registry: GameRegistry = GameRegistry::load(config.registry_path.clone());

    match cmd {
        Games::List => {
            if registry.is_empty() {
                println!("No games registered in {}", registry.path().to_string_lossy());
            }
            for (nickname, descriptor) in registry.list() {
                println!("{nickname}\t{}\t{}", descriptor.app_id, descriptor.process_name);
            }
        }
        Games::Add {
            nickname,
            app_id,
            process_name,
        } => {
            let added = registry.add(&nickname, &app_id, &process_name)?;
            println!("Added {}: {added}", nickname.to_lowercase());
        }
        Games::Remove { nickname } => {
            registry.remove(&nickname)?;
            println!("Removed {}", nickname.to_lowercase());
        }
    }

    return Ok(());
}
