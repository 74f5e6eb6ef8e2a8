use std::{error::Error, path::PathBuf, process, sync::Arc};

use clap::{command, Parser, Subcommand, ValueHint};
use log::{debug, error, info, LevelFilter};

use cssorbot::{
    api::{self, lookup_request, routes, RequestConfig},
    config::Config,
    events::{Event, EventType},
    http,
    login::{Escalation, LogNavigator},
    protocol::{
        lookup::{LookupResponse, LookupResult},
        playlists::PlaylistsResponse,
        servers::Server,
    },
    reconcile::PlaylistsListener,
    request::{Request, RequestState},
    session::Session,
    signal,
    store::{keys, Store},
    stream::EventStream,
    token_store::{FileStore, MemoryStore, TokenStore},
    util::format_duration,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, PartialEq, Eq, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value = "cssorbot.toml", env = "CSSORBOT_CONFIG")]
    config: PathBuf,

    /// Directory to keep the credential in
    ///
    /// Ensure that this directory is kept secure, as the credential grants
    /// access to your account.
    ///
    /// [default: `storage_dir` from the configuration file, or the working
    /// directory]
    #[arg(long, value_name = "DIR", value_hint = ValueHint::DirPath)]
    storage_dir: Option<PathBuf>,

    /// Keep the credential in memory only
    #[arg(long, default_value_t = false, conflicts_with = "storage_dir")]
    ephemeral: bool,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, PartialEq, Eq, Subcommand)]
enum Command {
    /// Log in with the authorization code from the login redirect
    ///
    /// Without a code, shows where to log in.
    Login { code: Option<String> },

    /// Forget the stored credential
    Logout,

    /// Look up a track or playlist
    Lookup { query: String },

    /// Show the server the bot plays in
    Servers,

    /// List your playlists
    Playlists,

    /// Create a playlist
    CreatePlaylist { name: String },

    /// Follow playlist and queue changes until interrupted
    Listen,
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => {
                // Quiet and verbose are mutually exclusive, and `verbose` is 0
                // by default. So this arm means: quiet mode.
                LevelFilter::Warn
            }
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module("cssorbot", level);
    }

    logger.init();
}

/// Loads the configuration file, pointing at the example when it is missing.
fn load_config(args: &Args) -> Result<Config, Box<dyn Error>> {
    let config = Config::from_file(&args.config);

    if let Err(ref e) = config {
        if e.kind == cssorbot::error::ErrorKind::NotFound {
            info!(
                "copy cssorbot.toml.example to {} and fill in your OAuth application",
                args.config.display()
            );
        }
    }

    Ok(config?)
}

fn token_store(args: &Args, config: &Config) -> Arc<dyn TokenStore> {
    if args.ephemeral {
        return Arc::new(MemoryStore::new());
    }

    let dir = args
        .storage_dir
        .as_deref()
        .unwrap_or_else(|| config.storage_dir());
    debug!("credential stored in {}", dir.display());
    Arc::new(FileStore::new(dir))
}

fn print_playlists(state: &RequestState<PlaylistsResponse>) {
    match state {
        RequestState::Pending => {}
        RequestState::InProgress => println!("loading playlists..."),
        RequestState::Success(data) if data.playlists.is_empty() => println!("no playlists"),
        RequestState::Success(data) => {
            for playlist in &data.playlists {
                let source = playlist
                    .source
                    .map(|source| format!(" ({source:?})").to_lowercase())
                    .unwrap_or_default();
                let items = playlist
                    .items
                    .as_ref()
                    .map(|items| format!(", {} items", items.len()))
                    .unwrap_or_default();
                println!("{}  {}{source}{items}", playlist.id, playlist.name);
            }
        }
        RequestState::Error(e) => println!("could not load playlists: {e}"),
    }
}

fn print_lookup(state: &RequestState<LookupResponse>) {
    match state {
        RequestState::Pending => {}
        RequestState::InProgress => println!("searching..."),
        RequestState::Success(LookupResponse { result: None }) => println!("nothing found"),
        RequestState::Success(LookupResponse {
            result: Some(LookupResult::Track(track)),
        }) => println!("{} / {}", track.title, format_duration(track.duration)),
        RequestState::Success(LookupResponse {
            result: Some(LookupResult::Playlist(playlist)),
        }) => {
            println!("{} ({} tracks)", playlist.name, playlist.size);
            for track in &playlist.tracks {
                println!("  {} / {}", track.title, format_duration(track.duration));
            }
        }
        RequestState::Error(e) => println!("lookup failed: {e}"),
    }
}

fn print_servers(state: &RequestState<Server>) {
    match state {
        RequestState::Success(server) => println!("{}  {}", server.id, server.name),
        RequestState::Error(e) => println!("could not load servers: {e}"),
        RequestState::Pending | RequestState::InProgress => {}
    }
}

fn print_event(event: &Event) {
    if let Event::QueueChanged { queue } = event {
        println!("queue:");
        for entry in queue {
            println!("  {} / {}", entry.title, format_duration(entry.duration));
        }
    }
}

/// Follows the event stream until interrupted.
async fn listen(
    session: Arc<Session>,
    config: &Config,
    playlists: Request<PlaylistsResponse>,
) -> Result<(), Box<dyn Error>> {
    session.ensure_authenticated()?;

    let stream = Arc::new(EventStream::new(config.ws_api_host.clone(), session));
    let _listener = PlaylistsListener::attach(&stream, playlists.cell().clone());
    let _queue = stream.subscribe(EventType::QueueChanged, print_event);

    let mut changes = playlists.subscribe();
    if let Some(fetch) = playlists.fetch_if_needed() {
        // Settles into the cell; errors are shown from there.
        drop(fetch);
    }

    let mut signals = signal::Handler::new()?;
    let runner = {
        let stream = Arc::clone(&stream);
        tokio::spawn(async move { stream.run().await })
    };
    tokio::pin!(runner);

    loop {
        tokio::select! {
            // Prioritize shutdown signals.
            biased;

            signal = signals.recv() => {
                match &signal {
                    Ok(signal) => info!("received {signal}, shutting down gracefully"),
                    Err(e) => error!("{e}, shutting down"),
                }
                stream.close();
                (&mut runner).await??;
                break signal.map(drop).map_err(Into::into);
            }

            result = &mut runner => {
                result??;
                break Ok(());
            }

            changed = changes.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                print_playlists(&changes.borrow_and_update());
            }
        }
    }
}

/// Main application logic.
///
/// # Errors
///
/// This function returns an error when the configuration cannot be loaded,
/// a request fails, or the user needs to log in.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args)?;

    let transport = Arc::new(http::Client::new(&config)?);
    let escalation = Escalation::new(&config.oauth, Arc::new(LogNavigator));
    let session = Arc::new(Session::new(
        config.http_api_host.clone(),
        token_store(&args, &config),
        transport,
        escalation,
    ));
    let client = api::Client::new(Arc::clone(&session));
    let store = Store::new();

    match args.command {
        Command::Login { code: None } => {
            println!("{}", session.escalation().url());
        }
        Command::Login { code: Some(code) } => {
            client.login(&code).await?;
            println!("logged in");
        }
        Command::Logout => {
            client.logout()?;
            println!("logged out");
        }
        Command::Lookup { query } => {
            let lookup = Request::<LookupResponse>::local(client, lookup_request(&query));
            let fetch = lookup.fetch(None);
            print_lookup(&lookup.state());
            let result = fetch.await;
            print_lookup(&lookup.state());
            result?;
        }
        Command::Servers => {
            let servers = Request::new(
                client,
                RequestConfig::get(routes::SERVERS),
                store.cell(&keys::SERVERS)?,
            );
            if let Some(fetch) = servers.fetch_if_needed() {
                let result = fetch.await;
                print_servers(&servers.state());
                result?;
            }
        }
        Command::Playlists => {
            let playlists = Request::new(
                client,
                RequestConfig::get(routes::PLAYLISTS),
                store.cell(&keys::PLAYLISTS)?,
            );
            if let Some(fetch) = playlists.fetch_if_needed() {
                let result = fetch.await;
                print_playlists(&playlists.state());
                result?;
            }
        }
        Command::CreatePlaylist { name } => {
            let created = client.create_playlist(&name).await?;
            println!("created {}  {}", created.playlist.id, created.playlist.name);
        }
        Command::Listen => {
            let playlists = Request::new(
                client,
                RequestConfig::get(routes::PLAYLISTS),
                store.cell(&keys::PLAYLISTS)?,
            );
            listen(session, &config, playlists).await?;
        }
    }

    Ok(())
}

/// Main entry point of the application.
///
/// This function initializes the logger facade, parses the command line
/// arguments, and runs the requested command.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        let login_required = e
            .downcast_ref::<cssorbot::error::Error>()
            .is_some_and(cssorbot::error::Error::is_login_redirect);
        if login_required {
            error!("not logged in, run `{name} login` to continue");
        } else {
            error!("{e}");
        }
        process::exit(1);
    }
}
