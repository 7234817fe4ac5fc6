// LogTailer - main.rs
//
// Command-line entry point. Handles:
// 1. CLI argument parsing
// 2. config.toml loading and logging initialisation
// 3. Scheme registry set-up (built-in + user-defined)
// 4. Opening the target and printing classified lines on a fixed cadence
//
// Tailed lines go to stdout; diagnostics go to stderr or the configured log
// file.

use clap::{Parser, Subcommand};
use logtailer::app::sink::Drained;
use logtailer::app::source::{RemoteCommands, RemoteTarget};
use logtailer::app::state::ViewState;
use logtailer::app::tailer::Tailer;
use logtailer::core::filter::DisplayFilter;
use logtailer::core::model::ClassifiedLine;
use logtailer::core::registry::SchemeRegistry;
use logtailer::platform::config::{self, AppConfig, PlatformPaths};
use logtailer::util::{constants, error::Result, logging};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// LogTailer - follow a growing log file, locally or over SSH, and classify
/// each line by severity.
#[derive(Parser, Debug)]
#[command(name = "logtailer", version, about)]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory).
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Severity scheme to classify with.
    #[arg(short = 's', long = "scheme")]
    scheme: Option<String>,

    /// Hide lines ranked below this level (tag or display name).
    #[arg(short = 'l', long = "min-level")]
    min_level: Option<String>,

    /// Only show lines matching this regex.
    #[arg(short = 'f', long = "filter")]
    filter: Option<String>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Print the known severity schemes and exit.
    #[arg(long = "list-schemes")]
    list_schemes: bool,

    #[command(subcommand)]
    target: Option<Target>,
}

#[derive(Subcommand, Debug)]
enum Target {
    /// Tail a local file.
    Local {
        /// File to follow. It may not exist yet.
        path: PathBuf,
    },
    /// Tail a file on a remote host over SSH.
    Remote {
        #[arg(long)]
        host: String,

        #[arg(short = 'u', long)]
        user: String,

        /// SSH port (defaults to [remote] port in config.toml, then 22).
        #[arg(short = 'p', long)]
        port: Option<u16>,

        /// Private key file.
        #[arg(short = 'k', long)]
        key: Option<PathBuf>,

        /// Password; tried before the key.
        #[arg(long, env = constants::SSH_PASSWORD_ENV, hide_env_values = true)]
        password: Option<String>,

        /// Absolute path of the file on the remote host.
        path: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PlatformPaths::resolve().config_file());
    let (app_config, warnings) = config::load_config(&config_path);

    logging::init(
        cli.debug,
        app_config.log_level.as_deref(),
        app_config.log_file.as_deref(),
    );

    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        config = %config_path.display(),
        "LogTailer starting"
    );
    for w in &warnings {
        tracing::warn!("{}", w);
        eprintln!("Warning: {w}");
    }

    if let Err(e) = run(cli, app_config) {
        tracing::error!(error = %e, "LogTailer stopped with an error");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli, app_config: AppConfig) -> Result<()> {
    let registry = Arc::new(SchemeRegistry::with_builtins());
    for scheme in app_config.schemes {
        let name = scheme.name.clone();
        if let Err(e) = registry.register_scheme(scheme) {
            tracing::warn!(scheme = %name, error = %e, "User scheme not registered");
            eprintln!("Warning: {e}");
        }
    }

    let wanted = cli
        .scheme
        .or(app_config.scheme)
        .unwrap_or_else(|| constants::DEFAULT_SCHEME_NAME.to_string());
    let current = registry.set_current(&wanted);
    if current.name != wanted {
        eprintln!("Warning: unknown scheme '{wanted}', using '{}'", current.name);
    }

    if cli.list_schemes {
        print_schemes(&registry);
        return Ok(());
    }

    let Some(target) = cli.target else {
        eprintln!("Nothing to tail. Use `logtailer local <PATH>` or `logtailer remote --host H --user U <PATH>`.");
        std::process::exit(2);
    };

    let mut filter = DisplayFilter::default();
    if let Some(level) = cli.min_level.or(app_config.min_level) {
        filter.set_min_level(&level, &current)?;
    }
    if let Some(pattern) = cli.filter.or(app_config.filter) {
        filter.set_regex(&pattern)?;
    }

    let commands = RemoteCommands {
        size: app_config.size_command,
        follow: app_config.tail_command,
    };
    let mut tailer = Tailer::new(Arc::clone(&registry), commands);

    match target {
        Target::Local { path } => tailer.open_local(path),
        Target::Remote {
            host,
            user,
            port,
            key,
            password,
            path,
        } => {
            let mut remote = RemoteTarget::new(host, user, path);
            remote.port = port.unwrap_or(app_config.ssh_port);
            remote.key_path = key;
            remote.password = password;
            tracing::debug!(target_info = ?remote, "Opening remote target");
            tailer.open_remote(remote)?;
        }
    }

    let mut view = ViewState::new(filter, app_config.max_lines);
    let result = follow(&tailer, &mut view, app_config.refresh_interval_ms);
    tailer.close();
    result
}

/// Drain and print until the source faults or stdout goes away.
fn follow(tailer: &Tailer, view: &mut ViewState, refresh_ms: u64) -> Result<()> {
    let stdout = io::stdout();
    let refresh = Duration::from_millis(refresh_ms);

    loop {
        let drained = tailer.drain_new_lines();
        if let Err(e) = print_drain(&mut stdout.lock(), view, drained) {
            // Usually a closed pipe (`logtailer ... | head`).
            tracing::debug!(error = %e, "stdout closed; stopping");
            return Ok(());
        }

        let status = tailer.status();
        if status != view.status {
            tracing::debug!(state = %status.state, primary = %status.primary, "Status changed");
            view.set_status(status);
        }

        if let Some(fault) = tailer.take_fault() {
            return Err(fault.into());
        }
        std::thread::sleep(refresh);
    }
}

fn print_drain(out: &mut impl Write, view: &mut ViewState, drained: Drained) -> io::Result<()> {
    if drained.restarted {
        writeln!(out, "---- restarted ----")?;
    }
    for line in view.apply(drained) {
        print_line(out, line)?;
    }
    out.flush()
}

fn print_line(out: &mut impl Write, line: &ClassifiedLine) -> io::Result<()> {
    if line.is_status() {
        writeln!(out, "-- {}", line.text())
    } else {
        writeln!(
            out,
            "{:>6} {:<8} {}",
            line.sequence(),
            line.level().display_name,
            line.text()
        )
    }
}

fn print_schemes(registry: &SchemeRegistry) {
    let current = registry.current();
    for name in registry.names() {
        let Some(scheme) = registry.get(&name) else {
            continue;
        };
        let marker = if scheme.name == current.name { '*' } else { ' ' };
        let levels: Vec<&str> = scheme.levels.iter().map(|l| l.display_name.as_str()).collect();
        println!(
            "{marker} {:<12} [{}, {})  {}",
            scheme.name,
            scheme.window.start,
            scheme.window.end,
            levels.join(" < ")
        );
    }
}
