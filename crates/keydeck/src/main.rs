//! Binary entrypoint for the keydeck daemon.
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    process,
};

use clap::{Parser, Subcommand, ValueEnum};
use config::resolve_config_path;
use logging as logshared;
use tokio::runtime::Builder;
use tracing::{debug, error};

/// HTTP status API.
mod api;
/// Terminal deck simulator and stdin key reader.
mod console;
/// Daemon wiring and event loop.
mod runtime;
mod watcher;

#[derive(Parser, Debug)]
#[command(name = "keydeck", about = "A page-based key deck daemon", version)]
/// Command-line interface for the `keydeck` binary.
struct Cli {
    /// Optional subcommand.
    #[command(subcommand)]
    command: Option<Command>,

    /// Logging controls
    #[command(flatten)]
    log: logshared::LogArgs,

    /// Optional path to the config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Serve the status API on this address (e.g. 127.0.0.1:3000)
    #[arg(long, value_name = "ADDR")]
    api_listen: Option<SocketAddr>,

    /// Deck model to simulate
    #[arg(long, value_enum, default_value_t = Model::Original)]
    model: Model,

    /// Override the model's key count
    #[arg(long)]
    keys: Option<usize>,

    /// Override the model's key face size in pixels
    #[arg(long, value_name = "PX")]
    icon_size: Option<u32>,
}

/// Known deck layouts.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Model {
    /// 6 keys, 80px faces.
    Mini,
    /// 15 keys, 72px faces.
    Original,
    /// 32 keys, 96px faces.
    Xl,
}

impl Model {
    /// Key count and face size.
    fn layout(self) -> (usize, u32) {
        match self {
            Self::Mini => (6, 80),
            Self::Original => (15, 72),
            Self::Xl => (32, 96),
        }
    }
}

#[derive(Subcommand, Debug)]
/// Top-level CLI subcommands.
enum Command {
    /// Load and validate the configuration then exit.
    Check {
        /// Path to configuration file to check (defaults to ~/.config/keydeck/config.ron)
        path: Option<PathBuf>,

        /// Dump the parsed configuration as JSON to stdout
        #[arg(long)]
        dump: bool,
    },
}

/// Validate the config at `explicit` (or the default path), optionally
/// printing it as JSON.
fn check(explicit: Option<&Path>, dump: bool) -> Result<(), String> {
    let path = resolve_config_path(explicit).map_err(|e| e.pretty())?;
    let cfg = config::load_from_path(&path).map_err(|e| e.pretty())?;
    if dump {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| format!("Failed to serialize config: {e}"))?;
        println!("{json}");
    } else {
        println!("OK");
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let spec = logshared::init(&cli.log);
    debug!(filter = %spec, "logging_initialized");

    if let Some(Command::Check { path, dump }) = &cli.command {
        let explicit = path.as_deref().or(cli.config.as_deref());
        if let Err(e) = check(explicit, *dump) {
            eprintln!("{e}");
            process::exit(1);
        }
        return;
    }

    let config_path = match resolve_config_path(cli.config.as_deref()) {
        Ok(p) => p,
        Err(e) => {
            error!("{}", e.pretty());
            process::exit(1);
        }
    };

    let rt = match Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            process::exit(1);
        }
    };
    let (keys, icon_size) = cli.model.layout();
    let opts = runtime::Options {
        config_path,
        keys: cli.keys.unwrap_or(keys),
        icon_size: cli.icon_size.unwrap_or(icon_size),
        api_listen: cli.api_listen,
    };
    if let Err(e) = rt.block_on(runtime::run(opts)) {
        error!("{}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn flags_override_the_model_layout() {
        let cli = Cli::try_parse_from(["keydeck", "--model", "xl", "--keys", "8"]).unwrap();
        assert_eq!(cli.model.layout(), (32, 96));
        assert_eq!(cli.keys, Some(8));
        assert_eq!(cli.icon_size, None);

        let cli = Cli::try_parse_from(["keydeck", "--api-listen", "127.0.0.1:9000"]).unwrap();
        assert_eq!(cli.model, Model::Original);
        assert_eq!(cli.api_listen, Some(SocketAddr::from(([127, 0, 0, 1], 9000))));
    }

    #[test]
    fn check_subcommand_parses() {
        let cli = Cli::try_parse_from(["keydeck", "--debug", "check", "deck.ron", "--dump"]).unwrap();
        assert!(cli.log.debug);
        match cli.command {
            Some(Command::Check { path, dump }) => {
                assert_eq!(path, Some(PathBuf::from("deck.ron")));
                assert!(dump);
            }
            None => panic!("expected check"),
        }
    }

    #[test]
    fn check_reports_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.ron");
        fs::write(&good, r#"(default_page: "main", pages: {"main": ()})"#).unwrap();
        assert!(check(Some(&good), false).is_ok());

        let bad = dir.path().join("bad.ron");
        fs::write(&bad, r#"(default_page: "nope", pages: {"main": ()})"#).unwrap();
        let err = check(Some(&bad), false).unwrap_err();
        assert!(err.contains("nope"), "{err}");
    }
}
