use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{error, info};
use payload_tftpd::config::{self, AppConfig};
use payload_tftpd::tftp;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "payload-tftpd")]
#[command(about = "Read-only TFTP server for a single payload", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a file to every TFTP read request
    Serve {
        /// Listen address [default: 127.0.0.1:69]
        #[arg(short, long)]
        address: Option<String>,

        /// File to serve to clients [default: payload.svg]
        #[arg(short, long, value_name = "PATH")]
        payload: Option<PathBuf>,

        /// Transmissions per block before giving up [default: 10]
        #[arg(short, long)]
        retries: Option<u8>,

        /// Time to wait for each acknowledgment, e.g. "6s" or "500ms" [default: 6s]
        #[arg(short, long, value_parser = humantime_serde::re::humantime::parse_duration)]
        timeout: Option<Duration>,

        /// Use single port mode (useful for NAT environments)
        #[arg(short, long)]
        single_port: bool,
    },

    /// Download a file from a TFTP server (RRQ)
    Fetch {
        /// Server IP address
        server: String,

        /// Remote file name on server
        remote_file: String,

        /// Local file path (defaults to remote file name)
        #[arg(value_name = "LOCAL_FILE")]
        local_file: Option<PathBuf>,

        /// Server port [default: 69]
        #[arg(short, long)]
        port: Option<u16>,

        /// Timeout in seconds [default: 5]
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Timeouts tolerated before giving up [default: 5]
        #[arg(short, long)]
        retries: Option<u8>,
    },

    /// Generate configuration file (.payload-tftpd.toml) in current directory
    Genconfig {
        /// Force overwrite existing configuration file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logger, default info level, display file line number and time
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use std::io::Write;
            let level_style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "[{} {level_style}{}{level_style:#} {}:{}] {level_style}{}{level_style:#}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.target(),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .init();

    let cli = Cli::parse();

    // Try to load configuration file
    let config_path = config::CONFIG_FILE;
    let app_config = if std::path::Path::new(config_path).exists() {
        match AppConfig::load_from_file(config_path) {
            Ok(cfg) => {
                let abs_path = std::fs::canonicalize(config_path)
                    .unwrap_or_else(|_| PathBuf::from(config_path));
                info!("Using configuration file: {}", abs_path.display());
                Some(cfg)
            }
            Err(e) => {
                error!("Failed to load configuration file: {}, using defaults", e);
                None
            }
        }
    } else {
        None
    };

    match cli.command {
        Commands::Serve {
            address,
            payload,
            retries,
            timeout,
            single_port,
        } => {
            tftp::server::run_with_config(
                address,
                payload,
                retries,
                timeout,
                single_port,
                app_config.as_ref().and_then(|c| c.serve.clone()),
            )?;
        }

        Commands::Fetch {
            server,
            remote_file,
            local_file,
            port,
            timeout,
            retries,
        } => {
            tftp::client::run_with_config(
                server,
                remote_file,
                local_file,
                port,
                timeout,
                retries,
                app_config.as_ref().and_then(|c| c.fetch.as_ref()),
            )?;
        }

        Commands::Genconfig { force } => {
            if let Err(e) = AppConfig::generate_config_file(config_path, force) {
                error!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
