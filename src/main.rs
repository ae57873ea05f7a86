use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iptv_parser::{
    config::Config,
    ingestor::{ChannelFilter, M3uParser, XmltvParser},
    output::{write_records, OutputFormat},
    services::Catalog,
    web::WebServer,
};

#[derive(Parser)]
#[command(name = "iptv-parser")]
#[command(version)]
#[command(about = "Parse XMLTV guides and M3U playlists into flat tables")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Log level
    #[arg(short = 'v', long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse an M3U playlist into a channel table
    ParseM3u(ParseArgs),
    /// Parse an XMLTV guide into a program table
    ParseXmltv(ParseArgs),
    /// Serve the channel and program tables over HTTP
    Serve(ServeArgs),
}

#[derive(Args)]
struct ParseArgs {
    /// Source file, plain or gzip compressed
    input: PathBuf,

    /// Destination table
    output: PathBuf,

    /// Output format (inferred from the output extension by default)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,
}

#[derive(Args)]
struct ServeArgs {
    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Channel table (overrides config file)
    #[arg(long, value_name = "PATH")]
    channels: Option<PathBuf>,

    /// Program table (overrides config file)
    #[arg(long, value_name = "PATH")]
    programs: Option<PathBuf>,

    /// Display timezone for program times
    #[arg(long, value_name = "TZ")]
    timezone: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with specified level
    let log_filter = if cli.log_level == "trace" {
        format!("iptv_parser={},tower_http=trace", cli.log_level)
    } else {
        format!("iptv_parser={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::load_from_file(&cli.config)?;

    match cli.command {
        Command::ParseM3u(args) => {
            let format = resolve_format(&config, &args)?;
            let filter = ChannelFilter::new(&config.playlist)?;
            let channels = M3uParser::new()
                .parse_file(&args.input)?
                .filter(|channel| match channel {
                    Ok(channel) => filter.matches(channel),
                    Err(_) => true,
                });
            let written = write_records(&args.output, format, channels)?;
            info!("Kept {} channels from {}", written, args.input.display());
        }
        Command::ParseXmltv(args) => {
            let format = resolve_format(&config, &args)?;
            let programs = XmltvParser::new().parse_file(&args.input)?;
            let written = write_records(&args.output, format, programs)?;
            info!("Wrote {} programs from {}", written, args.input.display());
        }
        Command::Serve(args) => {
            // Override config with CLI arguments
            if let Some(host) = args.host {
                config.web.host = host;
            }
            if let Some(port) = args.port {
                config.web.port = port;
            }
            if let Some(channels) = args.channels {
                config.query.channels_path = channels;
            }
            if let Some(programs) = args.programs {
                config.query.programs_path = programs;
            }
            if let Some(timezone) = args.timezone {
                config.query.display_timezone = timezone;
            }

            info!("Starting IPTV query service v{}", env!("CARGO_PKG_VERSION"));
            let catalog = Catalog::load(&config.query)?;
            let web_server = WebServer::new(&config.web, catalog)?;

            info!(
                "Starting web server on {}:{}",
                web_server.host(),
                web_server.port()
            );
            web_server.serve().await?;
        }
    }

    Ok(())
}

fn resolve_format(config: &Config, args: &ParseArgs) -> Result<OutputFormat> {
    let explicit = args.format.or(config.output.format);
    Ok(OutputFormat::resolve(explicit, &args.output)?)
}
