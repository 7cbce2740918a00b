mod sink;
mod transport;

use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{debug, error, info};
use ymodem_core::{ByteTransport, FileSink, ReceiverConfig, YmodemReceiver};

use crate::sink::{DirectorySink, ListingSink};
use crate::transport::{SerialTransport, StreamTransport};

#[derive(Parser, Debug)]
#[command(author, version, about = "YMODEM batch receiver", long_about = None)]
struct Args {
    /// Directory to store received files
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Print every save call instead of writing files
    #[arg(long)]
    dry_run: bool,

    /// Receiver configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace with hex dumps)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Receive over a serial port
    Serial {
        /// Serial device, e.g. /dev/ttyUSB0
        #[arg(short, long)]
        port: String,

        #[arg(short, long, default_value_t = 115_200)]
        baud: u32,
    },
    /// Receive over a pair of named pipes
    Fifo {
        /// Pipe the receiver writes to
        #[arg(long)]
        tx: PathBuf,

        /// Pipe the receiver reads from
        #[arg(long)]
        rx: PathBuf,
    },
    /// Receive over stdin/stdout
    Stdio,
    /// Print the effective configuration as TOML and exit
    PrintConfig {
        /// Write it to this file instead of stdout
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to install log subscriber");
    }

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => ReceiverConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ReceiverConfig::default(),
    };

    match args.command {
        Command::PrintConfig { ref save } => {
            match save {
                Some(path) => {
                    config
                        .save_to_file(path)
                        .with_context(|| format!("writing config {}", path.display()))?;
                    info!("Configuration written to {}", path.display());
                }
                None => print!("{}", config.to_toml()?),
            }
            Ok(())
        }
        Command::Serial { ref port, baud } => {
            info!("Opening {} at {} baud", port, baud);
            let mut transport = SerialTransport::open(port, baud)
                .with_context(|| format!("opening serial port {}", port))?;
            receive_with(&args, config, &mut transport)
        }
        Command::Fifo { ref tx, ref rx } => {
            // Read-write open keeps the call from blocking until a writer shows up.
            let reader = OpenOptions::new()
                .read(true)
                .write(true)
                .open(rx)
                .with_context(|| format!("opening {}", rx.display()))?;
            let writer = OpenOptions::new()
                .write(true)
                .open(tx)
                .with_context(|| format!("opening {}", tx.display()))?;
            let mut transport = StreamTransport::spawn(reader, writer);
            receive_with(&args, config, &mut transport)
        }
        Command::Stdio => {
            let mut transport = StreamTransport::spawn(std::io::stdin(), std::io::stdout());
            receive_with(&args, config, &mut transport)
        }
    }
}

fn receive_with<T: ByteTransport>(args: &Args, config: ReceiverConfig, transport: &mut T) -> Result<()> {
    if args.dry_run {
        // stdout may be the transport itself, so the listing goes to stderr.
        let mut sink = ListingSink::new(std::io::stderr());
        receive_into(config, transport, &mut sink)
    } else {
        if !args.output_dir.is_dir() {
            bail!("output directory {} does not exist", args.output_dir.display());
        }
        let mut sink = DirectorySink::new(&args.output_dir);
        receive_into(config, transport, &mut sink)
    }
}

fn receive_into<T: ByteTransport, S: FileSink>(
    config: ReceiverConfig,
    transport: &mut T,
    sink: &mut S,
) -> Result<()> {
    let receiver = YmodemReceiver::new(config);
    debug!(
        "Retry limits: header {}, block {}",
        receiver.config().header_retry_limit,
        receiver.config().block_retry_limit
    );
    let summary = receiver.receive(transport, sink)?;
    info!(
        "Received {} file(s), {} bytes",
        summary.files_received, summary.bytes_received
    );
    Ok(())
}
