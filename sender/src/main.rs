use std::fs::File;
use std::net::TcpStream;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::{error, info};

use linkarq::channel::{LossyChannel, DEFAULT_ERROR_PROBABILITY, DEFAULT_LOSS_PROBABILITY};
use linkarq::config::DEFAULT_ENDPOINT;
use linkarq::journal::Journal;
use linkarq::sender::run_session;
use linkarq::source::ChunkSource;
use linkarq::transport::TcpLink;
use linkarq::{FcsScheme, Protocol, SessionConfig};

/// Reliable-delivery sender: frames an input bit stream and transfers
/// it over TCP through a simulated lossy channel.
#[derive(Parser)]
#[command(name = "sender", version)]
struct Args {
    /// ARQ protocol: StopAndWait|1, GoBackN|2, SelectiveRepeat|3
    protocol: Protocol,

    /// Path to the input stream of ASCII '0'/'1' characters
    file_path: PathBuf,

    /// Payload size per frame in bytes
    packet_size: usize,

    /// Error-detection technique: CRC|1, Checksum|2
    technique: FcsScheme,

    /// Receiver endpoint to connect to
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    connect: String,

    /// Window size (defaults to the protocol's)
    #[arg(long)]
    window: Option<usize>,

    /// Retransmission timeout in seconds (defaults to the protocol's)
    #[arg(long)]
    timeout: Option<f64>,

    /// Channel frame-loss probability
    #[arg(long, default_value_t = DEFAULT_LOSS_PROBABILITY)]
    loss: f64,

    /// Channel bit-error probability
    #[arg(long, default_value_t = DEFAULT_ERROR_PROBABILITY)]
    error: f64,

    /// Seed for the channel RNG, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Session journal path
    #[arg(long, default_value = "log.txt")]
    log: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> linkarq::Result<()> {
    // Everything configurable is validated before any network activity.
    let channel = match args.seed {
        Some(seed) => LossyChannel::seeded(args.loss, args.error, seed)?,
        None => LossyChannel::new(args.loss, args.error)?,
    };
    let source = ChunkSource::new(File::open(&args.file_path)?, args.packet_size)?;
    let journal = Journal::to_file(&args.log)?;

    let mut config = SessionConfig::for_protocol(args.protocol, args.technique, args.packet_size);
    if let Some(window) = args.window {
        config = config.with_window(window);
    }
    if let Some(timeout) = args.timeout {
        config = config.with_timeout(Duration::from_secs_f64(timeout));
    }

    let stream = TcpStream::connect(&args.connect)?;
    info!("connected to receiver at {}", args.connect);
    let link = TcpLink::new(stream);

    let stats = run_session(args.protocol, link, source, channel, journal, config)?;
    info!(
        "transfer complete: {} frames sent, {} retransmissions, {} ACKs, {} NACKs",
        stats.sent, stats.resent, stats.acks, stats.nacks
    );
    Ok(())
}
