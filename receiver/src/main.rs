use std::fs::File;
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};

use linkarq::config::{DEFAULT_ENDPOINT, DEFAULT_RECEIVER_ADDRESS};
use linkarq::receiver::run_session;
use linkarq::transport::TcpLink;
use linkarq::{validate, FcsScheme, Protocol};

/// Reliable-delivery receiver: accepts sender sessions, delivers
/// payloads in order to the output file, and optionally validates the
/// result against the original input.
#[derive(Parser)]
#[command(name = "receiver", version)]
struct Args {
    /// ARQ protocol: StopAndWait|1, GoBackN|2, SelectiveRepeat|3
    protocol: Protocol,

    /// Error-detection technique: CRC|1, Checksum|2
    technique: FcsScheme,

    /// Endpoint to listen on
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    listen: String,

    /// Delivered-payload output path
    #[arg(long, default_value = "output.txt")]
    output: PathBuf,

    /// Original input stream; when given, the output is validated
    /// against it after each session
    #[arg(long)]
    input: Option<PathBuf>,

    /// Reorder window size (defaults to the protocol's)
    #[arg(long)]
    window: Option<usize>,

    /// Handle a single session, then exit
    #[arg(long)]
    once: bool,
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
    let window = args.window.unwrap_or_else(|| args.protocol.default_window());
    let listener = TcpListener::bind(&args.listen)?;
    info!(
        "listening on {} ({} with {})",
        args.listen, args.protocol, args.technique
    );

    loop {
        let (stream, peer) = listener.accept()?;
        info!("connection established with {peer}");

        let sink = File::create(&args.output)?;
        match run_session(
            args.protocol,
            TcpLink::new(stream),
            sink,
            args.technique,
            DEFAULT_RECEIVER_ADDRESS,
            window,
        ) {
            Ok(summary) => {
                info!("session delivered {} frames", summary.delivered);
                if let (Some(input), Some(payload_bytes)) = (&args.input, summary.payload_bytes) {
                    let mismatches = validate::annotate_file(input, &args.output, payload_bytes)?;
                    if mismatches == 0 {
                        info!("validation passed: output matches the input");
                    } else {
                        warn!("validation flagged {mismatches} incorrect lines");
                    }
                }
            }
            Err(err) => error!("session ended with error: {err}"),
        }
        info!("connection closed with {peer}");

        if args.once {
            return Ok(());
        }
    }
}
