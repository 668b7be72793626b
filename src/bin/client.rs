use clap::Parser;
use seqlink::{Session, SessionConfig};
use std::fs;
use std::time::Instant;

/// Messages at most this large keep the receiver's buffer bounded; the
/// session layer fragments each one into 512-byte datagrams on its own.
const XFER_CHUNK: usize = 32 * 1024;

/// Demo client: connects to the server and streams a file over the
/// session protocol, then tears the connection down.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = SessionConfig { debug: args.verbose, recv_deadline: None };
    let mut sess = Session::client_with(&args.ip, args.port, config)?;
    sess.connect()?;

    let data = fs::read(&args.file_name)?;
    let started = Instant::now();
    let mut sent = 0;
    for chunk in data.chunks(XFER_CHUNK) {
        sent += sess.send(chunk)?;
    }
    sess.disconnect()?;

    let dur = started.elapsed();
    println!("Sent {sent} bytes 🔗 in {} s", dur.as_secs_f64());
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1")]
    ip: String,
    #[arg(short, long, default_value_t = 2080)]
    port: u16,
    #[arg(short, long)]
    file_name: String,
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}
