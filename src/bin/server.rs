use clap::Parser;
use seqlink::{Error, Session, SessionConfig};
use std::fs::File;
use std::io::{BufWriter, Write};

/// Has to hold at least one full client message; keep in sync with the
/// client's chunking.
const XFER_CHUNK: usize = 32 * 1024;

/// Demo server: waits for one connection and writes everything received
/// to the destination file until the client closes the session.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = SessionConfig { debug: args.verbose, recv_deadline: None };
    let mut sess = Session::server_with(args.port, config)?;
    sess.listen()?;

    let mut out = BufWriter::new(File::create(&args.destination)?);
    let mut buf = vec![0u8; XFER_CHUNK];
    let mut total = 0;
    loop {
        match sess.recv(&mut buf) {
            Ok(n) => {
                out.write_all(&buf[..n])?;
                total += n;
            }
            Err(Error::Closed) => break,
            Err(e) => return Err(e.into()),
        }
    }
    out.flush()?;

    println!("Received {total} bytes into {}", args.destination);
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
    #[arg(short, long, default_value_t = 2080)]
    port: u16,
    #[arg(short, long)]
    destination: String,
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}
