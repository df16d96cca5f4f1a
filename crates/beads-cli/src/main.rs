use std::io::BufWriter;
use std::path::PathBuf;

use tracing::{error, info};

fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(beads_cli::CONFIG_ENV).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            eprintln!("usage: beads <chain.yaml> (or set {})", beads_cli::CONFIG_ENV);
            std::process::exit(2);
        });

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    match beads_cli::run_file(&path, &mut out) {
        Ok(counts) => info!(%counts, config = %path.display(), "chain complete"),
        Err(e) => {
            error!(error = %e, config = %path.display(), "chain failed");
            std::process::exit(1);
        }
    }
}
