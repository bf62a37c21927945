//! CLI for percpu-rand: per-core random byte streams.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "percpu-rand")]
#[command(about = "percpu-rand — per-core BLAKE3 keystream and xoshiro256++ byte streams")]
#[command(version = percpu_rand_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the keyed-hash variants supported on this machine
    Impls,

    /// Measure keyed-hash variant throughput and record the fastest
    Bench {
        /// Bytes produced per refill
        #[arg(long, default_value = "4096")]
        chunk_size: usize,

        /// Refills timed per variant
        #[arg(long, default_value = "2048")]
        rounds: usize,

        /// Write machine-readable results as JSON
        #[arg(long)]
        output: Option<String>,
    },

    /// Stream random bytes to stdout (pipe-friendly)
    Stream {
        /// Generator backend (overrides --config)
        #[arg(long, value_parser = ["keyed", "xoshiro"])]
        backend: Option<String>,

        /// Keyed-hash variant name, "fastest" or "cycle" (overrides --config)
        #[arg(long)]
        implementation: Option<String>,

        /// Total bytes (0 = infinite)
        #[arg(long, default_value = "0")]
        bytes: usize,

        /// Output format
        #[arg(long, default_value = "raw", value_parser = ["raw", "hex"])]
        format: String,

        /// Number of core slots (default: configured processors)
        #[arg(long)]
        cores: Option<usize>,

        /// JSON stream config file
        #[arg(long)]
        config: Option<String>,
    },

    /// Run the statistical quality battery on generated output
    Report {
        /// Backend to test (default: both)
        #[arg(long, value_parser = ["keyed", "xoshiro"])]
        backend: Option<String>,

        /// Number of bytes to generate per backend
        #[arg(long, default_value = "65536")]
        samples: usize,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Impls => commands::impls::run(),
        Commands::Bench {
            chunk_size,
            rounds,
            output,
        } => commands::bench::run(chunk_size, rounds, output.as_deref()),
        Commands::Stream {
            backend,
            implementation,
            bytes,
            format,
            cores,
            config,
        } => commands::load_config(&commands::ConfigOverrides {
            config_path: config.as_deref(),
            backend: backend.as_deref(),
            implementation: implementation.as_deref(),
            cores,
        })
        .and_then(|config| commands::stream::run(&config, bytes, &format)),
        Commands::Report { backend, samples } => commands::report::run(backend.as_deref(), samples),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
