//! Stream per-core random bytes to a file.
//!
//! Uses the xoshiro backend, which is the faster choice when the output does
//! not need to be unpredictable.
//!
//! Run: `cargo run --example stream_to_file`

use std::fs::File;
use std::io::{BufWriter, Write};

use percpu_rand_core::{Backend, CoreStreams, StreamConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_path = "percpu_output.bin";
    let total_bytes: usize = 1 << 20;

    let config = StreamConfig {
        backend: Backend::Xoshiro,
        ..StreamConfig::default()
    };
    let streams = CoreStreams::init(&config)?;
    println!(
        "Streaming {total_bytes} bytes to {output_path} ({} {} slots)",
        streams.core_count(),
        streams.backend()
    );

    let mut file = BufWriter::new(File::create(output_path)?);
    let written = streams.read(&mut file, total_bytes)?;
    file.flush()?;

    println!("Done. Wrote {written} bytes to {output_path}");
    Ok(())
}
