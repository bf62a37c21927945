//! Basic per-core stream example.
//!
//! Initializes keyed streams on every core, prints 64 bytes as hex, and shows
//! which keyed-hash variants this machine supports.
//!
//! Run: `cargo run --example basic`

use percpu_rand_core::{CoreStreams, StreamConfig, registry};

fn main() -> percpu_rand_core::Result<()> {
    let streams = CoreStreams::init(&StreamConfig::default())?;
    println!("Core slots: {} ({})", streams.core_count(), streams.backend());

    let reg = registry();
    println!("Supported variants: {}", reg.names().join(", "));
    println!("Selection: {}", reg.current_name());

    let mut random = [0u8; 64];
    streams.fill(&mut random)?;
    print!("Random bytes (hex): ");
    for b in &random {
        print!("{b:02x}");
    }
    println!();
    Ok(())
}
