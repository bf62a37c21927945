use percpu_rand_core::{Error, Result, measure, record_fastest, registry};

pub fn run(chunk_size: usize, rounds: usize, output_path: Option<&str>) -> Result<()> {
    if chunk_size == 0 || rounds == 0 {
        return Err(Error::InvalidConfig(
            "chunk size and rounds must be positive".to_string(),
        ));
    }
    let reg = registry();
    println!(
        "Benchmarking {} keyed-hash variant(s): {rounds} refills of {chunk_size} bytes each...\n",
        reg.count()
    );

    let results = measure(reg, chunk_size, rounds);
    let winner = record_fastest(reg, &results).map(|w| w.name.clone());

    println!("{}", "=".repeat(52));
    println!("{:<4} {:<12} {:>12} {:>10} {:>10}", "Id", "Variant", "MiB/s", "Bytes", "Time");
    println!("{}", "-".repeat(52));
    for r in &results {
        println!(
            "{:<4} {:<12} {:>12.1} {:>10} {:>9.3}s",
            r.id,
            r.name,
            r.bytes_per_sec / (1024.0 * 1024.0),
            r.bytes,
            r.elapsed.as_secs_f64()
        );
    }

    match winner {
        Some(name) => println!("\nFastest: {name}"),
        None => println!("\nNo supported variants."),
    }

    if let Some(path) = output_path {
        let written = serde_json::to_string_pretty(&results)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
        match written {
            Ok(()) => println!("Results saved to: {path}"),
            Err(e) => eprintln!("Failed to write results to {path}: {e}"),
        }
    }
    Ok(())
}
