use percpu_rand_core::{Backend, CoreStreams, Error, Result, StreamConfig};
use percpu_rand_tests::{TestResult, calculate_quality_score, run_all_tests};

pub fn run(backend: Option<&str>, samples: usize) -> Result<()> {
    if samples == 0 {
        return Err(Error::InvalidConfig("samples must be positive".to_string()));
    }
    let backends = match backend {
        Some(name) => vec![name.parse::<Backend>()?],
        None => vec![Backend::Keyed, Backend::Xoshiro],
    };

    println!(
        "Running quality battery on {} backend(s), {samples} bytes each...\n",
        backends.len()
    );

    let mut summary = Vec::new();
    for backend in backends {
        let config = StreamConfig {
            backend,
            ..StreamConfig::default()
        };
        let streams = CoreStreams::init(&config)?;
        let mut data = vec![0u8; samples];
        streams.fill(&mut data)?;

        let results = run_all_tests(&data);
        print_results(backend, &results);
        summary.push((backend, calculate_quality_score(&results), results));
    }

    println!("\n{}", "=".repeat(44));
    println!("{:<10} {:>8} {:>6} {:>8}", "Backend", "Score", "Grade", "Pass");
    println!("{}", "-".repeat(44));
    for (backend, score, results) in &summary {
        let passed = results.iter().filter(|r| r.passed).count();
        println!(
            "{:<10} {:>8.1} {:>6} {:>5}/{}",
            backend.to_string(),
            score,
            super::grade_for_score(*score),
            passed,
            results.len()
        );
    }
    Ok(())
}

fn print_results(backend: Backend, results: &[TestResult]) {
    println!("── {backend} ──");
    for r in results {
        let mark = if r.passed { "✓" } else { "✗" };
        let p = r
            .p_value
            .map_or_else(|| "     -".to_string(), |p| format!("{p:>6.4}"));
        println!("  {mark} {} {:<20} p={p}  {}", r.grade, r.name, r.details);
    }
    println!();
}
