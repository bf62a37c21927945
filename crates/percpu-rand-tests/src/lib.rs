//! Statistical quality battery for generated byte streams.
//!
//! A small set of NIST SP 800-22 style checks used to sanity-check the output
//! of both per-core backends. Each check returns a [`TestResult`] with a
//! p-value where one exists, a pass/fail verdict and a letter grade.
//!
//! These catch broken generators (stuck bits, short cycles, byte-order bugs);
//! they say nothing about cryptographic strength.

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};
use statrs::function::erf::erfc;

/// Significance level used for pass/fail.
pub const ALPHA: f64 = 0.01;

/// Result of a single check.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub p_value: Option<f64>,
    pub statistic: f64,
    pub details: String,
    pub grade: char,
}

impl TestResult {
    /// Letter grade for a p-value: A ≥ 0.1, B ≥ 0.01, C ≥ 0.001, D ≥ 0.0001,
    /// otherwise F.
    pub fn grade_from_p(p: Option<f64>) -> char {
        match p {
            Some(p) if p >= 0.1 => 'A',
            Some(p) if p >= 0.01 => 'B',
            Some(p) if p >= 0.001 => 'C',
            Some(p) if p >= 0.0001 => 'D',
            _ => 'F',
        }
    }

    pub fn pass_from_p(p: Option<f64>, threshold: f64) -> bool {
        p.is_some_and(|p| p >= threshold)
    }

    fn from_p(name: &str, p: Option<f64>, statistic: f64, details: String) -> Self {
        Self {
            name: name.to_string(),
            passed: Self::pass_from_p(p, ALPHA),
            p_value: p,
            statistic,
            details,
            grade: Self::grade_from_p(p),
        }
    }

    /// Result for checks scored by a 0..1 ratio instead of a p-value.
    fn from_ratio(name: &str, ratio: f64, statistic: f64, details: String) -> Self {
        let grade = match ratio {
            r if r > 0.95 => 'A',
            r if r > 0.85 => 'B',
            r if r > 0.7 => 'C',
            r if r > 0.5 => 'D',
            _ => 'F',
        };
        Self {
            name: name.to_string(),
            passed: ratio > 0.85,
            p_value: None,
            statistic,
            details,
            grade,
        }
    }

    fn failed(name: &str, details: String) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            p_value: None,
            statistic: 0.0,
            details,
            grade: 'F',
        }
    }

    fn insufficient(name: &str, needed: usize, got: usize) -> Self {
        Self::failed(name, format!("Insufficient data: need {needed}, got {got}"))
    }
}

/// Bits of `data`, most significant first within each byte.
fn to_bits(data: &[u8]) -> Vec<u8> {
    data.iter()
        .flat_map(|&byte| (0..8).rev().map(move |shift| (byte >> shift) & 1))
        .collect()
}

fn chi2_sf(df: f64, statistic: f64) -> Option<f64> {
    ChiSquared::new(df).ok().map(|d| d.sf(statistic))
}

/// Proportion of ones across the whole stream.
pub fn monobit_frequency(data: &[u8]) -> TestResult {
    let name = "Monobit Frequency";
    let n = data.len() * 8;
    if n < 100 {
        return TestResult::insufficient(name, 100, n);
    }
    let ones: i64 = data.iter().map(|b| b.count_ones() as i64).sum();
    let s = 2 * ones - n as i64;
    let s_obs = s.unsigned_abs() as f64 / (n as f64).sqrt();
    let p = erfc(s_obs / std::f64::consts::SQRT_2);
    TestResult::from_p(name, Some(p), s_obs, format!("S={s}, n={n}"))
}

/// Proportion of ones inside 128-bit blocks, chi-squared.
pub fn block_frequency(data: &[u8]) -> TestResult {
    let name = "Block Frequency";
    const BLOCK_BYTES: usize = 16;
    let blocks = data.len() / BLOCK_BYTES;
    if blocks < 10 {
        return TestResult::insufficient(name, BLOCK_BYTES * 80, data.len() * 8);
    }
    let m = (BLOCK_BYTES * 8) as f64;
    let chi2 = 4.0
        * m
        * data
            .chunks_exact(BLOCK_BYTES)
            .map(|block| {
                let ones: u32 = block.iter().map(|b| b.count_ones()).sum();
                let pi = ones as f64 / m - 0.5;
                pi * pi
            })
            .sum::<f64>();
    let p = chi2_sf(blocks as f64, chi2);
    TestResult::from_p(name, p, chi2, format!("blocks={blocks}, M={m}"))
}

/// Byte value histogram against uniform, chi-squared with 255 degrees of freedom.
pub fn byte_frequency(data: &[u8]) -> TestResult {
    let name = "Byte Frequency";
    let n = data.len();
    if n < 256 {
        return TestResult::insufficient(name, 256, n);
    }
    let mut hist = [0u64; 256];
    for &b in data {
        hist[b as usize] += 1;
    }
    let expected = n as f64 / 256.0;
    let chi2: f64 = hist
        .iter()
        .map(|&c| (c as f64 - expected).powi(2) / expected)
        .sum();
    let p = chi2_sf(255.0, chi2);
    TestResult::from_p(name, p, chi2, format!("n={n}, expected_per_bin={expected:.1}"))
}

/// Number of runs of identical bits.
pub fn runs_test(data: &[u8]) -> TestResult {
    let name = "Runs Test";
    let bits = to_bits(data);
    let n = bits.len();
    if n < 100 {
        return TestResult::insufficient(name, 100, n);
    }
    let pi = bits.iter().filter(|&&b| b == 1).count() as f64 / n as f64;
    if (pi - 0.5).abs() >= 2.0 / (n as f64).sqrt() {
        return TestResult {
            p_value: Some(0.0),
            ..TestResult::failed(name, format!("Pre-test failed: proportion={pi:.4}"))
        };
    }
    let runs = 1 + bits.windows(2).filter(|w| w[0] != w[1]).count();
    let expected = 2.0 * n as f64 * pi * (1.0 - pi) + 1.0;
    let spread = 2.0 * (2.0 * n as f64).sqrt() * pi * (1.0 - pi);
    let z = (runs as f64 - expected).abs() / spread;
    let p = erfc(z / std::f64::consts::SQRT_2);
    TestResult::from_p(name, Some(p), z, format!("runs={runs}, expected={expected:.0}"))
}

/// Lag-1 correlation of byte values, two-sided z-test.
pub fn serial_correlation(data: &[u8]) -> TestResult {
    let name = "Serial Correlation";
    let n = data.len();
    if n < 20 {
        return TestResult::insufficient(name, 20, n);
    }
    let mean = data.iter().map(|&b| b as f64).sum::<f64>() / n as f64;
    let var = data.iter().map(|&b| (b as f64 - mean).powi(2)).sum::<f64>() / n as f64;
    if var < 1e-10 {
        return TestResult {
            statistic: 1.0,
            ..TestResult::failed(name, "Zero variance".to_string())
        };
    }
    let cov: f64 = data
        .windows(2)
        .map(|w| (w[0] as f64 - mean) * (w[1] as f64 - mean))
        .sum();
    let r = cov / ((n - 1) as f64 * var);
    let z = r * (n as f64).sqrt();
    let p = 2.0 * Normal::standard().sf(z.abs());
    TestResult::from_p(name, Some(p), r.abs(), format!("r={r:.6}, z={z:.4}"))
}

/// Shannon entropy in bits per byte (8.0 is ideal).
pub fn shannon_entropy(data: &[u8]) -> TestResult {
    let name = "Shannon Entropy";
    let n = data.len();
    if n < 16 {
        return TestResult::insufficient(name, 16, n);
    }
    let mut hist = [0u64; 256];
    for &b in data {
        hist[b as usize] += 1;
    }
    let h: f64 = hist
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n as f64;
            -p * p.log2()
        })
        .sum();
    let ratio = h / 8.0;
    TestResult::from_ratio(name, ratio, h, format!("{h:.4} / 8.0 bits ({:.1}%)", ratio * 100.0))
}

/// zlib compressed size over input size. Random data does not compress.
pub fn compression_ratio(data: &[u8]) -> TestResult {
    let name = "Compression Ratio";
    let n = data.len();
    if n < 32 {
        return TestResult::insufficient(name, 32, n);
    }
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(n), Compression::best());
    let compressed = match encoder.write_all(data).and_then(|()| encoder.finish()) {
        Ok(c) => c,
        Err(e) => return TestResult::failed(name, format!("zlib failed: {e}")),
    };
    let ratio = compressed.len() as f64 / n as f64;
    TestResult::from_ratio(name, ratio, ratio, format!("{}/{n} = {ratio:.4}", compressed.len()))
}

/// Every check, in a fixed order.
pub const BATTERY: &[fn(&[u8]) -> TestResult] = &[
    monobit_frequency,
    block_frequency,
    byte_frequency,
    runs_test,
    serial_correlation,
    shannon_entropy,
    compression_ratio,
];

/// Run the whole battery on `data`.
pub fn run_all_tests(data: &[u8]) -> Vec<TestResult> {
    BATTERY.iter().map(|check| check(data)).collect()
}

/// Average grade score from 0 to 100 (A=100, B=75, C=50, D=25, F=0).
pub fn calculate_quality_score(results: &[TestResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let total: f64 = results
        .iter()
        .map(|r| match r.grade {
            'A' => 100.0,
            'B' => 75.0,
            'C' => 50.0,
            'D' => 25.0,
            _ => 0.0,
        })
        .sum();
    total / results.len() as f64
}
