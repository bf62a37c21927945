use std::io::{self, Write};

use percpu_rand_core::{CoreStreams, Error, Result, StreamConfig};

/// Bytes requested per iteration when streaming.
const CHUNK: usize = 64 * 1024;

pub fn run(config: &StreamConfig, n_bytes: usize, format: &str) -> Result<()> {
    let streams = CoreStreams::init(config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = pump(&streams, &mut out, n_bytes, format).map(|_| ());

    if result.is_ok() && format == "hex" && n_bytes > 0 {
        let _ = writeln!(out);
    }
    let _ = out.flush();
    result
}

/// Copy `n_bytes` random bytes (0 = unbounded) to `out`, raw or as hex.
///
/// Returns the number of random bytes produced. A closed pipe ends the stream
/// quietly. Any other sink failure reports how many bytes reached the sink,
/// counted in the output format.
fn pump<W: Write>(streams: &CoreStreams, out: &mut W, n_bytes: usize, format: &str) -> Result<usize> {
    let mut buf = vec![0u8; CHUNK];
    let mut total = 0usize;

    loop {
        if n_bytes > 0 && total >= n_bytes {
            return Ok(total);
        }
        let want = if n_bytes == 0 {
            CHUNK
        } else {
            CHUNK.min(n_bytes - total)
        };

        let step = match format {
            "hex" => streams.fill(&mut buf[..want]).and_then(|()| {
                out.write_all(super::to_hex(&buf[..want]).as_bytes())
                    .map_err(|source| Error::DeliveryFault {
                        delivered: 2 * total,
                        source,
                    })
            }),
            _ => streams.read(&mut *out, want).map(|_| ()),
        };

        match step {
            Ok(()) => total += want,
            Err(Error::DeliveryFault { source, .. }) if source.kind() == io::ErrorKind::BrokenPipe => {
                log::debug!("stdout closed after {total} bytes");
                return Ok(total);
            }
            Err(e) => return Err(e),
        }
    }
}
