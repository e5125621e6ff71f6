use anyhow::Result;
use std::io::{self, BufRead, Write};
use tracing::debug;

use crate::models::request::SessionRequest;

/// Maximum line size for session input: 1 MB.
const MAX_LINE_SIZE: usize = 1024 * 1024;

/// Run an NDJSON session over stdin/stdout.
pub fn run_session(handler: impl Fn(SessionRequest) -> Result<serde_json::Value>) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(stdin.lock(), stdout.lock(), handler)
}

/// Answer one JSON line per request line. Blank lines are skipped.
///
/// Malformed requests and handler failures produce an error line; the loop
/// only stops at end of input or on a write failure.
pub fn serve<R: BufRead, W: Write>(
    input: R,
    output: W,
    handler: impl Fn(SessionRequest) -> Result<serde_json::Value>,
) -> Result<()> {
    let mut out = io::BufWriter::new(output);
    let mut handled = 0usize;

    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let value = if trimmed.len() > MAX_LINE_SIZE {
            error_value(
                "INVALID_REQUEST",
                format!(
                    "Input line exceeds maximum size ({} bytes > {} bytes)",
                    trimmed.len(),
                    MAX_LINE_SIZE
                ),
            )
        } else {
            match serde_json::from_str::<SessionRequest>(trimmed) {
                Ok(req) => handler(req).unwrap_or_else(|e| error_value("IO_ERROR", e.to_string())),
                Err(e) => error_value("INVALID_REQUEST", format!("Invalid JSON request: {e}")),
            }
        };

        serde_json::to_writer(&mut out, &value)?;
        out.write_all(b"\n")?;
        out.flush()?;
        handled += 1;
    }

    debug!(requests = handled, "session closed");
    Ok(())
}

fn error_value(code: &str, message: String) -> serde_json::Value {
    serde_json::json!({ "error": { "code": code, "message": message } })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::request::Command;

    fn run(input: &str) -> Vec<serde_json::Value> {
        let mut output = Vec::new();
        serve(input.as_bytes(), &mut output, |req| {
            match req.command {
                Command::Modules => Ok(serde_json::json!({ "cp": req.cp })),
                _ => anyhow::bail!("unsupported"),
            }
        })
        .unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn one_response_per_request() {
        let lines = run("{\"command\":\"modules\",\"cp\":0.1}\n\n{\"command\":\"modules\"}\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["cp"], 0.1);
        assert!(lines[1]["cp"].is_null());
    }

    #[test]
    fn bad_lines_do_not_end_the_session() {
        let lines = run("not json\n{\"command\":\"facts\"}\n{\"command\":\"modules\",\"cp\":0.2}\n");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["error"]["code"], "INVALID_REQUEST");
        assert_eq!(lines[1]["error"]["code"], "IO_ERROR");
        assert_eq!(lines[2]["cp"], 0.2);
    }
}
