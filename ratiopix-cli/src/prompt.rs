//! Terminal threshold prompt.

use ratiopix_core::{Error, ImageStack, Result, ThresholdPair, ThresholdPrompt, ThresholdRequest};
use std::io::{BufRead, Write};

/// Asks for a threshold pair on a line-oriented terminal.
///
/// The operator types `min max`, presses enter on an empty line to accept
/// the suggestion, or `q` to abort.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, request: &ThresholdRequest<'_, ImageStack>) -> std::io::Result<Option<String>> {
        writeln!(self.output, "\nThreshold for {}", request.label)?;
        if let Some((lo, hi)) = request.value_range {
            writeln!(self.output, "  edge values span [{lo:.4}, {hi:.4}]")?;
        }
        write!(
            self.output,
            "  min max [{:.4} {:.4}] (q to abort): ",
            request.suggestion.min, request.suggestion.max
        )?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

fn parse_pair(line: &str) -> Option<ThresholdPair> {
    let mut parts = line.split(|c: char| c.is_whitespace() || c == ',').filter(|s| !s.is_empty());
    let min = parts.next()?.parse::<f64>().ok()?;
    let max = parts.next()?.parse::<f64>().ok()?;
    if parts.next().is_some() || !min.is_finite() || !max.is_finite() {
        return None;
    }
    Some(ThresholdPair::new(min, max))
}

impl<R: BufRead, W: Write> ThresholdPrompt<ImageStack> for LinePrompt<R, W> {
    fn request_threshold(&mut self, request: ThresholdRequest<'_, ImageStack>) -> Result<ThresholdPair> {
        loop {
            let line = self
                .ask(&request)
                .map_err(|e| Error::Prompt(e.to_string()))?
                .ok_or_else(|| Error::Prompt("input closed".into()))?;
            if line.is_empty() {
                return Ok(request.suggestion);
            }
            if line.eq_ignore_ascii_case("q") {
                return Err(Error::Prompt(format!("aborted at {}", request.label)));
            }
            match parse_pair(&line) {
                Some(pair) => return Ok(pair),
                None => log::warn!("Could not read '{line}' as two numbers"),
            }
        }
    }
}
