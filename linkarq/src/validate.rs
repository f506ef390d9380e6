//! Post-transfer output validation.
//!
//! Compares the delivered output lines against the original input bit
//! stream and annotates every mismatched line with `" (incorrect)"`.

use std::fs;
use std::path::Path;

use crate::error::Result;

/// Annotates delivered lines against the input bit stream.
///
/// Line `i` is expected to carry the input characters
/// `[i * payload_bytes * 8, (i + 1) * payload_bytes * 8)`; a shorter
/// final chunk is compared against whatever input remains. Returns the
/// annotated lines and the number of mismatches.
pub fn annotate_lines(
    input_bits: &str,
    lines: &[String],
    payload_bytes: usize,
) -> (Vec<String>, usize) {
    let chunk = payload_bytes * 8;
    let input = input_bits.trim();
    let mut mismatches = 0;

    let annotated = lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let start = (index * chunk).min(input.len());
            let end = ((index + 1) * chunk).min(input.len());
            let expected = &input[start..end];
            let payload = line
                .trim_end()
                .split_once(". ")
                .map(|(_, payload)| payload);

            if !expected.is_empty() && payload == Some(expected) {
                line.trim_end().to_string()
            } else {
                mismatches += 1;
                format!("{} (incorrect)", line.trim_end())
            }
        })
        .collect();

    (annotated, mismatches)
}

/// Rewrites the output file with mismatch annotations, returning the
/// number of incorrect lines.
pub fn annotate_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_path: Q,
    payload_bytes: usize,
) -> Result<usize> {
    let input = fs::read_to_string(input_path)?;
    let output = fs::read_to_string(&output_path)?;
    let lines: Vec<String> = output.lines().map(str::to_string).collect();

    let (annotated, mismatches) = annotate_lines(&input, &lines, payload_bytes);
    let mut text = annotated.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    fs::write(output_path, text)?;
    Ok(mismatches)
}
