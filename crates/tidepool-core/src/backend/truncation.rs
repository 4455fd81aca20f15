//! Per-line truncation for read windows
//!
//! Over-long lines are cut at a character budget with a visible marker;
//! silent truncation would let the model believe it saw the whole line.

const MARKER: &str = "... [truncated]";

/// Join `lines` with newlines, cutting each line at `max_len` characters.
/// Returns the joined text and the number of lines that were cut.
pub fn truncate_lines(lines: &[&str], max_len: usize) -> (String, usize) {
    let mut truncated = 0;
    let out: Vec<String> = lines
        .iter()
        .map(|line| {
            if line.chars().count() > max_len {
                truncated += 1;
                let cut: String = line.chars().take(max_len).collect();
                format!("{}{}", cut, MARKER)
            } else {
                (*line).to_string()
            }
        })
        .collect();
    (out.join("\n"), truncated)
}
