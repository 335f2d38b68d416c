//! The CLI: a thin adapter over the core library's `pack`/`unpack`/`status`
//! verbs. Argument parsing, progress rendering, and exit codes live here and
//! nowhere else in the crate.

pub mod pack;
pub mod status;
pub mod unpack;

use console::Term;
use unicode_segmentation::UnicodeSegmentation;

/// Truncates `message` to fit the current terminal width, keeping the head
/// and tail and eliding the middle.
pub fn truncate_for_terminal(message: &str, term: &Term) -> String {
    let w = term.size().1 as usize;
    if w <= 3 {
        return ".".repeat(w);
    }
    let syms: Vec<&str> = message.graphemes(true).collect();
    if syms.len() <= w {
        return message.to_owned();
    }
    let head = &syms[..w.saturating_sub(3) / 2];
    let tail = &syms[syms.len() - (w.saturating_sub(3) - head.len())..];
    format!("{}...{}", head.concat(), tail.concat())
}

/// Human-readable byte counts, e.g. `1.2 MiB`.
pub fn nice_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[unit])
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

/// A single line of progress, overwritten in place: `[current/total] message`.
pub fn print_progress_line(term: &Term, current: u64, total: u64, message: Option<&str>) {
    let line = match message {
        Some(m) => format!("[{current}/{total}] {m}"),
        None => format!("[{current}/{total}]"),
    };
    let _ = term.clear_line();
    let _ = term.write_str(&truncate_for_terminal(&line, term));
}
