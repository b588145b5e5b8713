// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Console output for recognition runs.
//!
//! The capture loop reports gate transitions and the segmenter reports the
//! gesture span it kept, both through `verbose!` so `--quiet` silences them.
//! Packing warnings and load failures go to stderr regardless.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::motion::GateState;
use crate::normalize::Boundaries;

/// Global verbosity flag.
static VERBOSE: AtomicBool = AtomicBool::new(true);

/// Set the global verbosity flag.
pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

/// Check if verbose output is enabled.
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Line printed when the capture gate changes state, e.g.
/// `Gate: Waiting -> Recognizing`.
#[must_use]
pub fn gate_transition(before: GateState, after: GateState) -> String {
    format!("Gate: {before} -> {after}")
}

/// Line printed after boundary search, e.g. `Gesture frames 3..=41 of 50 (39 kept)`.
#[must_use]
pub fn gesture_span(boundaries: &Boundaries, total_frames: usize) -> String {
    format!(
        "Gesture frames {}..={} of {total_frames} ({} kept)",
        boundaries.start,
        boundaries.end,
        boundaries.frame_count()
    )
}

/// Macro for standard info messages.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{
        println!("{}", format!($($arg)*));
    }};
}

/// Macro for warning messages.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{
        use colored::Colorize;
        eprintln!("{} {}", "WARNING ⚠️".yellow().bold(), format!($($arg)*));
    }};
}

/// Macro for error messages.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {{
        use colored::Colorize;
        eprintln!("{} {}", "Error:".red().bold(), format!($($arg)*));
    }};
}

/// Macro for success messages.
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {{
        use colored::Colorize;
        println!("{} {}", "✅".green(), format!($($arg)*));
    }};
}

/// Macro for verbose messages.
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {{
        if $crate::cli::logging::is_verbose() {
            println!("{}", format!($($arg)*));
        }
    }};
}

/// Macro for section headers.
#[macro_export]
macro_rules! section {
    ($($arg:tt)*) => {{
        use colored::Colorize;
        if $crate::cli::logging::is_verbose() {
            println!();
            println!("{}", format!($($arg)*).cyan().bold());
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_transition_lines() {
        assert_eq!(
            gate_transition(GateState::Waiting, GateState::Recognizing),
            "Gate: Waiting -> Recognizing"
        );
        assert_eq!(
            gate_transition(GateState::Recognizing, GateState::RecognitionEnded),
            "Gate: Recognizing -> Recognition Ended"
        );
    }

    #[test]
    fn test_gesture_span_line() {
        let boundaries = Boundaries { start: 3, end: 41 };
        assert_eq!(gesture_span(&boundaries, 50), "Gesture frames 3..=41 of 50 (39 kept)");
        let whole = Boundaries { start: 0, end: 0 };
        assert_eq!(gesture_span(&whole, 1), "Gesture frames 0..=0 of 1 (1 kept)");
    }

    #[test]
    fn test_quiet_run_suppresses_gate_lines() {
        set_verbose(false);
        assert!(!is_verbose());
        // Must not print, and must still type-check in statement position.
        crate::verbose!("{}", gate_transition(GateState::Waiting, GateState::Recognizing));

        set_verbose(true);
        assert!(is_verbose());
    }
}
