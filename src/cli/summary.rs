//! End-of-run summary table and process exit codes.

use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};

use crate::domain::models::RunOutcome;

/// `0` converged, `2` stopped without converging. Errors map to `1` in `main`.
pub const fn exit_code(outcome: &RunOutcome) -> u8 {
    if outcome.is_converged() { 0 } else { 2 }
}

/// Render the outcome as a short headline plus, when violations remain,
/// a table of them.
pub fn render_outcome(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Converged { iterations } => {
            format!("Converged after {iterations} iteration(s): no AZC violations left.")
        }
        RunOutcome::MaxIterationsReached { remaining } => {
            let mut table = Table::new();
            table
                .load_preset(presets::UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(
                    ["CODE", "MESSAGE"].map(|h| Cell::new(h).set_alignment(CellAlignment::Left)),
                );
            for violation in remaining {
                table.add_row([Cell::new(&violation.code), Cell::new(&violation.message)]);
            }
            format!(
                "Iteration budget exhausted with {} violation(s) remaining:\n{table}",
                remaining.len()
            )
        }
        RunOutcome::CompileFailed { diagnostics } => {
            format!("TypeSpec compilation failed before remediation:\n{}", diagnostics.trim_end())
        }
        RunOutcome::RecoveryExhausted {
            iteration,
            attempts,
            diagnostics,
        } => format!(
            "Iteration {iteration}: fix still fails to compile after {attempts} recovery attempt(s):\n{}",
            diagnostics.trim_end()
        ),
        RunOutcome::Cancelled {
            iterations_completed,
        } => format!("Cancelled after {iterations_completed} completed iteration(s)."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ViolationRecord;

    #[test]
    fn remaining_violations_are_tabulated() {
        let outcome = RunOutcome::MaxIterationsReached {
            remaining: vec![ViolationRecord::new("AZC0012", "Model 'Wrapper' is too generic")],
        };
        let text = render_outcome(&outcome);
        assert!(text.starts_with("Iteration budget exhausted with 1 violation(s)"));
        assert!(text.contains("AZC0012"));
        assert!(text.contains("Model 'Wrapper' is too generic"));
    }

    #[test]
    fn exit_codes_follow_outcome() {
        assert_eq!(exit_code(&RunOutcome::Converged { iterations: 0 }), 0);
        assert_eq!(
            exit_code(&RunOutcome::Cancelled {
                iterations_completed: 1
            }),
            2
        );
    }
}
