//! Composes the text sent to the remote worker.
//!
//! Everything here is pure string building; no I/O.

use std::fmt::Write as _;

use crate::domain::models::{
    RemediationRequest, RequestKind, UPDATED_CONTENT_FIELD, ViolationRecord,
};
use crate::services::fixer_registry::FixerRegistry;

const REMEDIATION_PREAMBLE: &str =
    "Fix every AZC analyzer violation listed below by editing client.tsp. \
     Use the file search tool to consult main.tsp and the current client.tsp.";

/// Closing mandate shared by every request: one JSON object, full file text.
fn output_mandate() -> String {
    format!(
        "Respond with a single JSON object and nothing else. It must contain an \
         \"analysis\" object and a \"{UPDATED_CONTENT_FIELD}\" string holding the \
         complete corrected client.tsp content, not a diff or an excerpt."
    )
}

/// Batch every handled violation into one remediation request.
///
/// Each violation contributes the fragment of every strategy that handles
/// its code, in input order. Violations no strategy handles are skipped.
pub fn build_remediation_request(
    violations: &[ViolationRecord],
    registry: &FixerRegistry,
) -> RemediationRequest {
    let mut body = String::new();
    body.push_str(REMEDIATION_PREAMBLE);
    body.push_str("\n\n");

    for violation in violations {
        for strategy in registry.strategies_for(&violation.code) {
            body.push_str(&strategy.build_instruction(&violation.message));
            body.push_str("\n\n");
        }
    }

    body.push_str(&output_mandate());
    RemediationRequest::new(RequestKind::Remediation, body)
}

/// Wrap raw compiler diagnostics into a recovery request.
pub fn build_compile_recovery_request(diagnostics: &str) -> RemediationRequest {
    let mut body = String::new();
    body.push_str(
        "The client.tsp you returned does not compile. The TypeSpec compiler reported:\n\n",
    );
    body.push_str("```\n");
    body.push_str(diagnostics.trim_end());
    body.push_str("\n```\n\n");
    body.push_str(
        "Correct client.tsp so it compiles cleanly while keeping every AZC fix you already made.\n\n",
    );
    body.push_str(&output_mandate());
    RemediationRequest::new(RequestKind::CompileRecovery, body)
}

/// Fixed instructions the worker agent is created with.
pub fn worker_instructions() -> String {
    let mut text = String::from(
        "You are an Azure SDK engineer and TypeSpec author. You make generated \
         .NET client libraries comply with the Azure SDK design guidelines \
         enforced by the AZC analyzers.\n\n",
    );
    text.push_str("## Objective\n");
    text.push_str(
        "Given main.tsp, client.tsp and an AZC violation log, resolve every \
         violation by customizing client.tsp and return the complete corrected file.\n\n",
    );
    text.push_str("## Rules\n");
    text.push_str("- Never modify main.tsp; every customization goes into client.tsp.\n");
    text.push_str("- Keep existing client.tsp content unless a fix requires changing it.\n");
    text.push_str("- Use TypeSpec 1.0+ syntax; the result must compile without errors.\n");
    text.push_str(
        "- Rename with `@@clientName(Target, \"NewName\", \"csharp\");` where Target is the \
         type as declared in main.tsp.\n",
    );
    text.push_str("- Every reference in client.tsp must resolve against main.tsp.\n\n");
    text.push_str("## Output\n");
    text.push_str("Return only this JSON object:\n");
    let _ = write!(
        text,
        r#"{{
  "analysis": {{
    "total_errors": <number>,
    "error_types_found": ["AZC0012", ...],
    "items_requiring_fixes": ["ModelA", ...]
  }},
  "fixes": {{
    "renames": [{{ "original": "Disk", "fixed": "ComputeDisk", "reason": "AZC0012: added service prefix" }}],
    "reference_updates": [{{ "location": "line 42", "original": "DiskOptions", "fixed": "ComputeDiskOptions", "reason": "follow rename" }}],
    "structural_additions": [{{ "type": "using", "location": "top of file", "reason": "needed by @@clientName" }}]
  }},
  "{UPDATED_CONTENT_FIELD}": "<complete client.tsp content>"
}}"#
    );
    text
}

/// First message of every session: the inputs, inline and delimited.
pub fn build_context_message(main: &str, client: &str, violation_log: &str) -> RemediationRequest {
    let mut body = String::from("Inputs for this session.\n\n");
    let _ = write!(
        body,
        "### main.tsp (read-only)\n===MAIN_TSP_START===\n{main}\n===MAIN_TSP_END===\n\n"
    );
    let _ = write!(
        body,
        "### client.tsp (current)\n===CLIENT_TSP_START===\n{client}\n===CLIENT_TSP_END===\n\n"
    );
    let _ = write!(
        body,
        "### AZC violation log\n===AZC_LOG_START===\n{violation_log}\n===AZC_LOG_END===\n"
    );
    RemediationRequest::new(RequestKind::Context, body)
}
