//! Turns raw build output into analyzer violation records.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::models::{DedupPolicy, ViolationRecord};

static VIOLATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(AZC\d{4}):\s*(.*)$").expect("violation regex is valid")
});

// MSBuild appends the owning project to every diagnostic line.
static PROJECT_SUFFIX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\[[^\[\]]*\.csproj\]\s*$").expect("project suffix regex is valid")
});

/// Extract violations from raw multi-line build output.
///
/// Lines without an `AZC####:` marker are ignored, so any input (including
/// empty or garbage input) yields a possibly empty list, never an error.
/// Order follows the input.
pub fn extract_violations(raw: &str, policy: DedupPolicy) -> Vec<ViolationRecord> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut records = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim();
        let Some(caps) = VIOLATION_REGEX.captures(trimmed) else {
            continue;
        };

        if policy == DedupPolicy::FirstOccurrence && !seen.insert(trimmed) {
            continue;
        }

        let message = PROJECT_SUFFIX_REGEX.replace(&caps[2], "");
        records.push(ViolationRecord::new(&caps[1], message.trim()));
    }

    records
}

/// Render records as the persisted violation log, one `CODE: message` per line.
pub fn render_violation_log(records: &[ViolationRecord]) -> String {
    records.iter().map(|r| format!("{r}\n")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_codes_in_order() {
        let raw = "AZC0012: Model 'Wrapper' is too generic\nAZC0030: Model 'DiskOptions' ends with forbidden suffix";
        let records = extract_violations(raw, DedupPolicy::FirstOccurrence);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].code, "AZC0012");
        assert_eq!(records[0].message, "Model 'Wrapper' is too generic");
        assert_eq!(records[1].code, "AZC0030");
    }

    #[test]
    fn tolerates_msbuild_prefix_and_project_suffix() {
        let raw = "  /src/Models/Disk.cs(12,18): error AZC0030: Model name 'DiskOptions' ends with 'Options'. [/out/Azure.ResourceManager.Compute.csproj]\r\n";
        let records = extract_violations(raw, DedupPolicy::FirstOccurrence);
        assert_eq!(
            records,
            vec![ViolationRecord::new(
                "AZC0030",
                "Model name 'DiskOptions' ends with 'Options'."
            )]
        );
    }

    #[test]
    fn codes_are_case_insensitive_and_normalised() {
        let records = extract_violations("azc0012: lower case", DedupPolicy::KeepAll);
        assert_eq!(records[0].code, "AZC0012");
    }

    #[test]
    fn ignores_unrelated_lines() {
        let raw = "Build started\nCS1002: ; expected\nAZC12: too short\nBuild FAILED.";
        assert!(extract_violations(raw, DedupPolicy::FirstOccurrence).is_empty());
        assert!(extract_violations("", DedupPolicy::FirstOccurrence).is_empty());
    }

    #[test]
    fn dedup_policy_controls_repeats() {
        let raw = "AZC0012: Model 'Data' is too generic\nnoise\n  AZC0012: Model 'Data' is too generic  \nAZC0012: Model 'Info' is too generic";
        let first = extract_violations(raw, DedupPolicy::FirstOccurrence);
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].message, "Model 'Info' is too generic");

        let all = extract_violations(raw, DedupPolicy::KeepAll);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn renders_one_line_per_record() {
        let records = vec![
            ViolationRecord::new("AZC0012", "a"),
            ViolationRecord::new("AZC0030", "b"),
        ];
        assert_eq!(render_violation_log(&records), "AZC0012: a\nAZC0030: b\n");
        assert_eq!(render_violation_log(&[]), "");
    }
}
