//! Remediation strategies, one variant per known analyzer code.
//!
//! Strategies are a closed set: adding support for a new code means adding a
//! variant here and listing it in [`FixerStrategy::ALL`]. Each strategy turns
//! a violation message into a plain-text instruction fragment containing the
//! rule, the required action and a worked example.

use serde::{Deserialize, Serialize};

/// A remediation strategy for a single analyzer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FixerStrategy {
    /// Single-word type names are too generic.
    Azc0012,
    /// Model names end with a forbidden suffix (`Request`, `Response`, `Options`).
    Azc0030,
    /// Model names end with the `Definition` suffix.
    Azc0031,
    /// Model names end with the `Data` suffix.
    Azc0032,
    /// Model names end with the `Operation` suffix.
    Azc0033,
    /// Type name collides with a well-known BCL or SDK type.
    Azc0034,
}

impl FixerStrategy {
    /// Every built-in strategy, in registration order.
    pub const ALL: [Self; 6] = [
        Self::Azc0012,
        Self::Azc0030,
        Self::Azc0031,
        Self::Azc0032,
        Self::Azc0033,
        Self::Azc0034,
    ];

    /// The analyzer code this strategy handles.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Azc0012 => "AZC0012",
            Self::Azc0030 => "AZC0030",
            Self::Azc0031 => "AZC0031",
            Self::Azc0032 => "AZC0032",
            Self::Azc0033 => "AZC0033",
            Self::Azc0034 => "AZC0034",
        }
    }

    /// Exact, case-insensitive code match.
    pub fn can_handle(self, code: &str) -> bool {
        self.code().eq_ignore_ascii_case(code.trim())
    }

    /// Build the instruction fragment for one violation message.
    pub fn build_instruction(self, message: &str) -> String {
        let message = message.trim();
        match self {
            Self::Azc0012 => format!(
                r#"#### Fix AZC0012
Error: {message}

**Rule**: Single-word model names are too generic and risk colliding with BCL or other libraries.
**Action**: Prefix each such model with the main resource or service name defined in main.tsp. Use the primary model or the last segment of the namespace in main.tsp as the prefix.

**Steps**:
- Load main.tsp and extract the namespace or main model name.
- Use the last segment of the namespace or the main model as the prefix.
- For each generic single-word model (e.g. 'Wrapper'), add or update its @@clientName decorator in client.tsp so the name is descriptive and unique.

**Example**:
If main.tsp defines:
```ts
namespace Azure.ResourceManager.Compute;
model ComputeDisk ...
```
Then:
```ts
// BAD:
@@clientName(Wrapper, "Wrapper", "csharp");

// GOOD:
@@clientName(Wrapper, "ComputeWrapper", "csharp");
```

- Ensure the final client.tsp remains valid TypeSpec 1.0+ syntax.
"#
            ),
            Self::Azc0030 => suffix_instruction(
                "AZC0030",
                message,
                "Model names must not end with `Request`, `Response` or `Options`; those suffixes are reserved for protocol-level types.",
                "DiskOptions",
                "DiskProperties",
            ),
            Self::Azc0031 => suffix_instruction(
                "AZC0031",
                message,
                "Model names must not end with `Definition` unless the model is itself a definition resource.",
                "RoleDefinition",
                "RoleDefinitionProperties",
            ),
            Self::Azc0032 => suffix_instruction(
                "AZC0032",
                message,
                "Model names must not end with `Data`; that suffix is reserved for resource data types.",
                "DiskData",
                "DiskInfo",
            ),
            Self::Azc0033 => suffix_instruction(
                "AZC0033",
                message,
                "Model names must not end with `Operation`; that suffix is reserved for long-running operation types.",
                "BackupOperation",
                "BackupOperationInfo",
            ),
            Self::Azc0034 => format!(
                r#"#### Fix AZC0034
Error: {message}

**Rule**: Type names must not collide with well-known types from the BCL or shared Azure SDK libraries.
**Action**: Rename the conflicting model for C# with a service-specific prefix using @@clientName in client.tsp.

**Example**:
```ts
// BAD: conflicts with System.Threading.Tasks.Task
@@clientName(Task, "Task", "csharp");

// GOOD:
@@clientName(Task, "ComputeTask", "csharp");
```
"#
            ),
        }
    }
}

fn suffix_instruction(
    code: &str,
    message: &str,
    rule: &str,
    bad: &str,
    good: &str,
) -> String {
    format!(
        r#"#### Fix {code}
Error: {message}

**Rule**: {rule}
**Action**: Add a @@clientName decorator in client.tsp that renames the model for C# to a name without the forbidden suffix, reflecting what the model represents.

**Example**:
```ts
@@clientName({bad}, "{good}", "csharp");
```
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_handle_is_case_insensitive_and_exact() {
        assert!(FixerStrategy::Azc0012.can_handle("AZC0012"));
        assert!(FixerStrategy::Azc0012.can_handle("azc0012"));
        assert!(!FixerStrategy::Azc0012.can_handle("AZC00120"));
        assert!(!FixerStrategy::Azc0012.can_handle("AZC0030"));
    }

    #[test]
    fn instructions_embed_trimmed_message() {
        let text =
            FixerStrategy::Azc0030.build_instruction("  Model 'DiskOptions' ends with Options \n");
        assert!(text.starts_with("#### Fix AZC0030"));
        assert!(text.contains("Error: Model 'DiskOptions' ends with Options\n"));
        assert!(text.contains("@@clientName(DiskOptions, \"DiskProperties\", \"csharp\");"));
    }

    #[test]
    fn instructions_are_deterministic() {
        for strategy in FixerStrategy::ALL {
            assert_eq!(
                strategy.build_instruction("msg"),
                strategy.build_instruction("msg")
            );
            assert!(strategy.build_instruction("msg").contains(strategy.code()));
        }
    }
}
