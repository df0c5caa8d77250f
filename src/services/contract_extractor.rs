//! Locates and validates the JSON contract inside free-form worker text.

use serde_json::{Map, Value};

use crate::domain::errors::ContractError;
use crate::domain::models::{Analysis, FixContract, Fixes, UPDATED_CONTENT_FIELD};

/// Return the last balanced `{ ... }` object in `text`, unchanged.
///
/// Scans backwards from the end: the first `}` found fixes the end of the
/// object, and the `{` that brings the brace depth back to zero fixes its
/// start. Braces that appear after the object (trailing prose) before any
/// `}` are ignored.
pub fn extract_json_object(text: &str) -> Result<&str, ContractError> {
    let bytes = text.as_bytes();
    let mut end: Option<usize> = None;
    let mut depth = 0usize;

    for i in (0..bytes.len()).rev() {
        match bytes[i] {
            b'}' => {
                if end.is_none() {
                    end = Some(i);
                }
                depth += 1;
            }
            b'{' => {
                let Some(end) = end else { continue };
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[i..=end]);
                }
            }
            _ => {}
        }
    }

    Err(ContractError::NoJsonObject)
}

/// Extract, parse and validate a worker response.
///
/// `analysis` must be an object and the updated content field a non-blank
/// string. `fixes` and the inner analysis fields are informational: when
/// they do not match the expected shape they are replaced by empty values.
pub fn parse_contract(text: &str) -> Result<FixContract, ContractError> {
    let json = extract_json_object(text)?;
    let value: Value = serde_json::from_str(json)?;
    let object = value.as_object().ok_or(ContractError::WrongType {
        field: "response",
        expected: "a JSON object",
    })?;

    let analysis = required(object, "analysis")?;
    if !analysis.is_object() {
        return Err(ContractError::WrongType {
            field: "analysis",
            expected: "an object",
        });
    }

    let updated_content = required(object, UPDATED_CONTENT_FIELD)?
        .as_str()
        .ok_or(ContractError::WrongType {
            field: UPDATED_CONTENT_FIELD,
            expected: "a string",
        })?;
    if updated_content.trim().is_empty() {
        return Err(ContractError::EmptyContent);
    }

    let analysis = serde_json::from_value::<Analysis>(analysis.clone()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "analysis section has unexpected shape, ignoring it");
        Analysis::default()
    });
    let fixes = match object.get("fixes") {
        Some(fixes) => serde_json::from_value::<Fixes>(fixes.clone()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "fixes section has unexpected shape, ignoring it");
            Fixes::default()
        }),
        None => Fixes::default(),
    };

    Ok(FixContract {
        analysis,
        fixes,
        updated_content: updated_content.to_string(),
    })
}

fn required<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, ContractError> {
    object.get(field).ok_or(ContractError::MissingField(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"analysis":{"total_errors":1,"error_types_found":["AZC0012"],"items_requiring_fixes":["Wrapper"]},"updatedContent":"model Foo {}"}"#;

    #[test]
    fn extracts_object_from_surrounding_prose() {
        let text = format!("Here you go:\n{VALID}\nThanks!");
        assert_eq!(extract_json_object(&text).unwrap(), VALID);
    }

    #[test]
    fn ignores_opening_braces_in_trailing_prose() {
        let text = format!("{VALID}\nLet me know if you need more {{ changes");
        assert_eq!(extract_json_object(&text).unwrap(), VALID);
    }

    #[test]
    fn picks_the_last_object() {
        let text = r#"first {"a":1} then {"b":{"c":2}} done"#;
        assert_eq!(extract_json_object(text).unwrap(), r#"{"b":{"c":2}}"#);
    }

    #[test]
    fn missing_or_unbalanced_objects_are_rejected() {
        assert!(matches!(
            extract_json_object("no json here"),
            Err(ContractError::NoJsonObject)
        ));
        assert!(matches!(
            extract_json_object("broken } text"),
            Err(ContractError::NoJsonObject)
        ));
    }

    #[test]
    fn parses_valid_contract() {
        let contract = parse_contract(&format!("Here you go:\n{VALID}\nThanks!")).unwrap();
        assert_eq!(contract.updated_content, "model Foo {}");
        assert_eq!(contract.analysis.total_errors, 1);
        assert_eq!(contract.reported_change_count(), 0);
    }

    #[test]
    fn accepts_legacy_analysis_keys() {
        let text = r#"{"analysis":{"total_azc_errors":2,"models_requiring_fixes":["A","B"]},"fixes":{"model_renames":[{"original":"A","fixed":"SvcA"}]},"updatedContent":"x"}"#;
        let contract = parse_contract(text).unwrap();
        assert_eq!(contract.analysis.total_errors, 2);
        assert_eq!(contract.fixes.renames.len(), 1);
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(
            parse_contract(r#"{"analysis": {}, "updatedContent": }"#),
            Err(ContractError::Malformed(_))
        ));
    }

    #[test]
    fn required_fields_are_enforced() {
        assert!(matches!(
            parse_contract(r#"{"updatedContent":"x"}"#),
            Err(ContractError::MissingField("analysis"))
        ));
        assert!(matches!(
            parse_contract(r#"{"analysis":{}}"#),
            Err(ContractError::MissingField("updatedContent"))
        ));
        assert!(matches!(
            parse_contract(r#"{"analysis":{},"UpdatedClientTsp":"x"}"#),
            Err(ContractError::MissingField("updatedContent"))
        ));
    }

    #[test]
    fn field_types_are_enforced() {
        assert!(matches!(
            parse_contract(r#"{"analysis":[],"updatedContent":"x"}"#),
            Err(ContractError::WrongType { field: "analysis", .. })
        ));
        assert!(matches!(
            parse_contract(r#"{"analysis":{},"updatedContent":{"a":1}}"#),
            Err(ContractError::WrongType { field: "updatedContent", .. })
        ));
        assert!(matches!(
            parse_contract(r#"{"analysis":{},"updatedContent":"  "}"#),
            Err(ContractError::EmptyContent)
        ));
    }

    #[test]
    fn odd_fixes_shape_does_not_fail_the_contract() {
        let contract =
            parse_contract(r#"{"analysis":{},"fixes":"none","updatedContent":"x"}"#).unwrap();
        assert_eq!(contract.fixes, Fixes::default());
    }
}
