/// Render a secret for logs: the first four characters and its length.
pub fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    if token.chars().count() <= 4 {
        return "[REDACTED]".to_string();
    }
    format!("{prefix}…[REDACTED, {} chars]", token.chars().count())
}
