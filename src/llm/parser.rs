//! Candidate extraction from provider responses.
//!
//! Models usually wrap SQL in markdown code fences; some return it raw. A
//! plain-text reply (e.g., "this schema has no weather data") yields no
//! candidate at all.

/// Extracts the candidate SQL from a provider response.
///
/// Tries, in order: a ```sql fence, a bare ``` fence, then the raw response
/// when its leading token already reads like a query. Returns None when the
/// response carries no SQL.
pub fn extract_candidate_sql(response: &str) -> Option<String> {
    if let Some(sql) = extract_code_block(response, "sql") {
        let sql = sql.trim();
        return (!sql.is_empty()).then(|| sql.to_string());
    }

    if let Some(sql) = extract_code_block(response, "") {
        let sql = sql.trim();
        return (!sql.is_empty()).then(|| sql.to_string());
    }

    let raw = response.trim();
    let token = raw
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .next()
        .unwrap_or("");
    if token.eq_ignore_ascii_case("select") || token.eq_ignore_ascii_case("with") {
        return Some(raw.to_string());
    }

    None
}

/// Extracts content from a markdown code block with the specified language.
///
/// Pass an empty string for `lang` to match blocks without a language
/// specifier.
fn extract_code_block(text: &str, lang: &str) -> Option<String> {
    let start_pattern = if lang.is_empty() {
        "```".to_string()
    } else {
        format!("```{}", lang)
    };

    let start_idx = text.find(&start_pattern)?;

    // Find the newline after the opening fence
    let content_start = text[start_idx + start_pattern.len()..]
        .find('\n')
        .map(|i| start_idx + start_pattern.len() + i + 1)?;

    // For generic blocks, make sure it's not actually a language-specific block
    if lang.is_empty() {
        let after_fence = &text[start_idx + 3..content_start - 1];
        if !after_fence.trim().is_empty() {
            return None;
        }
    }

    let end_idx = text[content_start..].find("```")?;

    Some(text[content_start..content_start + end_idx].to_string())
}
