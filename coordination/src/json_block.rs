//! Locating the JSON object inside free-form model output.

/// Try to extract a JSON block from a response that may contain surrounding text.
///
/// Checks a ```` ```json ```` fence, then a bare ```` ``` ```` fence, then the
/// first balanced `{...}` span. Braces inside JSON strings do not count.
pub fn extract_json_block(text: &str) -> Option<&str> {
    for fence in ["```json", "```JSON", "```"] {
        if let Some(start) = text.find(fence) {
            let body_start = start + fence.len();
            if let Some(end) = text[body_start..].find("```") {
                let body = text[body_start..body_start + end].trim();
                if body.starts_with('{') {
                    return Some(body);
                }
            }
        }
    }

    let start = text.find('{')?;
    balanced_end(&text[start..]).map(|end| &text[start..start + end])
}

/// Byte length of the object opening at `text[0]`, or `None` if it never closes.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
