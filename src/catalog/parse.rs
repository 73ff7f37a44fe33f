// Minimal delimited-text reader for sentence files.
//
// Sentence text regularly contains commas, so fields may be wrapped in
// double quotes; a doubled quote inside a quoted field is a literal quote.

use crate::error::SessionError;

/// Split one line into fields.
pub(super) fn split_record(line: &str, line_number: usize) -> Result<Vec<String>, SessionError> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if in_quotes {
        return Err(SessionError::CatalogFormat {
            reason: format!("line {}: unterminated quoted field", line_number),
        });
    }

    fields.push(current.trim().to_string());
    Ok(fields)
}

/// Quote a field for output if it contains a delimiter or quote.
pub(crate) fn escape_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_record() {
        let fields = split_record("1,2,A boy fell from the window,s0102.wav", 2).unwrap();
        assert_eq!(fields, vec!["1", "2", "A boy fell from the window", "s0102.wav"]);
    }

    #[test]
    fn test_split_quoted_record_with_commas() {
        let fields = split_record(r#"3, 1, "Yes, the ""big"" dog ran", s0301.wav"#, 5).unwrap();
        assert_eq!(fields[2], r#"Yes, the "big" dog ran"#);
        assert_eq!(fields[3], "s0301.wav");
    }

    #[test]
    fn test_unterminated_quote_is_format_error() {
        let err = split_record(r#"1,1,"open quote,a.wav"#, 7).unwrap_err();
        match err {
            SessionError::CatalogFormat { reason } => assert!(reason.contains("line 7")),
            other => panic!("Expected CatalogFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a, b"), "\"a, b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
