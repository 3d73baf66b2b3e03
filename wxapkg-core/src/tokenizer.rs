//! Array tokeniser (C5): split a bracketed, quoted, nested literal into its
//! top-level elements. Shared by the style and template restorers.

/// Split the inner contents of a `[...]` literal into top-level elements.
///
/// `input` may or may not include the surrounding brackets; either way only
/// the commas at bracket-depth 0 and outside of a string are treated as
/// separators. Backslash escapes are honoured within strings (the next
/// character is copied verbatim, never treated as a delimiter). Leading and
/// trailing whitespace on each token is trimmed; empty tokens are dropped.
pub fn tokenize(input: &str) -> Vec<String> {
    let inner = strip_outer_brackets(input);

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut string_char = '"';

    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if in_string {
            current.push(c);
            if c == '\\' {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                continue;
            }
            if c == string_char {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                in_string = true;
                string_char = c;
                current.push(c);
            }
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                push_token(&mut tokens, &current);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push_token(&mut tokens, &current);

    tokens
}

fn push_token(tokens: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        tokens.push(trimmed.to_string());
    }
}

fn strip_outer_brackets(input: &str) -> &str {
    let trimmed = input.trim();
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

/// Strip a matching pair of outer quotes and decode the escapes the restorers
/// rely on (`\n \t \' \"`). Tokens that are not quoted are returned unchanged.
pub fn unquote(token: &str) -> String {
    let bytes = token.as_bytes();
    let is_quoted = bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0];
    let inner = if is_quoted {
        &token[1..token.len() - 1]
    } else {
        token
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('n') => {
                    out.push('\n');
                    chars.next();
                }
                Some('t') => {
                    out.push('\t');
                    chars.next();
                }
                Some('\'') => {
                    out.push('\'');
                    chars.next();
                }
                Some('"') => {
                    out.push('"');
                    chars.next();
                }
                Some('\\') => {
                    out.push('\\');
                    chars.next();
                }
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}
