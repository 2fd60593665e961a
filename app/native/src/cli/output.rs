//! CLI output formatting.

use colored::Colorize;

/// Prints JSON with syntax highlighting.
///
/// Keys are cyan, strings green, numbers yellow, booleans and null magenta.
pub fn print_highlighted_json(value: &serde_json::Value) {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
    println!("{}", highlight_json(&pretty));
}

/// Colors a pretty-printed JSON document.
///
/// With colors disabled the input is returned unchanged.
fn highlight_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len() * 2);
    let mut chars = json.char_indices().peekable();

    while let Some((start, ch)) = chars.next() {
        match ch {
            '"' => {
                let mut end = start + 1;
                let mut escaped = false;
                for (i, c) in chars.by_ref() {
                    end = i + c.len_utf8();
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '"' {
                        break;
                    }
                }

                let literal = &json[start..end];
                // A string directly followed by a colon is an object key.
                let is_key = json[end..].trim_start().starts_with(':');
                if is_key {
                    out.push_str(&literal.cyan().to_string());
                } else {
                    out.push_str(&literal.green().to_string());
                }
            }
            '-' | '0'..='9' => {
                let mut end = start + 1;
                while let Some(&(i, c)) = chars.peek() {
                    if !(c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) {
                        break;
                    }
                    end = i + 1;
                    chars.next();
                }
                out.push_str(&json[start..end].yellow().to_string());
            }
            't' | 'f' | 'n' => {
                let word = ["true", "false", "null"]
                    .into_iter()
                    .find(|word| json[start..].starts_with(word));
                match word {
                    Some(word) => {
                        for _ in 1..word.len() {
                            chars.next();
                        }
                        out.push_str(&word.magenta().to_string());
                    }
                    None => out.push(ch),
                }
            }
            '{' | '}' | '[' | ']' => out.push_str(&ch.to_string().bold().to_string()),
            _ => out.push(ch),
        }
    }

    out
}
