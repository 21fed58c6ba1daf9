use std::collections::BTreeMap;

/// Parses flat `key=value` properties text.
///
/// The format follows the usual properties conventions:
/// - lines starting with `#` or `!` are comments, blank lines are skipped;
/// - the key ends at the first unescaped `=`, `:` or whitespace;
/// - a line ending in an odd number of backslashes continues on the next line,
///   with the continuation's leading whitespace dropped;
/// - `\t`, `\n`, `\r`, `\f` and `\uXXXX` escapes are decoded, any other escaped
///   character stands for itself.
///
/// Entries with an empty key are dropped. Later duplicates win.
pub fn parse_properties(content: &str) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    let mut logical = String::new();
    let mut continuing = false;

    for line in content.lines() {
        let line = line.trim_start_matches(is_blank);

        if !continuing {
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
        }

        let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            logical.push_str(&line[..line.len() - 1]);
            continuing = true;
            continue;
        }

        logical.push_str(line);
        continuing = false;
        if let Some((key, value)) = split_entry(&logical) {
            entries.insert(key, value);
        }
        logical.clear();
    }

    // A continuation on the last line still terminates the entry.
    if continuing && let Some((key, value)) = split_entry(&logical) {
        entries.insert(key, value);
    }

    entries
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{c}')
}

fn split_entry(line: &str) -> Option<(String, String)> {
    let chars: Vec<char> = line.chars().collect();
    let mut index = 0;
    let mut escaped = false;

    while index < chars.len() {
        let c = chars[index];
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '=' || c == ':' || is_blank(c) {
            break;
        }
        index += 1;
    }

    let key: String = chars[..index].iter().collect();
    let mut rest = index;

    while rest < chars.len() && is_blank(chars[rest]) {
        rest += 1;
    }
    if rest < chars.len() && (chars[rest] == '=' || chars[rest] == ':') {
        rest += 1;
    }
    while rest < chars.len() && is_blank(chars[rest]) {
        rest += 1;
    }

    let value: String = chars[rest..].iter().collect();
    let key = unescape(&key);
    if key.is_empty() {
        return None;
    }
    Some((key, unescape(&value)))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == 4 => out.push(decoded),
                    // Malformed escapes are kept verbatim.
                    _ => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    out
}
