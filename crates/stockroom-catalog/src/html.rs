//! Markup stripping for product descriptions
//!
//! Marketplace descriptions arrive as HTML fragments. They are flattened to
//! plain text with one line per text run, which keeps paragraph and list
//! boundaries readable without carrying any markup into storage.

/// Strip tags from `raw` and return the text runs joined by newlines.
///
/// Best effort: malformed markup never fails, it just yields whatever text
/// can be recovered. Absent or empty input yields an empty string.
pub fn normalize_html(raw: Option<&str>) -> String {
    let raw = match raw {
        Some(s) if !s.trim().is_empty() => s,
        _ => return String::new(),
    };

    let mut runs: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut rest = raw;

    while let Some(lt) = rest.find('<') {
        text.push_str(&rest[..lt]);
        let tail = &rest[lt..];

        if let Some(after) = tail.strip_prefix("<!--") {
            flush(&mut text, &mut runs);
            rest = match after.find("-->") {
                Some(end) => &after[end + 3..],
                None => "",
            };
            continue;
        }

        let Some(gt) = tail.find('>') else {
            // Unterminated tag: keep it as literal text
            text.push_str(tail);
            rest = "";
            break;
        };

        let tag = &tail[1..gt];
        if !looks_like_tag(tag) {
            text.push('<');
            rest = &tail[1..];
            continue;
        }

        flush(&mut text, &mut runs);
        rest = &tail[gt + 1..];

        if let Some(raw_text) = raw_text_element(tag) {
            let close = format!("</{}", raw_text);
            rest = match find_ascii_ci(rest, &close) {
                Some(pos) => match rest[pos..].find('>') {
                    Some(end) => &rest[pos + end + 1..],
                    None => "",
                },
                None => "",
            };
        }
    }
    text.push_str(rest);
    flush(&mut text, &mut runs);

    runs.join("\n").trim().to_string()
}

fn flush(text: &mut String, runs: &mut Vec<String>) {
    if !text.trim().is_empty() {
        runs.push(decode_entities(text));
    }
    text.clear();
}

/// `<` followed by a name, `/name`, or `!`/`?` declaration
fn looks_like_tag(tag: &str) -> bool {
    match tag.chars().next() {
        Some('/') => tag[1..].starts_with(|c: char| c.is_ascii_alphabetic()),
        Some('!') | Some('?') => true,
        Some(c) => c.is_ascii_alphabetic(),
        None => false,
    }
}

/// Elements whose content is not text
fn raw_text_element(tag: &str) -> Option<&'static str> {
    let name: String = tag
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    let self_closing = tag.trim_end().ends_with('/');
    match name.as_str() {
        "script" if !self_closing => Some("script"),
        "style" if !self_closing => Some("style"),
        _ => None,
    }
}

fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&tail[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraphs_become_lines() {
        assert_eq!(normalize_html(Some("<p>A</p><p>B</p>")), "A\nB");
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(normalize_html(Some("Organic honey 500g")), "Organic honey 500g");
        assert_eq!(normalize_html(Some("  padded  ")), "padded");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_html(Some("<ul><li>One</li><li>Two</li></ul>"));
        assert_eq!(once, "One\nTwo");
        assert_eq!(normalize_html(Some(&once)), once);
    }

    #[test]
    fn test_empty_and_absent() {
        assert_eq!(normalize_html(None), "");
        assert_eq!(normalize_html(Some("")), "");
        assert_eq!(normalize_html(Some("<div>   </div>")), "");
    }

    #[test]
    fn test_inline_markup_splits_runs() {
        assert_eq!(normalize_html(Some("<b>Fresh</b> olives")), "Fresh\n olives");
    }

    #[test]
    fn test_script_style_and_comments_dropped() {
        let html = "<style>p{color:red}</style><p>Kept</p><!-- hidden --><SCRIPT>alert(1)</SCRIPT>";
        assert_eq!(normalize_html(Some(html)), "Kept");
    }

    #[test]
    fn test_entities_decoded() {
        assert_eq!(
            normalize_html(Some("<p>Salt &amp; pepper &#8211; 5&lt;10 &#x41;</p>")),
            "Salt & pepper \u{2013} 5<10 A"
        );
        assert_eq!(normalize_html(Some("R&D &unknown;")), "R&D &unknown;");
    }

    #[test]
    fn test_malformed_markup() {
        assert_eq!(normalize_html(Some("<p>Open paragraph")), "Open paragraph");
        assert_eq!(normalize_html(Some("3 < 4 and <b")), "3 < 4 and <b");
        assert_eq!(normalize_html(Some("<p>A</p><!-- never closed")), "A");
    }
}
