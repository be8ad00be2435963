/// Elements whose content is never visible text.
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Strips markup from an HTML document and returns its visible text.
///
/// Tags and comments are removed, the contents of `script`, `style`,
/// `noscript` and `template` elements are dropped, common character
/// references are decoded and runs of whitespace collapse to one space.
///
/// # Examples
///
/// ```
/// use noteflow::fetcher::html_to_text;
///
/// let text = html_to_text("<p>Hello <b>world</b></p><script>x()</script>");
/// assert_eq!(text, "Hello world");
/// ```
pub fn html_to_text(html: &str) -> String {
    // ASCII lowercasing keeps byte offsets identical to `html`.
    let lower = html.to_ascii_lowercase();
    let mut text = String::with_capacity(html.len() / 2);
    let mut pos = 0;

    while let Some(rel) = html[pos..].find('<') {
        let start = pos + rel;
        let after = &lower[start + 1..];
        if !opens_markup(after) {
            text.push_str(&html[pos..=start]);
            pos = start + 1;
            continue;
        }

        text.push_str(&html[pos..start]);
        text.push(' ');
        pos = if after.starts_with("!--") {
            skip_past(&lower, start, "-->")
        } else if let Some(name) = hidden_element(after) {
            let closing = format!("</{name}");
            match lower[start..].find(&closing) {
                Some(end) => skip_past(&lower, start + end, ">"),
                None => html.len(),
            }
        } else {
            skip_past(&lower, start, ">")
        };
    }
    text.push_str(&html[pos..]);

    collapse_whitespace(&decode_entities(&text))
}

/// A `<` only opens markup when followed by a tag name, `/`, `!` or `?`.
fn opens_markup(after_bracket: &str) -> bool {
    after_bracket
        .bytes()
        .next()
        .is_some_and(|b| b.is_ascii_alphabetic() || matches!(b, b'/' | b'!' | b'?'))
}

fn skip_past(haystack: &str, from: usize, needle: &str) -> usize {
    haystack[from..]
        .find(needle)
        .map_or(haystack.len(), |i| from + i + needle.len())
}

fn hidden_element(after_bracket: &str) -> Option<&'static str> {
    HIDDEN_ELEMENTS.into_iter().find(|name| {
        after_bracket.strip_prefix(name).is_some_and(|rest| {
            rest.is_empty() || rest.starts_with(['>', '/', ' ', '\t', '\n', '\r'])
        })
    })
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        match candidate.find(';').filter(|&end| end <= 10) {
            Some(end) => match decode_entity(&candidate[1..end]) {
                Some(ch) => {
                    out.push(ch);
                    rest = &candidate[end + 1..];
                }
                None => {
                    out.push('&');
                    rest = &candidate[1..];
                }
            },
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }
    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "hellip" => '\u{2026}',
        "copy" => '\u{a9}',
        _ => return None,
    };
    Some(ch)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_basic_tags() {
        assert_eq!(html_to_text("<h1>Title</h1><p>Body text</p>"), "Title Body text");
    }

    #[test]
    fn removes_script_and_style_content() {
        let html = r#"<html><head><style>body { color: red; }</style>
            <SCRIPT type="text/javascript">var x = "<p>not text</p>";</SCRIPT></head>
            <body>Visible</body></html>"#;
        assert_eq!(html_to_text(html), "Visible");
    }

    #[test]
    fn removes_comments() {
        assert_eq!(html_to_text("a<!-- <b>hidden</b> -->b"), "a b");
    }

    #[test]
    fn tag_names_that_only_start_like_hidden_elements_are_kept() {
        assert_eq!(html_to_text("<scripted>shown</scripted>"), "shown");
    }

    #[test]
    fn decodes_named_and_numeric_entities() {
        assert_eq!(
            html_to_text("Fish &amp; chips &lt;3 &#39;yum&#x27; &bogus; &"),
            "Fish & chips <3 'yum' &bogus; &"
        );
    }

    #[test]
    fn unterminated_script_drops_rest_of_document() {
        assert_eq!(html_to_text("before<script>never closed"), "before");
    }

    #[test]
    fn keeps_non_ascii_text_intact() {
        assert_eq!(html_to_text("<p>Ünïcödé – ok</p>"), "Ünïcödé – ok");
    }

    #[test]
    fn bare_less_than_signs_are_text() {
        assert_eq!(
            html_to_text("<p>if a < b then c</p><p>Price: 3 <5 units</p>"),
            "if a < b then c Price: 3 <5 units"
        );
        assert_eq!(html_to_text("trailing <"), "trailing <");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(html_to_text("  just   text \n here "), "just text here");
    }
}
