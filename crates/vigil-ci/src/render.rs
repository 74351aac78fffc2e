//! Self-contained HTML pages for gate artifacts.
//!
//! Rendering is pure: the same input always yields byte-identical output.

const STYLE: &str = "body{font-family:monospace;margin:1.5em}\
pre{line-height:1.35}\
.add{background:#e6ffed;color:#22863a}\
.del{background:#ffeef0;color:#b31d28}\
.hunk{color:#6f42c1}\
.file{font-weight:bold}";

/// Escape text for inclusion in HTML element content or attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    let title = escape_html(title);
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <style>{STYLE}</style>\n</head>\n<body>\n<h1>{title}</h1>\n<pre>\n{body}</pre>\n</body>\n</html>\n"
    )
}

fn line_class(line: &str) -> Option<&'static str> {
    if line.starts_with("+++") || line.starts_with("---") {
        Some("file")
    } else if line.starts_with("@@") {
        Some("hunk")
    } else if line.starts_with('+') {
        Some("add")
    } else if line.starts_with('-') {
        Some("del")
    } else {
        None
    }
}

/// Render a unified diff with added, removed, hunk and file lines styled.
pub fn render_diff_html(title: &str, diff: &str) -> String {
    let mut body = String::with_capacity(diff.len() * 2);
    for line in diff.lines() {
        let escaped = escape_html(line);
        match line_class(line) {
            Some(class) => {
                body.push_str(&format!("<span class=\"{class}\">{escaped}</span>\n"));
            }
            None => {
                body.push_str(&escaped);
                body.push('\n');
            }
        }
    }
    page(title, &body)
}

/// Wrap arbitrary console output in an escaped `<pre>` page.
pub fn render_log_html(title: &str, text: &str) -> String {
    let mut body = escape_html(text);
    if !body.is_empty() && !body.ends_with('\n') {
        body.push('\n');
    }
    page(title, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_diff_line_classes() {
        let diff = "--- a.py\n+++ a.py\n@@ -1 +1 @@\n-x=1\n+x = 1\n context\n";
        let html = render_diff_html("Formatting diff", diff);
        assert!(html.contains("<span class=\"file\">--- a.py</span>"));
        assert!(html.contains("<span class=\"hunk\">@@ -1 +1 @@</span>"));
        assert!(html.contains("<span class=\"del\">-x=1</span>"));
        assert!(html.contains("<span class=\"add\">+x = 1</span>"));
        assert!(html.contains("\n context\n"));
    }

    #[test]
    fn test_diff_content_is_escaped() {
        let html = render_diff_html("t", "+if a < b and c > d:\n");
        assert!(html.contains("+if a &lt; b and c &gt; d:"));
        assert!(!html.contains("a < b"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let diff = "-a\n+b\n";
        assert_eq!(render_diff_html("t", diff), render_diff_html("t", diff));
    }

    #[test]
    fn test_log_page() {
        let html = render_log_html("Test report", "collected 0 items");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Test report</title>"));
        assert!(html.contains("collected 0 items\n</pre>"));
    }
}
