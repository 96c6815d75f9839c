//! Rendering completion text as Telegram HTML.
//!
//! Narrative text is passed through as-is. Fenced code blocks become
//! `<pre><code class="language-…">` with their body escaped, which Telegram
//! renders as a monospace block with a copy affordance. Untagged blocks get a
//! bare `<pre><code>`.

use crate::TextFormat;

use teloxide::utils::html;

/// Code fence delimiter.
pub const FENCE: &str = "```";

/// Sent instead of an empty completion.
pub const EMPTY_REPLY_PLACEHOLDER: &str = "Empty response";

/// Rendered reply plus the parse mode it must be sent with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedReply {
    pub text: String,
    pub format: TextFormat,
}

/// A fenced segment split into its info line and body.
struct CodeBlock<'a> {
    language: &'a str,
    body: &'a str,
}

impl<'a> CodeBlock<'a> {
    /// The first line is the language tag when it looks like one. Otherwise
    /// the whole segment is body, so no visible line is lost.
    fn parse(segment: &'a str) -> Self {
        if let Some((info, body)) = segment.split_once('\n') {
            let info = info.trim();
            if is_language_tag(info) {
                return Self {
                    language: info,
                    body,
                };
            }
        }
        Self {
            language: "",
            body: segment,
        }
    }

    fn to_html(&self) -> String {
        let body = html::escape(self.body);
        if self.language.is_empty() {
            format!("<pre><code>{body}</code></pre>")
        } else {
            format!(
                "<pre><code class=\"language-{}\">{body}</code></pre>",
                self.language
            )
        }
    }
}

/// Language tags end up inside an HTML attribute, so only plain identifiers qualify.
fn is_language_tag(tag: &str) -> bool {
    tag.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '#' | '.' | '-'))
}

/// Odd-position segments of the text split on fences. A trailing block with
/// no closing fence (usually a truncated completion) runs to the end of the text.
fn code_segments(text: &str) -> impl Iterator<Item = &str> {
    text.split(FENCE).skip(1).step_by(2)
}

/// Render a completion for display.
///
/// Text without fences comes back unchanged. Narrative segments pass through
/// untouched; code segments are escaped and wrapped.
pub fn format_response(text: &str) -> FormattedReply {
    if text.is_empty() {
        return FormattedReply {
            text: EMPTY_REPLY_PLACEHOLDER.to_string(),
            format: TextFormat::Html,
        };
    }

    if !text.contains(FENCE) {
        return FormattedReply {
            text: text.to_string(),
            format: TextFormat::Html,
        };
    }

    let fences = text.matches(FENCE).count();
    if fences % 2 == 1 {
        tracing::debug!(fences, "unterminated code block, rendering to end of text");
    }

    let mut rendered = String::with_capacity(text.len() + 64);
    for (index, segment) in text.split(FENCE).enumerate() {
        if index % 2 == 1 {
            rendered.push_str(&CodeBlock::parse(segment).to_html());
        } else {
            rendered.push_str(segment);
        }
    }

    FormattedReply {
        text: rendered,
        format: TextFormat::Html,
    }
}

/// Bodies of all code blocks, separated by a blank line.
///
/// Returns `None` when the text has no block with content.
pub fn extract_code(text: &str) -> Option<String> {
    let bodies: Vec<&str> = code_segments(text)
        .map(|segment| CodeBlock::parse(segment).body.trim_end_matches('\n'))
        .filter(|body| !body.trim().is_empty())
        .collect();

    if bodies.is_empty() {
        None
    } else {
        Some(bodies.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn text_without_fences_is_unchanged_and_idempotent() {
        let inputs = [
            "plain answer",
            "<b>already html</b> & more",
            "two backticks `` are not a fence",
            "line one\nline two",
        ];
        for input in inputs {
            let once = format_response(input);
            assert_eq!(once.text, input);
            assert_eq!(once.format, TextFormat::Html);
            assert_eq!(format_response(&once.text).text, input);
        }
    }

    #[test]
    fn empty_text_becomes_placeholder() {
        assert_eq!(format_response("").text, EMPTY_REPLY_PLACEHOLDER);
    }

    #[test]
    fn renders_inline_python_block() {
        let reply = format_response("before ```python\ncode()\n``` after");

        assert_eq!(reply.format, TextFormat::Html);
        assert_eq!(
            reply.text,
            "before <pre><code class=\"language-python\">code()\n</code></pre> after"
        );
    }

    #[test]
    fn escapes_code_but_not_narrative() {
        let input = indoc! {"
            Use <b>bold</b> like this:
            ```html
            <div>a & b</div>
            ```
            Done.
        "};

        let reply = format_response(input);

        assert!(reply.text.starts_with("Use <b>bold</b> like this:\n"));
        assert!(reply.text.contains("&lt;div&gt;a &amp; b&lt;/div&gt;"));
        assert!(reply.text.contains("<pre><code class=\"language-html\">"));
        assert!(reply.text.ends_with("</code></pre>\nDone.\n"));
    }

    #[test]
    fn block_without_newline_has_no_language() {
        let reply = format_response("run ```ls -la``` now");
        assert_eq!(reply.text, "run <pre><code>ls -la</code></pre> now");
    }

    #[test]
    fn suspicious_language_tag_stays_in_body() {
        let reply = format_response("```\" onclick=\"x\nbody\n```");
        assert_eq!(reply.text, "<pre><code>\" onclick=\"x\nbody\n</code></pre>");
    }

    #[test]
    fn code_first_line_is_not_swallowed_as_language() {
        let input = "```print(a)\nprint(b)\n```";

        assert_eq!(
            format_response(input).text,
            "<pre><code>print(a)\nprint(b)\n</code></pre>"
        );
        assert_eq!(extract_code(input).as_deref(), Some("print(a)\nprint(b)"));
    }

    #[test]
    fn multiple_blocks_keep_order() {
        let reply = format_response("a```rust\nfn a() {}\n```b```sh\necho b\n```c");
        assert_eq!(
            reply.text,
            "a<pre><code class=\"language-rust\">fn a() {}\n</code></pre>b\
             <pre><code class=\"language-sh\">echo b\n</code></pre>c"
        );
    }

    #[test]
    fn unclosed_fence_renders_to_end_of_text() {
        let input = "here is code:\n```python\nprint(1 < 2)";
        let reply = format_response(input);

        assert_eq!(reply.format, TextFormat::Html);
        assert_eq!(
            reply.text,
            "here is code:\n<pre><code class=\"language-python\">print(1 &lt; 2)</code></pre>"
        );
        assert_eq!(extract_code(input).as_deref(), Some("print(1 < 2)"));
    }

    #[test]
    fn extracts_bodies_of_all_blocks() {
        let input = indoc! {"
            First:
            ```python
            print(1)
            ```
            Second:
            ```
            echo 2
            ```
            Trailing ```js
            never closed
        "};

        assert_eq!(
            extract_code(input).as_deref(),
            Some("print(1)\n\necho 2\n\nnever closed")
        );
    }

    #[test]
    fn no_code_blocks_means_no_code() {
        assert_eq!(extract_code("just text"), None);
        assert_eq!(extract_code("empty ``````"), None);
        assert_eq!(extract_code("dangling ```python\n"), None);
    }
}
