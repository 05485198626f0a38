use pulldown_cmark::{Event, Options, Parser, html};

/// Renders the function's markdown reply to HTML. Empty text renders nothing.
///
/// Raw HTML inside the reply is not trusted and comes out as escaped text.
pub fn render_markdown(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }

    let parser = Parser::new_ext(text, Options::empty()).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emphasis_is_rendered() {
        let out = render_markdown("**hello**").unwrap();
        assert!(out.contains("<strong>hello</strong>"), "{out}");
    }

    #[test]
    fn empty_text_renders_nothing() {
        assert_eq!(render_markdown(""), None);
    }

    #[test]
    fn headings_and_lists() {
        let out = render_markdown("# Plan\n\n- one\n- two\n").unwrap();
        assert!(out.contains("<h1>Plan</h1>"));
        assert!(out.contains("<li>one</li>"));
        assert!(out.contains("<li>two</li>"));
    }

    #[test]
    fn raw_html_is_escaped() {
        let out = render_markdown("hi <script>alert(1)</script>").unwrap();
        assert!(!out.contains("<script>"), "{out}");
        assert!(out.contains("&lt;script&gt;"), "{out}");

        let block = render_markdown("<div onclick=\"x()\">block</div>\n").unwrap();
        assert!(!block.contains("<div"), "{block}");
    }
}
