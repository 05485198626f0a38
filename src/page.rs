use std::fmt::{self, Write};

use pulldown_cmark_escape::{escape_html, escape_html_body_text};

use crate::{
    flow::{Notice, Workspace},
    form::{Field, FieldErrors, FormValues},
    render::render_markdown,
};

const STYLE: &str = "\
body{font-family:sans-serif;margin:0;background:#f4f5f7}\
.layout-container{display:grid;grid-template-columns:1fr 1fr;gap:2rem;padding:2rem}\
.form-body{display:grid;grid-template-columns:1fr 1fr;gap:1rem}\
.full-columns{grid-column:1 / -1}\
.form-field-container{display:flex;flex-direction:column;gap:.25rem}\
.form-input-textarea{min-height:6rem}\
.form-error{color:#b00020;margin:0}\
.notice{grid-column:1 / -1;background:#fff4e5;border:1px solid #f0a020;padding:.75rem}\
.response-prompt{background:#fff;padding:1rem}";

pub struct PageView<'a> {
    pub values: &'a FormValues,
    pub errors: &'a FieldErrors,
    pub notice: Option<&'a Notice>,
    pub response: &'a str,
    pub busy: bool,
}

impl<'a> From<&'a Workspace> for PageView<'a> {
    fn from(workspace: &'a Workspace) -> Self {
        Self {
            values: workspace.values(),
            errors: workspace.errors(),
            notice: workspace.notice(),
            response: workspace.response(),
            busy: workspace.busy(),
        }
    }
}

/// Inline message under a field, or nothing.
pub fn error_message(out: &mut String, message: Option<&str>) -> fmt::Result {
    let Some(message) = message else {
        return Ok(());
    };

    out.push_str(r#"<p class="form-error" role="alert">"#);
    escape_html_body_text(&mut *out, message)?;
    out.push_str("</p>");
    Ok(())
}

fn field_control(
    out: &mut String,
    field: Field,
    values: &FormValues,
    errors: &FieldErrors,
) -> fmt::Result {
    let name = field.name();
    let class = if field.multiline() {
        "form-field-container full-columns"
    } else {
        "form-field-container"
    };

    write!(
        out,
        r#"<div class="{class}"><label class="form-label" for="{name}">"#
    )?;
    escape_html_body_text(&mut *out, field.label())?;
    out.push_str("</label>");

    if field.multiline() {
        write!(
            out,
            r#"<textarea class="form-input-textarea" id="{name}" name="{name}">"#
        )?;
        escape_html_body_text(&mut *out, values.get(field))?;
        out.push_str("</textarea>");
    } else {
        write!(
            out,
            r#"<input class="form-input-text" type="text" id="{name}" name="{name}" value=""#
        )?;
        escape_html(&mut *out, values.get(field))?;
        out.push_str(r#"">"#);
    }

    error_message(out, errors.message(field))?;
    out.push_str("</div>");
    Ok(())
}

pub fn render_page(view: &PageView<'_>) -> Result<String, fmt::Error> {
    let mut out = String::with_capacity(4096);

    out.push_str("<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">");
    out.push_str("<title>Service prompt</title><style>");
    out.push_str(STYLE);
    out.push_str("</style></head><body><div class=\"layout-container\">");

    out.push_str(r#"<form method="post" action="/" class="form-body">"#);
    out.push_str("<h1 class=\"full-columns\">Service prompt</h1>");

    if let Some(notice) = view.notice {
        out.push_str(r#"<div class="notice" role="status">"#);
        escape_html_body_text(&mut out, notice.message)?;
        out.push_str("</div>");
    }

    for field in Field::ALL {
        field_control(&mut out, field, view.values, view.errors)?;
    }

    let disabled = if view.busy { " disabled" } else { "" };
    write!(
        out,
        r#"<input class="button" type="submit" value="Send"{disabled}>"#
    )?;
    out.push_str("</form>");

    out.push_str(r#"<div class="response-prompt">"#);
    if let Some(html) = render_markdown(view.response) {
        out.push_str(&html);
    }
    out.push_str("</div></div></body></html>");

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::filled_values;

    fn view<'a>(values: &'a FormValues, errors: &'a FieldErrors) -> PageView<'a> {
        PageView {
            values,
            errors,
            notice: None,
            response: "",
            busy: false,
        }
    }

    #[test]
    fn error_display_is_pure() {
        let mut out = String::new();
        error_message(&mut out, None).unwrap();
        assert_eq!(out, "");

        error_message(&mut out, Some("This field is required")).unwrap();
        assert_eq!(
            out,
            r#"<p class="form-error" role="alert">This field is required</p>"#
        );
    }

    #[test]
    fn error_text_is_escaped() {
        let mut out = String::new();
        error_message(&mut out, Some("a < b & c")).unwrap();
        assert!(out.contains("a &lt; b &amp; c"));
    }

    #[test]
    fn every_field_is_rendered_with_its_value() {
        let values = filled_values();
        let errors = FieldErrors::default();
        let page = render_page(&view(&values, &errors)).unwrap();

        for field in Field::ALL {
            assert!(page.contains(&format!(r#"name="{}""#, field.name())));
            assert!(page.contains(values.get(field)));
        }
        assert!(!page.contains(r#"class="form-error""#));
        assert!(!page.contains(" disabled"));
    }

    #[test]
    fn user_text_is_escaped() {
        let mut values = FormValues::default();
        values.set(Field::Client, r#""><script>x</script>"#);
        let errors = FieldErrors::default();

        let page = render_page(&view(&values, &errors)).unwrap();
        assert!(!page.contains("<script>"));
        assert!(page.contains(r#"value="&quot;&gt;&lt;script&gt;x&lt;/script&gt;""#));
    }

    #[test]
    fn textarea_content_cannot_close_the_element() {
        let mut values = FormValues::default();
        values.set(Field::CurrentMethod, "it's </textarea><b>");
        let errors = FieldErrors::default();

        let page = render_page(&view(&values, &errors)).unwrap();
        assert!(page.contains("it's &lt;/textarea&gt;&lt;b&gt;</textarea>"));
    }

    #[test]
    fn validation_errors_are_shown_inline() {
        let mut values = filled_values();
        values.set(Field::SuccessCriteria, "");
        let errors = values.validate().unwrap_err();

        let page = render_page(&view(&values, &errors)).unwrap();
        assert_eq!(page.matches(r#"class="form-error""#).count(), 1);
    }

    #[test]
    fn response_and_notice_render() {
        let values = FormValues::default();
        let errors = FieldErrors::default();
        let notice = Notice { message: "Try again later." };
        let page = render_page(&PageView {
            values: &values,
            errors: &errors,
            notice: Some(&notice),
            response: "**hello**",
            busy: true,
        })
        .unwrap();

        assert!(page.contains("<strong>hello</strong>"));
        assert!(page.contains("Try again later."));
        assert!(page.contains(r#"value="Send" disabled"#));
    }
}
