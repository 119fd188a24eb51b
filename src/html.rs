use std::fmt::{Display, Formatter, Write as FmtWrite};

use itertools::Itertools;

use crate::image_url::{FitMode, ImageUrlBuilder};
use crate::portable_text::Node;
use crate::render::{self, MarkValue, RuleTable};

/// A fragment of HTML that is safe for inclusion in a page: text content has been escaped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markup(String);

impl Markup {
    /// Trusted HTML, included verbatim.
    pub fn raw(html: impl Into<String>) -> Self {
        Markup(html.into())
    }

    /// Text, escaped.
    pub fn text(text: &str) -> Self {
        let mut html = String::with_capacity(text.len());
        // We write to a string, this never fails
        let _ = write_escaped_fmt(&mut html, text, false);
        Markup(html)
    }

    pub fn concat(parts: impl IntoIterator<Item = Markup>) -> Self {
        Markup(parts.into_iter().map(|m| m.0).join(""))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for Markup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Writes `text` with HTML special chars escaped. In attribute mode, quotes are escaped, and
/// `<` and `>` are left as is.
pub fn write_escaped_fmt(out: &mut impl FmtWrite, text: &str, attr_mode: bool) -> std::fmt::Result {
    let mut last = 0;
    for (i, c) in text.char_indices() {
        let escaped = match c {
            '&' => "&amp;",
            '\u{a0}' => "&nbsp;",
            '"' if attr_mode => "&quot;",
            '\'' if attr_mode => "&#39;",
            '<' if !attr_mode => "&lt;",
            '>' if !attr_mode => "&gt;",
            _ => continue,
        };
        out.write_str(&text[last..i])?;
        out.write_str(escaped)?;
        last = i + c.len_utf8();
    }
    out.write_str(&text[last..])
}

/// Builds an element. Attributes with an empty value are omitted.
pub fn element(tag: &str, attrs: &[(&str, &str)], children: impl IntoIterator<Item = Markup>) -> Markup {
    let mut html = String::new();
    html.push('<');
    html.push_str(tag);
    push_attrs(&mut html, attrs);
    html.push('>');
    for child in children {
        html.push_str(child.as_str());
    }
    html.push_str("</");
    html.push_str(tag);
    html.push('>');
    Markup(html)
}

/// Builds a void element such as `<img>` or `<input>`.
pub fn void_element(tag: &str, attrs: &[(&str, &str)]) -> Markup {
    let mut html = String::new();
    html.push('<');
    html.push_str(tag);
    push_attrs(&mut html, attrs);
    html.push('>');
    Markup(html)
}

fn push_attrs(html: &mut String, attrs: &[(&str, &str)]) {
    for (name, value) in attrs {
        if !value.is_empty() {
            html.push(' ');
            html.push_str(name);
            html.push_str("=\"");
            let _ = write_escaped_fmt(html, value, true);
            html.push('"');
        }
    }
}

//-------------------------------------------------------------------------------------------------
// Portable Text to HTML

/// Width of images embedded in a post's description.
const EMBEDDED_IMAGE_WIDTH: u32 = 800;

/// The rules used to render post descriptions.
pub fn html_rules(images: &ImageUrlBuilder) -> RuleTable<Markup> {
    let images = images.clone();

    let mut rules = RuleTable::new(Markup::text)
        .block("normal", |children, _| element("p", &[], children))
        .block("blockquote", |children, _| element("blockquote", &[], children))
        .list("bullet", |children, _| element("ul", &[], children))
        .list("number", |children, _| element("ol", &[], children))
        .list_item("bullet", |children, _| element("li", &[], children))
        .list_item("number", |children, _| element("li", &[], children))
        .mark("link", |children, value| {
            let href = match value {
                MarkValue::Annotation(def) => def.href().unwrap_or_default(),
                MarkValue::Decorator(_) => "",
            };
            // External links open in a new tab
            let (target, rel) = if href.starts_with("http") {
                ("_blank", "noindex nofollow")
            } else {
                ("", "")
            };
            element("a", &[("href", href), ("target", target), ("rel", rel)], children)
        })
        .embedded("image", move |node| match node {
            Node::Image(img) => match images.image(img).width(EMBEDDED_IMAGE_WIDTH).fit(FitMode::Max).url() {
                Ok(src) => element(
                    "figure",
                    &[],
                    [void_element("img", &[("src", &src), ("alt", img.alt.as_deref().unwrap_or_default()), ("loading", "lazy")])],
                ),
                Err(err) => {
                    tracing::warn!("Skipping embedded image: {:#}", err);
                    Markup::default()
                }
            },
            _ => Markup::default(),
        });

    for heading in ["h1", "h2", "h3", "h4"] {
        rules = rules.block(heading, move |children, _| element(heading, &[], children));
    }
    for decorator in ["strong", "em", "code"] {
        rules = rules.mark(decorator, move |children, _| element(decorator, &[], children));
    }

    rules
}

/// Renders a rich text document to an HTML string.
pub fn render_html(document: &[Node], rules: &RuleTable<Markup>) -> Markup {
    Markup::concat(render::render(document, rules))
}
