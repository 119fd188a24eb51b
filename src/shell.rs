//! The page shell: document head, navigation bar, theme selector and footer.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use anyhow::bail;
use chrono::Datelike;
use indoc::{formatdoc, indoc};

use crate::config::SiteConfig;
use crate::html::{element, void_element, write_escaped_fmt, Markup};
use crate::pages::Page;

pub const THEME_COOKIE: &str = "theme";

/// A year, in seconds.
const THEME_COOKIE_MAX_AGE: u32 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub const ALL: [Theme; 3] = [Theme::Light, Theme::Dark, Theme::System];

    fn label(self) -> &'static str {
        match self {
            Theme::Light => "Light",
            Theme::Dark => "Dark",
            Theme::System => "System",
        }
    }
}

impl Display for Theme {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        })
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "light" => Theme::Light,
            "dark" => Theme::Dark,
            "system" => Theme::System,
            _ => bail!("Unknown theme '{}'", s),
        })
    }
}

/// Reads the theme preference from a `Cookie` request header. Missing or unknown values
/// fall back to the system theme.
pub fn theme_from_cookie(header: Option<&str>) -> Theme {
    header
        .into_iter()
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == THEME_COOKIE)
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or_default()
}

/// The `Set-Cookie` header value that persists a theme preference.
pub fn theme_cookie(theme: Theme) -> String {
    format!("{}={}; Path=/; Max-Age={}; SameSite=Lax", THEME_COOKIE, theme, THEME_COOKIE_MAX_AGE)
}

pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

//-------------------------------------------------------------------------------------------------

pub struct Layout<'a> {
    pub site: &'a SiteConfig,
    pub theme: Theme,
    /// Static pages have no server to post the theme form to.
    pub interactive: bool,
}

impl<'a> Layout<'a> {
    pub fn new(site: &'a SiteConfig, theme: Theme) -> Self {
        Layout { site, theme, interactive: true }
    }

    pub fn for_static_site(site: &'a SiteConfig) -> Self {
        Layout { site, theme: Theme::System, interactive: false }
    }

    /// Wraps a page body into a complete HTML document.
    pub fn wrap(&self, page: &Page) -> Markup {
        let site = self.site;
        let description = page.description.as_deref().unwrap_or(&site.site_description);

        let html = formatdoc! {r#"
            <!DOCTYPE html>
            <html lang="en" data-theme="{theme}">
            <head>
            <meta charset="utf-8">
            <meta name="viewport" content="width=device-width, initial-scale=1">
            <title>{title}</title>
            <meta name="description" content="{description}">
            <meta property="og:title" content="{og_title}">
            <meta property="og:description" content="{description}">
            <meta property="og:site_name" content="{site_name}">
            <meta property="og:url" content="{site_url}">
            <meta property="og:type" content="website">
            <link rel="icon" href="/favicon.ico">
            <style>
            {stylesheet}</style>
            </head>
            <body>
            {navbar}
            <main class="container">
            {body}
            </main>
            {footer}
            </body>
            </html>
            "#,
            theme = self.theme,
            title = Markup::text(&page.title),
            og_title = attr(&page.title),
            description = attr(description),
            site_name = attr(&site.site_title),
            site_url = attr(&site.site_url),
            stylesheet = STYLESHEET,
            navbar = self.navbar(),
            body = page.body,
            footer = footer(&site.author, current_year()),
        };

        Markup::raw(html)
    }

    fn navbar(&self) -> Markup {
        let mut items = vec![
            element("a", &[("href", "/"), ("class", "logo")], [Markup::text(&self.site.author)]),
            // The mobile menu is a checkbox hack: the label toggles the box, CSS shows the links
            void_element("input", &[("type", "checkbox"), ("id", "menu-toggle"), ("class", "menu-toggle")]),
            element("label", &[("for", "menu-toggle"), ("class", "menu-button"), ("aria-label", "Toggle menu")], [
                Markup::raw("&#9776;"),
            ]),
            element("nav", &[("class", "nav-links")], [
                element("a", &[("href", "/")], [Markup::text("Home")]),
                element("a", &[("href", "/about")], [Markup::text("About")]),
            ]),
        ];
        if self.interactive {
            items.push(self.theme_form());
        }

        element("header", &[("class", "navbar")], [element("div", &[("class", "container nav-inner")], items)])
    }

    fn theme_form(&self) -> Markup {
        let options = Theme::ALL.iter().map(|theme| {
            let value = theme.to_string();
            let selected = if *theme == self.theme { "selected" } else { "" };
            element("option", &[("value", &value), ("selected", selected)], [Markup::text(theme.label())])
        });

        element("form", &[("method", "post"), ("action", "/theme"), ("class", "theme-form")], [
            element("select", &[("name", "theme"), ("aria-label", "Theme")], options),
            element("button", &[("type", "submit")], [Markup::text("Apply")]),
        ])
    }
}

pub fn footer(author: &str, year: i32) -> Markup {
    element("footer", &[("class", "footer")], [element("p", &[], [
        Markup::raw(format!("&copy; {} ", year)),
        Markup::text(author),
        Markup::text(". Built with Rust and Sanity."),
    ])])
}

fn attr(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let _ = write_escaped_fmt(&mut result, value, true);
    result
}

const STYLESHEET: &str = indoc! {r#"
    :root, [data-theme="light"] {
      --bg: #ffffff; --fg: #0f172a; --muted: #64748b; --card: #f8fafc; --border: #e2e8f0; --accent: #2563eb;
    }
    [data-theme="dark"] {
      --bg: #0b1120; --fg: #e2e8f0; --muted: #94a3b8; --card: #111827; --border: #1f2937; --accent: #60a5fa;
    }
    @media (prefers-color-scheme: dark) {
      [data-theme="system"] {
        --bg: #0b1120; --fg: #e2e8f0; --muted: #94a3b8; --card: #111827; --border: #1f2937; --accent: #60a5fa;
      }
    }
    * { box-sizing: border-box; }
    body { margin: 0; font-family: system-ui, sans-serif; background: var(--bg); color: var(--fg); line-height: 1.6; }
    a { color: var(--accent); }
    .container { max-width: 64rem; margin: 0 auto; padding: 0 1rem; }
    .navbar { position: sticky; top: 0; background: var(--bg); border-bottom: 1px solid var(--border); z-index: 10; }
    .nav-inner { display: flex; align-items: center; gap: 1rem; height: 4rem; }
    .logo { font-weight: 700; text-decoration: none; color: var(--fg); margin-right: auto; }
    .nav-links { display: flex; gap: 1rem; }
    .nav-links a { color: var(--muted); text-decoration: none; }
    .menu-toggle, .menu-button { display: none; }
    @media (max-width: 640px) {
      .menu-button { display: block; cursor: pointer; font-size: 1.5rem; }
      .nav-links { display: none; position: absolute; top: 4rem; left: 0; right: 0; flex-direction: column; padding: 1rem; background: var(--bg); border-bottom: 1px solid var(--border); }
      .menu-toggle:checked ~ .nav-links { display: flex; }
    }
    .hero { text-align: center; padding: 4rem 0 2rem; }
    .avatar { width: 6rem; height: 6rem; margin: 0 auto 1rem; border-radius: 50%; background: var(--card); display: flex; align-items: center; justify-content: center; font-size: 2rem; }
    .tagline { color: var(--muted); }
    .section-title { text-align: center; }
    .card-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(18rem, 1fr)); gap: 1.5rem; }
    .card-link { text-decoration: none; color: inherit; }
    .card { background: var(--card); border: 1px solid var(--border); border-radius: 0.75rem; overflow: hidden; height: 100%; }
    .card-thumbnail { width: 100%; height: auto; display: block; }
    .card-placeholder { aspect-ratio: 16 / 9; display: flex; align-items: center; justify-content: center; color: var(--muted); }
    .card-content, .card-footer { padding: 0 1rem 1rem; }
    .card-summary { color: var(--muted); }
    .badges { display: flex; flex-wrap: wrap; gap: 0.5rem; justify-content: inherit; }
    .badge { font-size: 0.75rem; padding: 0.125rem 0.5rem; border-radius: 999px; border: 1px solid var(--border); }
    .contact { text-align: center; padding: 3rem 0; }
    .contact-links { display: flex; gap: 1rem; justify-content: center; }
    .button { padding: 0.5rem 1rem; border-radius: 0.5rem; background: var(--accent); color: var(--bg); text-decoration: none; }
    .button.outline { background: none; color: var(--accent); border: 1px solid var(--accent); }
    .back-link { display: inline-block; margin: 2rem 0 1rem; }
    .post { padding: 1.5rem; }
    .post-header { display: flex; flex-direction: column; align-items: center; gap: 1rem; }
    .post-thumbnail { border-radius: 0.5rem; }
    .video { position: relative; aspect-ratio: 16 / 9; margin: 1.5rem 0; }
    .video iframe { position: absolute; inset: 0; width: 100%; height: 100%; border: 0; }
    .prose figure { margin: 1.5rem 0; }
    .prose img { max-width: 100%; height: auto; }
    .prose blockquote { border-left: 4px solid var(--border); margin-left: 0; padding-left: 1rem; color: var(--muted); }
    .footer { text-align: center; color: var(--muted); padding: 2rem 0; border-top: 1px solid var(--border); margin-top: 3rem; }
"#};
