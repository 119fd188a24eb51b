//! Site pages, composed from posts fetched from a [`ContentSource`].
//!
//! Pages only produce their body: the [shell](crate::shell) adds navigation and footer.

use indoc::formatdoc;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use crate::config::SiteConfig;
use crate::html::{element, render_html, void_element, Markup};
use crate::image_url::{build_image_url, FitMode, ImageUrlBuilder};
use crate::portable_text::{Post, PostSummary};
use crate::render::RuleTable;
use crate::sanity::ContentSource;

#[derive(Debug, Clone)]
pub struct Page {
    pub title: String,
    pub description: Option<String>,
    pub body: Markup,
}

#[derive(Debug, Clone)]
pub enum PostPage {
    Found(Page),
    NotFound,
}

//-------------------------------------------------------------------------------------------------
// Home

pub async fn home_page(source: &dyn ContentSource, images: &ImageUrlBuilder, site: &SiteConfig) -> anyhow::Result<Page> {
    let posts = source.fetch_post_list().await?;
    Ok(render_home(&posts, images, site))
}

/// The home page for an already fetched post list.
pub fn render_home(posts: &[PostSummary], images: &ImageUrlBuilder, site: &SiteConfig) -> Page {
    let cards = posts
        .iter()
        .filter_map(|post| match &post.slug {
            Some(slug) => Some(post_card(post, slug.as_str(), images)),
            None => {
                warn!("Skipping post '{}' with no slug", post.title);
                None
            }
        })
        .collect::<Vec<_>>();

    let body = Markup::concat([
        hero(site),
        element("section", &[("class", "projects")], [
            element("h2", &[("class", "section-title")], [Markup::text("My Projects")]),
            element("div", &[("class", "card-grid")], cards),
        ]),
        contact(site),
    ]);

    Page {
        title: site.site_title.clone(),
        description: Some(site.site_description.clone()),
        body,
    }
}

fn hero(site: &SiteConfig) -> Markup {
    let initials: String = site.author.split_whitespace().filter_map(|w| w.chars().next()).take(2).collect();

    element("section", &[("class", "hero")], [
        element("div", &[("class", "avatar")], [Markup::text(&initials)]),
        element("h1", &[], [Markup::text(&format!("Hi, I am {}", site.author))]),
        element("p", &[("class", "tagline")], [Markup::text(&site.tagline)]),
        badges(&site.skills),
    ])
}

fn contact(site: &SiteConfig) -> Markup {
    let mut links = Vec::new();
    if let Some(email) = &site.email {
        links.push(element("a", &[("class", "button"), ("href", &format!("mailto:{}", email))], [Markup::text("Email Me")]));
    }
    if let Some(url) = &site.github_url {
        links.push(element("a", &[("class", "button outline"), ("href", url), ("target", "_blank")], [Markup::text("GitHub")]));
    }
    if let Some(url) = &site.linkedin_url {
        links.push(element("a", &[("class", "button outline"), ("href", url), ("target", "_blank")], [Markup::text("LinkedIn")]));
    }

    element("section", &[("class", "contact")], [
        element("h2", &[("class", "section-title")], [Markup::text("Get in Touch")]),
        element("p", &[], [Markup::text("Interested in collaborating or hiring? Reach out!")]),
        element("div", &[("class", "contact-links")], links),
    ])
}

fn post_card(post: &PostSummary, slug: &str, images: &ImageUrlBuilder) -> Markup {
    let thumbnail = post.thumbnail.as_ref().and_then(|thumb| {
        build_image_url(images, thumb, 400, 225, FitMode::Crop, None)
            .map_err(|err| warn!("Bad thumbnail for post '{}': {:#}", slug, err))
            .ok()
    });

    let header = match thumbnail {
        Some(src) => void_element("img", &[
            ("src", &src),
            ("alt", &post.title),
            ("width", "400"),
            ("height", "225"),
            ("class", "card-thumbnail"),
        ]),
        None => element("div", &[("class", "card-placeholder")], [
            element("p", &[], [Markup::text("No thumbnail available")]),
        ]),
    };

    let mut content = vec![element("h3", &[("class", "card-title")], [Markup::text(&post.title)])];
    if let Some(summary) = &post.summary {
        content.push(element("p", &[("class", "card-summary")], [Markup::text(summary)]));
    }
    if !post.tech_stack.is_empty() {
        content.push(badges(&post.tech_stack));
    }

    element(
        "a",
        &[("href", &post_href(slug)), ("class", "card-link"), ("aria-label", &format!("Read more about {}", post.title))],
        [element("article", &[("class", "card")], [
            header,
            element("div", &[("class", "card-content")], content),
            element("div", &[("class", "card-footer")], [Markup::raw("Read More &rarr;")]),
        ])],
    )
}

fn badges(items: &[String]) -> Markup {
    element("div", &[("class", "badges")], items.iter().map(|item| element("span", &[("class", "badge")], [Markup::text(item)])))
}

/// Link to a post page. Slugs are URL-safe by construction, but let's not trust it.
pub fn post_href(slug: &str) -> String {
    format!("/posts/{}", urlencoding::encode(slug))
}

//-------------------------------------------------------------------------------------------------
// Post

pub async fn post_page(
    source: &dyn ContentSource,
    images: &ImageUrlBuilder,
    rules: &RuleTable<Markup>,
    slug: &str,
) -> anyhow::Result<PostPage> {
    match source.fetch_post_by_slug(slug).await? {
        Some(post) => Ok(PostPage::Found(render_post(&post, images, rules))),
        None => Ok(PostPage::NotFound),
    }
}

fn render_post(post: &Post, images: &ImageUrlBuilder, rules: &RuleTable<Markup>) -> Page {
    let mut header = Vec::new();

    if let Some(thumb) = &post.thumbnail {
        match build_image_url(images, thumb, 200, 200, FitMode::Crop, Some(80)) {
            Ok(src) => {
                let alt = thumb.alt.clone().unwrap_or_else(|| format!("{} thumbnail", post.title));
                header.push(void_element("img", &[
                    ("src", &src),
                    ("alt", &alt),
                    ("width", "200"),
                    ("height", "200"),
                    ("loading", "lazy"),
                    ("class", "post-thumbnail"),
                ]));
            }
            Err(err) => warn!("Bad thumbnail for post '{}': {:#}", post.slug.as_str(), err),
        }
    }
    header.push(element("h1", &[("class", "post-title")], [Markup::text(&post.title)]));
    if !post.tech_stack.is_empty() {
        header.push(badges(&post.tech_stack));
    }

    let mut content = Vec::new();
    if let Some(video_id) = post.video_url.as_deref().and_then(youtube_video_id) {
        content.push(element("div", &[("class", "video")], [element(
            "iframe",
            &[
                ("src", &format!("https://www.youtube.com/embed/{}", video_id)),
                ("title", &format!("YouTube video player for {}", post.title)),
                ("allow", "accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture"),
                ("allowfullscreen", "allowfullscreen"),
                ("loading", "lazy"),
            ],
            [],
        )]));
    }
    content.push(element("div", &[("class", "prose")], [render_html(&post.description, rules)]));

    let body = Markup::concat([
        element("a", &[("href", "/"), ("class", "back-link")], [Markup::raw("&larr; Back to Home")]),
        element("article", &[("class", "card post")], [
            element("header", &[("class", "post-header")], header),
            element("div", &[("class", "post-content")], content),
        ]),
    ]);

    Page {
        title: post.title.clone(),
        description: post.summary.clone(),
        body,
    }
}

lazy_static! {
    static ref YOUTUBE_ID_RE: Regex =
        Regex::new(r"^.*(youtu\.be/|v/|u/\w/|embed/|watch\?v=|&v=)([^#&?]*).*").unwrap();
}

/// Extracts the video id from a YouTube sharing, watch or embed URL. Ids are 11 chars long.
pub fn youtube_video_id(url: &str) -> Option<&str> {
    YOUTUBE_ID_RE.captures(url)
        .and_then(|captures| captures.get(2))
        .map(|m| m.as_str())
        .filter(|id| id.len() == 11)
}

//-------------------------------------------------------------------------------------------------
// Static pages

pub fn about_page(site: &SiteConfig) -> Page {
    let author = Markup::text(&site.author);
    let body = formatdoc! {r#"
        <div class="about">
        <h1>About Me</h1>
        <section>
        <p>Hi, I'm {author}, a developer building interactive web apps with TypeScript, Next.js,
        React, Rust and more. With a background in front-end development, I've created projects
        ranging from dynamic portfolios to AI-integrated applications. I'm driven by clean code,
        intuitive user experiences, and the potential of emerging technologies.</p>
        </section>
        <section>
        <h2>My Journey into Development</h2>
        <p>I first discovered coding during my fourth year of university, taking an introductory
        course purely for enjoyment. It sparked something, but at the time I was set on pursuing
        medicine. That curiosity lingered until two years ago, when I committed fully. Starting
        with JavaScript fundamentals, I progressed to frameworks like React and Next.js, using
        Tailwind for efficient styling and TypeScript for robust, scalable code.</p>
        </section>
        <section>
        <h2>What Makes Me Stand Out</h2>
        <p>Beyond code, I thrive on personal growth and diverse experiences. I completed a 10-week
        improv class, which sharpened my quick thinking and creativity, skills I now apply to
        problem-solving in tech.</p>
        </section>
        <section>
        <h2>What's Next</h2>
        <p>I'm always working on new projects. Check out the <a href="/">projects page</a> to see
        what I've been building lately.</p>
        </section>
        </div>
    "#, author = author};

    Page {
        title: format!("About {} | Developer Portfolio", site.author),
        description: Some(format!("Learn more about {}'s journey as a developer, passions, and upcoming projects.", site.author)),
        body: Markup::raw(body),
    }
}

pub fn not_found_page(slug: &str) -> Page {
    Page {
        title: "Post not found".to_string(),
        description: None,
        body: element("div", &[("class", "not-found")], [
            element("h1", &[], [Markup::text("Post not found")]),
            element("p", &[], [Markup::text(&format!("There is no post at '{}'.", slug))]),
            element("a", &[("href", "/"), ("class", "back-link")], [Markup::raw("&larr; Back to Home")]),
        ]),
    }
}

/// Static site 404 page, served for any missing path.
pub fn missing_page() -> Page {
    Page {
        title: "Page not found".to_string(),
        description: None,
        body: element("div", &[("class", "not-found")], [
            element("h1", &[], [Markup::text("Page not found")]),
            element("p", &[], [Markup::text("The page you are looking for does not exist.")]),
            element("a", &[("href", "/"), ("class", "back-link")], [Markup::raw("&larr; Back to Home")]),
        ]),
    }
}

/// Shown when content could not be fetched. No partial content is displayed.
pub fn error_page() -> Page {
    Page {
        title: "Something went wrong".to_string(),
        description: None,
        body: element("div", &[("class", "not-found")], [
            element("h1", &[], [Markup::text("Something went wrong")]),
            element("p", &[], [Markup::text("This page could not be loaded. Please try again in a moment.")]),
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::html_rules;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use scraper::{Html, Selector};
    use serde_json::json;
    use std::sync::Mutex;

    /// Returns canned posts and records requested slugs.
    struct MockSource {
        posts: Vec<Post>,
        summaries: Vec<PostSummary>,
        fail: bool,
        slug_calls: Mutex<Vec<String>>,
    }

    impl MockSource {
        fn new(posts: serde_json::Value) -> Self {
            let posts: Vec<Post> = serde_json::from_value(posts).unwrap();
            let summaries = posts.iter().map(PostSummary::from).collect();
            MockSource { posts, summaries, fail: false, slug_calls: Mutex::new(Vec::new()) }
        }

        fn with_summaries(mut self, summaries: serde_json::Value) -> Self {
            self.summaries = serde_json::from_value(summaries).unwrap();
            self
        }

        fn failing() -> Self {
            MockSource { fail: true, ..MockSource::new(json!([])) }
        }
    }

    #[async_trait]
    impl ContentSource for MockSource {
        async fn fetch_post_list(&self) -> anyhow::Result<Vec<PostSummary>> {
            if self.fail {
                return Err(anyhow!("connection refused"));
            }
            Ok(self.summaries.clone())
        }

        async fn fetch_post_by_slug(&self, slug: &str) -> anyhow::Result<Option<Post>> {
            self.slug_calls.lock().unwrap().push(slug.to_string());
            if self.fail {
                return Err(anyhow!("connection refused"));
            }
            Ok(self.posts.iter().find(|p| p.slug.as_str() == slug).cloned())
        }
    }

    fn images() -> ImageUrlBuilder {
        ImageUrlBuilder::new("proj", "production")
    }

    fn select<'a>(html: &'a Html, selector: &str) -> Vec<scraper::ElementRef<'a>> {
        html.select(&Selector::parse(selector).unwrap()).collect()
    }

    fn sample_post() -> serde_json::Value {
        json!({
            "title": "Rust & Sanity",
            "slug": { "_type": "slug", "current": "rust-sanity" },
            "summary": "A site in Rust",
            "description": [
                { "_type": "block", "style": "h2", "children": [{ "_type": "span", "text": "Launch" }] },
                { "_type": "block", "style": "normal", "children": [{ "_type": "span", "text": "Done." }] }
            ],
            "videoUrl": "https://www.youtube.com/watch?v=abc12345678",
            "techStack": ["Rust", "axum"],
            "thumbnail": { "asset": { "_ref": "image-abc-2000x1000-jpg" } }
        })
    }

    #[test]
    fn test_youtube_video_id() {
        assert_eq!(Some("abc12345678"), youtube_video_id("https://www.youtube.com/watch?v=abc12345678"));
        assert_eq!(Some("dQw4w9WgXcQ"), youtube_video_id("https://youtu.be/dQw4w9WgXcQ"));
        assert_eq!(Some("dQw4w9WgXcQ"), youtube_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ?start=3"));
        assert_eq!(Some("dQw4w9WgXcQ"), youtube_video_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ"));
        assert_eq!(None, youtube_video_id("https://vimeo.com/123456789"));
        assert_eq!(None, youtube_video_id("https://www.youtube.com/watch?v=short"));
    }

    #[test]
    fn test_post_href() {
        assert_eq!("/posts/rust-sanity", post_href("rust-sanity"));
        assert_eq!("/posts/a%20b%2Fc", post_href("a b/c"));
    }

    #[tokio::test]
    async fn test_home_page() -> anyhow::Result<()> {
        let source = MockSource::new(json!([])).with_summaries(json!([
            { "title": "With thumbnail", "slug": { "current": "one" }, "summary": "First", "techStack": ["Rust"],
              "thumbnail": { "asset": { "_ref": "image-abc-2000x1000-jpg" } } },
            { "title": "No thumbnail", "slug": "two", "techStack": null },
            { "title": "Draft", "slug": null }
        ]));

        let page = home_page(&source, &images(), &SiteConfig::default()).await?;
        let html = Html::parse_fragment(page.body.as_str());

        let cards = select(&html, "a.card-link");
        assert_eq!(2, cards.len());
        assert_eq!(Some("/posts/one"), cards[0].value().attr("href"));
        assert_eq!(Some("/posts/two"), cards[1].value().attr("href"));

        let thumbnails = select(&html, "img.card-thumbnail");
        assert_eq!(1, thumbnails.len());
        assert_eq!(
            Some("https://cdn.sanity.io/images/proj/production/abc-2000x1000.jpg?rect=111,0,1778,1000&w=400&h=225&fit=crop"),
            thumbnails[0].value().attr("src")
        );
        assert_eq!(1, select(&html, ".card-placeholder").len());

        // Only the first card has a badge row, next to the hero's skills
        assert_eq!(1, select(&html, ".card .badges").len());
        Ok(())
    }

    #[tokio::test]
    async fn test_thumbnail_without_asset_uses_placeholder() -> anyhow::Result<()> {
        let source = MockSource::new(json!([])).with_summaries(json!([
            { "title": "Good", "slug": "good", "thumbnail": { "asset": { "_ref": "image-abc-2000x1000-jpg" } } },
            { "title": "Removed asset", "slug": "removed",
              "thumbnail": { "_type": "image", "hotspot": { "x": 0.5, "y": 0.5, "width": 1, "height": 1 } } }
        ]));

        let page = home_page(&source, &images(), &SiteConfig::default()).await?;
        let html = Html::parse_fragment(page.body.as_str());

        assert_eq!(2, select(&html, "a.card-link").len());
        assert_eq!(1, select(&html, "a[href='/posts/good'] img.card-thumbnail").len());
        assert_eq!(1, select(&html, "a[href='/posts/removed'] .card-placeholder").len());
        Ok(())
    }

    #[tokio::test]
    async fn test_home_page_fetch_failure() {
        let result = home_page(&MockSource::failing(), &images(), &SiteConfig::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_post_page() -> anyhow::Result<()> {
        let source = MockSource::new(json!([sample_post()]));
        let rules = html_rules(&images());

        let page = match post_page(&source, &images(), &rules, "rust-sanity").await? {
            PostPage::Found(page) => page,
            PostPage::NotFound => panic!("post should be found"),
        };
        assert_eq!("Rust & Sanity", page.title);

        let html = Html::parse_fragment(page.body.as_str());
        assert_eq!(1, select(&html, ".prose h2").len());
        assert_eq!(1, select(&html, ".prose p").len());
        assert_eq!(2, select(&html, ".badge").len());

        let iframe = select(&html, ".video iframe");
        assert_eq!(Some("https://www.youtube.com/embed/abc12345678"), iframe[0].value().attr("src"));

        let thumb = select(&html, "img.post-thumbnail");
        assert_eq!(Some("Rust & Sanity thumbnail"), thumb[0].value().attr("alt"));
        assert!(thumb[0].value().attr("src").unwrap().ends_with("&w=200&h=200&q=80&fit=crop"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unrecognized_video_url_is_suppressed() -> anyhow::Result<()> {
        let mut post = sample_post();
        post["videoUrl"] = json!("https://vimeo.com/123456789");
        post["thumbnail"] = json!({ "asset": { "_ref": "garbage" } });
        let source = MockSource::new(json!([post]));

        let page = match post_page(&source, &images(), &html_rules(&images()), "rust-sanity").await? {
            PostPage::Found(page) => page,
            PostPage::NotFound => panic!("post should be found"),
        };

        let html = Html::parse_fragment(page.body.as_str());
        assert!(select(&html, "iframe").is_empty());
        assert!(select(&html, "img").is_empty());
        assert_eq!(1, select(&html, "h1.post-title").len());
        Ok(())
    }

    #[tokio::test]
    async fn test_post_with_images_without_asset() -> anyhow::Result<()> {
        let mut post = sample_post();
        post["thumbnail"] = json!({ "_type": "image", "hotspot": { "x": 0.5, "y": 0.5, "width": 1, "height": 1 } });
        post["description"].as_array_mut().unwrap().push(json!({ "_type": "image", "alt": "Gone" }));
        let source = MockSource::new(json!([post]));

        let page = match post_page(&source, &images(), &html_rules(&images()), "rust-sanity").await? {
            PostPage::Found(page) => page,
            PostPage::NotFound => panic!("post should be found"),
        };

        let html = Html::parse_fragment(page.body.as_str());
        assert!(select(&html, "img").is_empty());
        assert_eq!(1, select(&html, ".prose h2").len());
        assert_eq!(1, select(&html, ".prose p").len());
        Ok(())
    }

    #[tokio::test]
    async fn test_post_not_found() -> anyhow::Result<()> {
        let source = MockSource::new(json!([sample_post()]));

        let page = post_page(&source, &images(), &html_rules(&images()), "does-not-exist").await?;
        assert!(matches!(page, PostPage::NotFound));
        assert_eq!(vec!["does-not-exist".to_string()], *source.slug_calls.lock().unwrap());

        assert!(not_found_page("does-not-exist").body.as_str().contains("Post not found"));
        Ok(())
    }

    #[test]
    fn test_about_page() {
        let page = about_page(&SiteConfig { author: "Jane <Doe>".to_string(), ..SiteConfig::default() });
        assert!(page.body.as_str().contains("Hi, I'm Jane &lt;Doe&gt;"));
        assert_eq!("About Jane <Doe> | Developer Portfolio", page.title);
    }
}
