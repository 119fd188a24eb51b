use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::SiteConfig;
use crate::html::html_rules;
use crate::image_url::ImageUrlBuilder;
use crate::pages::{self, Page, PostPage};
use crate::sanity::ContentSource;
use crate::shell::Layout;

/// Renders the whole site to static files in `out_dir`:
/// `index.html`, `about/index.html`, `posts/<slug>/index.html` and `404.html`.
///
/// Posts are rendered in parallel on the current rayon thread pool.
pub fn publish(source: &dyn ContentSource, images: &ImageUrlBuilder, site: &SiteConfig, out_dir: &Path) -> Result<()> {

    // Build a tokio runtime to call async content fetches.
    let rt = tokio::runtime::Runtime::new()?;
    let _guard = rt.enter();

    let layout = Layout::for_static_site(site);
    let rules = html_rules(images);

    //----- Home, about and not found

    info!("Loading post list.");
    let summaries = rt.block_on(source.fetch_post_list())?;

    write_page(&layout, &pages::render_home(&summaries, images, site), &out_dir.join("index.html"))?;
    write_page(&layout, &pages::about_page(site), &out_dir.join("about/index.html"))?;
    write_page(&layout, &pages::missing_page(), &out_dir.join("404.html"))?;

    //----- Posts

    summaries.into_par_iter()
        .map(|summary| {
            let slug = match &summary.slug {
                Some(slug) if is_safe_path_segment(slug.as_str()) => slug.as_str().to_string(),
                _ => {
                    warn!("Skipping '{}' (missing or unusable slug)", summary.title);
                    return Ok(());
                }
            };

            let _guard = rt.enter();
            let page = tokio::runtime::Handle::current()
                .block_on(pages::post_page(source, images, &rules, &slug))
                .with_context(|| format!("Failed to render post '{}'", slug))?;

            match page {
                PostPage::Found(page) => write_page(&layout, &page, &out_dir.join("posts").join(&slug).join("index.html")),
                PostPage::NotFound => {
                    // Deleted between the two queries
                    warn!("Skipping '{}' (not found)", slug);
                    Ok(())
                }
            }
        })
        .collect::<anyhow::Result<Vec<()>>>()?;

    Ok(())
}

fn write_page(layout: &Layout, page: &Page, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Cannot create {:?}", parent))?;
    }

    info!("Writing {:?}", path);
    fs::write(path, layout.wrap(page).as_str()).with_context(|| format!("Cannot write to {:?}", path))?;
    Ok(())
}

/// A slug becomes a directory name: it must stay within the output directory.
fn is_safe_path_segment(slug: &str) -> bool {
    !slug.is_empty()
        && slug != "."
        && slug != ".."
        && slug != "favicon.ico"
        && !slug.contains(['/', '\\'])
}
