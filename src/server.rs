//! HTTP delivery of the site.
//!
//! Page bodies are cached for `revalidate_secs`, then rendered again from fresh content on the
//! next request. The shell is applied on every response, since it depends on the theme cookie.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{Extension, Form, Path};
use axum::http::header::{COOKIE, LOCATION, REFERER, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::cache::PageCache;
use crate::config::SiteConfig;
use crate::html::{html_rules, Markup};
use crate::image_url::ImageUrlBuilder;
use crate::pages::{self, Page, PostPage};
use crate::render::RuleTable;
use crate::sanity::ContentSource;
use crate::shell::{theme_cookie, theme_from_cookie, Layout, Theme};

/// Requests for this slug come from browsers looking for a site icon, not from post links.
const RESERVED_SLUG: &str = "favicon.ico";

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn ContentSource>,
    pub images: ImageUrlBuilder,
    pub rules: Arc<RuleTable<Markup>>,
    pub site: Arc<SiteConfig>,
    pub cache: Arc<PageCache<(StatusCode, Page)>>,
}

impl AppState {
    pub fn new(source: Arc<dyn ContentSource>, images: ImageUrlBuilder, site: SiteConfig) -> Self {
        AppState {
            source,
            rules: Arc::new(html_rules(&images)),
            images,
            cache: Arc::new(PageCache::with_max_entries(
                Duration::from_secs(site.revalidate_secs),
                site.cache_max_entries,
            )),
            site: Arc::new(site),
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/about", get(about_handler))
        .route("/posts/:slug", get(post_handler))
        .route("/favicon.ico", get(|| async { StatusCode::NOT_FOUND }))
        .route("/theme", post(theme_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = state.site.listen.clone();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Serving site on http://{}", addr);
    axum::serve(listener, build_app(state)).await.context("Server error")?;
    Ok(())
}

//-------------------------------------------------------------------------------------------------
// Handlers

async fn home_handler(Extension(state): Extension<AppState>, headers: HeaderMap) -> Response {
    let result = state.cache.try_get_with("/", async {
        let page = pages::home_page(state.source.as_ref(), &state.images, &state.site).await?;
        anyhow::Ok((StatusCode::OK, page))
    }).await;

    respond(&state, &headers, result)
}

async fn about_handler(Extension(state): Extension<AppState>, headers: HeaderMap) -> Response {
    respond(&state, &headers, Ok((StatusCode::OK, pages::about_page(&state.site))))
}

async fn post_handler(
    Extension(state): Extension<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Response {
    if slug == RESERVED_SLUG {
        return StatusCode::NOT_FOUND.into_response();
    }

    let key = format!("/posts/{}", slug);
    let result = state.cache.try_get_with(&key, async {
        let page = pages::post_page(state.source.as_ref(), &state.images, &state.rules, &slug).await?;
        anyhow::Ok(match page {
            PostPage::Found(page) => (StatusCode::OK, page),
            PostPage::NotFound => (StatusCode::NOT_FOUND, pages::not_found_page(&slug)),
        })
    }).await;

    respond(&state, &headers, result)
}

#[derive(Deserialize)]
struct ThemeForm {
    theme: Option<String>,
}

async fn theme_handler(headers: HeaderMap, Form(form): Form<ThemeForm>) -> Response {
    let theme = form.theme.and_then(|t| t.parse::<Theme>().ok()).unwrap_or_default();
    let target = redirect_target(headers.get(REFERER).and_then(|v| v.to_str().ok()));

    (
        StatusCode::SEE_OTHER,
        [(SET_COOKIE, theme_cookie(theme)), (LOCATION, target)],
    ).into_response()
}

/// Where to go back after changing the theme. Only local paths are followed.
fn redirect_target(referer: Option<&str>) -> String {
    let path = match referer {
        Some(r) if r.starts_with('/') && !r.starts_with("//") => Some(r.to_string()),
        Some(r) => url::Url::parse(r).ok().map(|url| match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        }),
        None => None,
    };
    path.unwrap_or_else(|| "/".to_string())
}

fn respond(state: &AppState, headers: &HeaderMap, result: anyhow::Result<(StatusCode, Page)>) -> Response {
    let (status, page) = result.unwrap_or_else(|err| {
        error!("Failed to render page: {:#}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, pages::error_page())
    });

    let theme = theme_from_cookie(headers.get(COOKIE).and_then(|v| v.to_str().ok()));
    let html = Layout::new(&state.site, theme).wrap(&page);

    (status, Html(html.into_string())).into_response()
}
