use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sanity2site::config::Commands::*;
use sanity2site::config::*;
use sanity2site::image_url::ImageUrlBuilder;
use sanity2site::sanity::{ContentSource, SanityClient, StaticSource};
use sanity2site::server::{self, AppState};
use sanity2site::publish;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sanity2site=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = RootCommand::read();
    let site = SiteConfig::read(&args.config)?;
    let sanity = SanityConfig::from_env().context("Failed to load Sanity configuration")?;

    let source: Arc<dyn ContentSource> = match &args.posts {
        Some(path) => Arc::new(StaticSource::read(path)?),
        None => Arc::new(SanityClient::new(&sanity)?),
    };
    let images = ImageUrlBuilder::new(&sanity.project_id, &sanity.dataset);

    match args.command {
        Serve => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(server::serve(AppState::new(source, images, site)))?;
        }

        Publish { out } => {
            let out_dir = out.unwrap_or_else(|| site.output_dir.clone());

            // Post pages are rendered in parallel, each one waiting on its own content fetch.
            rayon::ThreadPoolBuilder::new()
                .num_threads(site.concurrency.unwrap_or(8))
                .build()?
                .install(|| publish::publish(source.as_ref(), &images, &site, &out_dir))?;
        }
    }

    Ok(())
}
