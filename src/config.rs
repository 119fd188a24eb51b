use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::{Path, PathBuf};

//----- Command line parameters

/// Portfolio website rendered from Sanity content
#[derive(Parser, Debug)]
#[clap(version)]
pub struct RootCommand {
    /// Path to the config file
    #[clap(global = true, long, default_value = "sanity2site.yml")]
    pub config: PathBuf,

    /// Read posts from a JSON export instead of querying Sanity
    #[clap(global = true, long)]
    pub posts: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

impl RootCommand {
    // Avoids importing Parser in main
    pub fn read() -> RootCommand {
        RootCommand::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the site, rendering pages on request
    Serve,

    /// Render all pages to a static site directory
    Publish {
        /// Output directory (overrides `output_dir` in the config file)
        #[clap(long)]
        out: Option<PathBuf>,
    },
}

//----- Config file

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SiteConfig {
    pub site_title: String,
    pub site_description: String,
    pub site_url: String,
    pub author: String,
    pub tagline: String,
    pub skills: Vec<String>,
    pub email: Option<String>,
    pub github_url: Option<String>,
    pub linkedin_url: Option<String>,
    pub listen: String,
    /// How long a rendered page can be served before its content is fetched again
    pub revalidate_secs: u64,
    /// Maximum number of rendered pages kept in the cache
    pub cache_max_entries: u64,
    pub output_dir: PathBuf,
    pub concurrency: Option<usize>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            site_title: "Joshua Singarayer's Portfolio".to_string(),
            site_description: "Showcasing projects built with TypeScript, Rust, and more. Available for hire.".to_string(),
            site_url: "https://joshthejourneyman.netlify.app/".to_string(),
            author: "Joshua Singarayer".to_string(),
            tagline: "A developer passionate about building interactive web apps. Check out my projects below!".to_string(),
            skills: vec!["TypeScript".to_string(), "Next.js".to_string(), "Tailwind".to_string(), "Rust".to_string()],
            email: None,
            github_url: None,
            linkedin_url: None,
            listen: "127.0.0.1:3000".to_string(),
            revalidate_secs: 60,
            cache_max_entries: crate::cache::DEFAULT_MAX_ENTRIES,
            output_dir: "public".into(),
            concurrency: None,
        }
    }
}

impl SiteConfig {
    /// Reads the config file. A missing file yields the default config.
    pub fn read(path: &Path) -> anyhow::Result<SiteConfig> {
        if !path.exists() {
            tracing::info!("No config file at {:?}, using defaults", path);
            return Ok(SiteConfig::default());
        }
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let config = serde_yaml::from_reader(file).with_context(|| format!("Failed to read {:?}", path))?;
        Ok(config)
    }
}

//----- Environment

/// Identifies the Sanity project and dataset to read content from.
#[derive(Debug, Clone)]
pub struct SanityConfig {
    pub project_id: String,
    pub dataset: String,
    pub api_version: String,
    pub use_cdn: bool,
}

impl SanityConfig {
    /// Loads configuration from environment variables, and a `.env` file if present.
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Variables can also have the `NEXT_PUBLIC_` prefix, so that an existing `.env` file
    /// can be reused as is.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| {
            lookup(name)
                .or_else(|| lookup(&format!("NEXT_PUBLIC_{}", name)))
                .filter(|value| !value.trim().is_empty())
        };
        let required = |name: &str| var(name).ok_or_else(|| anyhow!("{} must be set", name));

        let use_cdn = match var("SANITY_USE_CDN") {
            None => true,
            Some(value) => value.parse::<bool>().with_context(|| format!("SANITY_USE_CDN must be true or false, got '{}'", value))?,
        };

        Ok(SanityConfig {
            project_id: required("SANITY_PROJECT_ID")?,
            dataset: required("SANITY_DATASET")?,
            api_version: required("SANITY_API_VERSION")?,
            use_cdn,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;

    #[test]
    fn test_sanity_config_from_env() -> anyhow::Result<()> {
        let env = hashmap! {
            "SANITY_PROJECT_ID" => "abc123",
            "NEXT_PUBLIC_SANITY_DATASET" => "production",
            "SANITY_API_VERSION" => "2024-01-01",
        };
        let config = SanityConfig::from_lookup(|name| env.get(name).map(|v| v.to_string()))?;

        assert_eq!("abc123", config.project_id);
        assert_eq!("production", config.dataset);
        assert!(config.use_cdn);
        Ok(())
    }

    #[test]
    fn test_missing_variable_is_an_error() {
        let env = hashmap! {
            "SANITY_PROJECT_ID" => "abc123",
            "SANITY_DATASET" => "",
            "SANITY_API_VERSION" => "2024-01-01",
        };
        let err = SanityConfig::from_lookup(|name| env.get(name).map(|v| v.to_string())).unwrap_err();
        assert_eq!("SANITY_DATASET must be set", err.to_string());
    }

    #[test]
    fn test_site_config_defaults() -> anyhow::Result<()> {
        let config: SiteConfig = serde_yaml::from_str("author: Jane Doe\nrevalidate_secs: 30\n")?;
        assert_eq!("Jane Doe", config.author);
        assert_eq!(30, config.revalidate_secs);
        assert_eq!("127.0.0.1:3000", config.listen);
        assert_eq!(1000, config.cache_max_entries);
        Ok(())
    }

    #[test]
    fn test_cli() {
        let args = RootCommand::parse_from(["sanity2site", "publish", "--out", "dist"]);
        assert_eq!(PathBuf::from("sanity2site.yml"), args.config);
        assert!(matches!(args.command, Commands::Publish { out: Some(ref out) } if out == Path::new("dist")));
    }
}
