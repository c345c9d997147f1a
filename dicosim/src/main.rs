use std::path::PathBuf;

use argh::FromArgs;

use dicosim::scrape::ScrapeOptions;
use dicosim::{Config, jobs, scrape, server};

/// Semantic definition search over cached Le Robert dictionary pages.
#[derive(Debug, FromArgs)]
struct Opts {
    /// path to the configuration file
    #[argh(option, short = 'c', default = "String::from(\"dicosim.toml\")")]
    config: String,
    #[argh(subcommand)]
    command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Scrape(ScrapeOpts),
    Validate(ValidateOpts),
    Process(ProcessOpts),
    Index(IndexOpts),
    Embed(EmbedOpts),
    Serve(ServeOpts),
}

/// Download definition pages and media into the local cache.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "scrape")]
struct ScrapeOpts {
    /// file with one seed word path per line
    #[argh(option)]
    seeds: Option<PathBuf>,
    /// search term whose autocomplete suggestions seed the crawl (repeatable)
    #[argh(option)]
    search: Vec<String>,
    /// crawl the "Explorer le dictionnaire" listing for seeds
    #[argh(switch)]
    explore: bool,
    /// seed from the definition links of already-cached pages
    #[argh(switch)]
    follow_links: bool,
    /// also download audio and image media
    #[argh(switch)]
    media: bool,
}

/// Check that cached pages contain definitions and are correctly named.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "validate")]
struct ValidateOpts {}

/// Process cached pages and rebuild the word index.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "process")]
struct ProcessOpts {}

/// Rebuild the word index from the processed pages.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "index")]
struct IndexOpts {}

/// Compute example embeddings for every configured model.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "embed")]
struct EmbedOpts {}

/// Serve the query API and the web UI.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "serve")]
struct ServeOpts {}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let opts: Opts = argh::from_env();

    let config = Config::load(&opts.config)?;
    dicosim::tracing::try_init(&config.tracing)?;

    match opts.command {
        Command::Scrape(scrape_opts) => {
            let options = ScrapeOptions {
                seeds: scrape_opts.seeds,
                search: scrape_opts.search,
                explore: scrape_opts.explore,
                follow_links: scrape_opts.follow_links,
                media: scrape_opts.media,
            };
            scrape::run(&config, options).await?;
        }
        Command::Validate(_) => scrape::validate(&config).await?,
        Command::Process(_) => jobs::process_all(&config).await?,
        Command::Index(_) => jobs::rebuild_word_index(&config)?,
        Command::Embed(_) => jobs::embed_all(&config).await?,
        Command::Serve(_) => server::run(config).await?,
    }

    Ok(())
}
