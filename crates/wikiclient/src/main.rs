use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use wikiclient_core::api::{
    Client, NamespaceId, PageListOptions, ProtocolVersion, RedirectFilter, WikiApi,
};
use wikiclient_core::config::{WikiConfig, load_config};

#[derive(Debug, Parser)]
#[command(
    name = "wikiclient",
    version,
    about = "MediaWiki API client for 1.19-era and 1.31-era wikis"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "URL",
        help = "Wiki base URL (api.php and index.php live under it)"
    )]
    wiki_url: Option<String>,
    #[arg(
        long,
        global = true,
        value_name = "VERSION",
        help = "MediaWiki API generation: 1.19 or 1.31"
    )]
    mediawiki_version: Option<String>,
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Config file (default: wikiclient.toml)"
    )]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "List namespace ids (virtual namespaces excluded)")]
    Namespaces,
    #[command(about = "List every image as a JSON line")]
    Images(ImagesArgs),
    #[command(about = "List page titles in a namespace")]
    Pages(PagesArgs),
    #[command(about = "Print the raw text of a page")]
    Page(PageArgs),
    #[command(about = "Full-text search for page titles")]
    Search(SearchArgs),
    #[command(name = "deleted-revisions", about = "List deleted revisions as JSON lines")]
    DeletedRevisions(DeletedRevisionsArgs),
    #[command(about = "Replace the entire text of a page, creating it if absent")]
    Edit(EditArgs),
    #[command(about = "Delete a page")]
    Delete(DeleteArgs),
    #[command(about = "Verify the configured credentials")]
    Login,
}

#[derive(Debug, Args)]
struct ImagesArgs {
    #[arg(long, default_value_t = 500, help = "Page size per API request")]
    limit: u32,
}

#[derive(Debug, Args)]
struct PagesArgs {
    #[arg(help = "Namespace id to list")]
    namespace: NamespaceId,
    #[arg(long, default_value_t = 500, help = "Page size per API request")]
    limit: u32,
    #[arg(long, value_name = "TITLE", help = "Start from this title")]
    from: Option<String>,
    #[arg(long, default_value = "all", help = "all, redirects, or nonredirects")]
    filter: String,
}

#[derive(Debug, Args)]
struct PageArgs {
    title: String,
}

#[derive(Debug, Args)]
struct SearchArgs {
    query: String,
    #[arg(long, default_value_t = 0, help = "Namespace id to search in")]
    namespace: NamespaceId,
    #[arg(long, default_value_t = 500, help = "Page size per API request")]
    limit: u32,
}

#[derive(Debug, Args)]
struct DeletedRevisionsArgs {
    #[arg(long, default_value_t = 0, help = "Namespace id to list")]
    namespace: NamespaceId,
    #[arg(long, default_value_t = 500, help = "Page size per API request")]
    limit: u32,
}

#[derive(Debug, Args)]
struct EditArgs {
    title: String,
    #[arg(
        long,
        value_name = "PATH",
        conflicts_with = "text",
        help = "Read the new page text from a file"
    )]
    file: Option<PathBuf>,
    #[arg(long, help = "New page text")]
    text: Option<String>,
    #[arg(long, help = "Edit summary")]
    summary: Option<String>,
}

#[derive(Debug, Args)]
struct DeleteArgs {
    title: String,
    #[arg(long, help = "Deletion reason")]
    reason: Option<String>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("wikiclient.toml"));
    let config = load_config(&config_path)?;

    match &cli.command {
        Commands::Namespaces => run_namespaces(&cli, &config),
        Commands::Images(args) => run_images(&cli, &config, args),
        Commands::Pages(args) => run_pages(&cli, &config, args),
        Commands::Page(args) => run_page(&cli, &config, args),
        Commands::Search(args) => run_search(&cli, &config, args),
        Commands::DeletedRevisions(args) => run_deleted_revisions(&cli, &config, args),
        Commands::Edit(args) => run_edit(&cli, &config, args),
        Commands::Delete(args) => run_delete(&cli, &config, args),
        Commands::Login => run_login(&cli, &config),
    }
}

fn build_client(cli: &Cli, config: &WikiConfig) -> Result<Client> {
    let base_url = cli
        .wiki_url
        .clone()
        .or_else(|| config.wiki_url())
        .context("no wiki URL configured (use --wiki-url, WIKI_URL, or the config file)")?;
    let version = match &cli.mediawiki_version {
        Some(raw) => raw
            .parse::<ProtocolVersion>()
            .map_err(|message| anyhow!(message))?,
        None => config.protocol_version()?,
    };
    Ok(Client::new(version, &base_url, &config.http_options())?)
}

fn credentials() -> Option<(String, String)> {
    let username = env::var("WIKI_USERNAME").ok().filter(|v| !v.is_empty())?;
    let password = env::var("WIKI_PASSWORD").ok().filter(|v| !v.is_empty())?;
    Some((username, password))
}

/// Log in when credentials are configured; mutations on open wikis work
/// anonymously without them.
fn login_if_configured(client: &mut Client) -> Result<bool> {
    let Some((username, password)) = credentials() else {
        return Ok(false);
    };
    client.login(&username, &password)?;
    Ok(true)
}

fn run_namespaces(cli: &Cli, config: &WikiConfig) -> Result<()> {
    let mut client = build_client(cli, config)?;
    let namespaces = client.namespace_list()?;
    for id in &namespaces {
        println!("namespace: {id}");
    }
    println!("namespaces.count: {}", namespaces.len());
    Ok(())
}

fn run_images(cli: &Cli, config: &WikiConfig, args: &ImagesArgs) -> Result<()> {
    let mut client = build_client(cli, config)?;
    for image in client.image_list(args.limit) {
        let image = image?;
        println!("{}", serde_json::to_string(&image)?);
    }
    Ok(())
}

fn run_pages(cli: &Cli, config: &WikiConfig, args: &PagesArgs) -> Result<()> {
    let mut client = build_client(cli, config)?;
    let options = PageListOptions {
        first_page: args.from.clone(),
        redirect_filter: args
            .filter
            .parse::<RedirectFilter>()
            .map_err(|message| anyhow!(message))?,
    };
    for title in client.page_list(args.namespace, args.limit, &options) {
        println!("{}", title?);
    }
    Ok(())
}

fn run_page(cli: &Cli, config: &WikiConfig, args: &PageArgs) -> Result<()> {
    let mut client = build_client(cli, config)?;
    print!("{}", client.page_text(&args.title)?);
    Ok(())
}

fn run_search(cli: &Cli, config: &WikiConfig, args: &SearchArgs) -> Result<()> {
    let mut client = build_client(cli, config)?;
    for title in client.search_pages(&args.query, args.namespace, args.limit)? {
        println!("{}", title?);
    }
    Ok(())
}

fn run_deleted_revisions(cli: &Cli, config: &WikiConfig, args: &DeletedRevisionsArgs) -> Result<()> {
    let mut client = build_client(cli, config)?;
    for revision in client.deleted_revisions(args.namespace, args.limit) {
        let revision = revision?;
        println!("{}", serde_json::to_string(&revision)?);
    }
    Ok(())
}

fn run_edit(cli: &Cli, config: &WikiConfig, args: &EditArgs) -> Result<()> {
    let text = match (&args.file, &args.text) {
        (Some(path), None) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, Some(text)) => text.clone(),
        _ => bail!("either --text or --file is required"),
    };

    let mut client = build_client(cli, config)?;
    login_if_configured(&mut client)?;
    client.edit_page(&args.title, &text, args.summary.as_deref())?;
    println!("edited: {}", args.title);
    println!("requests: {}", client.request_count());
    Ok(())
}

fn run_delete(cli: &Cli, config: &WikiConfig, args: &DeleteArgs) -> Result<()> {
    let mut client = build_client(cli, config)?;
    login_if_configured(&mut client)?;
    client.delete_page(&args.title, args.reason.as_deref())?;
    println!("deleted: {}", args.title);
    println!("requests: {}", client.request_count());
    Ok(())
}

fn run_login(cli: &Cli, config: &WikiConfig) -> Result<()> {
    let mut client = build_client(cli, config)?;
    if !login_if_configured(&mut client)? {
        bail!("WIKI_USERNAME and WIKI_PASSWORD must be set");
    }
    println!("login: success");
    println!("mediawiki_version: {}", client.version());
    Ok(())
}
