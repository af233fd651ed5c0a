use clap::{Parser, Subcommand};
use folio::collection::CollectionType;
use folio::{config, loader, output, registry::Registry, render};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

/// Env var holding a tracing filter, e.g. `FOLIO_LOG=folio=debug`.
const LOG_ENV: &str = "FOLIO_LOG";

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Typed content collections for Markdown blogs")]
#[command(long_about = "\
Typed content collections for Markdown blogs

Every directory under the content root is a collection. Content collections
hold Markdown/MDX posts with YAML front-matter; data collections hold JSON or
YAML records. Each entry is validated against its collection's schema from
folio.toml, and an invalid entry fails the whole run.

Project structure:

  blog/
  ├── folio.toml                     # Site config and collection schemas
  └── src/content/
      ├── post/                      # Content collection
      │   ├── feature-flags/
      │   │   ├── index.mdx          # slug: feature-flags
      │   │   └── cover.svg          # Image referenced from front-matter
      │   ├── ci-with-dagger.md      # slug: ci-with-dagger
      │   └── _template.mdx          # Leading _ or . = ignored
      └── author/                    # Data collection
          └── ldamore.json           # id: ldamore

Slugs come from the file path (index files take their directory name) unless
the front-matter sets `slug`.

Run 'folio gen-config' to generate a documented folio.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Project directory containing folio.toml
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Show debug logs (overridden by FOLIO_LOG)
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show errors (overridden by FOLIO_LOG)
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate all content and write .folio/manifest.json
    Sync,
    /// Validate all content without writing anything
    Check,
    /// List the entries of a collection
    List {
        collection: String,
        /// Include entries whose front-matter sets `draft: true`
        #[arg(long)]
        drafts: bool,
    },
    /// Print one entry as JSON, by slug (content) or id (data)
    Get { collection: String, key: String },
    /// Render a content entry's body to HTML
    Render { collection: String, slug: String },
    /// Print the resolved configuration (stock defaults + folio.toml)
    Config,
    /// Print a stock folio.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(cli.quiet, cli.verbose)?;

    match cli.command {
        Command::Sync => {
            let (project, registry) = load_project(&cli.root)?;
            let manifest_dir = cli.root.join(".folio");
            std::fs::create_dir_all(&manifest_dir)?;
            let manifest_path = manifest_dir.join("manifest.json");
            let json = serde_json::to_string_pretty(&registry.manifest())?;
            std::fs::write(&manifest_path, json)?;
            info!(path = %manifest_path.display(), "manifest written");
            output::print_sync_output(&registry, &project.content_dir);
        }
        Command::Check => {
            println!("==> Checking {}", cli.root.display());
            let (project, registry) = load_project(&cli.root)?;
            output::print_sync_output(&registry, &project.content_dir);
            println!("==> Content is valid");
        }
        Command::List { collection, drafts } => {
            let (project, registry) = load_project(&cli.root)?;
            let entries = registry.get_collection_filtered(&collection, |entry| {
                drafts || entry.data.get("draft").and_then(|d| d.as_bool()) != Some(true)
            })?;
            output::print_list_output(&entries, &project.profile);
        }
        Command::Get { collection, key } => {
            let (_, registry) = load_project(&cli.root)?;
            let entry = match registry.collection_type(&collection)? {
                CollectionType::Content => registry.get_entry_by_slug(&collection, &key)?,
                CollectionType::Data => registry.get_data_entry_by_id(&collection, &key)?,
            };
            let Some(entry) = entry else {
                return Err(format!("No entry '{key}' in collection '{collection}'").into());
            };
            println!("{}", serde_json::to_string_pretty(entry)?);
        }
        Command::Render { collection, slug } => {
            let (project, registry) = load_project(&cli.root)?;
            let Some(entry) = registry.get_entry_by_slug(&collection, &slug)? else {
                return Err(format!("No entry '{slug}' in collection '{collection}'").into());
            };
            let rendered = render::render(entry, &project.markdown)?;
            output::print_render_output(entry, &rendered);
            println!();
            print!("{}", rendered.html);
        }
        Command::Config => {
            let project = config::load_config(&cli.root)?;
            print!("{}", toml::to_string_pretty(&project)?);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load `folio.toml` and build the registry from the content directory.
fn load_project(root: &Path) -> Result<(config::ProjectConfig, Registry), Box<dyn std::error::Error>> {
    let project = config::load_config(root)?;
    let content = project.content_config()?;
    let registry = loader::load(root, &project.content_root(root), &content)?;
    Ok((project, registry))
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| format!("failed to initialize tracing subscriber: {e}"))?;

    Ok(())
}
