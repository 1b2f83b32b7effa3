//! Docling Layout CLI - post-process layout predictions and order pages
//!
//! Reads page models as JSON, runs the layout pipeline and prints the
//! cleaned clusters in reading order.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use docling_layout::{
    LayoutConfig, LayoutPipeline, PageElement, PageInput, PageLayout, ReadingOrderPredictor,
};
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Default)]
enum OutputFormat {
    /// One line per cluster
    #[default]
    Text,
    /// Full page layouts as JSON
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "docling-layout",
    about = "Clean up layout predictions and order them for reading",
    version
)]
struct Args {
    /// Show detailed processing information
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Post-process pages and put their clusters in reading order
    Process {
        /// JSON file with one page or an array of pages
        #[arg(value_name = "PAGES_JSON")]
        input: PathBuf,

        /// TOML configuration file
        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Write output to a file instead of stdout
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Keep the clusters' own cells instead of assigning page cells
        #[arg(long)]
        skip_cell_assignment: bool,

        /// Keep clusters that end up without cells
        #[arg(long)]
        keep_empty_clusters: bool,

        /// Do not wrap unassigned cells in text clusters
        #[arg(long)]
        no_orphans: bool,
    },

    /// Print the reading order of a list of page elements
    Order {
        /// JSON file with an array of page elements
        #[arg(value_name = "ELEMENTS_JSON")]
        input: PathBuf,

        /// TOML configuration file
        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },

    /// Print the default configuration as TOML
    Config,
}

/// Either a single page or a list of pages
#[derive(Deserialize)]
#[serde(untagged)]
enum PagesFile {
    Many(Vec<PageInput>),
    One(Box<PageInput>),
}

impl PagesFile {
    fn into_pages(self) -> Vec<PageInput> {
        match self {
            Self::Many(pages) => pages,
            Self::One(page) => vec![*page],
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<LayoutConfig> {
    match path {
        Some(path) => LayoutConfig::from_file(path)
            .with_context(|| format!("Failed to load config file: {}", path.display())),
        None => Ok(LayoutConfig::default()),
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON input: {}", path.display()))
}

fn format_text(layouts: &[PageLayout]) -> String {
    let mut out = String::new();
    for layout in layouts {
        out.push_str(&format!(
            "Page {} ({} clusters, {} cells)\n",
            layout.page_no,
            layout.clusters.len(),
            layout.cells.len()
        ));
        for cluster in &layout.clusters {
            let bbox = cluster.bbox;
            out.push_str(&format!(
                "  [{}] {} ({:.1}, {:.1}, {:.1}, {:.1}) {:.2}: {}\n",
                cluster.id,
                cluster.label,
                bbox.l,
                bbox.b,
                bbox.r,
                bbox.t,
                cluster.confidence,
                cluster.text()
            ));
        }
    }
    out
}

fn write_output(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => fs::write(path, content)
            .with_context(|| format!("Failed to write output file: {}", path.display())),
        None => {
            print!("{content}");
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();

    match args.command {
        Commands::Process {
            input,
            config,
            format,
            output,
            skip_cell_assignment,
            keep_empty_clusters,
            no_orphans,
        } => {
            let mut config = load_config(config.as_deref())?;
            // Flags only ever switch the configured behavior on or off
            config.options.skip_cell_assignment |= skip_cell_assignment;
            config.options.keep_empty_clusters |= keep_empty_clusters;
            if no_orphans {
                config.options.create_orphan_clusters = false;
            }

            let pages = read_json::<PagesFile>(&input)?.into_pages();
            let pipeline = LayoutPipeline::new(config)?;
            info!("Processing {} pages from {}", pages.len(), input.display());
            let layouts = pipeline.process_pages(pages);

            let content = match format {
                OutputFormat::Text => format_text(&layouts),
                OutputFormat::Json => {
                    let mut json = serde_json::to_string_pretty(&layouts)
                        .context("Failed to serialize page layouts")?;
                    json.push('\n');
                    json
                }
            };
            write_output(&content, output.as_deref())?;
        }
        Commands::Order { input, config } => {
            let config = load_config(config.as_deref())?;
            let elements: Vec<PageElement> = read_json(&input)?;
            let predictor = ReadingOrderPredictor::new(config.reading_order);
            let order = predictor.predict(&elements);
            info!("Ordered {} elements", order.len());

            let line: Vec<String> = order.iter().map(ToString::to_string).collect();
            println!("{}", line.join(" "));
        }
        Commands::Config => {
            let toml = toml::to_string(&LayoutConfig::default())
                .context("Failed to serialize default configuration")?;
            print!("{toml}");
        }
    }

    Ok(())
}
