//! vmr - command-line client for the Vascular Model Repository
//!
//! Browse, search, and download cardiovascular models from
//! vascularmodel.com. Catalog data is cached locally; downloads go to the
//! current directory unless told otherwise.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tracing_subscriber::EnvFilter;

use vmr_core::catalog::{ModelFilter, Summary};
use vmr_core::client::{BatchReport, ClientConfig, DownloadOptions, VmrClient};
use vmr_core::download::format_size;

#[derive(Parser, Debug)]
#[clap(
    name = "vmr",
    about = "Client for the Vascular Model Repository (vascularmodel.com)",
    version
)]
struct Cli {
    /// Cache directory for catalog data
    #[clap(long, global = true)]
    cache_dir: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List models in the repository
    List {
        #[clap(flatten)]
        filters: FilterArgs,

        /// Maximum number of results to show
        #[clap(long, short = 'n', default_value_t = 20)]
        limit: usize,

        /// Output as JSON
        #[clap(long)]
        json: bool,

        /// Force refresh of the catalog (bypass cache)
        #[clap(long)]
        refresh: bool,
    },

    /// Search for models matching criteria
    Search {
        #[clap(flatten)]
        filters: FilterArgs,

        /// Output as JSON
        #[clap(long)]
        json: bool,

        /// Force refresh of the catalog (bypass cache)
        #[clap(long)]
        refresh: bool,
    },

    /// Show detailed information about a model
    Info {
        /// Model name (e.g., 0001_H_AO_SVD)
        name: String,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Download one or more models
    Download {
        /// Model names (e.g., 0001_H_AO_SVD)
        #[clap(required = true)]
        names: Vec<String>,

        /// Output directory
        #[clap(long, short, default_value = ".")]
        output: PathBuf,

        /// Also download simulation result bundles
        #[clap(long)]
        include_simulations: bool,

        /// Also download the PDF documentation
        #[clap(long)]
        pdf: bool,

        /// Extract ZIP bundles after download
        #[clap(long, short = 'x')]
        extract: bool,
    },

    /// Download all simulation results for a model
    DownloadSimulations {
        /// Model name
        name: String,

        /// Output directory
        #[clap(long, short, default_value = ".")]
        output: PathBuf,

        /// Extract ZIP bundles after download
        #[clap(long, short = 'x')]
        extract: bool,
    },

    /// Show summary statistics for the repository
    Summary {
        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Force refresh of cached catalog data
    Refresh,

    /// Show cache status information
    CacheInfo {
        /// Output as JSON
        #[clap(long)]
        json: bool,
    },
}

/// Shared search filter flags.
#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Filter by model name (substring)
    #[clap(long)]
    name: Option<String>,

    /// Filter by anatomy (Aorta, Coronary, ...)
    #[clap(long, short = 'a')]
    anatomy: Option<String>,

    /// Filter by species (Human, Animal, or codes H, A)
    #[clap(long, short = 's')]
    species: Option<String>,

    /// Filter by disease condition (substring)
    #[clap(long, short = 'd')]
    disease: Option<String>,

    /// Filter by sex (Male, Female)
    #[clap(long)]
    sex: Option<String>,

    /// Minimum age in years
    #[clap(long)]
    age_min: Option<f64>,

    /// Maximum age in years
    #[clap(long)]
    age_max: Option<f64>,

    /// Only models with simulation results
    #[clap(long)]
    with_simulations: bool,
}

impl FilterArgs {
    fn into_filter(self) -> ModelFilter {
        ModelFilter {
            name: self.name,
            anatomy: self.anatomy,
            species: self.species,
            disease: self.disease,
            sex: self.sex,
            age_min: self.age_min,
            age_max: self.age_max,
            has_simulations: self.with_simulations.then_some(true),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::default();
    if let Some(dir) = cli.cache_dir {
        config.cache_dir = Some(dir);
    }
    let client = VmrClient::with_config(config).context("Failed to initialize VMR client")?;

    match cli.command {
        Command::List {
            filters,
            limit,
            json,
            refresh,
        } => execute_list(&client, filters.into_filter(), limit, json, refresh).await,
        Command::Search {
            filters,
            json,
            refresh,
        } => execute_search(&client, filters.into_filter(), json, refresh).await,
        Command::Info { name, json } => execute_info(&client, &name, json).await,
        Command::Download {
            names,
            output,
            include_simulations,
            pdf,
            extract,
        } => {
            let opts = DownloadOptions {
                extract,
                include_simulations,
                include_pdf: pdf,
            };
            execute_download(&client, &names, &output, opts).await
        }
        Command::DownloadSimulations {
            name,
            output,
            extract,
        } => execute_download_simulations(&client, &name, &output, extract).await,
        Command::Summary { json } => execute_summary(&client, json).await,
        Command::Refresh => execute_refresh(&client).await,
        Command::CacheInfo { json } => execute_cache_info(&client, json),
    }
}

/// Table row for model listings
#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Anatomy")]
    anatomy: String,
    #[tabled(rename = "Disease")]
    disease: String,
    #[tabled(rename = "Species")]
    species: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Sims")]
    sims: String,
}

async fn execute_list(
    client: &VmrClient,
    filter: ModelFilter,
    limit: usize,
    json_output: bool,
    refresh: bool,
) -> Result<()> {
    if refresh {
        eprintln!("Refreshing catalog...");
        client.refresh().await?;
    }

    let models = client.search(&filter).await?;

    if models.is_empty() {
        println!("No models found matching criteria.");
        return Ok(());
    }

    if json_output {
        let shown: Vec<_> = models.iter().take(limit).collect();
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    let total = models.len();
    if total > limit {
        println!("Found {total} models (showing first {limit})\n");
    } else {
        println!("Found {total} models\n");
    }

    let rows: Vec<ModelRow> = models
        .iter()
        .take(limit)
        .map(|m| ModelRow {
            name: m.name.clone(),
            anatomy: m.anatomy.clone(),
            disease: m.disease.clone(),
            species: m.species.clone(),
            age: m.age.map(|a| format!("{a:.0}")).unwrap_or_else(|| "-".to_string()),
            size: m.file_size.map(format_size).unwrap_or_else(|| "-".to_string()),
            sims: if m.has_simulations { "yes" } else { "" }.to_string(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();

    println!("{table}");
    Ok(())
}

async fn execute_search(
    client: &VmrClient,
    filter: ModelFilter,
    json_output: bool,
    refresh: bool,
) -> Result<()> {
    if refresh {
        eprintln!("Refreshing catalog...");
        client.refresh().await?;
    }

    let models = client.search(&filter).await?;

    if models.is_empty() {
        println!("No models found.");
        return Ok(());
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    println!("Found {} matching models:\n", models.len());

    for model in &models {
        let age = model
            .age
            .map(|a| format!(", Age {a:.1}"))
            .unwrap_or_default();
        println!("  {}", model.name);
        println!("    {} | {}{age}", model.species, model.sex);
        println!("    {} | {}", model.anatomy, model.disease);
        if model.has_simulations {
            println!("    Simulations available");
        }
        println!();
    }

    Ok(())
}

async fn execute_info(client: &VmrClient, name: &str, json_output: bool) -> Result<()> {
    let model = client.get_model(name).await?;
    let sims = client.simulations_for(name).await?;

    if json_output {
        let output = serde_json::json!({
            "model": model,
            "simulations": sims,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let yes_no = |flag: bool| if flag { "Yes" } else { "No" };

    println!("Model: {}", model.name);
    println!();
    println!("Demographics:");
    println!("  Species:   {}", model.species);
    println!("  Sex:       {}", model.sex);
    println!(
        "  Age:       {}",
        model.age.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string())
    );
    if !model.ethnicity.is_empty() {
        println!("  Ethnicity: {}", model.ethnicity);
    }
    println!();
    println!("Classification:");
    println!("  Anatomy:   {}", model.anatomy);
    println!("  Disease:   {}", model.disease);
    if !model.procedure.is_empty() {
        println!("  Procedure: {}", model.procedure);
    }
    println!();
    println!("Available Data:");
    println!("  Images:        {}", yes_no(model.has_images));
    println!("  Paths:         {}", yes_no(model.has_paths));
    println!("  Segmentations: {}", yes_no(model.has_segmentations));
    println!("  Models:        {}", yes_no(model.has_models));
    println!("  Meshes:        {}", yes_no(model.has_meshes));
    println!("  Simulations:   {}", yes_no(model.has_simulations));

    if let Some(size) = model.file_size {
        println!();
        println!("Download Size: {}", format_size(size));
    }

    if !model.doi.is_empty() {
        println!();
        println!("DOI: {}", model.doi);
    }

    if !sims.is_empty() {
        println!();
        println!("Simulation Results:");
        for sim in &sims {
            let size = sim
                .file_size
                .map(|s| format!(" [{}]", format_size(s)))
                .unwrap_or_default();
            println!(
                "  - {}: {} ({}){size}",
                sim.display_name(),
                sim.method,
                sim.fidelity
            );
        }
    }

    Ok(())
}

async fn execute_download(
    client: &VmrClient,
    names: &[String],
    output: &Path,
    opts: DownloadOptions,
) -> Result<()> {
    if names.len() == 1 {
        let name = &names[0];
        println!("Downloading {name}...");
        let path = client.download(name, output, opts).await?;
        println!("Done: {}", path.display());
        return Ok(());
    }

    println!("Downloading {} models...", names.len());
    let report = client.download_batch(names, output, opts).await?;
    print_batch_report(&report);

    if report.all_failed() {
        anyhow::bail!("all {} downloads failed", report.total());
    }
    Ok(())
}

async fn execute_download_simulations(
    client: &VmrClient,
    name: &str,
    output: &Path,
    extract: bool,
) -> Result<()> {
    let sims = client.simulations_for(name).await?;
    if sims.is_empty() {
        println!("No simulations found for: {name}");
        return Ok(());
    }

    println!("Downloading {} simulation files for {name}...", sims.len());
    let report = client.download_simulations(name, output, extract).await?;
    print_batch_report(&report);

    if report.all_failed() {
        anyhow::bail!("all {} downloads failed", report.total());
    }
    Ok(())
}

fn print_batch_report(report: &BatchReport) {
    println!(
        "\nDownloaded {} of {}",
        report.succeeded.len(),
        report.total()
    );
    for (name, err) in &report.failed {
        eprintln!("  failed {name}: {err}");
    }
}

async fn execute_summary(client: &VmrClient, json_output: bool) -> Result<()> {
    let summary: Summary = client.summary().await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("VMR Summary");
    println!("{}", "=".repeat(40));
    println!("Total Models: {}", summary.total);
    println!();

    println!("By Species:");
    for (species, count) in &summary.by_species {
        println!("  {species}: {count}");
    }
    println!();

    println!("By Anatomy (top 10):");
    let mut by_anatomy: Vec<_> = summary.by_anatomy.iter().collect();
    by_anatomy.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    for (anatomy, count) in by_anatomy.into_iter().take(10) {
        println!("  {anatomy}: {count}");
    }
    println!();

    println!("Features:");
    println!("  With Simulations: {}", summary.with_simulations);
    println!("  With Meshes: {}", summary.with_meshes);
    println!("  With Segmentations: {}", summary.with_segmentations);

    if let Some(age) = &summary.age {
        println!();
        println!("Age Statistics:");
        println!("  Min: {:.1} years", age.min);
        println!("  Max: {:.1} years", age.max);
        println!("  Mean: {:.1} years", age.mean);
    }

    if summary.total_size_bytes > 0 {
        println!();
        println!("Total Download Size: {}", format_size(summary.total_size_bytes));
    }

    Ok(())
}

async fn execute_refresh(client: &VmrClient) -> Result<()> {
    println!("Refreshing catalog data...");
    let snapshot = client.refresh().await?;
    println!(
        "Done: {} models, {} simulations",
        snapshot.model_count(),
        snapshot.simulation_count()
    );
    Ok(())
}

fn execute_cache_info(client: &VmrClient, json_output: bool) -> Result<()> {
    let status = client.cache_info();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Cache File: {}", status.path.display());
    println!(
        "Max Age:    {} hours",
        status.max_age_secs / 3600
    );
    println!();

    if !status.exists {
        println!("No cached catalog.");
        return Ok(());
    }

    if let Some(fetched_at) = status.fetched_at {
        println!("Fetched:    {}", fetched_at.to_rfc3339());
    }
    if let Some(age) = status.age_secs {
        println!("Age:        {:.1} hours", age as f64 / 3600.0);
    }
    if let Some(size) = status.size_bytes {
        println!("Size:       {}", format_size(size));
    }
    println!("Status:     {}", if status.stale { "stale" } else { "valid" });

    Ok(())
}
