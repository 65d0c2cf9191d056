use std::path::PathBuf;
use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};

use insightforge_dashboard_lib::{
    config_manager::{ConfigManager, DEFAULT_CONFIG_FILE},
    csv_ingestor::read_dataset_file,
    dashboard_state::UiEffect,
    init_logging, normalize_records, Dashboard, DatasetRole, ReportView, UiSink,
};

#[derive(Parser, Debug)]
#[command(name = "insightforge", version, about = "Run product analyses against the InsightForge API")]
struct Cli {
    /// INI configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Overrides api.base_url for this invocation
    #[arg(long)]
    api_base_url: Option<String>,

    /// Overrides api.api_key for this invocation
    #[arg(long)]
    api_key: Option<String>,

    /// Print the report view as JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the API's /health and /auth-status endpoints
    Health,
    /// Write the resolved configuration to the config file
    InitConfig {
        #[arg(long)]
        force: bool,
    },
    /// Parse a CSV file and show how it maps onto a role
    Inspect {
        file: PathBuf,
        #[arg(short, long)]
        role: DatasetRole,
    },
    /// Run an analysis with the given brief
    Analyze(AnalyzeArgs),
    /// Run the configured sample brief on sample data
    Demo,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[arg(long)]
    mode: Option<String>,
    #[arg(long)]
    goal: Option<String>,
    #[arg(long)]
    scope_type: Option<String>,
    /// Product or SKU being analysed
    #[arg(long)]
    scope_value: Option<String>,
    #[arg(long)]
    marketplace: Option<String>,
    #[arg(long)]
    region: Option<String>,
    #[arg(long)]
    timeframe: Option<String>,
    #[arg(long = "constraint")]
    constraints: Vec<String>,
    /// Dataset to upload, as PATH=ROLE (repeat for each role)
    #[arg(long = "file", value_parser = parse_file_arg)]
    files: Vec<FileArg>,
}

#[derive(Debug, Clone)]
struct FileArg {
    path: PathBuf,
    role: DatasetRole,
}

fn parse_file_arg(value: &str) -> Result<FileArg, String> {
    let (path, role) = value
        .rsplit_once('=')
        .ok_or_else(|| format!("expected PATH=ROLE, got '{}'", value))?;
    let role = role.parse::<DatasetRole>().map_err(|e| e.to_string())?;
    Ok(FileArg { path: PathBuf::from(path), role })
}

/// Prints effects to the terminal.
struct ConsoleSink {
    json: bool,
}

impl UiSink for ConsoleSink {
    fn apply(&mut self, effect: &UiEffect) {
        match effect {
            UiEffect::SetStatus(text) => println!("» {}", text),
            UiEffect::ShowAlert(text) => eprintln!("✖ {}", text),
            UiEffect::ShowToast(text) => println!("✔ {}", text),
            UiEffect::SetFileWarning { file, warning: Some(warning) } => {
                eprintln!("  ⚠ file #{}: {}", file + 1, warning)
            }
            UiEffect::RenderFileList(rows) => {
                for row in rows {
                    let role = row.role.map(|r| r.to_string()).unwrap_or_else(|| "unmapped".to_string());
                    println!("  📄 {} ({:.1}KB, {} rows) → {}", row.file_name, row.size_kb, row.rows, role);
                }
            }
            UiEffect::SetHealth(online) => println!("API: {}", if *online { "online" } else { "offline" }),
            UiEffect::SetAuth(required) => println!("Auth: {}", if *required { "required" } else { "open" }),
            UiEffect::RenderReport(view) => print_report(view, self.json),
            _ => {}
        }
    }
}

fn print_report(view: &ReportView, json: bool) {
    if json {
        match serde_json::to_string_pretty(view) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to serialize report: {}", e),
        }
        return;
    }

    if view.is_demo {
        println!("\n(demo data, the API call did not succeed)");
    }
    if let Some(badge) = &view.confidence_badge {
        println!("{}", badge.text);
    }
    if let Some(badge) = &view.completeness_badge {
        println!("{}", badge.text);
    }
    println!("\nRisks:");
    for risk in &view.risks {
        println!("  - {}", risk);
    }
    println!("\nRecommendations:");
    for rec in &view.recommendations {
        println!("  - {}", rec);
    }
    println!("\n{}", view.report_markdown);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config_manager = ConfigManager::new(&cli.config)?;
    if let Some(url) = &cli.api_base_url {
        config_manager.config.api.base_url = url.clone();
    }
    if let Some(key) = &cli.api_key {
        config_manager.config.api.api_key = key.clone();
    }
    init_logging(&config_manager.config);

    match cli.command {
        Command::InitConfig { force } => {
            if config_manager.config_path().exists() && !force {
                return Err(anyhow!(
                    "{} already exists, pass --force to overwrite",
                    config_manager.config_path().display()
                ));
            }
            config_manager.save()?;
            println!("Wrote {}", config_manager.config_path().display());
        }
        Command::Inspect { file, role } => {
            let dataset = read_dataset_file(&file).await?;
            let outcome = normalize_records(&dataset.records, role);
            println!("{}: {} rows, columns: {}", dataset.file_name, dataset.records.len(), dataset.headers.join(", "));
            match outcome.warning() {
                Some(warning) => println!("⚠ {}", warning),
                None => println!("All required {} fields present", role),
            }
            if let Some(first) = outcome.records.first() {
                let mut keys: Vec<_> = first.keys().collect();
                keys.sort();
                for key in keys {
                    println!("  {} = {}", key, first[key]);
                }
            }
        }
        Command::Health => {
            let mut dashboard = Dashboard::new(config_manager.config.clone(), ConsoleSink { json: cli.json });
            let online = dashboard.check_health().await;
            if online {
                dashboard.check_auth().await;
            }
        }
        Command::Demo => {
            let mut dashboard = Dashboard::new(config_manager.config.clone(), ConsoleSink { json: cli.json });
            dashboard.load_demo_brief();
            dashboard.run_analysis().await?;
        }
        Command::Analyze(args) => {
            let mut dashboard = Dashboard::new(config_manager.config.clone(), ConsoleSink { json: cli.json });
            dashboard.edit_form(|form| {
                let fields = [
                    (&mut form.mode, args.mode),
                    (&mut form.goal, args.goal),
                    (&mut form.scope_type, args.scope_type),
                    (&mut form.scope_value, args.scope_value),
                    (&mut form.marketplace, args.marketplace),
                    (&mut form.region, args.region),
                    (&mut form.timeframe, args.timeframe),
                ];
                for (field, value) in fields {
                    if let Some(value) = value {
                        *field = value;
                    }
                }
                form.constraints = args.constraints;
            });

            if !args.files.is_empty() {
                let files: Vec<_> = args.files.iter().map(|f| (f.path.as_path(), f.role)).collect();
                dashboard.upload_files(&files).await?;
            }
            dashboard.run_analysis().await?;
        }
    }

    Ok(())
}
