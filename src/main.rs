use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use dashboard_store::support::{Clock, SystemClock};
use dashboard_store::{init_tracing, DashboardPatch, DashboardStore, ImportMode, NewDashboard, StoreConfig};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dashboards")]
#[command(about = "Manage the dashboard store", long_about = None)]
struct Cli {
    /// Backing store file (overrides DASHBOARD_STORE_FILE)
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List dashboards, optionally filtered by label or search text
    List {
        #[arg(long = "list")]
        list: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one dashboard
    Show { id: String },
    /// Add a dashboard
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        #[arg(long = "list")]
        lists: Vec<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Update fields of a dashboard
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "list")]
        lists: Vec<String>,
        #[arg(long, conflicts_with = "lists")]
        clear_lists: bool,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        selected: Option<bool>,
    },
    /// Delete one or more dashboards
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Print every known label
    Lists,
    /// Register a label
    ListAdd { name: String },
    /// Rename a label everywhere
    ListRename { old: String, new: String },
    /// Remove a label everywhere
    ListDelete { name: String },
    /// Print label usage statistics
    Stats,
    /// Record a status change from the capture layer
    Status {
        id: String,
        status: String,
        #[arg(long)]
        captured_at: Option<String>,
        #[arg(long, conflicts_with = "captured_at")]
        captured_now: bool,
    },
    /// Export a snapshot
    Export { path: Option<PathBuf> },
    /// Import a snapshot, merging unless --replace is given
    Import {
        path: PathBuf,
        #[arg(long)]
        replace: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.file {
        Some(file) => StoreConfig::for_data_file(file),
        None => StoreConfig::from_env(),
    };
    if let Err(error) = init_tracing(&config.log_dir) {
        eprintln!("logging disabled: {error}");
    }
    let store = DashboardStore::open(&config);

    match cli.command {
        Commands::List { list, search } => {
            let dashboards = match (list, search) {
                (Some(list), _) => store.dashboards_in_list(&list),
                (None, Some(query)) => store.search(&query),
                (None, None) => store.all_dashboards(),
            };
            print_json(&dashboards)?;
        }
        Commands::Show { id } => match store.get_dashboard(&id) {
            Some(dashboard) => print_json(&dashboard)?,
            None => bail!("dashboard not found: {id}"),
        },
        Commands::Add {
            name,
            url,
            lists,
            description,
        } => {
            let input = NewDashboard::new(name, url)
                .with_lists(lists)
                .with_description(description);
            print_json(&store.create_dashboard(input)?)?;
        }
        Commands::Update {
            id,
            name,
            url,
            description,
            lists,
            clear_lists,
            status,
            selected,
        } => {
            let lists = if clear_lists {
                Some(Vec::new())
            } else if lists.is_empty() {
                None
            } else {
                Some(lists)
            };
            let patch = DashboardPatch {
                name,
                url,
                description,
                lists,
                status,
                selected,
                ..DashboardPatch::default()
            };
            print_json(&store.update_dashboard(&id, patch)?)?;
        }
        Commands::Delete { ids } => print_json(&store.delete_dashboards(ids.as_slice())?)?,
        Commands::Lists => print_json(&store.all_lists())?,
        Commands::ListAdd { name } => store.add_list(&name)?,
        Commands::ListRename { old, new } => store.rename_list(&old, &new)?,
        Commands::ListDelete { name } => store.delete_list(&name)?,
        Commands::Stats => print_json(&store.list_statistics())?,
        Commands::Status {
            id,
            status,
            captured_at,
            captured_now,
        } => {
            let captured_at = if captured_now {
                Some(SystemClock.timestamp())
            } else {
                captured_at
            };
            print_json(&store.update_status(&id, &status, captured_at.as_deref())?)?;
        }
        Commands::Export { path } => {
            let written = store.export(path.as_deref())?;
            println!("{}", written.display());
        }
        Commands::Import { path, replace } => {
            let mode = if replace { ImportMode::Replace } else { ImportMode::Merge };
            let summary = store.import(&path, mode);
            print_json(&summary)?;
            if !summary.success {
                bail!("import failed");
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
