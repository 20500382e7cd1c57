use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use clap::{Parser, Subcommand};
use mapkeeper::{MapStore, config, items, output, pinned, records::Marker};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mapkeeper")]
#[command(about = "File-backed store for map markers, item details and uploads")]
#[command(long_about = "\
File-backed store for map markers, item details and uploads

Every map is an image file under the maps root. Data attached to a map lives
in the map's folder:

  data/
  ├── mapkeeper.toml                 # Optional config (see gen-config)
  ├── app-data/
  │   ├── pinned.txt                 # Pinned popups
  │   └── maps/
  │       ├── maps-loading-order.json
  │       └── Region/SubArea/
  │           ├── world.png          # Logical path: Region/SubArea/world.png
  │           ├── markers.txt
  │           ├── item-details.json
  │           └── images/
  ├── presets/
  └── assets/

Deleting a marker also removes the item details it owns and any uploaded
images those details reference.

Run 'mapkeeper gen-config' to generate a documented mapkeeper.toml.")]
#[command(version)]
struct Cli {
    /// Data directory
    #[arg(long, default_value = "data", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the ordered map catalog
    Catalog,
    /// Print every map image with its default size
    Sizes,
    /// List, add, update or delete markers
    #[command(subcommand)]
    Markers(MarkersCommand),
    /// Read or replace a map's item details
    #[command(subcommand)]
    Items(ItemsCommand),
    /// Upload or delete item images
    #[command(subcommand)]
    Images(ImagesCommand),
    /// Remove item details (and their uploaded images) by item key
    Cleanup {
        /// Logical map path
        #[arg(long)]
        map: String,
        /// Item keys to remove
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Load or save pinned popups
    #[command(subcommand)]
    Pinned(PinnedCommand),
    /// Browse the preset library
    Presets {
        /// Category holding the preset type
        #[arg(long)]
        category: Option<String>,
        /// Print every preset file as JSON
        #[arg(long, conflicts_with_all = ["category", "preset_type"])]
        all: bool,
        /// Preset type (or subcategory with --category)
        #[arg(value_name = "TYPE")]
        preset_type: Option<String>,
    },
    /// Print a stock mapkeeper.toml with all options documented
    GenConfig,
}

#[derive(Subcommand)]
enum MarkersCommand {
    /// List markers of one map, or of every map
    List {
        #[arg(long)]
        map: Option<String>,
    },
    /// Add a marker from a JSON file
    Add {
        #[arg(long)]
        file: PathBuf,
    },
    /// Replace the marker with ID from a JSON file
    Update {
        id: i64,
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete a marker and clean up its items
    Delete {
        id: i64,
        /// Only look in this map (default: every map, first match wins)
        #[arg(long)]
        map: Option<String>,
    },
}

#[derive(Subcommand)]
enum ItemsCommand {
    /// Print a map's item details as JSON
    Get {
        #[arg(long)]
        map: String,
    },
    /// Replace a map's item details with a JSON file
    Put {
        #[arg(long)]
        map: String,
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ImagesCommand {
    /// Store an image file as a new upload for a map
    Upload {
        #[arg(long)]
        map: String,
        #[arg(long)]
        file: PathBuf,
        /// File extension (default: the file's own, else png)
        #[arg(long)]
        ext: Option<String>,
    },
    /// Delete an upload by served URL, relative path or file name
    Delete {
        #[arg(long)]
        map: String,
        path: String,
    },
}

#[derive(Subcommand)]
enum PinnedCommand {
    /// Print the pinned set
    Load,
    /// Apply a JSON array of pin/unpin records
    Save {
        #[arg(long)]
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let store = MapStore::open(&cli.data_dir)?;
    setup_logging(store.config().logging.debug);

    match cli.command {
        Command::Catalog => output::print_catalog(&store.catalog()),
        Command::Sizes => output::print_sizes(&store.map_sizes()),
        Command::Markers(cmd) => run_markers(&store, cmd)?,
        Command::Items(ItemsCommand::Get { map }) => {
            let details = store.item_details(&map)?;
            println!("{}", serde_json::to_string_pretty(&details)?);
        }
        Command::Items(ItemsCommand::Put { map, file }) => {
            let details = items::parse_item_details(read_json(&file)?)?;
            store.save_item_details(&map, &details)?;
            println!("Saved {} item(s) for {}", details.len(), map);
        }
        Command::Images(ImagesCommand::Upload { map, file, ext }) => {
            let bytes = std::fs::read(&file)?;
            let ext = ext.or_else(|| {
                file.extension()
                    .and_then(|e| e.to_str())
                    .map(String::from)
            });
            let encoded = BASE64_STANDARD.encode(bytes);
            let rel = store.upload_image(&map, &encoded, ext.as_deref())?;
            println!("{}", rel);
        }
        Command::Images(ImagesCommand::Delete { map, path }) => {
            if store.delete_image(&map, &path)? {
                println!("Deleted {}", path);
            } else {
                println!("Image file not found: {}", path);
            }
        }
        Command::Cleanup { map, keys } => {
            let cleaned = store.cleanup_items(&map, &keys)?;
            output::print_cleanup(&map, keys.len(), &cleaned);
        }
        Command::Pinned(PinnedCommand::Load) => output::print_pinned(&store.load_pinned()?),
        Command::Pinned(PinnedCommand::Save { file }) => {
            let batch = pinned::parse_pinned_batch(read_json(&file)?)?;
            let count = store.save_pinned(&batch)?;
            println!("Pinned popups: {}", count);
        }
        Command::Presets {
            category,
            all,
            preset_type,
        } => {
            let library = store.presets();
            match (all, category, preset_type) {
                (true, _, _) => {
                    println!("{}", serde_json::to_string_pretty(&library.all_presets()?)?);
                }
                (false, Some(category), Some(sub)) => {
                    output::print_presets(&library.presets_in(&category, &sub)?);
                }
                (false, None, Some(preset_type)) => {
                    output::print_presets(&library.presets(&preset_type)?);
                }
                (false, _, None) => output::print_categories(&library.categories()?),
            }
        }
        Command::GenConfig => print!("{}", config::stock_config_toml()),
    }

    Ok(())
}

fn run_markers(store: &MapStore, cmd: MarkersCommand) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        MarkersCommand::List { map } => {
            output::print_markers(&store.list_markers(map.as_deref())?);
        }
        MarkersCommand::Add { file } => {
            let marker = Marker::from_value(read_json(&file)?)?;
            let map = marker.require_map()?.to_string();
            store.create_marker(marker)?;
            output::print_marker_saved(&map, None);
        }
        MarkersCommand::Update { id, file } => {
            let marker = Marker::from_value(read_json(&file)?)?;
            let map = marker.require_map()?.to_string();
            let outcome = store.update_marker(id, marker)?;
            output::print_marker_saved(&map, Some(outcome));
        }
        MarkersCommand::Delete { id, map } => {
            let deletion = store.delete_marker(id, map.as_deref())?;
            output::print_deletion(id, &deletion);
        }
    }
    Ok(())
}

fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Install the stderr subscriber. `RUST_LOG` wins over the config.
fn setup_logging(debug: bool) {
    let default = if debug {
        "warn,mapkeeper=debug"
    } else {
        "warn,mapkeeper=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
