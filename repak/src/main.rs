#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use asset_graph::{AssetGraph, MatchList, VertexId};
use pak_write::transform::{OpusTransform, Transform, TransformFailure};
use pak_write::{normalize_entries, write_pak, write_split_pak, PakEntry, PakError, PakSummary};

mod config;
mod jobs;
mod logging;
mod walk;

use config::{ConfigError, RepakConfig};
use walk::WalkError;

const EXIT_SUCCESS: i32 = 0;
const EXIT_CONFIG: i32 = 10;
const EXIT_WALK: i32 = 11;
const EXIT_PACK: i32 = 12;

#[derive(Parser)]
#[command(name = "repak", version, about = "Quake 3 content repacker")]
struct Cli {
    /// Enable debug logging.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild per-map and common pk3s from a content tree.
    Pack(PackArgs),
    /// Walk the content tree and report graph statistics.
    Stats(StatsArgs),
}

#[derive(Parser)]
struct PackArgs {
    /// Source directory holding one subdirectory per game.
    #[arg(value_name = "SRC")]
    src: PathBuf,

    /// Output directory for the repacked pk3s.
    #[arg(value_name = "DEST")]
    dest: PathBuf,

    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Worker threads for pak writing. Defaults to the CPU count.
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Parser)]
struct StatsArgs {
    #[arg(value_name = "SRC")]
    src: PathBuf,

    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    if cli.verbose {
        logging::set_level(logging::LogLevel::Debug);
    }
    let exit_code = match cli.command {
        Commands::Pack(args) => run_pack(args),
        Commands::Stats(args) => run_stats(args),
    };
    std::process::exit(exit_code);
}

#[derive(Debug)]
enum BuildError {
    Config(ConfigError),
    Walk(WalkError),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Config(err) => write!(f, "{}", err),
            BuildError::Walk(err) => write!(f, "{}", err),
        }
    }
}

impl From<ConfigError> for BuildError {
    fn from(err: ConfigError) -> Self {
        BuildError::Config(err)
    }
}

impl From<WalkError> for BuildError {
    fn from(err: WalkError) -> Self {
        BuildError::Walk(err)
    }
}

impl BuildError {
    fn exit_code(&self) -> i32 {
        match self {
            BuildError::Config(_) => EXIT_CONFIG,
            BuildError::Walk(_) => EXIT_WALK,
        }
    }
}

/// Flattens and walks every game under `src` into one shared graph. The
/// base game goes first so mod overrides rewire edges that already exist.
fn build_graph(config: &RepakConfig, src: &Path) -> Result<AssetGraph, BuildError> {
    let mut games = walk::list_games(src).map_err(BuildError::Walk)?;
    if let Some(base_index) = games
        .iter()
        .position(|game| game.eq_ignore_ascii_case(&config.base_game))
    {
        // Keep the directory's own casing for the path join below.
        let base_dir = games.remove(base_index);
        games.insert(0, base_dir);
    } else {
        logging::warn(format!(
            "base game directory '{}' not found under {}",
            config.base_game,
            src.display()
        ));
    }

    let mut graph = AssetGraph::new(&config.base_game);
    for game in &games {
        let exclude = config.game_exclude(game)?;
        let include = config.game_include(game)?;
        let map_includes = map_include_table(config, game)?;

        logging::info(format!("walking game {}", game));
        let root = walk::flatten_game(&src.join(game))?;
        walk::graph_game(&mut graph, game, &root, &exclude, include, &map_includes)?;
    }

    let dangling = graph.dangling_placeholders();
    for id in &dangling {
        logging::warn(format!("referenced asset never found: {}", id));
    }
    if !dangling.is_empty() {
        logging::warn(format!(
            "{} referenced assets were never found on disk",
            dangling.len()
        ));
    }
    Ok(graph)
}

fn map_include_table(
    config: &RepakConfig,
    game: &str,
) -> Result<HashMap<String, MatchList>, ConfigError> {
    let mut table = HashMap::new();
    if let Some(game_config) = config.game_section(game) {
        for map in game_config.maps.keys() {
            if let Some(list) = config.map_include(game, map)? {
                table.insert(map.to_lowercase(), list);
            }
        }
    }
    Ok(table)
}

/// File entries for a set of graph vertices. Vertices that were only ever
/// referenced have no source and are reported, not packed.
fn verts_to_entries(graph: &AssetGraph, verts: &[VertexId]) -> Vec<PakEntry> {
    let mut entries = Vec::with_capacity(verts.len());
    for &v in verts {
        let data = graph.data(v);
        let Some(source) = &data.source else {
            logging::warn(format!("missing asset {}", graph.id(v)));
            continue;
        };
        let absolute = source.absolute();
        let size = match std::fs::metadata(&absolute) {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                logging::warn(format!(
                    "cannot stat {}: {}, skipping",
                    absolute.display(),
                    err
                ));
                continue;
            }
        };
        entries.push(PakEntry::from_file(source.relative.clone(), absolute, size));
    }
    entries
}

enum PakJob {
    Single { path: PathBuf },
    Split { dir: PathBuf, stem: String, max_bytes: u64 },
}

struct PakTaskResult {
    summaries: Result<Vec<PakSummary>, PakError>,
    warnings: Vec<String>,
}

fn pak_task(
    entries: Vec<PakEntry>,
    job: PakJob,
    on_failure: TransformFailure,
) -> PakTaskResult {
    let transforms: Vec<Box<dyn Transform>> = vec![Box::new(OpusTransform::new("opusenc"))];
    let (entries, warnings) = pak_write::transform::apply_transforms(entries, &transforms, on_failure);
    let entries = normalize_entries(entries);
    let summaries = match job {
        PakJob::Single { path } => write_pak(&path, &entries).map(|summary| vec![summary]),
        PakJob::Split {
            dir,
            stem,
            max_bytes,
        } => write_split_pak(&dir, &stem, &entries, max_bytes),
    };
    PakTaskResult {
        summaries,
        warnings,
    }
}

fn run_pack(args: PackArgs) -> i32 {
    let config = match RepakConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            logging::error(format!("{}", err));
            return EXIT_CONFIG;
        }
    };

    let graph = match build_graph(&config, &args.src) {
        Ok(graph) => graph,
        Err(err) => {
            logging::error(format!("{}", err));
            return err.exit_code();
        }
    };

    let threshold = config.reference_threshold;
    let max_pak_bytes = config.max_pak_bytes;
    let on_failure = config.on_transform_failure.policy();

    // Mods first, base game last.
    let mut games = graph.mods();
    games.push(config.base_game.clone());

    let mut tasks: Vec<jobs::Task<PakTaskResult>> = Vec::new();
    for game in &games {
        for map in graph.maps(game) {
            let Some(map_v) = graph.map_vertex(game, map) else {
                continue;
            };
            let verts = graph.map_assets(map_v, threshold);
            let entries = verts_to_entries(&graph, &verts);
            let basename = graph.data(map_v).basename.clone();
            let path = args.dest.join(game).join(format!("{}.pk3", basename));
            let label = path.display().to_string();
            tasks.push(jobs::Task::new(label, move || {
                pak_task(entries, PakJob::Single { path }, on_failure)
            }));
        }

        let common = graph.common_assets(game, threshold);
        let entries = verts_to_entries(&graph, &common);
        if entries.is_empty() {
            logging::info(format!("no common assets for {}", game));
            continue;
        }
        let dir = args.dest.join(game);
        let label = format!("{}/pak*.pk3", dir.display());
        tasks.push(jobs::Task::new(label, move || {
            pak_task(
                entries,
                PakJob::Split {
                    dir,
                    stem: "pak".to_string(),
                    max_bytes: max_pak_bytes,
                },
                on_failure,
            )
        }));
    }

    let workers = args.workers.unwrap_or_else(jobs::default_workers);
    let outcomes = jobs::run_tasks(workers, tasks);

    let mut failed = false;
    for outcome in outcomes {
        for warning in &outcome.result.warnings {
            logging::warn(warning);
        }
        match outcome.result.summaries {
            Ok(summaries) => {
                for summary in summaries {
                    logging::info(format!(
                        "wrote {} ({} entries, {} bytes)",
                        summary.path.display(),
                        summary.entries,
                        summary.content_bytes
                    ));
                }
            }
            Err(err) => {
                logging::error(format!("failed to write {}: {}", outcome.label, err));
                failed = true;
            }
        }
    }

    if failed {
        EXIT_PACK
    } else {
        EXIT_SUCCESS
    }
}

fn run_stats(args: StatsArgs) -> i32 {
    let config = match RepakConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            logging::error(format!("{}", err));
            return EXIT_CONFIG;
        }
    };

    let graph = match build_graph(&config, &args.src) {
        Ok(graph) => graph,
        Err(err) => {
            logging::error(format!("{}", err));
            return err.exit_code();
        }
    };

    println!(
        "graph: {} vertices, {} edges",
        graph.graph().vertex_count(),
        graph.graph().edge_count()
    );
    for game in graph.games() {
        let maps = graph.maps(game);
        let common = graph.common_assets(game, config.reference_threshold);
        println!(
            "{}: {} maps, {} common assets",
            game,
            maps.len(),
            common.len()
        );
        for map in maps {
            if let Some(map_v) = graph.map_vertex(game, map) {
                let assets = graph.map_assets(map_v, config.reference_threshold);
                println!("  {}: {} assets", map, assets.len());
            }
        }
    }
    let dangling = graph.dangling_placeholders();
    if !dangling.is_empty() {
        println!("{} referenced assets never found:", dangling.len());
        for id in dangling {
            println!("  {}", id);
        }
    }
    EXIT_SUCCESS
}
