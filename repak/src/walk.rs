use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use asset_graph::{
    AssetGraph, MapEntity, MapRecord, MatchList, ModelRecord, ScriptRecord, ShaderRecord,
};
use compat_q3::{bsp, md3, shader};
use zip::read::ZipArchive;

use crate::logging;

#[derive(Debug)]
pub enum WalkError {
    Io { path: PathBuf, source: io::Error },
    Zip { path: PathBuf, source: zip::result::ZipError },
    Bsp { path: PathBuf, source: bsp::BspError },
    Md3 { path: PathBuf, source: md3::Md3Error },
    Shader { path: PathBuf, source: shader::ShaderError },
}

impl fmt::Display for WalkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalkError::Io { path, source } => {
                write!(f, "io error at {}: {}", path.display(), source)
            }
            WalkError::Zip { path, source } => {
                write!(f, "pk3 error at {}: {}", path.display(), source)
            }
            WalkError::Bsp { path, source } => {
                write!(f, "bsp decode error at {}: {}", path.display(), source)
            }
            WalkError::Md3 { path, source } => {
                write!(f, "md3 decode error at {}: {}", path.display(), source)
            }
            WalkError::Shader { path, source } => {
                write!(f, "shader parse error at {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for WalkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WalkError::Io { source, .. } => Some(source),
            WalkError::Zip { source, .. } => Some(source),
            WalkError::Bsp { source, .. } => Some(source),
            WalkError::Md3 { source, .. } => Some(source),
            WalkError::Shader { source, .. } => Some(source),
        }
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> WalkError + '_ {
    move |source| WalkError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Game directories directly under the source root, sorted by name.
pub fn list_games(src: &Path) -> Result<Vec<String>, WalkError> {
    let mut games = Vec::new();
    for entry in fs::read_dir(src).map_err(io_err(src))? {
        let entry = entry.map_err(io_err(src))?;
        let file_type = entry.file_type().map_err(io_err(src))?;
        if !file_type.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            games.push(name.to_string());
        }
    }
    games.sort();
    Ok(games)
}

/// Extracts every pk3 under `dir` (ascending name order, later archives
/// overwriting earlier ones) into a fresh temp directory and returns it.
/// A directory without pk3s is walked in place.
pub fn flatten_game(dir: &Path) -> Result<PathBuf, WalkError> {
    let mut paks = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err(dir))? {
        let entry = entry.map_err(io_err(dir))?;
        let path = entry.path();
        let is_pk3 = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pk3"));
        if is_pk3 {
            paks.push(path);
        }
    }
    if paks.is_empty() {
        return Ok(dir.to_path_buf());
    }
    paks.sort();

    let flattened = temp_dir("flattened").map_err(io_err(dir))?;
    for pak in &paks {
        logging::info(format!("extracting pak {}", pak.display()));
        extract_pak(pak, &flattened)?;
    }
    Ok(flattened)
}

fn extract_pak(pak: &Path, dest: &Path) -> Result<(), WalkError> {
    let file = File::open(pak).map_err(io_err(pak))?;
    let mut archive = ZipArchive::new(file).map_err(|source| WalkError::Zip {
        path: pak.to_path_buf(),
        source,
    })?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|source| WalkError::Zip {
            path: pak.to_path_buf(),
            source,
        })?;
        if entry.is_dir() {
            continue;
        }
        // Drops entries that escape the extraction root.
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            logging::warn(format!(
                "skipping unsafe entry {} in {}",
                entry.name(),
                pak.display()
            ));
            continue;
        };
        let target = dest.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_err(&target))?;
        }
        let mut out = File::create(&target).map_err(io_err(&target))?;
        io::copy(&mut entry, &mut out).map_err(io_err(&target))?;
    }
    Ok(())
}

fn temp_dir(label: &str) -> io::Result<PathBuf> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("repak_{}_{}_{}", label, std::process::id(), nanos));
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Adds every file under `root` to the graph for `game`. Files matching
/// `exclude` never enter the graph; `include` becomes the game's common
/// pak whitelist; `map_includes` keys on map basename.
pub fn graph_game(
    graph: &mut AssetGraph,
    game: &str,
    root: &Path,
    exclude: &MatchList,
    include: MatchList,
    map_includes: &HashMap<String, MatchList>,
) -> Result<(), WalkError> {
    graph.add_game(game, Some(include));

    let mut files = Vec::new();
    collect_files(root, root, &mut files)?;
    files.sort();

    for relative in &files {
        if exclude.matches(relative) {
            logging::debug(format!("excluding {}/{}", game, relative));
            continue;
        }
        graph_file(graph, game, root, relative, map_includes)?;
    }
    Ok(())
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), WalkError> {
    for entry in fs::read_dir(dir).map_err(io_err(dir))? {
        let entry = entry.map_err(io_err(dir))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(io_err(&path))?;
        if file_type.is_dir() {
            collect_files(root, &path, out)?;
        } else if file_type.is_file() {
            if let Ok(relative) = path.strip_prefix(root) {
                let name = relative
                    .components()
                    .filter_map(|c| c.as_os_str().to_str())
                    .collect::<Vec<_>>()
                    .join("/");
                if !name.is_empty() {
                    out.push(name);
                }
            }
        }
    }
    Ok(())
}

fn graph_file(
    graph: &mut AssetGraph,
    game: &str,
    root: &Path,
    relative: &str,
    map_includes: &HashMap<String, MatchList>,
) -> Result<(), WalkError> {
    let path = root.join(relative);
    let ext = Path::new(relative)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let v = match ext.as_str() {
        "wav" => graph.add_audio(relative, game),
        "bsp" => {
            let data = fs::read(&path).map_err(io_err(&path))?;
            let decoded = bsp::parse_bsp(&data).map_err(|source| WalkError::Bsp {
                path: path.clone(),
                source,
            })?;
            let record = map_record(&decoded);
            let basename = Path::new(relative)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or(relative);
            let whitelist = map_includes.get(&basename.to_lowercase()).cloned();
            graph.add_map(relative, game, &record, whitelist)
        }
        "md3" => {
            let data = fs::read(&path).map_err(io_err(&path))?;
            let model = md3::parse_md3(&data).map_err(|source| WalkError::Md3 {
                path: path.clone(),
                source,
            })?;
            graph.add_model(relative, game, &model_record(&model))
        }
        "shader" => {
            let text = fs::read_to_string(&path).map_err(io_err(&path))?;
            let defs = shader::parse_script(&text).map_err(|source| WalkError::Shader {
                path: path.clone(),
                source,
            })?;
            graph.add_script(relative, game, &script_record(defs))
        }
        "skin" => graph.add_skin(relative, game),
        "jpg" | "tga" => graph.add_texture(relative, game),
        _ => graph.add_misc(relative, game),
    };
    graph.set_source(v, root, relative);
    Ok(())
}

fn map_record(decoded: &bsp::Bsp) -> MapRecord {
    let entities = decoded
        .entities
        .iter()
        .map(|entity| MapEntity {
            music: entity.get("music").map(str::to_string),
            noise: entity.get("noise").map(str::to_string),
            model: entity.get("model").map(str::to_string),
            model2: entity.get("model2").map(str::to_string),
        })
        .collect();
    MapRecord {
        entities,
        shaders: decoded.shaders.clone(),
    }
}

fn model_record(model: &md3::Md3) -> ModelRecord {
    let surface_shaders = model
        .surfaces
        .iter()
        .flat_map(|surface| surface.shaders.iter().cloned())
        .collect();
    ModelRecord {
        skins: model.skins.clone(),
        surface_shaders,
    }
}

fn script_record(defs: Vec<shader::ShaderDef>) -> ScriptRecord {
    let shaders = defs
        .into_iter()
        .map(|def| ShaderRecord {
            name: def.name,
            stage_maps: def.stage_maps,
            inner_box: def.inner_box,
            outer_box: def.outer_box,
        })
        .collect();
    ScriptRecord { shaders }
}
