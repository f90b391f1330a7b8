//! Asset dependency graph for pk3 repacking.
//!
//! One graph spans the base game and every mod so that cross-scope
//! references, mod overrides and shader shadowing can be resolved in a
//! single place. Construction is single-threaded; once built, the graph is
//! read-only for partitioning.
#![forbid(unsafe_code)]

mod graph;
mod match_list;
mod partition;

pub use graph::{DirectedGraph, VertexId};
pub use match_list::{MatchList, Pattern, PatternError};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Closed set of asset kinds. Each packageable kind maps to a canonical
/// suffix so that interchangeable extensions (`.jpg`/`.tga`) collapse to one
/// identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetType {
    Audio,
    Map,
    Model,
    Script,
    Shader,
    Skin,
    Texture,
    Misc,
    GameScope,
}

impl AssetType {
    /// Canonical suffix replacing the on-disk extension in graph keys.
    /// Misc assets and game scopes keep their literal name.
    pub fn canonical_ext(self) -> Option<&'static str> {
        match self {
            AssetType::Audio => Some(".audio"),
            AssetType::Map => Some(".map"),
            AssetType::Model => Some(".model"),
            AssetType::Script => Some(".script"),
            AssetType::Shader => Some(".shader"),
            AssetType::Skin => Some(".skin"),
            AssetType::Texture => Some(".texture"),
            AssetType::Misc | AssetType::GameScope => None,
        }
    }

    fn is_composite(self) -> bool {
        matches!(self, AssetType::Map | AssetType::Model)
    }
}

/// Where an asset's bytes live on disk: the walked root plus the relative
/// path under it. Absent for assets only ever seen as references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    pub root: PathBuf,
    pub relative: String,
}

impl SourceLocation {
    pub fn absolute(&self) -> PathBuf {
        self.root.join(&self.relative)
    }
}

#[derive(Clone, Debug)]
pub struct AssetData {
    pub asset_type: AssetType,
    pub game: String,
    pub basename: String,
    pub whitelist: Option<MatchList>,
    pub source: Option<SourceLocation>,
}

/// Decoded map content: entity fields that reference other assets, plus the
/// material table from the shader lump.
#[derive(Clone, Debug, Default)]
pub struct MapRecord {
    pub entities: Vec<MapEntity>,
    pub shaders: Vec<String>,
}

/// The entity fields the packer cares about. `noise`/`model`/`model2`
/// values starting with `*` are inline references into the map's own
/// geometry, not separate files.
#[derive(Clone, Debug, Default)]
pub struct MapEntity {
    pub music: Option<String>,
    pub noise: Option<String>,
    pub model: Option<String>,
    pub model2: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ModelRecord {
    pub skins: Vec<String>,
    pub surface_shaders: Vec<String>,
}

/// One shader definition pulled out of a script file.
#[derive(Clone, Debug, Default)]
pub struct ShaderRecord {
    pub name: String,
    pub stage_maps: Vec<String>,
    pub inner_box: Vec<String>,
    pub outer_box: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ScriptRecord {
    pub shaders: Vec<ShaderRecord>,
}

/// The shared asset graph. Vertices are assets keyed by
/// `{game}/{generalized-path}` plus one scope vertex per game/mod.
pub struct AssetGraph {
    graph: DirectedGraph<AssetData>,
    base_game: String,
    games: Vec<String>,
    maps: HashMap<String, Vec<String>>,
    fallback_created: Vec<VertexId>,
}

impl AssetGraph {
    pub fn new(base_game: &str) -> Self {
        Self {
            graph: DirectedGraph::new(),
            base_game: sanitize(base_game),
            games: Vec::new(),
            maps: HashMap::new(),
            fallback_created: Vec::new(),
        }
    }

    pub fn base_game(&self) -> &str {
        &self.base_game
    }

    pub fn graph(&self) -> &DirectedGraph<AssetData> {
        &self.graph
    }

    pub fn id(&self, v: VertexId) -> &str {
        self.graph.id(v)
    }

    pub fn data(&self, v: VertexId) -> &AssetData {
        self.graph.data(v)
    }

    /// Registers a game/mod scope, attaching its whitelist. Idempotent; a
    /// scope created implicitly by a fallback reference picks up the
    /// whitelist here.
    pub fn add_game(&mut self, game: &str, whitelist: Option<MatchList>) -> VertexId {
        let v = self.ensure_game(game);
        if whitelist.is_some() {
            self.graph.data_mut(v).whitelist = whitelist;
        }
        v
    }

    pub fn games(&self) -> &[String] {
        &self.games
    }

    pub fn mods(&self) -> Vec<String> {
        self.games
            .iter()
            .filter(|game| *game != &self.base_game)
            .cloned()
            .collect()
    }

    /// Map basenames registered for a game, in discovery order.
    pub fn maps(&self, game: &str) -> &[String] {
        self.maps
            .get(&sanitize(game))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn map_vertex(&self, game: &str, map: &str) -> Option<VertexId> {
        let name = format!("maps/{}", sanitize(map));
        self.graph.vertex(&self.key(&name, &sanitize(game), AssetType::Map))
    }

    /// Records where an asset's bytes were found. Fills in the source of a
    /// vertex that was first materialized as a forward reference.
    pub fn set_source(&mut self, v: VertexId, root: &Path, relative: &str) {
        self.graph.data_mut(v).source = Some(SourceLocation {
            root: root.to_path_buf(),
            relative: relative.to_string(),
        });
    }

    /// Ids of assets that were fabricated as base-game stand-ins for
    /// unresolved references and never found on disk.
    pub fn dangling_placeholders(&self) -> Vec<String> {
        self.fallback_created
            .iter()
            .filter(|&&v| self.graph.data(v).source.is_none())
            .map(|&v| self.graph.id(v).to_string())
            .collect()
    }

    pub fn add_audio(&mut self, name: &str, game: &str) -> VertexId {
        self.add_asset(name, game, AssetType::Audio, None)
    }

    pub fn add_texture(&mut self, name: &str, game: &str) -> VertexId {
        self.add_asset(name, game, AssetType::Texture, None)
    }

    pub fn add_skin(&mut self, name: &str, game: &str) -> VertexId {
        self.add_asset(name, game, AssetType::Skin, None)
    }

    pub fn add_misc(&mut self, name: &str, game: &str) -> VertexId {
        self.add_asset(name, game, AssetType::Misc, None)
    }

    /// Adds a map and the edges to everything its decoded record mentions:
    /// ambient audio and secondary models from entities, and the shader
    /// lump's material names (`*`-prefixed lightmap sentinels skipped).
    pub fn add_map(
        &mut self,
        name: &str,
        game: &str,
        record: &MapRecord,
        whitelist: Option<MatchList>,
    ) -> VertexId {
        let map_v = self.add_asset(name, game, AssetType::Map, whitelist);
        for entity in &record.entities {
            let mut refs = Vec::new();
            if let Some(music) = &entity.music {
                refs.push(self.resolve_or_create(music, game, AssetType::Audio));
            }
            if let Some(noise) = &entity.noise {
                if !noise.starts_with('*') {
                    refs.push(self.resolve_or_create(noise, game, AssetType::Audio));
                }
            }
            if let Some(model) = &entity.model {
                if !model.starts_with('*') {
                    refs.push(self.resolve_or_create(model, game, AssetType::Model));
                }
            }
            if let Some(model2) = &entity.model2 {
                if !model2.starts_with('*') {
                    refs.push(self.resolve_or_create(model2, game, AssetType::Model));
                }
            }
            for r in refs {
                self.graph.add_edge(map_v, r);
            }
        }
        for shader_name in &record.shaders {
            if shader_name.starts_with('*') {
                continue;
            }
            let v = self.resolve_shader_or_texture(shader_name, game);
            self.graph.add_edge(map_v, v);
        }
        map_v
    }

    /// Adds a model with edges to its skins and per-surface materials.
    /// Models often carry empty names in their tables; those are skipped.
    pub fn add_model(&mut self, name: &str, game: &str, record: &ModelRecord) -> VertexId {
        let model_v = self.add_asset(name, game, AssetType::Model, None);
        for skin in &record.skins {
            if skin.is_empty() {
                continue;
            }
            let skin_v = self.resolve_or_create(skin, game, AssetType::Skin);
            self.graph.add_edge(model_v, skin_v);
        }
        for shader in &record.surface_shaders {
            if shader.is_empty() {
                continue;
            }
            let v = self.resolve_shader_or_texture(shader, game);
            self.graph.add_edge(model_v, v);
        }
        model_v
    }

    /// Adds a shader script. Scripts contain shaders organizationally, but
    /// scripts are never referenced, so the relationship is inverted: each
    /// shader gets an edge back to its declaring script plus edges to its
    /// stage textures and sky box faces.
    pub fn add_script(&mut self, name: &str, game: &str, record: &ScriptRecord) -> VertexId {
        let script_v = self.add_asset(name, game, AssetType::Script, None);
        for shader in &record.shaders {
            let shader_v = self.add_asset(&shader.name, game, AssetType::Shader, None);
            self.graph.add_edge(shader_v, script_v);
            for stage_map in &shader.stage_maps {
                let tex_v = self.resolve_or_create(stage_map, game, AssetType::Texture);
                self.graph.add_edge(shader_v, tex_v);
            }
            for face in shader.inner_box.iter().chain(shader.outer_box.iter()) {
                let tex_v = self.resolve_or_create(face, game, AssetType::Texture);
                self.graph.add_edge(shader_v, tex_v);
            }
        }
        script_v
    }

    fn key(&self, name: &str, game: &str, ty: AssetType) -> String {
        format!("{}/{}", game, generalize(name, ty))
    }

    fn ensure_game(&mut self, game: &str) -> VertexId {
        let game = sanitize(game);
        if !self.games.contains(&game) {
            self.games.push(game.clone());
        }
        self.graph.add_vertex(
            &game,
            AssetData {
                asset_type: AssetType::GameScope,
                game: game.clone(),
                basename: game.clone(),
                whitelist: None,
                source: None,
            },
        )
    }

    fn add_asset(
        &mut self,
        name: &str,
        game: &str,
        ty: AssetType,
        whitelist: Option<MatchList>,
    ) -> VertexId {
        let name = sanitize(name);
        let game = sanitize(game);
        let scope = self.ensure_game(&game);
        let stem = basename_stem(&name);
        if ty == AssetType::Map {
            self.register_map(&game, &stem);
        }

        let key = self.key(&name, &game, ty);
        if let Some(existing) = self.graph.vertex(&key) {
            return existing;
        }

        let v = self.graph.add_vertex(
            &key,
            AssetData {
                asset_type: ty,
                game: game.clone(),
                basename: stem.clone(),
                whitelist,
                source: None,
            },
        );
        self.graph.add_edge(scope, v);

        if game != self.base_game {
            self.rewire_mod_override(&name, &game, ty, v);
        }
        if ty == AssetType::Shader {
            self.shadow_textures(&name, &game, v);
        }
        if ty == AssetType::Map {
            self.adopt_existing_assets(v, &game, &stem);
        } else {
            self.attach_to_known_maps(v, &name, &game);
        }
        v
    }

    /// A mod asset overriding a same-named base-game asset takes over every
    /// edge between the base vertex and vertices owned by that mod. Other
    /// mods and the base game keep referencing the original.
    fn rewire_mod_override(&mut self, name: &str, mod_game: &str, ty: AssetType, new_v: VertexId) {
        let base_key = self.key(name, &self.base_game.clone(), ty);
        let Some(base_v) = self.graph.vertex(&base_key) else {
            return;
        };
        let in_moves: Vec<VertexId> = self
            .graph
            .in_neighbors(base_v)
            .iter()
            .copied()
            .filter(|&src| src != new_v && self.graph.data(src).game == mod_game)
            .collect();
        for src in in_moves {
            self.graph.add_edge(src, new_v);
            self.graph.remove_edge(src, base_v);
        }
        let out_moves: Vec<VertexId> = self
            .graph
            .out_neighbors(base_v)
            .iter()
            .copied()
            .filter(|&dst| dst != new_v && self.graph.data(dst).game == mod_game)
            .collect();
        for dst in out_moves {
            self.graph.add_edge(new_v, dst);
            self.graph.remove_edge(base_v, dst);
        }
    }

    /// Composite assets treat unknown materials as bare textures. A shader
    /// declared later with the same name takes precedence: edges from maps
    /// and models of the shader's game are redirected to the shader vertex.
    fn shadow_textures(&mut self, name: &str, shader_game: &str, shader_v: VertexId) {
        let mut texture_games = vec![self.base_game.clone()];
        if shader_game != self.base_game {
            texture_games.insert(0, shader_game.to_string());
        }
        for texture_game in texture_games {
            let tex_key = self.key(name, &texture_game, AssetType::Texture);
            let Some(tex_v) = self.graph.vertex(&tex_key) else {
                continue;
            };
            let moves: Vec<VertexId> = self
                .graph
                .in_neighbors(tex_v)
                .iter()
                .copied()
                .filter(|&src| {
                    let data = self.graph.data(src);
                    data.asset_type.is_composite() && data.game == shader_game
                })
                .collect();
            for src in moves {
                self.graph.add_edge(src, shader_v);
                self.graph.remove_edge(src, tex_v);
            }
        }
    }

    fn register_map(&mut self, game: &str, stem: &str) {
        let entry = self.maps.entry(game.to_string()).or_default();
        if !entry.iter().any(|existing| existing == stem) {
            entry.push(stem.to_string());
        }
    }

    /// A newly added map adopts same-game assets associated by naming
    /// convention (`{mapname}.` in the id) or by the map's whitelist.
    /// Covers level screenshots, per-map configs and the like that no file
    /// ever references explicitly.
    fn adopt_existing_assets(&mut self, map_v: VertexId, game: &str, map_stem: &str) {
        let marker = format!("{}.", map_stem);
        let adopted: Vec<VertexId> = self
            .graph
            .vertex_ids()
            .filter(|&v| {
                if v == map_v {
                    return false;
                }
                let data = self.graph.data(v);
                if data.game != game
                    || matches!(data.asset_type, AssetType::Map | AssetType::GameScope)
                {
                    return false;
                }
                let id = self.graph.id(v);
                if id.contains(&marker) {
                    return true;
                }
                self.graph
                    .data(map_v)
                    .whitelist
                    .as_ref()
                    .is_some_and(|w| w.matches(id))
            })
            .collect();
        for v in adopted {
            self.graph.add_edge(map_v, v);
        }
    }

    /// The reverse of [`Self::adopt_existing_assets`]: a non-map asset added
    /// after its map is attached to every registered same-game map it
    /// matches.
    fn attach_to_known_maps(&mut self, v: VertexId, name: &str, game: &str) {
        let stems = match self.maps.get(game) {
            Some(stems) => stems.clone(),
            None => return,
        };
        for stem in stems {
            let Some(map_v) = self.map_vertex(game, &stem) else {
                continue;
            };
            let by_name = name.contains(&format!("{}.", stem));
            let by_whitelist = self
                .graph
                .data(map_v)
                .whitelist
                .as_ref()
                .is_some_and(|w| w.matches(self.graph.id(v)));
            if by_name || by_whitelist {
                self.graph.add_edge(map_v, v);
            }
        }
    }

    /// Resolution for references built *from* an asset: own game first, then
    /// the base game, else a base-game placeholder is fabricated. An
    /// unresolved reference never fails; fabricated vertices are tracked so
    /// the run can report them.
    fn resolve_or_create(&mut self, name: &str, game: &str, ty: AssetType) -> VertexId {
        let name = sanitize(name);
        let game = sanitize(game);
        if let Some(v) = self.graph.vertex(&self.key(&name, &game, ty)) {
            return v;
        }
        let base = self.base_game.clone();
        if let Some(v) = self.graph.vertex(&self.key(&name, &base, ty)) {
            return v;
        }
        let v = self.add_asset(&name, &base, ty, None);
        self.fallback_created.push(v);
        v
    }

    /// Material resolution: shaders take precedence over bare textures of
    /// the same name, own game over base game.
    fn resolve_shader_or_texture(&mut self, name: &str, game: &str) -> VertexId {
        let name = sanitize(name);
        let game = sanitize(game);
        if let Some(v) = self.graph.vertex(&self.key(&name, &game, AssetType::Shader)) {
            return v;
        }
        if let Some(v) = self.graph.vertex(&self.key(&name, &game, AssetType::Texture)) {
            return v;
        }
        let base = self.base_game.clone();
        if let Some(v) = self.graph.vertex(&self.key(&name, &base, AssetType::Shader)) {
            return v;
        }
        if let Some(v) = self.graph.vertex(&self.key(&name, &base, AssetType::Texture)) {
            return v;
        }
        let v = self.add_asset(&name, &base, AssetType::Texture, None);
        self.fallback_created.push(v);
        v
    }
}

fn sanitize(p: &str) -> String {
    p.to_lowercase().replace('\\', "/")
}

/// Replaces the extension with the type's canonical suffix, appending it
/// when the name has none (shader names usually carry no extension).
fn generalize(p: &str, ty: AssetType) -> String {
    let Some(new_ext) = ty.canonical_ext() else {
        return p.to_string();
    };
    match extension_start(p) {
        Some(dot) => format!("{}{}", &p[..dot], new_ext),
        None => format!("{}{}", p, new_ext),
    }
}

fn extension_start(p: &str) -> Option<usize> {
    let file_start = p.rfind('/').map(|i| i + 1).unwrap_or(0);
    let name = &p[file_start..];
    match name.rfind('.') {
        Some(0) | None => None,
        Some(dot) => Some(file_start + dot),
    }
}

/// Filename stem: no directories, no extension.
fn basename_stem(p: &str) -> String {
    let file_start = p.rfind('/').map(|i| i + 1).unwrap_or(0);
    let name = &p[file_start..];
    match name.rfind('.') {
        Some(0) | None => name.to_string(),
        Some(dot) => name[..dot].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generalize_replaces_extension() {
        assert_eq!(
            generalize("textures/base_wall/girders.jpg", AssetType::Texture),
            "textures/base_wall/girders.texture"
        );
        assert_eq!(
            generalize("textures/base_wall/girders.tga", AssetType::Texture),
            "textures/base_wall/girders.texture"
        );
    }

    #[test]
    fn generalize_appends_when_no_extension() {
        assert_eq!(
            generalize("textures/skies/tim_hell", AssetType::Shader),
            "textures/skies/tim_hell.shader"
        );
    }

    #[test]
    fn generalize_ignores_dots_in_directories() {
        assert_eq!(
            generalize("dir.v2/noext", AssetType::Texture),
            "dir.v2/noext.texture"
        );
    }

    #[test]
    fn misc_keeps_literal_name() {
        assert_eq!(generalize("botfiles/bots.txt", AssetType::Misc), "botfiles/bots.txt");
    }

    #[test]
    fn sanitize_normalizes_case_and_separators() {
        assert_eq!(sanitize("Sound\\World\\Wind.WAV"), "sound/world/wind.wav");
    }

    #[test]
    fn repeated_insertion_returns_same_vertex() {
        let mut graph = AssetGraph::new("basejs");
        let a = graph.add_texture("textures/wall.jpg", "basejs");
        let b = graph.add_texture("textures/wall.tga", "basejs");
        assert_eq!(a, b);
        assert_eq!(graph.id(a), "basejs/textures/wall.texture");
    }

    #[test]
    fn assets_are_owned_by_their_scope() {
        let mut graph = AssetGraph::new("basejs");
        let v = graph.add_audio("sound/wind.wav", "basejs");
        let scope = graph.graph().vertex("basejs").expect("scope vertex");
        assert!(graph.graph().out_neighbors(scope).contains(&v));
        assert_eq!(graph.data(v).game, "basejs");
    }

    #[test]
    fn map_record_builds_entity_and_shader_edges() {
        let mut graph = AssetGraph::new("basejs");
        let record = MapRecord {
            entities: vec![MapEntity {
                music: Some("music/fla22k_02.wav".to_string()),
                noise: Some("*3".to_string()),
                model: Some("models/mapobjects/lamps/flame.md3".to_string()),
                model2: None,
            }],
            shaders: vec![
                "textures/gothic_floor/largerblock3b".to_string(),
                "*lightmap0".to_string(),
            ],
        };
        let map_v = graph.add_map("maps/q3dm1.bsp", "basejs", &record, None);
        let out = graph.graph().out_neighbors(map_v);
        // music, model, one non-sentinel shader (as texture placeholder)
        assert_eq!(out.len(), 3);
        assert!(graph
            .graph()
            .vertex("basejs/music/fla22k_02.audio")
            .is_some());
        assert!(graph.graph().vertex("basejs/*3.audio").is_none());
        assert!(graph
            .graph()
            .vertex("basejs/textures/gothic_floor/largerblock3b.texture")
            .is_some());
    }

    #[test]
    fn script_shaders_reference_script_and_stages() {
        let mut graph = AssetGraph::new("basejs");
        let record = ScriptRecord {
            shaders: vec![ShaderRecord {
                name: "textures/base_wall/foobar".to_string(),
                stage_maps: vec![
                    "textures/base_wall/foobar_stage1.tga".to_string(),
                    "textures/base_wall/foobar_stage2.tga".to_string(),
                ],
                inner_box: Vec::new(),
                outer_box: Vec::new(),
            }],
        };
        let script_v = graph.add_script("scripts/base_wall.shader", "basejs", &record);
        let shader_v = graph
            .graph()
            .vertex("basejs/textures/base_wall/foobar.shader")
            .expect("shader vertex");
        let out = graph.graph().out_neighbors(shader_v);
        assert!(out.contains(&script_v));
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn model_record_builds_skin_and_surface_edges() {
        let mut graph = AssetGraph::new("basejs");
        let record = ModelRecord {
            skins: vec![
                "models/players/sarge/default.skin".to_string(),
                String::new(),
            ],
            surface_shaders: vec![
                "models/players/sarge/body".to_string(),
                String::new(),
            ],
        };
        let model_v = graph.add_model("models/players/sarge/upper.md3", "basejs", &record);
        let out = graph.graph().out_neighbors(model_v);
        // one skin and one surface material, empty table slots skipped
        assert_eq!(out.len(), 2);
        assert!(graph
            .graph()
            .vertex("basejs/models/players/sarge/default.skin")
            .is_some());
        assert!(graph
            .graph()
            .vertex("basejs/models/players/sarge/body.texture")
            .is_some());
    }

    #[test]
    fn mod_override_rewires_only_mod_edges() {
        let mut graph = AssetGraph::new("basejs");
        // base texture referenced by a base map and a mod map
        graph.add_texture("textures/wall.jpg", "basejs");
        let base_map = graph.add_map(
            "maps/m1.bsp",
            "basejs",
            &MapRecord {
                entities: Vec::new(),
                shaders: vec!["textures/wall".to_string()],
            },
            None,
        );
        let mod_map = graph.add_map(
            "maps/m1.bsp",
            "modx",
            &MapRecord {
                entities: Vec::new(),
                shaders: vec!["textures/wall".to_string()],
            },
            None,
        );
        let base_tex = graph.graph().vertex("basejs/textures/wall.texture").unwrap();
        assert!(graph.graph().in_neighbors(base_tex).contains(&mod_map));

        // the mod now ships its own texture of the same name
        let mod_tex = graph.add_texture("textures/wall.tga", "modx");
        assert!(graph.graph().out_neighbors(mod_map).contains(&mod_tex));
        assert!(!graph.graph().in_neighbors(base_tex).contains(&mod_map));
        assert!(graph.graph().out_neighbors(base_map).contains(&base_tex));
    }

    #[test]
    fn shader_shadows_texture_of_same_name() {
        let mut graph = AssetGraph::new("basejs");
        let map_v = graph.add_map(
            "maps/m1.bsp",
            "basejs",
            &MapRecord {
                entities: Vec::new(),
                shaders: vec!["textures/wall".to_string()],
            },
            None,
        );
        let tex_v = graph.graph().vertex("basejs/textures/wall.texture").unwrap();
        assert!(graph.graph().out_neighbors(map_v).contains(&tex_v));

        let record = ScriptRecord {
            shaders: vec![ShaderRecord {
                name: "textures/wall".to_string(),
                stage_maps: vec!["textures/wall_stage.tga".to_string()],
                inner_box: Vec::new(),
                outer_box: Vec::new(),
            }],
        };
        graph.add_script("scripts/walls.shader", "basejs", &record);
        let shader_v = graph.graph().vertex("basejs/textures/wall.shader").unwrap();
        assert!(graph.graph().out_neighbors(map_v).contains(&shader_v));
        assert!(!graph.graph().out_neighbors(map_v).contains(&tex_v));
        // shader dependencies are reachable from the map through the shader
        let stage_v = graph
            .graph()
            .vertex("basejs/textures/wall_stage.texture")
            .unwrap();
        assert!(graph.graph().out_neighbors(shader_v).contains(&stage_v));
    }

    #[test]
    fn map_adopts_assets_by_name_convention() {
        let mut graph = AssetGraph::new("basejs");
        // screenshot walked before the map
        let shot = graph.add_misc("levelshots/q3dm1.jpg", "basejs");
        let map_v = graph.add_map("maps/q3dm1.bsp", "basejs", &MapRecord::default(), None);
        assert!(graph.graph().out_neighbors(map_v).contains(&shot));
        // config walked after the map
        let cfg = graph.add_misc("maps/q3dm1.cfg", "basejs");
        assert!(graph.graph().out_neighbors(map_v).contains(&cfg));
    }

    #[test]
    fn map_whitelist_adopts_unrelated_assets() {
        let mut graph = AssetGraph::new("basejs");
        let whitelist = MatchList::parse(&["env/special".to_string()]).unwrap();
        let map_v = graph.add_map(
            "maps/q3dm1.bsp",
            "basejs",
            &MapRecord::default(),
            Some(whitelist),
        );
        let tex = graph.add_texture("env/special/sky.tga", "basejs");
        assert!(graph.graph().out_neighbors(map_v).contains(&tex));
    }

    #[test]
    fn unresolved_reference_creates_tracked_placeholder() {
        let mut graph = AssetGraph::new("basejs");
        let record = MapRecord {
            entities: vec![MapEntity {
                music: Some("music/missing.wav".to_string()),
                ..MapEntity::default()
            }],
            shaders: Vec::new(),
        };
        graph.add_map("maps/m1.bsp", "modx", &record, None);
        // fabricated in the base game, not the mod
        assert!(graph.graph().vertex("basejs/music/missing.audio").is_some());
        assert_eq!(
            graph.dangling_placeholders(),
            vec!["basejs/music/missing.audio".to_string()]
        );
    }

    #[test]
    fn placeholder_found_on_disk_is_not_dangling() {
        let mut graph = AssetGraph::new("basejs");
        let record = MapRecord {
            entities: vec![MapEntity {
                music: Some("music/late.wav".to_string()),
                ..MapEntity::default()
            }],
            shaders: Vec::new(),
        };
        graph.add_map("maps/m1.bsp", "basejs", &record, None);
        let v = graph.add_audio("music/late.wav", "basejs");
        graph.set_source(v, Path::new("/tmp/basejs"), "music/late.wav");
        assert!(graph.dangling_placeholders().is_empty());
    }

    #[test]
    fn mods_excludes_base_game() {
        let mut graph = AssetGraph::new("basejs");
        graph.add_game("basejs", None);
        graph.add_game("modx", None);
        assert_eq!(graph.mods(), vec!["modx".to_string()]);
    }

    #[test]
    fn maps_are_registered_per_game() {
        let mut graph = AssetGraph::new("basejs");
        graph.add_map("maps/q3dm1.bsp", "basejs", &MapRecord::default(), None);
        graph.add_map("maps/q3dm2.bsp", "basejs", &MapRecord::default(), None);
        assert_eq!(graph.maps("basejs"), ["q3dm1", "q3dm2"]);
        assert!(graph.maps("modx").is_empty());
        assert!(graph.map_vertex("basejs", "q3dm1").is_some());
    }
}
