use std::collections::HashMap;
use std::fmt;

// id Tech 3 BSP (IBSP v46/47). Only the lumps the packer needs are decoded:
// entities (ambient audio / secondary model references) and shaders (the
// map's material table).

const LUMP_COUNT: usize = 17;
const SUPPORTED_VERSIONS: [u32; 2] = [46, 47];

const LUMP_ENTITIES: usize = 0;
const LUMP_SHADERS: usize = 1;

const SHADER_STRIDE: usize = 72;
const SHADER_NAME_LEN: usize = 64;

#[derive(Debug)]
pub enum BspError {
    InvalidHeader,
    Truncated,
    UnsupportedVersion(u32),
    LumpOutOfBounds { lump: &'static str },
    InvalidLumpSize { lump: &'static str, size: u32, stride: u32 },
    MalformedEntities { offset: usize, message: String },
}

impl fmt::Display for BspError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BspError::InvalidHeader => write!(f, "invalid q3 bsp header"),
            BspError::Truncated => write!(f, "q3 bsp data is truncated"),
            BspError::UnsupportedVersion(version) => {
                write!(f, "unsupported q3 bsp version {}", version)
            }
            BspError::LumpOutOfBounds { lump } => {
                write!(f, "q3 bsp lump out of bounds: {}", lump)
            }
            BspError::InvalidLumpSize { lump, size, stride } => write!(
                f,
                "q3 bsp lump has invalid size: {} (size {}, stride {})",
                lump, size, stride
            ),
            BspError::MalformedEntities { offset, message } => {
                write!(f, "q3 bsp entities lump malformed at byte {}: {}", offset, message)
            }
        }
    }
}

impl std::error::Error for BspError {}

/// One entity from the entities lump: a bag of key/value properties.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entity {
    pairs: HashMap<String, String>,
}

impl Entity {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct Bsp {
    pub entities: Vec<Entity>,
    pub shaders: Vec<String>,
}

#[derive(Debug, Copy, Clone)]
struct Lump {
    offset: u32,
    length: u32,
}

pub fn parse_bsp(data: &[u8]) -> Result<Bsp, BspError> {
    let lumps = parse_header(data)?;
    let entities = parse_entities(lump_slice(data, lumps[LUMP_ENTITIES]))?;
    let shaders = parse_shaders(lump_slice(data, lumps[LUMP_SHADERS]))?;
    Ok(Bsp { entities, shaders })
}

fn parse_header(data: &[u8]) -> Result<[Lump; LUMP_COUNT], BspError> {
    if data.len() < 8 {
        return Err(BspError::Truncated);
    }
    if &data[0..4] != b"IBSP" {
        return Err(BspError::InvalidHeader);
    }
    let version = read_u32_le(&data[4..8]);
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(BspError::UnsupportedVersion(version));
    }

    let header_len = 8 + LUMP_COUNT * 8;
    if data.len() < header_len {
        return Err(BspError::Truncated);
    }

    let mut lumps = [Lump { offset: 0, length: 0 }; LUMP_COUNT];
    for (i, lump) in lumps.iter_mut().enumerate() {
        let base = 8 + i * 8;
        let offset = read_u32_le(&data[base..base + 4]);
        let length = read_u32_le(&data[base + 4..base + 8]);
        let end = offset.checked_add(length).ok_or(BspError::LumpOutOfBounds {
            lump: lump_name(i),
        })?;
        if end as usize > data.len() {
            return Err(BspError::LumpOutOfBounds { lump: lump_name(i) });
        }
        *lump = Lump { offset, length };
    }
    Ok(lumps)
}

/// Entities lump text: `{ "key" "value" … }` blocks, optionally
/// NUL-terminated. Malformed structure is an error; game data is a fixed
/// versioned input and a parse failure means a broken build, not content to
/// skip.
fn parse_entities(data: &[u8]) -> Result<Vec<Entity>, BspError> {
    let text = data.split(|&b| b == 0).next().unwrap_or(data);
    let mut entities = Vec::new();
    let mut current: Option<Entity> = None;
    let mut pos = 0usize;

    while pos < text.len() {
        let b = text[pos];
        if b.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        match b {
            b'{' => {
                if current.is_some() {
                    return Err(malformed(pos, "nested '{'"));
                }
                current = Some(Entity::default());
                pos += 1;
            }
            b'}' => {
                let entity = current.take().ok_or_else(|| malformed(pos, "'}' outside entity"))?;
                entities.push(entity);
                pos += 1;
            }
            b'"' => {
                let entity = current
                    .as_mut()
                    .ok_or_else(|| malformed(pos, "quoted string outside entity"))?;
                let (key, after_key) = read_quoted(text, pos)?;
                let mut cursor = after_key;
                while cursor < text.len() && text[cursor].is_ascii_whitespace() {
                    cursor += 1;
                }
                if cursor >= text.len() || text[cursor] != b'"' {
                    return Err(malformed(cursor, "property key without value"));
                }
                let (value, after_value) = read_quoted(text, cursor)?;
                entity.pairs.insert(key, value);
                pos = after_value;
            }
            _ => return Err(malformed(pos, "unexpected character")),
        }
    }
    if current.is_some() {
        return Err(malformed(text.len(), "unterminated entity block"));
    }
    Ok(entities)
}

fn read_quoted(text: &[u8], start: usize) -> Result<(String, usize), BspError> {
    let mut end = start + 1;
    while end < text.len() && text[end] != b'"' {
        end += 1;
    }
    if end >= text.len() {
        return Err(malformed(start, "unterminated quoted string"));
    }
    let raw = &text[start + 1..end];
    Ok((String::from_utf8_lossy(raw).into_owned(), end + 1))
}

fn malformed(offset: usize, message: &str) -> BspError {
    BspError::MalformedEntities {
        offset,
        message: message.to_string(),
    }
}

fn parse_shaders(data: &[u8]) -> Result<Vec<String>, BspError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if !data.len().is_multiple_of(SHADER_STRIDE) {
        return Err(BspError::InvalidLumpSize {
            lump: "shaders",
            size: data.len() as u32,
            stride: SHADER_STRIDE as u32,
        });
    }
    let mut shaders = Vec::with_capacity(data.len() / SHADER_STRIDE);
    for chunk in data.chunks_exact(SHADER_STRIDE) {
        shaders.push(read_fixed_name(&chunk[..SHADER_NAME_LEN]));
    }
    Ok(shaders)
}

pub(crate) fn read_fixed_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn lump_name(index: usize) -> &'static str {
    match index {
        LUMP_ENTITIES => "entities",
        LUMP_SHADERS => "shaders",
        _ => "unused",
    }
}

fn lump_slice(data: &[u8], lump: Lump) -> &[u8] {
    let start = lump.offset as usize;
    &data[start..start + lump.length as usize]
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_bsp(entities: &[u8], shader_names: &[&str]) -> Vec<u8> {
        let header_len = 8 + LUMP_COUNT * 8;
        let mut shaders = Vec::new();
        for name in shader_names {
            let mut chunk = vec![0u8; SHADER_STRIDE];
            chunk[..name.len()].copy_from_slice(name.as_bytes());
            shaders.extend_from_slice(&chunk);
        }

        let mut data = vec![0u8; header_len];
        data[0..4].copy_from_slice(b"IBSP");
        data[4..8].copy_from_slice(&46u32.to_le_bytes());
        let ent_offset = data.len() as u32;
        data.extend_from_slice(entities);
        let shader_offset = data.len() as u32;
        data.extend_from_slice(&shaders);

        let ent_base = 8 + LUMP_ENTITIES * 8;
        data[ent_base..ent_base + 4].copy_from_slice(&ent_offset.to_le_bytes());
        data[ent_base + 4..ent_base + 8].copy_from_slice(&(entities.len() as u32).to_le_bytes());
        let shader_base = 8 + LUMP_SHADERS * 8;
        data[shader_base..shader_base + 4].copy_from_slice(&shader_offset.to_le_bytes());
        data[shader_base + 4..shader_base + 8]
            .copy_from_slice(&(shaders.len() as u32).to_le_bytes());
        data
    }

    #[test]
    fn parse_entities_and_shaders() {
        let entities = br#"
{
"classname" "worldspawn"
"music" "music/fla22k_02.wav"
}
{
"classname" "misc_model"
"model2" "models/mapobjects/flame.md3"
}
"#;
        let data = build_bsp(entities, &["textures/gothic_floor/largerblock3b", "*lightmap0"]);
        let bsp = parse_bsp(&data).expect("parse ok");
        assert_eq!(bsp.entities.len(), 2);
        assert_eq!(bsp.entities[0].get("music"), Some("music/fla22k_02.wav"));
        assert_eq!(
            bsp.entities[1].get("model2"),
            Some("models/mapobjects/flame.md3")
        );
        assert_eq!(
            bsp.shaders,
            vec![
                "textures/gothic_floor/largerblock3b".to_string(),
                "*lightmap0".to_string()
            ]
        );
    }

    #[test]
    fn entities_tolerate_trailing_nul() {
        let mut entities = b"{\n\"classname\" \"worldspawn\"\n}\n".to_vec();
        entities.push(0);
        let data = build_bsp(&entities, &[]);
        let bsp = parse_bsp(&data).expect("parse ok");
        assert_eq!(bsp.entities.len(), 1);
    }

    #[test]
    fn malformed_entities_is_an_error() {
        let data = build_bsp(b"{ \"key\" }", &[]);
        let err = parse_bsp(&data).expect_err("should fail");
        assert!(matches!(err, BspError::MalformedEntities { .. }));
    }

    #[test]
    fn unterminated_entity_is_an_error() {
        let data = build_bsp(b"{ \"a\" \"b\"", &[]);
        assert!(matches!(
            parse_bsp(&data),
            Err(BspError::MalformedEntities { .. })
        ));
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut data = vec![0u8; 8 + LUMP_COUNT * 8];
        data[0..4].copy_from_slice(b"VBSP");
        data[4..8].copy_from_slice(&46u32.to_le_bytes());
        assert!(matches!(parse_bsp(&data), Err(BspError::InvalidHeader)));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut data = vec![0u8; 8 + LUMP_COUNT * 8];
        data[0..4].copy_from_slice(b"IBSP");
        data[4..8].copy_from_slice(&38u32.to_le_bytes());
        assert!(matches!(
            parse_bsp(&data),
            Err(BspError::UnsupportedVersion(38))
        ));
    }

    #[test]
    fn rejects_lump_past_end() {
        let mut data = vec![0u8; 8 + LUMP_COUNT * 8];
        data[0..4].copy_from_slice(b"IBSP");
        data[4..8].copy_from_slice(&46u32.to_le_bytes());
        let base = 8 + LUMP_SHADERS * 8;
        data[base..base + 4].copy_from_slice(&4096u32.to_le_bytes());
        data[base + 4..base + 8].copy_from_slice(&72u32.to_le_bytes());
        assert!(matches!(
            parse_bsp(&data),
            Err(BspError::LumpOutOfBounds { .. })
        ));
    }
}
