use std::fmt;

use crate::bsp::read_fixed_name;

// MD3 (IDP3 v15). Only the per-surface shader table is decoded; vertex and
// animation data never matter for packing. The header declares a skin count
// but carries no skin names, so `skins` is populated only when a future
// format revision supplies them.

const MD3_MAGIC: &[u8; 4] = b"IDP3";
const MD3_VERSION: i32 = 15;

const HEADER_LEN: usize = 108;
const SURFACE_HEADER_LEN: usize = 108;
const SHADER_ENTRY_LEN: usize = 68;
const NAME_LEN: usize = 64;

const MAX_SURFACES: usize = 1024;
const MAX_SURFACE_SHADERS: usize = 256;

#[derive(Debug)]
pub enum Md3Error {
    InvalidHeader,
    Truncated,
    UnsupportedVersion(i32),
    SurfaceOutOfBounds { index: usize },
    TooManySurfaces { count: usize },
    TooManyShaders { surface: String, count: usize },
}

impl fmt::Display for Md3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Md3Error::InvalidHeader => write!(f, "invalid md3 header"),
            Md3Error::Truncated => write!(f, "md3 data is truncated"),
            Md3Error::UnsupportedVersion(version) => {
                write!(f, "unsupported md3 version {}", version)
            }
            Md3Error::SurfaceOutOfBounds { index } => {
                write!(f, "md3 surface {} out of bounds", index)
            }
            Md3Error::TooManySurfaces { count } => {
                write!(f, "md3 declares too many surfaces ({})", count)
            }
            Md3Error::TooManyShaders { surface, count } => {
                write!(f, "md3 surface {} declares too many shaders ({})", surface, count)
            }
        }
    }
}

impl std::error::Error for Md3Error {}

#[derive(Clone, Debug)]
pub struct Md3Surface {
    pub name: String,
    pub shaders: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Md3 {
    pub name: String,
    pub skins: Vec<String>,
    pub surfaces: Vec<Md3Surface>,
}

pub fn parse_md3(data: &[u8]) -> Result<Md3, Md3Error> {
    if data.len() < HEADER_LEN {
        return Err(Md3Error::Truncated);
    }
    if &data[0..4] != MD3_MAGIC {
        return Err(Md3Error::InvalidHeader);
    }
    let version = read_i32_le(&data[4..8]);
    if version != MD3_VERSION {
        return Err(Md3Error::UnsupportedVersion(version));
    }

    let name = read_fixed_name(&data[8..8 + NAME_LEN]);
    let num_surfaces = read_i32_le(&data[84..88]).max(0) as usize;
    let ofs_surfaces = read_i32_le(&data[100..104]).max(0) as usize;
    if num_surfaces > MAX_SURFACES {
        return Err(Md3Error::TooManySurfaces { count: num_surfaces });
    }

    let mut surfaces = Vec::with_capacity(num_surfaces);
    let mut cursor = ofs_surfaces;
    for index in 0..num_surfaces {
        let (surface, next) = parse_surface(data, cursor, index)?;
        surfaces.push(surface);
        cursor = next;
    }

    Ok(Md3 {
        name,
        skins: Vec::new(),
        surfaces,
    })
}

fn parse_surface(data: &[u8], offset: usize, index: usize) -> Result<(Md3Surface, usize), Md3Error> {
    let end = offset
        .checked_add(SURFACE_HEADER_LEN)
        .ok_or(Md3Error::SurfaceOutOfBounds { index })?;
    if end > data.len() {
        return Err(Md3Error::SurfaceOutOfBounds { index });
    }
    let header = &data[offset..end];
    if &header[0..4] != MD3_MAGIC {
        return Err(Md3Error::SurfaceOutOfBounds { index });
    }
    let name = read_fixed_name(&header[4..4 + NAME_LEN]);
    let num_shaders = read_i32_le(&header[76..80]).max(0) as usize;
    let ofs_shaders = read_i32_le(&header[92..96]).max(0) as usize;
    let ofs_end = read_i32_le(&header[104..108]).max(0) as usize;
    if num_shaders > MAX_SURFACE_SHADERS {
        return Err(Md3Error::TooManyShaders {
            surface: name,
            count: num_shaders,
        });
    }

    let shaders_start = offset
        .checked_add(ofs_shaders)
        .ok_or(Md3Error::SurfaceOutOfBounds { index })?;
    let shaders_end = shaders_start
        .checked_add(num_shaders * SHADER_ENTRY_LEN)
        .ok_or(Md3Error::SurfaceOutOfBounds { index })?;
    if shaders_end > data.len() {
        return Err(Md3Error::SurfaceOutOfBounds { index });
    }

    let mut shaders = Vec::with_capacity(num_shaders);
    for chunk in data[shaders_start..shaders_end].chunks_exact(SHADER_ENTRY_LEN) {
        shaders.push(read_fixed_name(&chunk[..NAME_LEN]));
    }

    let next = offset
        .checked_add(ofs_end)
        .ok_or(Md3Error::SurfaceOutOfBounds { index })?;
    if next > data.len() || next <= offset {
        return Err(Md3Error::SurfaceOutOfBounds { index });
    }
    Ok((Md3Surface { name, shaders }, next))
}

fn read_i32_le(bytes: &[u8]) -> i32 {
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_md3(surface_shaders: &[&[&str]]) -> Vec<u8> {
        let mut data = vec![0u8; HEADER_LEN];
        data[0..4].copy_from_slice(MD3_MAGIC);
        data[4..8].copy_from_slice(&MD3_VERSION.to_le_bytes());
        data[8..8 + 10].copy_from_slice(b"testmodel\0");
        data[84..88].copy_from_slice(&(surface_shaders.len() as i32).to_le_bytes());
        data[100..104].copy_from_slice(&(HEADER_LEN as i32).to_le_bytes());

        for (i, shaders) in surface_shaders.iter().enumerate() {
            let surface_len = SURFACE_HEADER_LEN + shaders.len() * SHADER_ENTRY_LEN;
            let mut surface = vec![0u8; surface_len];
            surface[0..4].copy_from_slice(MD3_MAGIC);
            let surf_name = format!("surface{}", i);
            surface[4..4 + surf_name.len()].copy_from_slice(surf_name.as_bytes());
            surface[76..80].copy_from_slice(&(shaders.len() as i32).to_le_bytes());
            surface[92..96].copy_from_slice(&(SURFACE_HEADER_LEN as i32).to_le_bytes());
            surface[104..108].copy_from_slice(&(surface_len as i32).to_le_bytes());
            for (j, shader) in shaders.iter().enumerate() {
                let base = SURFACE_HEADER_LEN + j * SHADER_ENTRY_LEN;
                surface[base..base + shader.len()].copy_from_slice(shader.as_bytes());
            }
            data.extend_from_slice(&surface);
        }
        data
    }

    #[test]
    fn parse_surfaces_and_shaders() {
        let data = build_md3(&[
            &["models/mapobjects/flame/flame1"],
            &["models/mapobjects/flame/flame2", ""],
        ]);
        let md3 = parse_md3(&data).expect("parse ok");
        assert_eq!(md3.name, "testmodel");
        assert_eq!(md3.surfaces.len(), 2);
        assert_eq!(
            md3.surfaces[0].shaders,
            vec!["models/mapobjects/flame/flame1".to_string()]
        );
        // empty shader names survive decoding; the graph layer skips them
        assert_eq!(md3.surfaces[1].shaders.len(), 2);
        assert_eq!(md3.surfaces[1].shaders[1], "");
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut data = build_md3(&[]);
        data[0..4].copy_from_slice(b"IDP2");
        assert!(matches!(parse_md3(&data), Err(Md3Error::InvalidHeader)));
    }

    #[test]
    fn rejects_wrong_version() {
        let mut data = build_md3(&[]);
        data[4..8].copy_from_slice(&14i32.to_le_bytes());
        assert!(matches!(
            parse_md3(&data),
            Err(Md3Error::UnsupportedVersion(14))
        ));
    }

    #[test]
    fn rejects_surface_past_end() {
        let mut data = build_md3(&[&["shader"]]);
        let len = data.len();
        data.truncate(len - 4);
        assert!(matches!(
            parse_md3(&data),
            Err(Md3Error::SurfaceOutOfBounds { .. })
        ));
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(matches!(parse_md3(b"IDP3"), Err(Md3Error::Truncated)));
    }
}
