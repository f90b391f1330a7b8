use std::fmt;

// Quake 3 shader scripts: a sequence of `name { … { stage } … }` blocks.
// The packer wants the texture references only: stage maps (`map`,
// `clampmap`, `animmap` frames) and `skyparms` box faces. Built-in
// materials (`$lightmap`, `$whiteimage`) are not files and are dropped
// here.

const SKY_FACE_SUFFIXES: [&str; 6] = ["_rt", "_bk", "_lf", "_ft", "_up", "_dn"];

#[derive(Debug)]
pub enum ShaderError {
    UnexpectedEndOfScript,
    UnexpectedToken { line: usize, token: String },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::UnexpectedEndOfScript => write!(f, "shader script ends mid-block"),
            ShaderError::UnexpectedToken { line, token } => {
                write!(f, "unexpected token '{}' on line {}", token, line)
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// One shader definition: the texture names its stages and sky parms pull
/// in. Names come out as written (no extension normalization; identity
/// generalization happens in the graph).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShaderDef {
    pub name: String,
    pub stage_maps: Vec<String>,
    pub inner_box: Vec<String>,
    pub outer_box: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Token<'a> {
    text: &'a str,
    line: usize,
}

pub fn parse_script(text: &str) -> Result<Vec<ShaderDef>, ShaderError> {
    let tokens = tokenize(text);
    let mut defs = Vec::new();
    let mut cursor = 0usize;

    while cursor < tokens.len() {
        let name_token = tokens[cursor];
        if name_token.text == "{" || name_token.text == "}" {
            return Err(ShaderError::UnexpectedToken {
                line: name_token.line,
                token: name_token.text.to_string(),
            });
        }
        cursor += 1;
        let open = tokens.get(cursor).ok_or(ShaderError::UnexpectedEndOfScript)?;
        if open.text != "{" {
            return Err(ShaderError::UnexpectedToken {
                line: open.line,
                token: open.text.to_string(),
            });
        }
        cursor += 1;
        let (def, next) = parse_shader_body(name_token.text, &tokens, cursor)?;
        defs.push(def);
        cursor = next;
    }
    Ok(defs)
}

fn parse_shader_body<'a>(
    name: &str,
    tokens: &[Token<'a>],
    mut cursor: usize,
) -> Result<(ShaderDef, usize), ShaderError> {
    let mut def = ShaderDef {
        name: name.to_string(),
        ..ShaderDef::default()
    };

    while cursor < tokens.len() {
        let token = tokens[cursor];
        match token.text {
            "}" => return Ok((def, cursor + 1)),
            "{" => {
                cursor = parse_stage(&mut def, tokens, cursor + 1)?;
            }
            text if text.eq_ignore_ascii_case("skyparms") => {
                cursor += 1;
                let mut boxes = [None, None];
                // skyparms <outerbox|-> <cloudheight|-> <innerbox|->
                for (slot, target) in [(0usize, 0usize), (2, 1)] {
                    if let Some(param) = tokens.get(cursor + slot) {
                        if param.line == token.line
                            && param.text != "-"
                            && param.text != "{"
                            && param.text != "}"
                        {
                            boxes[target] = Some(param.text.to_string());
                        }
                    }
                }
                if let Some(outer) = &boxes[0] {
                    def.outer_box = sky_faces(outer);
                }
                if let Some(inner) = &boxes[1] {
                    def.inner_box = sky_faces(inner);
                }
                cursor = skip_directive(tokens, cursor);
            }
            _ => {
                cursor = skip_directive(tokens, cursor + 1);
            }
        }
    }
    Err(ShaderError::UnexpectedEndOfScript)
}

fn parse_stage<'a>(
    def: &mut ShaderDef,
    tokens: &[Token<'a>],
    mut cursor: usize,
) -> Result<usize, ShaderError> {
    while cursor < tokens.len() {
        let token = tokens[cursor];
        match token.text {
            "}" => return Ok(cursor + 1),
            "{" => {
                return Err(ShaderError::UnexpectedToken {
                    line: token.line,
                    token: "{".to_string(),
                })
            }
            text if text.eq_ignore_ascii_case("map") || text.eq_ignore_ascii_case("clampmap") => {
                if let Some(target) = tokens.get(cursor + 1) {
                    push_stage_map(def, target.text);
                }
                cursor = skip_directive(tokens, cursor + 1);
            }
            text if text.eq_ignore_ascii_case("animmap") => {
                // animmap <frequency> <frame…>
                cursor += 2;
                while cursor < tokens.len() {
                    let frame = tokens[cursor];
                    if frame.text == "{" || frame.text == "}" || frame.line != token.line {
                        break;
                    }
                    push_stage_map(def, frame.text);
                    cursor += 1;
                }
            }
            _ => {
                cursor = skip_directive(tokens, cursor + 1);
            }
        }
    }
    Err(ShaderError::UnexpectedEndOfScript)
}

/// Directives are line-oriented: everything up to the next line (or brace)
/// belongs to the current directive.
fn skip_directive<'a>(tokens: &[Token<'a>], start: usize) -> usize {
    if start >= tokens.len() {
        return start;
    }
    let line = tokens[start.saturating_sub(1)].line;
    let mut cursor = start;
    while cursor < tokens.len() {
        let token = tokens[cursor];
        if token.text == "{" || token.text == "}" || token.line != line {
            break;
        }
        cursor += 1;
    }
    cursor
}

fn push_stage_map(def: &mut ShaderDef, name: &str) {
    if name.starts_with('$') {
        return;
    }
    def.stage_maps.push(name.to_string());
}

fn sky_faces(base: &str) -> Vec<String> {
    SKY_FACE_SUFFIXES
        .iter()
        .map(|suffix| format!("{}{}", base, suffix))
        .collect()
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    for (index, raw_line) in text.lines().enumerate() {
        let line = index + 1;
        let content = match raw_line.find("//") {
            Some(pos) => &raw_line[..pos],
            None => raw_line,
        };
        let mut rest = content;
        while let Some(start) = rest.find(|c: char| !c.is_whitespace()) {
            rest = &rest[start..];
            let token_len = if rest.starts_with('{') || rest.starts_with('}') {
                1
            } else {
                rest.find(|c: char| c.is_whitespace() || c == '{' || c == '}')
                    .unwrap_or(rest.len())
            };
            tokens.push(Token {
                text: &rest[..token_len],
                line,
            });
            rest = &rest[token_len..];
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_stages_and_directives() {
        let script = r#"
// wall materials
textures/base_wall/foobar
{
    surfaceparm metalsteps
    {
        map $lightmap
        rgbGen identity
    }
    {
        map textures/base_wall/foobar_stage1.tga
        blendFunc GL_DST_COLOR GL_ZERO
    }
    {
        clampmap textures/base_wall/foobar_stage2.tga
    }
}
"#;
        let defs = parse_script(script).expect("parse ok");
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "textures/base_wall/foobar");
        assert_eq!(
            defs[0].stage_maps,
            vec![
                "textures/base_wall/foobar_stage1.tga".to_string(),
                "textures/base_wall/foobar_stage2.tga".to_string()
            ]
        );
    }

    #[test]
    fn animmap_collects_all_frames() {
        let script = r#"
textures/sfx/flame
{
    {
        animMap 10 textures/sfx/flame1.tga textures/sfx/flame2.tga
        blendFunc GL_ONE GL_ONE
    }
}
"#;
        let defs = parse_script(script).expect("parse ok");
        assert_eq!(
            defs[0].stage_maps,
            vec![
                "textures/sfx/flame1.tga".to_string(),
                "textures/sfx/flame2.tga".to_string()
            ]
        );
    }

    #[test]
    fn skyparms_expands_box_faces() {
        let script = r#"
textures/skies/tim_hell
{
    skyparms env/hell - -
    {
        map textures/skies/clouds.tga
    }
}
"#;
        let defs = parse_script(script).expect("parse ok");
        assert_eq!(
            defs[0].outer_box,
            vec![
                "env/hell_rt".to_string(),
                "env/hell_bk".to_string(),
                "env/hell_lf".to_string(),
                "env/hell_ft".to_string(),
                "env/hell_up".to_string(),
                "env/hell_dn".to_string()
            ]
        );
        assert!(defs[0].inner_box.is_empty());
        assert_eq!(defs[0].stage_maps, vec!["textures/skies/clouds.tga".to_string()]);
    }

    #[test]
    fn truncated_skyparms_does_not_eat_next_line() {
        let script = r#"
textures/skies/broken
{
    skyparms
    surfaceparm nolightmap
    {
        map textures/skies/clouds.tga
    }
}
"#;
        let defs = parse_script(script).expect("parse ok");
        assert!(defs[0].outer_box.is_empty());
        assert!(defs[0].inner_box.is_empty());
        assert_eq!(defs[0].stage_maps, vec!["textures/skies/clouds.tga".to_string()]);
    }

    #[test]
    fn multiple_shaders_in_one_script() {
        let script = r#"
textures/a { { map textures/a.tga } }
textures/b { { map textures/b.tga } }
"#;
        let defs = parse_script(script).expect("parse ok");
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[1].name, "textures/b");
        assert_eq!(defs[1].stage_maps, vec!["textures/b.tga".to_string()]);
    }

    #[test]
    fn unterminated_block_is_an_error() {
        let script = "textures/a {\n { map textures/a.tga }\n";
        assert!(matches!(
            parse_script(script),
            Err(ShaderError::UnexpectedEndOfScript)
        ));
    }

    #[test]
    fn stray_brace_is_an_error() {
        assert!(matches!(
            parse_script("}"),
            Err(ShaderError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn comments_are_ignored() {
        let script = "textures/a // trailing\n{\n// { map bogus.tga }\n{ map textures/a.tga }\n}\n";
        let defs = parse_script(script).expect("parse ok");
        assert_eq!(defs[0].stage_maps, vec!["textures/a.tga".to_string()]);
    }
}
