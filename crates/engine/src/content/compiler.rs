use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use roxmltree::{Document, Node};
use tracing::{debug, info};

use crate::enemy::{AttackProfile, EnemyArchetype, TargetPolicy};
use crate::movement::MovementStrategy;
use crate::status::{OnContactEffect, StatusEffectKind};

use super::database::{DefDatabase, EnemyDef, EnemyDefId};
use super::discovery::discover_mod_sources;
use super::types::{ContentPaths, ContentPlanError, ContentPlanRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    Discovery,
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDefInMod,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub mod_id: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (mod={}, file={}, line={}, column={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (mod={}, file={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

/// The document being compiled, carried along for error locations.
#[derive(Clone, Copy)]
struct XmlSource<'a, 'input> {
    mod_id: &'a str,
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl XmlSource<'_, '_> {
    fn error(&self, code: ContentErrorCode, message: String, node: Node<'_, '_>) -> ContentCompileError {
        let pos = self.doc.text_pos_at(node.range().start);
        ContentCompileError {
            code,
            message,
            mod_id: self.mod_id.to_string(),
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }
}

pub fn compile_def_database(
    paths: &ContentPaths,
    request: &ContentPlanRequest,
) -> Result<DefDatabase, ContentCompileError> {
    let sources = discover_mod_sources(paths, request)
        .map_err(|error| map_discovery_error(error, &paths.base_content_dir))?;

    let mut merged = BTreeMap::<String, EnemyDef>::new();

    for source in sources {
        let xml_files = collect_xml_files_sorted(&source.source_dir)
            .map_err(|error| read_error(&source.mod_id, error.path, error.source))?;
        debug!(
            mod_id = %source.mod_id,
            load_index = source.load_index,
            xml_files = xml_files.len(),
            "content_mod_discovered"
        );
        let mut seen_in_mod = HashSet::<String>::new();

        for xml_file in xml_files {
            let raw = fs::read_to_string(&xml_file)
                .map_err(|source_err| read_error(&source.mod_id, xml_file.clone(), source_err))?;
            let archetypes = parse_defs_document(&source.mod_id, &xml_file, &raw)?;
            for archetype in archetypes {
                if !seen_in_mod.insert(archetype.def_name.clone()) {
                    return Err(ContentCompileError {
                        code: ContentErrorCode::DuplicateDefInMod,
                        message: format!(
                            "duplicate EnemyDef '{}' in mod '{}'; each mod may define a defName only once",
                            archetype.def_name, source.mod_id
                        ),
                        mod_id: source.mod_id.clone(),
                        file_path: xml_file.clone(),
                        location: None,
                    });
                }
                // Across mods the later mod overrides.
                merged.insert(
                    archetype.def_name.clone(),
                    EnemyDef {
                        id: EnemyDefId(0),
                        mod_id: source.mod_id.clone(),
                        archetype,
                    },
                );
            }
        }
    }

    let database = DefDatabase::from_enemy_defs(merged.into_values().collect());
    info!(enemy_defs = database.len(), "content_compiled");
    Ok(database)
}

fn parse_defs_document(
    mod_id: &str,
    file_path: &Path,
    raw: &str,
) -> Result<Vec<EnemyArchetype>, ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        mod_id: mod_id.to_string(),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    let src = XmlSource {
        mod_id,
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(src.error(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            root,
        ));
    }

    let mut defs = Vec::new();
    for child in root.children().filter(|node| node.is_element()) {
        if child.tag_name().name() != "EnemyDef" {
            return Err(src.error(
                ContentErrorCode::UnknownDefType,
                format!(
                    "unsupported def type <{}>; only <EnemyDef> is supported",
                    child.tag_name().name()
                ),
                child,
            ));
        }
        defs.push(parse_enemy_def(src, child)?);
    }

    Ok(defs)
}

fn parse_enemy_def(src: XmlSource<'_, '_>, node: Node<'_, '_>) -> Result<EnemyArchetype, ContentCompileError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut def_name: Option<String> = None;
    let mut label: Option<String> = None;
    let mut archetype = EnemyArchetype::default();

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        if !seen_fields.insert(field_name.clone()) {
            return Err(src.error(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{}> in <EnemyDef>", field_name),
                field,
            ));
        }

        match field_name.as_str() {
            "defName" => def_name = Some(required_text(src, field, "defName")?),
            "label" => label = Some(required_text(src, field, "label")?),
            "maxHealth" => {
                let value: u32 = parse_field(src, field, "maxHealth")?;
                if value == 0 {
                    return Err(src.error(
                        ContentErrorCode::InvalidValue,
                        "maxHealth must be >= 1".to_string(),
                        field,
                    ));
                }
                archetype.max_health = value;
            }
            "speed" => archetype.speed = non_negative(src, field, "speed")?,
            "contactDamage" => archetype.contact_damage = parse_field(src, field, "contactDamage")?,
            "visionRange" => archetype.vision_range = non_negative(src, field, "visionRange")?,
            "attackRange" => archetype.attack_range = non_negative(src, field, "attackRange")?,
            "attackCooldownMs" => {
                archetype.attack_cooldown =
                    Duration::from_millis(parse_field(src, field, "attackCooldownMs")?)
            }
            "radius" => {
                let value = non_negative(src, field, "radius")?;
                if value <= 0.0 {
                    return Err(src.error(
                        ContentErrorCode::InvalidValue,
                        "radius must be > 0".to_string(),
                        field,
                    ));
                }
                archetype.radius = value;
            }
            "damageScale" => archetype.damage_scale = non_negative(src, field, "damageScale")?,
            "movement" => archetype.movement = parse_movement(src, field)?,
            "attack" => archetype.attack = parse_attack(src, field)?,
            "contactEffects" => archetype.contact_effects = parse_contact_effects(src, field)?,
            "targetPolicy" => {
                let value = required_text(src, field, "targetPolicy")?;
                archetype.target_policy = match value.as_str() {
                    "Player" => TargetPolicy::Player,
                    "Summoner" => TargetPolicy::Summoner,
                    _ => {
                        return Err(src.error(
                            ContentErrorCode::InvalidValue,
                            format!(
                                "invalid targetPolicy '{}'; allowed values: Player, Summoner",
                                value
                            ),
                            field,
                        ))
                    }
                };
            }
            _ => {
                return Err(src.error(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{}> in <EnemyDef>", field_name),
                    field,
                ))
            }
        }
    }

    let Some(def_name) = def_name else {
        return Err(src.error(
            ContentErrorCode::MissingField,
            "missing required field <defName> in <EnemyDef>".to_string(),
            node,
        ));
    };
    let Some(label) = label else {
        return Err(src.error(
            ContentErrorCode::MissingField,
            "missing required field <label> in <EnemyDef>".to_string(),
            node,
        ));
    };
    archetype.def_name = def_name;
    archetype.label = label;
    Ok(archetype)
}

fn parse_movement(src: XmlSource<'_, '_>, node: Node<'_, '_>) -> Result<MovementStrategy, ContentCompileError> {
    let kind = required_attr(src, node, "kind")?;
    let movement = match kind {
        "Direct" => {
            check_attributes(src, node, &[])?;
            MovementStrategy::Direct
        }
        "Diagonal" => {
            check_attributes(src, node, &[])?;
            MovementStrategy::Diagonal
        }
        "Zigzag" => {
            check_attributes(src, node, &["amplitude", "frequencyHz"])?;
            MovementStrategy::Zigzag {
                amplitude: attr_f32(src, node, "amplitude", 40.0)?,
                frequency_hz: attr_f32(src, node, "frequencyHz", 2.0)?,
            }
        }
        "Dash" => {
            check_attributes(src, node, &["chargeMs", "burstMs", "cooldownMs", "dashSpeed"])?;
            MovementStrategy::Dash {
                charge: attr_ms(src, node, "chargeMs", 1_000)?,
                burst: attr_ms(src, node, "burstMs", 300)?,
                cooldown: attr_ms(src, node, "cooldownMs", 1_500)?,
                dash_speed: attr_f32(src, node, "dashSpeed", 6.0)?,
            }
        }
        "Orbit" => {
            check_attributes(src, node, &["radius", "angularSpeed"])?;
            MovementStrategy::Orbit {
                radius: attr_f32(src, node, "radius", 80.0)?,
                angular_speed: attr_signed_f32(src, node, "angularSpeed", 2.0)?,
            }
        }
        "KeepDistance" => {
            check_attributes(src, node, &["preferredDistance", "tolerance"])?;
            MovementStrategy::KeepDistance {
                preferred_distance: attr_f32(src, node, "preferredDistance", 180.0)?,
                tolerance: attr_f32(src, node, "tolerance", 20.0)?,
            }
        }
        "EdgePatrol" => {
            check_attributes(src, node, &["clockwise"])?;
            MovementStrategy::EdgePatrol {
                clockwise: attr_bool(src, node, "clockwise", true)?,
            }
        }
        other => {
            return Err(src.error(
                ContentErrorCode::InvalidValue,
                format!(
                    "invalid movement kind '{}'; allowed values: Direct, Zigzag, Dash, Orbit, KeepDistance, Diagonal, EdgePatrol",
                    other
                ),
                node,
            ))
        }
    };
    Ok(movement)
}

fn parse_attack(src: XmlSource<'_, '_>, node: Node<'_, '_>) -> Result<AttackProfile, ContentCompileError> {
    let kind = required_attr(src, node, "kind")?;
    match kind {
        "Melee" => {
            check_attributes(src, node, &["damage"])?;
            Ok(AttackProfile::Melee {
                damage: attr_parsed(src, node, "damage", 5)?,
            })
        }
        "Ranged" => {
            check_attributes(src, node, &["projectileSpeed", "damage"])?;
            Ok(AttackProfile::Ranged {
                projectile_speed: attr_f32(src, node, "projectileSpeed", 220.0)?,
                damage: attr_parsed(src, node, "damage", 4)?,
            })
        }
        other => Err(src.error(
            ContentErrorCode::InvalidValue,
            format!("invalid attack kind '{}'; allowed values: Melee, Ranged", other),
            node,
        )),
    }
}

fn parse_contact_effects(
    src: XmlSource<'_, '_>,
    node: Node<'_, '_>,
) -> Result<Vec<OnContactEffect>, ContentCompileError> {
    let mut effects = Vec::new();
    for item in node.children().filter(|child| child.is_element()) {
        if item.tag_name().name() != "li" {
            return Err(src.error(
                ContentErrorCode::UnknownField,
                format!("unexpected <{}> in <contactEffects>; use <li>", item.tag_name().name()),
                item,
            ));
        }
        let value = required_text(src, item, "li")?;
        let effect = match value.as_str() {
            "None" => OnContactEffect::None,
            other => match StatusEffectKind::parse(other) {
                Some(kind) => OnContactEffect::Apply(kind),
                None => {
                    return Err(src.error(
                        ContentErrorCode::InvalidValue,
                        format!(
                            "invalid contact effect '{}'; allowed values: Poison, Sleep, Fear, Stun, Encourage, None",
                            other
                        ),
                        item,
                    ))
                }
            },
        };
        if effects.contains(&effect) {
            return Err(src.error(
                ContentErrorCode::DuplicateField,
                format!("contact effect '{}' listed twice", value),
                item,
            ));
        }
        effects.push(effect);
    }
    Ok(effects)
}

fn required_text(
    src: XmlSource<'_, '_>,
    node: Node<'_, '_>,
    field_name: &str,
) -> Result<String, ContentCompileError> {
    let value = node.text().map(str::trim).unwrap_or_default().to_string();
    if value.is_empty() {
        return Err(src.error(
            ContentErrorCode::MissingField,
            format!("field <{}> must not be empty", field_name),
            node,
        ));
    }
    Ok(value)
}

fn parse_field<T: FromStr>(
    src: XmlSource<'_, '_>,
    node: Node<'_, '_>,
    field_name: &str,
) -> Result<T, ContentCompileError> {
    let value = required_text(src, node, field_name)?;
    value.parse::<T>().map_err(|_| {
        src.error(
            ContentErrorCode::InvalidValue,
            format!("{} '{}' is not a valid number", field_name, value),
            node,
        )
    })
}

fn non_negative(
    src: XmlSource<'_, '_>,
    node: Node<'_, '_>,
    field_name: &str,
) -> Result<f32, ContentCompileError> {
    let value: f32 = parse_field(src, node, field_name)?;
    if !value.is_finite() || value < 0.0 {
        return Err(src.error(
            ContentErrorCode::InvalidValue,
            format!("{} must be finite and >= 0", field_name),
            node,
        ));
    }
    Ok(value)
}

fn required_attr<'a>(
    src: XmlSource<'_, '_>,
    node: Node<'a, '_>,
    name: &str,
) -> Result<&'a str, ContentCompileError> {
    match node.attribute(name).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(src.error(
            ContentErrorCode::MissingField,
            format!(
                "<{}> requires a non-empty '{}' attribute",
                node.tag_name().name(),
                name
            ),
            node,
        )),
    }
}

/// Everything except `kind` must be one of `allowed`.
fn check_attributes(
    src: XmlSource<'_, '_>,
    node: Node<'_, '_>,
    allowed: &[&str],
) -> Result<(), ContentCompileError> {
    for attribute in node.attributes() {
        let name = attribute.name();
        if name != "kind" && !allowed.contains(&name) {
            return Err(src.error(
                ContentErrorCode::UnknownField,
                format!(
                    "unknown attribute '{}' on <{}>",
                    name,
                    node.tag_name().name()
                ),
                node,
            ));
        }
    }
    Ok(())
}

fn attr_parsed<T: FromStr>(
    src: XmlSource<'_, '_>,
    node: Node<'_, '_>,
    name: &str,
    default: T,
) -> Result<T, ContentCompileError> {
    let Some(raw) = node.attribute(name) else {
        return Ok(default);
    };
    raw.trim().parse::<T>().map_err(|_| {
        src.error(
            ContentErrorCode::InvalidValue,
            format!("attribute '{}' value '{}' is not valid", name, raw),
            node,
        )
    })
}

fn attr_signed_f32(
    src: XmlSource<'_, '_>,
    node: Node<'_, '_>,
    name: &str,
    default: f32,
) -> Result<f32, ContentCompileError> {
    let value = attr_parsed(src, node, name, default)?;
    if !value.is_finite() {
        return Err(src.error(
            ContentErrorCode::InvalidValue,
            format!("attribute '{}' must be finite", name),
            node,
        ));
    }
    Ok(value)
}

fn attr_f32(
    src: XmlSource<'_, '_>,
    node: Node<'_, '_>,
    name: &str,
    default: f32,
) -> Result<f32, ContentCompileError> {
    let value = attr_signed_f32(src, node, name, default)?;
    if value < 0.0 {
        return Err(src.error(
            ContentErrorCode::InvalidValue,
            format!("attribute '{}' must be >= 0", name),
            node,
        ));
    }
    Ok(value)
}

fn attr_ms(
    src: XmlSource<'_, '_>,
    node: Node<'_, '_>,
    name: &str,
    default_ms: u64,
) -> Result<Duration, ContentCompileError> {
    attr_parsed(src, node, name, default_ms).map(Duration::from_millis)
}

fn attr_bool(
    src: XmlSource<'_, '_>,
    node: Node<'_, '_>,
    name: &str,
    default: bool,
) -> Result<bool, ContentCompileError> {
    attr_parsed(src, node, name, default)
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<PathBuf>::new();
    collect_recursive(root, &mut files)?;
    files.sort_by_cached_key(|path| normalize_rel_path(path.strip_prefix(root).unwrap_or(path)));
    Ok(files)
}

fn collect_recursive(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_error(mod_id: &str, path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read XML content: {source}"),
        mod_id: mod_id.to_string(),
        file_path: path,
        location: None,
    }
}

fn map_discovery_error(error: ContentPlanError, base_dir: &Path) -> ContentCompileError {
    match error {
        ContentPlanError::EnabledModMissing {
            mod_id,
            expected_dir,
        } => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: format!(
                "enabled mod '{}' not found at {}; check enabled mod list",
                mod_id,
                expected_dir.display()
            ),
            mod_id,
            file_path: expected_dir,
            location: None,
        },
        other => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: other.to_string(),
            mod_id: "<discovery>".to_string(),
            file_path: base_dir.to_path_buf(),
            location: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn setup_paths(root: &Path) -> ContentPaths {
        let base = root.join("assets").join("base");
        let mods = root.join("mods");
        fs::create_dir_all(&base).expect("base");
        fs::create_dir_all(&mods).expect("mods");
        ContentPaths {
            base_content_dir: base,
            mods_dir: mods,
        }
    }

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write");
    }

    fn compile_base(xml: &str) -> Result<DefDatabase, ContentCompileError> {
        let temp = TempDir::new().expect("temp");
        let paths = setup_paths(temp.path());
        write_file(&paths.base_content_dir.join("enemies.xml"), xml);
        compile_def_database(&paths, &ContentPlanRequest::default())
    }

    #[test]
    fn valid_compile_assigns_stable_ids_by_def_name() {
        let db = compile_base(
            r#"<Defs>
                <EnemyDef><defName>zeta</defName><label>Zeta</label></EnemyDef>
                <EnemyDef><defName>alpha</defName><label>Alpha</label></EnemyDef>
            </Defs>"#,
        )
        .expect("compile");
        let alpha = db.enemy_def_id_by_name("alpha").expect("alpha");
        let zeta = db.enemy_def_id_by_name("zeta").expect("zeta");
        assert!(alpha.0 < zeta.0);
        assert_eq!(db.enemy_def(alpha).expect("def").mod_id, "base");
    }

    #[test]
    fn full_enemy_def_compiles_every_field() {
        let db = compile_base(
            r#"<Defs>
                <EnemyDef>
                    <defName>dust_bunny</defName>
                    <label>Dust Bunny</label>
                    <maxHealth>24</maxHealth>
                    <speed>70</speed>
                    <contactDamage>6</contactDamage>
                    <visionRange>300</visionRange>
                    <attackRange>30</attackRange>
                    <attackCooldownMs>800</attackCooldownMs>
                    <radius>10</radius>
                    <damageScale>0.5</damageScale>
                    <movement kind="Dash" chargeMs="1000" burstMs="250" cooldownMs="1200" dashSpeed="6"/>
                    <attack kind="Ranged" projectileSpeed="150" damage="3"/>
                    <contactEffects><li>Stun</li><li>Poison</li></contactEffects>
                    <targetPolicy>Summoner</targetPolicy>
                </EnemyDef>
            </Defs>"#,
        )
        .expect("compile");
        let bunny = db.enemy_archetype_by_name("dust_bunny").expect("def");
        assert_eq!(bunny.label, "Dust Bunny");
        assert_eq!(bunny.max_health, 24);
        assert!((bunny.speed - 70.0).abs() < f32::EPSILON);
        assert_eq!(bunny.contact_damage, 6);
        assert_eq!(bunny.attack_cooldown, Duration::from_millis(800));
        assert!((bunny.damage_scale - 0.5).abs() < f32::EPSILON);
        assert_eq!(
            bunny.movement,
            MovementStrategy::Dash {
                charge: Duration::from_millis(1_000),
                burst: Duration::from_millis(250),
                cooldown: Duration::from_millis(1_200),
                dash_speed: 6.0,
            }
        );
        assert_eq!(
            bunny.attack,
            AttackProfile::Ranged {
                projectile_speed: 150.0,
                damage: 3
            }
        );
        assert_eq!(
            bunny.contact_effects,
            vec![
                OnContactEffect::Apply(StatusEffectKind::Stun),
                OnContactEffect::Apply(StatusEffectKind::Poison)
            ]
        );
        assert_eq!(bunny.target_policy, TargetPolicy::Summoner);
    }

    #[test]
    fn optional_fields_use_archetype_defaults() {
        let db = compile_base(
            r#"<Defs><EnemyDef><defName>a</defName><label>A</label><movement kind="Zigzag" amplitude="12"/></EnemyDef></Defs>"#,
        )
        .expect("compile");
        let def = db.enemy_archetype_by_name("a").expect("def");
        let defaults = EnemyArchetype::default();
        assert_eq!(def.max_health, defaults.max_health);
        assert_eq!(def.attack, defaults.attack);
        assert_eq!(
            def.movement,
            MovementStrategy::Zigzag {
                amplitude: 12.0,
                frequency_hz: 2.0
            }
        );
    }

    #[test]
    fn missing_def_name_reports_mod_file_and_location() {
        let temp = TempDir::new().expect("temp");
        let paths = setup_paths(temp.path());
        write_file(
            &paths.base_content_dir.join("enemies.xml"),
            r#"<Defs><EnemyDef><label>X</label></EnemyDef></Defs>"#,
        );
        let err = compile_def_database(&paths, &ContentPlanRequest::default()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::MissingField);
        assert_eq!(err.mod_id, "base");
        assert!(err
            .file_path
            .ends_with(Path::new("assets").join("base").join("enemies.xml")));
        assert!(err.location.is_some());
        assert!(err.to_string().contains("line="));
    }

    #[test]
    fn unknown_field_errors() {
        let err = compile_base(
            r#"<Defs><EnemyDef><defName>a</defName><label>A</label><mood>Happy</mood></EnemyDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnknownField);
    }

    #[test]
    fn unknown_movement_attribute_errors() {
        let err = compile_base(
            r#"<Defs><EnemyDef><defName>a</defName><label>A</label><movement kind="Orbit" wobble="2"/></EnemyDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnknownField);
    }

    #[test]
    fn invalid_values_error() {
        for body in [
            r#"<movement kind="Teleport"/>"#,
            r#"<attack kind="Magic"/>"#,
            r#"<contactEffects><li>Confuse</li></contactEffects>"#,
            r#"<targetPolicy>Boss</targetPolicy>"#,
            r#"<speed>-3</speed>"#,
            r#"<maxHealth>0</maxHealth>"#,
            r#"<radius>0</radius>"#,
            r#"<movement kind="Dash" chargeMs="soon"/>"#,
        ] {
            let xml = format!(
                "<Defs><EnemyDef><defName>a</defName><label>A</label>{body}</EnemyDef></Defs>"
            );
            let err = compile_base(&xml).expect_err("err");
            assert_eq!(err.code, ContentErrorCode::InvalidValue, "{body}");
        }
    }

    #[test]
    fn wrong_root_and_def_type_error() {
        let err = compile_base(r#"<Things/>"#).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::InvalidRoot);
        let err = compile_base(r#"<Defs><ItemDef/></Defs>"#).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnknownDefType);
    }

    #[test]
    fn duplicate_field_errors() {
        let err = compile_base(
            r#"<Defs><EnemyDef><defName>a</defName><label>A</label><label>B</label></EnemyDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::DuplicateField);
    }

    #[test]
    fn malformed_xml_reports_location() {
        let err = compile_base(r#"<Defs><EnemyDef><defName>a</defName></Defs>"#).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::XmlMalformed);
        assert!(err.location.is_some());
    }

    #[test]
    fn same_mod_duplicate_def_errors() {
        let err = compile_base(
            r#"<Defs>
                <EnemyDef><defName>a</defName><label>A</label></EnemyDef>
                <EnemyDef><defName>a</defName><label>B</label></EnemyDef>
            </Defs>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::DuplicateDefInMod);
    }

    #[test]
    fn cross_mod_duplicate_is_last_mod_wins() {
        let temp = TempDir::new().expect("temp");
        let paths = setup_paths(temp.path());
        write_file(
            &paths.base_content_dir.join("enemies.xml"),
            r#"<Defs><EnemyDef><defName>sock_normal</defName><label>Base</label><speed>40</speed></EnemyDef></Defs>"#,
        );
        write_file(
            &paths.mods_dir.join("hard_mode").join("nested").join("socks.xml"),
            r#"<Defs><EnemyDef><defName>sock_normal</defName><label>Mod</label><speed>90</speed></EnemyDef></Defs>"#,
        );
        let db = compile_def_database(
            &paths,
            &ContentPlanRequest {
                enabled_mods: vec!["hard_mode".to_string()],
            },
        )
        .expect("compile");
        let id = db.enemy_def_id_by_name("sock_normal").expect("id");
        let def = db.enemy_def(id).expect("def");
        assert_eq!(def.archetype.label, "Mod");
        assert_eq!(def.mod_id, "hard_mode");
        assert!((def.archetype.speed - 90.0).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_enabled_mod_is_a_discovery_error() {
        let temp = TempDir::new().expect("temp");
        let paths = setup_paths(temp.path());
        let err = compile_def_database(
            &paths,
            &ContentPlanRequest {
                enabled_mods: vec!["ghost".to_string()],
            },
        )
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::Discovery);
        assert_eq!(err.mod_id, "ghost");
    }

    #[test]
    fn non_xml_files_are_ignored() {
        let temp = TempDir::new().expect("temp");
        let paths = setup_paths(temp.path());
        write_file(&paths.base_content_dir.join("notes.txt"), "not xml");
        write_file(
            &paths.base_content_dir.join("b").join("enemies.XML"),
            r#"<Defs><EnemyDef><defName>a</defName><label>A</label></EnemyDef></Defs>"#,
        );
        let db = compile_def_database(&paths, &ContentPlanRequest::default()).expect("compile");
        assert_eq!(db.len(), 1);
    }
}
