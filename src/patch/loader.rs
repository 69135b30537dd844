use crate::patch::codec::{decode_config, encode_patch, DecodeError};
use crate::patch::definition::PatchDefinition;
use crate::patch::errors::EncodeError;
use crate::patch::schema::{Metadata, PatchConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Decoded patch file, ready to apply.
#[derive(Debug, Clone)]
pub struct PatchSet {
    pub meta: Metadata,
    pub definitions: Vec<PatchDefinition>,
}

impl PatchSet {
    pub fn new(meta: Metadata, definitions: Vec<PatchDefinition>) -> Self {
        Self { meta, definitions }
    }

    pub fn from_config(config: &PatchConfig) -> Result<Self, ConfigError> {
        let definitions =
            decode_config(config).map_err(|source| ConfigError::Decode { path: None, source })?;
        Ok(Self::new(config.meta.clone(), definitions))
    }

    /// Persisted form of every definition. Fails on the first definition
    /// holding a closure.
    pub fn to_config(&self) -> Result<PatchConfig, EncodeError> {
        let patches = self
            .definitions
            .iter()
            .map(encode_patch)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PatchConfig {
            meta: self.meta.clone(),
            patches,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    /// `.json` files are JSON; everything else is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Toml,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Json {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
    Decode {
        path: Option<PathBuf>,
        source: DecodeError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = Some(path.to_path_buf());
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml { path, source },
            ConfigError::Json { path: None, source } => ConfigError::Json { path, source },
            ConfigError::Validation { path: None, source } => {
                ConfigError::Validation { path, source }
            }
            ConfigError::Decode { path: None, source } => ConfigError::Decode { path, source },
            other => other,
        }
    }
}

fn location(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" ({})", path.display()),
        None => String::new(),
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read patch file {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => {
                write!(f, "failed to parse patch TOML{}: {}", location(path), source)
            }
            ConfigError::Json { path, source } => {
                write!(f, "failed to parse patch JSON{}: {}", location(path), source)
            }
            ConfigError::Validation { path, source } => {
                write!(f, "invalid patch file{}: {}", location(path), source)
            }
            ConfigError::Decode { path, source } => {
                write!(f, "malformed patch{}: {}", location(path), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Json { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
            ConfigError::Decode { source, .. } => Some(source),
        }
    }
}

/// Parse and validate a TOML patch file.
pub fn load_from_str(input: &str) -> Result<PatchConfig, ConfigError> {
    let config: PatchConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    validated(config)
}

/// Parse and validate a JSON patch file.
pub fn load_from_json_str(input: &str) -> Result<PatchConfig, ConfigError> {
    let config: PatchConfig = serde_json::from_str(input)
        .map_err(|source| ConfigError::Json { path: None, source })?;
    validated(config)
}

fn validated(config: PatchConfig) -> Result<PatchConfig, ConfigError> {
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatchConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = match Format::from_path(path) {
        Format::Toml => load_from_str(&contents),
        Format::Json => load_from_json_str(&contents),
    };
    parsed.map_err(|error| error.with_path(path))
}

/// Load, validate and decode a patch file.
pub fn load_patch_set(path: impl AsRef<Path>) -> Result<PatchSet, ConfigError> {
    let path = path.as_ref();
    let config = load_from_path(path)?;
    PatchSet::from_config(&config).map_err(|error| error.with_path(path))
}

pub fn serialize_config(config: &PatchConfig, format: Format) -> Result<String, EncodeError> {
    let rendered = match format {
        Format::Toml => toml_edit::ser::to_string_pretty(config).map_err(|e| e.to_string()),
        Format::Json => serde_json::to_string_pretty(config).map_err(|e| e.to_string()),
    };
    rendered.map_err(EncodeError::Format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::schema::TransformSpec;

    const SAMPLE: &str = r#"
[meta]
name = "combat-1.20.4"
version_range = ">=1.20.4, <1.21.0"

[[patches]]
id = "retarget-hurt"
target_classes = ["net/minecraft/world/entity/LivingEntity"]
target_methods = ["hurt(Lnet/minecraft/world/damagesource/DamageSource;F)Z"]
target_annotations = ["Inject"]

[[patches.transforms]]
type = "modify-injection-point"
value = "INVOKE"
target = "Lnet/minecraft/world/entity/LivingEntity;actuallyHurt(Lnet/minecraft/world/damagesource/DamageSource;F)V"
reset_values = true

[[patches.transforms]]
type = "modify-method-params"
policy = { kind = "append", types = ["Z"] }
"#;

    #[test]
    fn parses_toml_patch_file() {
        let config = load_from_str(SAMPLE).unwrap();
        assert_eq!(config.meta.name, "combat-1.20.4");
        assert_eq!(config.patches.len(), 1);
        assert!(matches!(
            config.patches[0].transforms[0],
            TransformSpec::ModifyInjectionPoint {
                reset_values: true,
                ..
            }
        ));
    }

    #[test]
    fn decodes_into_definitions() {
        let set = PatchSet::from_config(&load_from_str(SAMPLE).unwrap()).unwrap();
        assert_eq!(set.definitions.len(), 1);
        assert_eq!(set.definitions[0].transforms().len(), 2);
    }

    #[test]
    fn unknown_transform_type_is_a_parse_error() {
        let input = r#"
[[patches]]
id = "x"

[[patches.transforms]]
type = "rename-everything"
"#;
        assert!(matches!(
            load_from_str(input),
            Err(ConfigError::Toml { .. })
        ));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(Format::from_path(Path::new("a/b.JSON")), Format::Json);
        assert_eq!(Format::from_path(Path::new("a/b.toml")), Format::Toml);
        assert_eq!(Format::from_path(Path::new("a/b")), Format::Toml);
    }
}
