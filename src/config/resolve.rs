//! Layered override resolution.
//!
//! Precedence, lowest to highest: builtin defaults, config file, topic-file
//! overrides, CLI `--set`, request overrides. Later layers win per path.
//! Resolution is pure: no I/O, no environment reads, and identical inputs
//! always produce field-for-field identical snapshots.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use serde_json::Value;
use thiserror::Error;

use crate::provider::Capability;

use super::schema::RuntimeConfig;

/// Errors from configuration resolution and provider selection.
///
/// Always surfaced to the caller immediately and never retried; nothing in
/// this enum is reachable once a run has started.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Override path does not name a leaf of the schema.
    #[error("unknown config path '{path}'")]
    UnknownPath { path: String },
    /// Value cannot inhabit the leaf it targets.
    #[error("invalid value for '{path}': {reason}")]
    InvalidValue { path: String, reason: String },
    /// Identifier not registered for the capability.
    #[error("unknown {capability} provider '{identifier}' (registered: {registered})")]
    UnknownProvider {
        capability: Capability,
        identifier: String,
        registered: String,
    },
    /// Config file could not be read or parsed.
    #[error("config file {path}: {reason}")]
    File { path: String, reason: String },
}

impl ConfigError {
    pub fn unknown_path(path: impl Into<String>) -> Self {
        Self::UnknownPath { path: path.into() }
    }

    pub fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue { path: path.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// One dotted-path override, e.g. `video.style=minimal_white`.
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    pub path: String,
    pub value: Value,
}

impl Override {
    pub fn new(path: impl Into<String>, value: Value) -> Self {
        Self { path: path.into(), value }
    }

    /// Parse a CLI `--set PATH=VALUE` argument.
    ///
    /// Values autocast the way a shell user expects: `true`/`false`, integers,
    /// floats, and JSON arrays/objects; everything else stays a string.
    pub fn parse(raw: &str) -> Result<Self> {
        let (path, value) = raw
            .split_once('=')
            .ok_or_else(|| ConfigError::invalid(raw, "expected PATH=VALUE"))?;
        let path = path.trim();
        if path.is_empty() {
            return Err(ConfigError::invalid(raw, "empty path"));
        }
        Ok(Self::new(path, autocast(value.trim())))
    }

    /// Flatten a JSON object of dotted path -> value pairs (topic files, REST
    /// request bodies) into overrides.
    pub fn from_map(map: &serde_json::Map<String, Value>) -> Vec<Self> {
        map.iter().map(|(k, v)| Self::new(k.clone(), v.clone())).collect()
    }
}

fn autocast(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    if raw.starts_with('[') || raw.starts_with('{') {
        if let Ok(v) = serde_json::from_str(raw) {
            return v;
        }
    }
    Value::String(raw.to_string())
}

static BUILTIN_TREE: Lazy<Value> = Lazy::new(|| {
    serde_json::to_value(RuntimeConfig::default()).unwrap()
});

/// The base configuration layer: builtin defaults, optionally overlaid with a
/// `pipeline.json` file.
#[derive(Debug, Clone)]
pub struct ConfigTree {
    root: Value,
}

impl ConfigTree {
    /// Builtin defaults only.
    pub fn builtin() -> Self {
        Self { root: BUILTIN_TREE.clone() }
    }

    /// Builtin defaults overlaid with a parsed config file.
    ///
    /// Known sections deep-merge over the defaults, which lets a file extend
    /// the style and persona tables. Unknown top-level keys are skipped with
    /// a warning; override paths stay strict.
    pub fn from_value(file: Value) -> Result<Self> {
        let Value::Object(sections) = file else {
            return Err(ConfigError::File {
                path: "<inline>".into(),
                reason: "top level must be a JSON object".into(),
            });
        };
        let mut root = BUILTIN_TREE.clone();
        for (key, value) in sections {
            match root.get_mut(&key) {
                Some(slot) => deep_merge(slot, value),
                None => tracing::warn!(key = %key, "ignoring unknown config section"),
            }
        }
        typed(&root).map_err(|reason| ConfigError::File { path: "<inline>".into(), reason })?;
        Ok(Self { root })
    }

    /// Read and overlay a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let display = path.display().to_string();
        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::File { path: display.clone(), reason: e.to_string() })?;
        let file: Value = serde_json::from_str(&text)
            .map_err(|e| ConfigError::File { path: display.clone(), reason: e.to_string() })?;
        match Self::from_value(file) {
            Ok(tree) => Ok(tree),
            Err(ConfigError::File { reason, .. }) => {
                Err(ConfigError::File { path: display, reason })
            }
            Err(other) => Err(other),
        }
    }

    /// Locate the base layer: explicit path, `./pipeline.json`, then
    /// `<config dir>/showrun/pipeline.json`, then builtin defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let local = Path::new("pipeline.json");
        if local.exists() {
            return Self::from_file(local);
        }
        if let Some(dir) = dirs::config_dir() {
            let global = dir.join("showrun").join("pipeline.json");
            if global.exists() {
                return Self::from_file(&global);
            }
        }
        Ok(Self::builtin())
    }

    /// Raw JSON view of the base layer.
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Resolve the override layers into one immutable snapshot.
    ///
    /// Pass empty slices for absent layers. Every override must address an
    /// existing leaf with a value of the same JSON kind; violations surface
    /// as [`ConfigError::UnknownPath`] or [`ConfigError::InvalidValue`] with
    /// the offending path, before any provider is touched.
    pub fn resolve(
        &self,
        topic: &[Override],
        cli: &[Override],
        request: &[Override],
    ) -> Result<RuntimeConfig> {
        let mut root = self.root.clone();
        for layer in [topic, cli, request] {
            for ov in layer {
                apply(&mut root, ov)?;
                // Re-typing after each override pins type damage on the
                // override that introduced it.
                typed(&root).map_err(|reason| ConfigError::invalid(&ov.path, reason))?;
            }
        }
        let cfg = typed(&root).map_err(|reason| ConfigError::invalid("<defaults>", reason))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

fn typed(root: &Value) -> std::result::Result<RuntimeConfig, String> {
    serde_json::from_value(root.clone()).map_err(|e| e.to_string())
}

fn deep_merge(slot: &mut Value, incoming: Value) {
    match (slot, incoming) {
        (Value::Object(base), Value::Object(over)) => {
            for (key, value) in over {
                match base.get_mut(&key) {
                    Some(nested) => deep_merge(nested, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, incoming) => *slot = incoming,
    }
}

/// Replace one leaf, rejecting unknown paths and JSON-kind changes.
fn apply(root: &mut Value, ov: &Override) -> Result<()> {
    let segments: Vec<&str> = ov.path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return Err(ConfigError::unknown_path(&ov.path));
    };
    let mut cursor = &mut *root;
    for segment in parents {
        cursor = cursor
            .get_mut(*segment)
            .ok_or_else(|| ConfigError::unknown_path(&ov.path))?;
    }
    let Value::Object(parent) = cursor else {
        return Err(ConfigError::unknown_path(&ov.path));
    };
    let slot = parent
        .get_mut(*last)
        .ok_or_else(|| ConfigError::unknown_path(&ov.path))?;
    if kind(slot) != kind(&ov.value) {
        return Err(ConfigError::invalid(
            &ov.path,
            format!("expected {}, got {}", kind(slot), kind(&ov.value)),
        ));
    }
    *slot = ov.value.clone();
    Ok(())
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
