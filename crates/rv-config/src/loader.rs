//! YAML loader with custom tag support
//!
//! Supported tags:
//! - `!include path` - Include another YAML file (relative to the including file)
//! - `!env_var VAR` - Environment variable substitution

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

struct YamlLoader {
    /// Track included files to detect circular includes
    include_stack: HashSet<PathBuf>,
}

impl YamlLoader {
    fn new() -> Self {
        Self {
            include_stack: HashSet::new(),
        }
    }

    fn load_file(&mut self, path: &Path) -> ConfigResult<Value> {
        debug!("Loading YAML file: {:?}", path);

        if self.include_stack.contains(path) {
            return Err(ConfigError::CircularInclude {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        self.include_stack.insert(path.to_path_buf());
        let result = self.load_string(&content, path);
        self.include_stack.remove(path);

        result
    }

    fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        self.process_value(value, source_path)
    }

    fn process_value(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged, source_path),
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::new();
                for (k, v) in map {
                    let processed = self.process_value(v, source_path)?;
                    result.insert(k, processed);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => {
                let result: ConfigResult<Vec<Value>> = seq
                    .into_iter()
                    .map(|v| self.process_value(v, source_path))
                    .collect();
                Ok(Value::Sequence(result?))
            }
            _ => Ok(value),
        }
    }

    fn process_tagged(
        &mut self,
        tagged: serde_yaml::value::TaggedValue,
        source_path: &Path,
    ) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        trace!("Processing tag '{}' with value {:?}", tag, tagged.value);

        match tag.as_str() {
            "!include" => {
                let path = self.value_to_path(&tagged.value, source_path)?;
                if !path.exists() {
                    return Err(ConfigError::IncludeNotFound { path });
                }
                debug!("Including file: {:?}", path);
                self.load_file(&path)
            }
            "!env_var" => {
                let var = tagged.value.as_str().unwrap_or_default().to_string();
                std::env::var(&var)
                    .map(Value::String)
                    .map_err(|_| ConfigError::EnvVarNotFound { var })
            }
            _ => {
                let processed = self.process_value(tagged.value, source_path)?;
                Ok(Value::Tagged(Box::new(serde_yaml::value::TaggedValue {
                    tag: tagged.tag,
                    value: processed,
                })))
            }
        }
    }

    fn value_to_path(&self, value: &Value, source_path: &Path) -> ConfigResult<PathBuf> {
        let path_str = value.as_str().ok_or_else(|| ConfigError::InvalidValue {
            path: format!("{:?}", value),
            reason: "include path must be a string".to_string(),
        })?;

        let resolved = if Path::new(path_str).is_absolute() {
            PathBuf::from(path_str)
        } else {
            source_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(path_str)
        };
        Ok(resolved)
    }
}

/// Load a YAML file with tag processing
pub fn load_yaml(path: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new().load_file(path.as_ref())
}

/// Load a YAML string with tag processing
///
/// `source_name` is used for error messages and to resolve relative includes.
pub fn load_yaml_string(content: &str, source_name: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new().load_string(content, source_name.as_ref())
}
