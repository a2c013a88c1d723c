//! Persisted option storage and the shared license mapping.
//!
//! The host keeps named options as JSON values. All add-on licenses live in
//! one option (`polylang_licenses` by default) mapping each add-on id to a
//! `{key, data}` record. Reads are defensive: legacy or malformed values are
//! coerced to empty defaults instead of being rejected.
//!
//! ## Implementations
//!
//! - [`MemoryOptionStore`] keeps options in a map, for tests and embedding.
//! - [`FileOptionStore`] writes one `<option>.json` document per option.

use crate::client::responses::{is_empty_value, LicenseData};
use crate::errors::LicenseResult;

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Host option storage.
pub trait OptionStore: Send + Sync {
    /// Fetch an option, `None` when it was never written.
    fn get_option(&self, name: &str) -> LicenseResult<Option<Value>>;

    /// Create or overwrite an option.
    fn update_option(&self, name: &str, value: Value) -> LicenseResult<()>;
}

/// In-memory option store.
#[derive(Debug, Default)]
pub struct MemoryOptionStore {
    options: RwLock<HashMap<String, Value>>,
}

impl MemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-seeded with one option.
    pub fn with_option(name: &str, value: Value) -> Self {
        let store = Self::new();
        store
            .options
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), value);
        store
    }
}

impl OptionStore for MemoryOptionStore {
    fn get_option(&self, name: &str) -> LicenseResult<Option<Value>> {
        let options = self.options.read().unwrap_or_else(|e| e.into_inner());
        Ok(options.get(name).cloned())
    }

    fn update_option(&self, name: &str, value: Value) -> LicenseResult<()> {
        let mut options = self.options.write().unwrap_or_else(|e| e.into_inner());
        options.insert(name.to_string(), value);
        Ok(())
    }
}

/// File-backed option store, one JSON document per option.
#[derive(Debug, Clone)]
pub struct FileOptionStore {
    dir: PathBuf,
}

impl FileOptionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn option_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl OptionStore for FileOptionStore {
    fn get_option(&self, name: &str) -> LicenseResult<Option<Value>> {
        let path = self.option_path(name);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                log::warn!("Ignoring unreadable option {:?}: {}", path, e);
                Ok(None)
            }
        }
    }

    fn update_option(&self, name: &str, value: Value) -> LicenseResult<()> {
        fs::create_dir_all(&self.dir)?;

        let path = self.option_path(name);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&value)?)?;
        fs::rename(&tmp, &path)?;

        log::debug!("Wrote option {} to {:?}", name, path);
        Ok(())
    }
}

/// Persisted key/data slice for one add-on.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LicenseRecord {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<LicenseData>,
}

impl LicenseRecord {
    /// Decode one entry of the shared mapping.
    ///
    /// Returns `None` when the entry is not an object.
    pub fn decode(entry: &Value) -> Option<Self> {
        let fields = entry.as_object()?;

        let key = match fields.get("key") {
            Some(v) if is_empty_value(v) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(true)) => "1".to_string(),
            _ => String::new(),
        };
        let data = fields.get("data").and_then(LicenseData::coerce);

        Some(Self { key, data })
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty() && self.data.is_none()
    }
}

/// Typed access to the shared license mapping.
#[derive(Clone)]
pub struct LicenseStore {
    options: Arc<dyn OptionStore>,
    option_name: String,
}

impl LicenseStore {
    pub fn new(options: Arc<dyn OptionStore>, option_name: impl Into<String>) -> Self {
        Self {
            options,
            option_name: option_name.into(),
        }
    }

    pub fn option_name(&self) -> &str {
        &self.option_name
    }

    /// Read the mapping; anything other than an object reads as empty.
    fn read_mapping(&self) -> LicenseResult<Map<String, Value>> {
        match self.options.get_option(&self.option_name)? {
            Some(Value::Object(map)) => Ok(map),
            Some(other) => {
                log::debug!(
                    "Option {} holds a non-mapping value ({}), treating as empty",
                    self.option_name,
                    type_name(&other)
                );
                Ok(Map::new())
            }
            None => Ok(Map::new()),
        }
    }

    /// Load the record stored for an add-on id.
    pub fn load(&self, id: &str) -> LicenseResult<Option<LicenseRecord>> {
        let mapping = self.read_mapping()?;
        Ok(mapping.get(id).and_then(LicenseRecord::decode))
    }

    /// All decodable records, ordered by id.
    pub fn all(&self) -> LicenseResult<Vec<(String, LicenseRecord)>> {
        let mapping = self.read_mapping()?;
        Ok(mapping
            .iter()
            .filter_map(|(id, entry)| LicenseRecord::decode(entry).map(|r| (id.clone(), r)))
            .collect())
    }

    /// Overwrite the record of one add-on, leaving the others untouched.
    pub fn save(&self, id: &str, record: &LicenseRecord) -> LicenseResult<()> {
        let mut mapping = self.read_mapping()?;
        mapping.insert(id.to_string(), serde_json::to_value(record)?);
        self.options
            .update_option(&self.option_name, Value::Object(mapping))
    }

    /// Drop the record of one add-on.
    pub fn remove(&self, id: &str) -> LicenseResult<()> {
        let mut mapping = self.read_mapping()?;
        if mapping.remove(id).is_some() {
            self.options
                .update_option(&self.option_name, Value::Object(mapping))?;
        }
        Ok(())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with(value: Value) -> LicenseStore {
        let options = Arc::new(MemoryOptionStore::with_option("polylang_licenses", value));
        LicenseStore::new(options, "polylang_licenses")
    }

    #[test]
    fn missing_option_reads_as_empty() {
        let store = LicenseStore::new(Arc::new(MemoryOptionStore::new()), "polylang_licenses");
        assert_eq!(store.load("polylang-pro").unwrap(), None);
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn legacy_scalar_option_reads_as_empty() {
        let store = store_with(json!("corrupted"));
        assert_eq!(store.load("polylang-pro").unwrap(), None);
    }

    #[test]
    fn non_object_entry_is_absent() {
        let store = store_with(json!({"polylang-pro": "ABC"}));
        assert_eq!(store.load("polylang-pro").unwrap(), None);
    }

    #[test]
    fn decodes_key_and_data() {
        let store = store_with(json!({
            "polylang-pro": {"key": "ABC", "data": {"license": "valid"}}
        }));
        let record = store.load("polylang-pro").unwrap().unwrap();
        assert_eq!(record.key, "ABC");
        assert!(record.data.unwrap().is_valid());
    }

    #[test]
    fn numeric_keys_are_coerced_to_strings() {
        let store = store_with(json!({"polylang-pro": {"key": 12345}}));
        assert_eq!(store.load("polylang-pro").unwrap().unwrap().key, "12345");
    }

    #[test]
    fn null_key_becomes_empty_string() {
        let store = store_with(json!({"polylang-pro": {"key": null, "data": null}}));
        let record = store.load("polylang-pro").unwrap().unwrap();
        assert_eq!(record.key, "");
        assert!(record.data.is_none());
        assert!(record.is_empty());
    }

    #[test]
    fn save_preserves_other_records() {
        let store = store_with(json!({"other-addon": {"key": "KEEP", "extra": 1}}));
        let record = LicenseRecord {
            key: "NEW".to_string(),
            data: None,
        };
        store.save("polylang-pro", &record).unwrap();

        let raw = store.options.get_option("polylang_licenses").unwrap().unwrap();
        assert_eq!(raw["other-addon"], json!({"key": "KEEP", "extra": 1}));
        assert_eq!(raw["polylang-pro"], json!({"key": "NEW"}));
    }

    #[test]
    fn save_replaces_legacy_scalar_option() {
        let store = store_with(json!(42));
        store
            .save("polylang-pro", &LicenseRecord { key: "K".to_string(), data: None })
            .unwrap();
        assert_eq!(store.load("polylang-pro").unwrap().unwrap().key, "K");
    }

    #[test]
    fn remove_drops_only_that_record() {
        let store = store_with(json!({"a": {"key": "1"}, "b": {"key": "2"}}));
        store.remove("a").unwrap();
        let ids: Vec<String> = store.all().unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["b".to_string()]);
    }
}
