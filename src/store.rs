use crate::alignment::AlignmentBridge;
use crate::group_collection::GroupCollection;
use crate::models::CorpusStats;
use crate::schema::{corpus_schema, validate_json};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

const SNAPSHOT_FILE: &str = "corpus.json";
const MANIFEST_FILE: &str = "manifest.json";

/// Written next to every snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StoreManifest {
    pub schema_version: String,
    pub saved_at: String,
    pub snapshot_sha256: String,
    pub stats: CorpusStats,
}

/// Persists the corpus tree as a JSON snapshot plus a checksummed manifest
pub struct ProjectStore {
    dir: PathBuf,
    schema_version: String,
}

impl ProjectStore {
    pub fn new(dir: &Path, schema_version: &str) -> Self {
        ProjectStore {
            dir: dir.to_path_buf(),
            schema_version: schema_version.to_string(),
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path().exists()
    }

    pub fn normalize_timestamp(dt: &DateTime<Utc>) -> String {
        dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    pub fn hash_snapshot(json: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn save(&self, collection: &GroupCollection) -> Result<StoreManifest> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create project directory: {:?}", self.dir))?;

        let snapshot = collection.to_snapshot().context("Failed to serialize corpus")?;
        let json_str = serde_json::to_string_pretty(&snapshot)?;

        let manifest = StoreManifest {
            schema_version: self.schema_version.clone(),
            saved_at: Self::normalize_timestamp(&Utc::now()),
            snapshot_sha256: Self::hash_snapshot(&json_str),
            stats: collection.stats(),
        };

        fs::write(self.snapshot_path(), &json_str)
            .with_context(|| format!("Failed to write {:?}", self.snapshot_path()))?;
        fs::write(self.manifest_path(), serde_json::to_string_pretty(&manifest)?)
            .with_context(|| format!("Failed to write {:?}", self.manifest_path()))?;

        Ok(manifest)
    }

    pub fn load_manifest(&self) -> Result<StoreManifest> {
        let content = fs::read_to_string(self.manifest_path())
            .with_context(|| format!("Failed to read {:?}", self.manifest_path()))?;
        serde_json::from_str(&content).context("Failed to parse manifest.json")
    }

    /// Loads the snapshot after checking it against the manifest checksum
    /// and the corpus schema
    pub fn load(&self, bridge: &dyn AlignmentBridge) -> Result<GroupCollection> {
        let json_str = fs::read_to_string(self.snapshot_path())
            .with_context(|| format!("Failed to read {:?}", self.snapshot_path()))?;

        let manifest = self.load_manifest()?;
        let actual = Self::hash_snapshot(&json_str);
        if manifest.snapshot_sha256 != actual {
            bail!(
                "Snapshot checksum mismatch: manifest has {}, file hashes to {}",
                manifest.snapshot_sha256,
                actual
            );
        }

        let snapshot: Value = serde_json::from_str(&json_str).context("Failed to parse corpus.json")?;
        validate_json(&snapshot, &corpus_schema()?).context("corpus.json does not match the corpus schema")?;

        GroupCollection::from_snapshot(snapshot, bridge).context("Failed to rebuild corpus from snapshot")
    }

    /// Loads the stored corpus, or an empty one for a new project
    pub fn load_or_default(&self, bridge: &dyn AlignmentBridge) -> Result<GroupCollection> {
        if self.exists() {
            self.load(bridge)
        } else {
            Ok(GroupCollection::default())
        }
    }
}
