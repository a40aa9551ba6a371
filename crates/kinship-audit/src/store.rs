//! Audit log storage: trait plus file-backed and in-memory implementations.
//!
//! Entries are stored as JSON files organized by date and entry ID. Every
//! read re-verifies the BLAKE3 content hash.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use kinship_core::TenantId;

use crate::{AuditEntry, AuditId};

/// Errors that can occur during audit storage operations.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Audit entry not found: {0}")]
    NotFound(AuditId),

    #[error("Integrity check failed for audit entry {0}: stored hash does not match content")]
    IntegrityViolation(AuditId),

    #[error("Audit entry has no content hash (not finalized)")]
    NotFinalized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Query parameters for listing audit entries.
#[derive(Debug, Default, Clone)]
pub struct AuditQuery {
    pub tenant_id: Option<TenantId>,
    pub actor: Option<String>,
    pub operation: Option<String>,
    /// Only include entries started at or after this time.
    pub from: Option<DateTime<Utc>>,
    /// Only include entries started at or before this time.
    pub to: Option<DateTime<Utc>>,
}

impl AuditQuery {
    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            ..Default::default()
        }
    }

    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(tid) = self.tenant_id {
            if entry.tenant_id != tid {
                return false;
            }
        }
        if let Some(ref actor) = self.actor {
            if &entry.actor != actor {
                return false;
            }
        }
        if let Some(ref op) = self.operation {
            if &entry.operation != op {
                return false;
            }
        }
        if let Some(from) = self.from {
            if entry.started_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.started_at > to {
                return false;
            }
        }
        true
    }
}

/// Persistence backend for audit entries.
pub trait AuditLog: Send + Sync {
    /// Store a finalized entry. Returns an error if it has no content hash.
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditError>;

    /// Retrieve an entry by ID, verifying integrity.
    fn get(&self, id: AuditId) -> Result<AuditEntry, AuditError>;

    /// List entries matching the query, ordered by started_at descending.
    fn list(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, AuditError>;
}

/// File-system backed audit log.
///
/// ```text
/// {root}/
///   2026/
///     03/
///       15/
///         {entry_id}.json
/// ```
pub struct FileAuditLog {
    root: PathBuf,
}

impl FileAuditLog {
    /// Create a log rooted at the given directory, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn entry_path(&self, entry: &AuditEntry) -> PathBuf {
        let date = entry.started_at.format("%Y/%m/%d");
        self.root.join(format!("{}/{}.json", date, entry.id.0))
    }

    fn find_path(&self, id: AuditId) -> Result<PathBuf, AuditError> {
        let filename = format!("{}.json", id.0);
        find_file_recursive(&self.root, &filename).ok_or(AuditError::NotFound(id))
    }
}

impl AuditLog for FileAuditLog {
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        if entry.content_hash.is_none() {
            return Err(AuditError::NotFinalized);
        }

        let path = self.entry_path(entry);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(entry)?;
        fs::write(&path, json)?;

        tracing::debug!(
            audit_id = %entry.id,
            operation = %entry.operation,
            path = %path.display(),
            "Audit entry written"
        );

        Ok(())
    }

    fn get(&self, id: AuditId) -> Result<AuditEntry, AuditError> {
        let path = self.find_path(id)?;
        let json = fs::read_to_string(&path)?;
        let entry: AuditEntry = serde_json::from_str(&json)?;

        if !entry.verify_integrity() {
            return Err(AuditError::IntegrityViolation(id));
        }

        Ok(entry)
    }

    fn list(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, AuditError> {
        let mut entries = Vec::new();
        collect_entries_recursive(&self.root, &mut entries)?;

        entries.retain(|e| query.matches(e));
        entries.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        Ok(entries)
    }
}

/// In-process audit log, used when no audit directory is configured.
#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        if entry.content_hash.is_none() {
            return Err(AuditError::NotFinalized);
        }
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.push(entry.clone());
        Ok(())
    }

    fn get(&self, id: AuditId) -> Result<AuditEntry, AuditError> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let entry = entries
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or(AuditError::NotFound(id))?;
        if !entry.verify_integrity() {
            return Err(AuditError::IntegrityViolation(id));
        }
        Ok(entry)
    }

    fn list(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, AuditError> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let mut out: Vec<AuditEntry> = entries.iter().filter(|e| query.matches(e)).cloned().collect();
        out.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(out)
    }
}

fn find_file_recursive(dir: &Path, filename: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_file_recursive(&path, filename) {
                return Some(found);
            }
        } else if path.file_name().and_then(|n| n.to_str()) == Some(filename) {
            return Some(path);
        }
    }
    None
}

fn collect_entries_recursive(dir: &Path, out: &mut Vec<AuditEntry>) -> Result<(), AuditError> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_entries_recursive(&path, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
            let json = fs::read_to_string(&path)?;
            match serde_json::from_str::<AuditEntry>(&json) {
                Ok(parsed) => out.push(parsed),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable audit entry");
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuditOutcome, AuditSession};
    use kinship_core::Actor;

    fn make_entry(tenant: TenantId, actor: &str, operation: &str) -> AuditEntry {
        let mut session = AuditSession::new(tenant, &Actor::new(actor), operation);
        session.set_subject(serde_json::json!({"parent": "a", "child": "b"}));
        session.note("cycle_check", "No cycle", serde_json::json!({"visited": 3}));
        session.finish(AuditOutcome::Accepted)
    }

    #[test]
    fn test_append_and_retrieve() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileAuditLog::new(dir.path()).unwrap();

        let entry = make_entry(TenantId::new(), "reviewer", "propose_edge");
        let id = entry.id;
        log.append(&entry).unwrap();

        let loaded = log.get(id).unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.operation, "propose_edge");
        assert!(loaded.verify_integrity());
    }

    #[test]
    fn test_integrity_violation_detected() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileAuditLog::new(dir.path()).unwrap();

        let entry = make_entry(TenantId::new(), "reviewer", "propose_edge");
        let id = entry.id;
        log.append(&entry).unwrap();

        let path = log.find_path(id).unwrap();
        let json = fs::read_to_string(&path).unwrap();
        let tampered = json.replace("reviewer", "intruder");
        fs::write(&path, tampered).unwrap();

        let result = log.get(id);
        assert!(matches!(result, Err(AuditError::IntegrityViolation(_))));
    }

    #[test]
    fn test_append_rejects_unfinalized() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileAuditLog::new(dir.path()).unwrap();

        let mut entry = make_entry(TenantId::new(), "reviewer", "propose_edge");
        entry.content_hash = None;

        assert!(matches!(log.append(&entry), Err(AuditError::NotFinalized)));
    }

    #[test]
    fn test_list_filters_by_tenant_and_operation() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileAuditLog::new(dir.path()).unwrap();
        let (t1, t2) = (TenantId::new(), TenantId::new());

        log.append(&make_entry(t1, "a", "propose_edge")).unwrap();
        log.append(&make_entry(t1, "a", "resolve_prediction")).unwrap();
        log.append(&make_entry(t2, "b", "propose_edge")).unwrap();

        assert_eq!(log.list(&AuditQuery::for_tenant(t1)).unwrap().len(), 2);

        let query = AuditQuery {
            operation: Some("propose_edge".into()),
            ..Default::default()
        };
        assert_eq!(log.list(&query).unwrap().len(), 2);

        let query = AuditQuery {
            tenant_id: Some(t2),
            actor: Some("a".into()),
            ..Default::default()
        };
        assert!(log.list(&query).unwrap().is_empty());
    }

    #[test]
    fn test_memory_log_roundtrip() {
        let log = MemoryAuditLog::new();
        let entry = make_entry(TenantId::new(), "reviewer", "scan_predictions");
        log.append(&entry).unwrap();

        assert_eq!(log.len(), 1);
        assert_eq!(log.get(entry.id).unwrap().operation, "scan_predictions");
        assert!(matches!(log.get(AuditId::new()), Err(AuditError::NotFound(_))));
    }
}
