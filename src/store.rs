use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::backup::{self, ExportSummary, ImportSummary};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::ordering::{self, SortDirection, SortKey};
use crate::record::{self, Marks, StudentRecord};
use crate::stats::{self, PerformanceStats};
use crate::storage::RecordFile;

/// Change applied to one record by `update_by_roll`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Mutation {
    Name { name: String },
    Marks { marks: Marks },
    /// `subject` is 1-based, in `record::SUBJECTS` order.
    Mark { subject: i64, mark: i32 },
}

pub fn exists(records: &[StudentRecord], roll: i32) -> bool {
    records.iter().any(|r| r.roll == roll)
}

/// Appends `record` with freshly derived fields and returns the stored copy.
/// Leaves `records` untouched on error.
pub fn add(records: &mut Vec<StudentRecord>, mut record: StudentRecord) -> StoreResult<StudentRecord> {
    if exists(records, record.roll) {
        return Err(StoreError::DuplicateKey(record.roll));
    }
    record.validate()?;
    record.compute_derived();
    records.push(record.clone());
    Ok(record)
}

pub fn find_by_roll(records: &[StudentRecord], roll: i32) -> Option<&StudentRecord> {
    records.iter().find(|r| r.roll == roll)
}

/// Case-insensitive substring match on the name, in dataset order.
pub fn find_by_name<'a>(records: &'a [StudentRecord], query: &str) -> Vec<&'a StudentRecord> {
    let needle = query.to_lowercase();
    records
        .iter()
        .filter(|r| r.name.to_lowercase().contains(&needle))
        .collect()
}

pub fn update_by_roll(
    records: &mut [StudentRecord],
    roll: i32,
    mutation: &Mutation,
) -> StoreResult<StudentRecord> {
    let Some(target) = records.iter_mut().find(|r| r.roll == roll) else {
        return Err(StoreError::NotFound(roll));
    };

    // Validate before touching the record so a rejected update changes nothing.
    match mutation {
        Mutation::Name { name } => {
            record::validate_name(name)?;
            target.name = name.clone();
        }
        Mutation::Marks { marks } => {
            record::validate_marks(marks)?;
            target.marks = *marks;
        }
        Mutation::Mark { subject, mark } => {
            let idx = record::subject_index(*subject)?;
            record::validate_mark(idx, *mark)?;
            target.marks[idx] = *mark;
        }
    }
    target.compute_derived();
    Ok(target.clone())
}

/// Stable removal; the remaining records keep their relative order.
pub fn delete_by_roll(records: &mut Vec<StudentRecord>, roll: i32) -> StoreResult<StudentRecord> {
    let idx = records
        .iter()
        .position(|r| r.roll == roll)
        .ok_or(StoreError::NotFound(roll))?;
    Ok(records.remove(idx))
}

/// Runs each operation as one locked load-compute-save cycle against the
/// configured records file. Holds no dataset between calls.
#[derive(Debug, Clone)]
pub struct RecordStore {
    file: RecordFile,
}

impl RecordStore {
    pub fn open(config: &StoreConfig) -> Self {
        RecordStore {
            file: RecordFile::new(config.records_path()),
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read-only view: an unreadable file counts as an empty dataset. When
    /// the lock cannot be taken the file is read unlocked; commits are a
    /// rename, so a reader never sees a half-written file.
    fn read<T>(&self, op: impl FnOnce(&[StudentRecord]) -> T) -> StoreResult<T> {
        let _lock = match self.file.lock() {
            Ok(lock) => Some(lock),
            Err(e) => {
                warn!(error = %e, "records lock unavailable; reading without it");
                None
            }
        };
        let records = match self.file.load_all() {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "records file unreadable; treating as empty");
                Vec::new()
            }
        };
        Ok(op(&records))
    }

    /// Mutating cycle: load errors propagate so an unreadable file is never
    /// overwritten. Nothing is saved when `op` fails.
    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut Vec<StudentRecord>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let _lock = self.file.lock()?;
        let mut records = self.file.load_all()?;
        let out = op(&mut records)?;
        self.file.save_all(&records)?;
        Ok(out)
    }

    /// Strict check of a location before it is adopted: the lock must be
    /// obtainable and the file readable. Returns the record count.
    pub fn verify(&self) -> StoreResult<usize> {
        let _lock = self.file.lock()?;
        Ok(self.file.load_all()?.len())
    }

    pub fn list(&self) -> StoreResult<Vec<StudentRecord>> {
        self.read(|records| records.to_vec())
    }

    pub fn count(&self) -> StoreResult<usize> {
        self.read(|records| records.len())
    }

    pub fn exists(&self, roll: i32) -> StoreResult<bool> {
        self.read(|records| exists(records, roll))
    }

    pub fn create(&self, record: StudentRecord) -> StoreResult<StudentRecord> {
        let created = self.mutate(|records| add(records, record))?;
        info!(roll = created.roll, "student added");
        Ok(created)
    }

    pub fn get(&self, roll: i32) -> StoreResult<Option<StudentRecord>> {
        self.read(|records| find_by_roll(records, roll).cloned())
    }

    pub fn search(&self, query: &str) -> StoreResult<Vec<StudentRecord>> {
        self.read(|records| find_by_name(records, query).into_iter().cloned().collect())
    }

    pub fn update(&self, roll: i32, mutation: &Mutation) -> StoreResult<StudentRecord> {
        let updated = self.mutate(|records| update_by_roll(records, roll, mutation))?;
        info!(roll, "student updated");
        Ok(updated)
    }

    pub fn delete(&self, roll: i32) -> StoreResult<StudentRecord> {
        let removed = self.mutate(|records| delete_by_roll(records, roll))?;
        info!(roll, "student deleted");
        Ok(removed)
    }

    /// Sorted view of the dataset. The file is rewritten in the new order
    /// only when `persist` is set.
    pub fn sort(
        &self,
        key: SortKey,
        direction: SortDirection,
        persist: bool,
    ) -> StoreResult<Vec<StudentRecord>> {
        if !persist {
            return self.read(|records| {
                let mut view = records.to_vec();
                ordering::sort_records(&mut view, key, direction);
                view
            });
        }
        let sorted = self.mutate(|records| {
            ordering::sort_records(records, key, direction);
            Ok(records.clone())
        })?;
        info!(?key, ?direction, "sorted order saved");
        Ok(sorted)
    }

    pub fn stats(&self) -> StoreResult<PerformanceStats> {
        self.read(stats::compute_stats)
    }

    pub fn export_bundle(&self, out_path: &Path) -> anyhow::Result<ExportSummary> {
        let _lock = self.file.lock()?;
        backup::export_records_bundle(self.file.path(), out_path)
    }

    pub fn import_bundle(&self, in_path: &Path) -> anyhow::Result<ImportSummary> {
        let _lock = self.file.lock()?;
        let summary = backup::import_records_bundle(in_path, self.file.path())?;
        info!(
            format = %summary.bundle_format_detected,
            records = summary.record_count,
            "records imported"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(roll: i32, name: &str, mark: i32) -> StudentRecord {
        StudentRecord::draft(roll, name, [mark; 6])
    }

    fn abc() -> Vec<StudentRecord> {
        vec![rec(1, "Alice", 90), rec(2, "Bob", 40), rec(3, "Carol", 65)]
    }

    #[test]
    fn add_appends_and_rejects_duplicates() {
        let mut v = abc();
        add(&mut v, rec(4, "Dan", 70)).expect("add");
        assert_eq!(v.last().map(|r| r.roll), Some(4));

        let before = v.clone();
        let err = add(&mut v, rec(2, "Other Bob", 10)).expect_err("duplicate");
        assert!(matches!(err, StoreError::DuplicateKey(2)));
        assert_eq!(v, before);
    }

    #[test]
    fn add_rederives_stale_fields() {
        let mut v = Vec::new();
        let mut r = rec(1, "Eve", 80);
        r.total = 0;
        r.percentage = 0.0;
        add(&mut v, r).expect("add");
        assert_eq!(v[0].total, 480);
        assert!(v[0].is_derived_consistent());
    }

    #[test]
    fn find_by_roll_returns_first_hit() {
        let mut v = abc();
        v.push(rec(2, "Bob Again", 55));
        assert_eq!(find_by_roll(&v, 2).map(|r| r.name.as_str()), Some("Bob"));
        assert!(find_by_roll(&v, 99).is_none());
        assert!(exists(&v, 3));
        assert!(!exists(&v, 99));
    }

    #[test]
    fn name_search_is_case_insensitive_and_ordered() {
        let v = vec![rec(1, "Maria Lopez", 50), rec(2, "Tom", 60), rec(3, "AMARIO", 70)];
        let hits: Vec<i32> = find_by_name(&v, "mar").iter().map(|r| r.roll).collect();
        assert_eq!(hits, vec![1, 3]);
        assert!(find_by_name(&v, "zzz").is_empty());
        assert_eq!(find_by_name(&v, "").len(), 3);
    }

    #[test]
    fn update_kinds_recompute_derived_fields() {
        let mut v = abc();

        let r = update_by_roll(&mut v, 2, &Mutation::Marks { marks: [100; 6] }).expect("marks");
        assert_eq!(r.total, 600);
        assert_eq!(r.percentage, 100.0);
        assert_eq!(r.grade, record::Grade::Excellent);

        let r = update_by_roll(&mut v, 2, &Mutation::Mark { subject: 6, mark: 0 }).expect("mark");
        assert_eq!(r.marks, [100, 100, 100, 100, 100, 0]);
        assert_eq!(r.total, 500);

        let r = update_by_roll(&mut v, 2, &Mutation::Name { name: "Robert".into() }).expect("name");
        assert_eq!(r.name, "Robert");
        assert_eq!(r.total, 500);

        assert_eq!(v[1], r);
        assert_eq!(v[0], abc()[0]);
        assert_eq!(v[2], abc()[2]);
    }

    #[test]
    fn rejected_updates_change_nothing() {
        let mut v = abc();
        let before = v.clone();

        let err = update_by_roll(&mut v, 9, &Mutation::Name { name: "x".into() }).expect_err("missing");
        assert!(matches!(err, StoreError::NotFound(9)));

        let err = update_by_roll(&mut v, 1, &Mutation::Mark { subject: 7, mark: 50 }).expect_err("index");
        assert!(matches!(err, StoreError::InvalidInput(_)));

        let err = update_by_roll(&mut v, 1, &Mutation::Mark { subject: 1, mark: 101 }).expect_err("range");
        assert!(matches!(err, StoreError::InvalidInput(_)));

        let err = update_by_roll(&mut v, 1, &Mutation::Marks { marks: [50, 50, 50, 50, 50, -3] })
            .expect_err("marks range");
        assert!(matches!(err, StoreError::InvalidInput(_)));

        assert_eq!(v, before);
    }

    #[test]
    fn delete_is_stable() {
        let mut v = abc();
        let removed = delete_by_roll(&mut v, 1).expect("delete");
        assert_eq!(removed.name, "Alice");
        assert_eq!(v, abc()[1..].to_vec());

        let err = delete_by_roll(&mut v, 1).expect_err("gone");
        assert!(matches!(err, StoreError::NotFound(1)));
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn mutation_parses_from_tagged_json() {
        let m: Mutation = serde_json::from_value(serde_json::json!({
            "kind": "mark", "subject": 3, "mark": 88
        }))
        .expect("parse");
        assert_eq!(m, Mutation::Mark { subject: 3, mark: 88 });

        let bad = serde_json::from_value::<Mutation>(serde_json::json!({
            "kind": "marks", "marks": [1, 2, 3]
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn store_cycles_persist_between_calls() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RecordStore::open(&StoreConfig::at(dir.path().join("records.dat")));

        store.create(rec(1, "Alice", 90)).expect("alice");
        store.create(rec(2, "Bob", 40)).expect("bob");
        assert!(matches!(
            store.create(rec(1, "Again", 10)),
            Err(StoreError::DuplicateKey(1))
        ));
        assert_eq!(store.count().expect("count"), 2);

        let bytes = std::fs::read(store.path()).expect("read");
        assert!(matches!(store.delete(42), Err(StoreError::NotFound(42))));
        assert!(matches!(
            store.update(42, &Mutation::Name { name: "x".into() }),
            Err(StoreError::NotFound(42))
        ));
        assert_eq!(std::fs::read(store.path()).expect("read"), bytes);

        let view = store
            .sort(SortKey::Percentage, SortDirection::Asc, false)
            .expect("view");
        assert_eq!(view[0].roll, 2);
        assert_eq!(store.list().expect("list")[0].roll, 1);

        store
            .sort(SortKey::Percentage, SortDirection::Asc, true)
            .expect("persist");
        assert_eq!(store.list().expect("list")[0].roll, 2);

        let s = store.stats().expect("stats");
        assert_eq!(s.total_students, 2);
        assert_eq!(s.top.map(|r| r.roll), Some(1));
    }

    #[test]
    fn reads_still_work_when_lock_file_is_unusable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RecordStore::open(&StoreConfig::at(dir.path().join("records.dat")));
        store.create(rec(1, "Alice", 90)).expect("alice");

        std::fs::create_dir(dir.path().join("records.dat.lock")).expect("lock dir");

        let listed = store.list().expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(store.get(1).expect("get").map(|r| r.name), Some("Alice".to_string()));
        assert_eq!(store.stats().expect("stats").total_students, 1);

        let bytes = std::fs::read(store.path()).expect("read");
        assert!(matches!(
            store.create(rec(2, "Bob", 40)),
            Err(StoreError::StorageRead { .. })
        ));
        assert!(matches!(store.verify(), Err(StoreError::StorageRead { .. })));
        assert_eq!(std::fs::read(store.path()).expect("read"), bytes);
    }

    #[test]
    fn concurrent_creates_are_not_lost() {
        const THREADS: i32 = 4;
        const PER_THREAD: i32 = 25;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("records.dat");

        let workers: Vec<_> = (0..THREADS)
            .map(|t| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let store = RecordStore::open(&StoreConfig::at(path));
                    for i in 0..PER_THREAD {
                        let roll = t * 1000 + i;
                        store
                            .create(rec(roll, &format!("student {}", roll), 60))
                            .expect("create");
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().expect("worker");
        }

        let store = RecordStore::open(&StoreConfig::at(&path));
        let records = store.list().expect("list");
        assert_eq!(records.len(), (THREADS * PER_THREAD) as usize);
        let mut rolls: Vec<i32> = records.iter().map(|r| r.roll).collect();
        rolls.sort_unstable();
        rolls.dedup();
        assert_eq!(rolls.len(), records.len());
    }
}
