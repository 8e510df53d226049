use crate::error::ScoutError;
use crate::models::{ProductRecord, Snapshot};
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const PREFIX: &str = "ranking_";
const SUFFIX: &str = ".json";

/// Distinguishes temporary files of concurrent writes within one process
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// UTC offset of the ranking's home market in hours (KST, no DST)
const DATE_KEY_OFFSET_HOURS: i64 = 9;

/// Identity of a persisted snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactId {
    pub date: NaiveDate,
    pub path: PathBuf,
}

/// Calendar date a run started now is filed under
pub fn date_key_now() -> NaiveDate {
    (Utc::now() + Duration::hours(DATE_KEY_OFFSET_HOURS)).date_naive()
}

/// Date key encoded in an artifact file name, if it is one
pub fn parse_artifact_name(name: &str) -> Option<NaiveDate> {
    let date = name.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Directory of dated ranking snapshots, one file per date key
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", PREFIX, date.format("%Y-%m-%d"), SUFFIX))
    }

    /// Persist `records` as the snapshot for `date`, replacing any earlier
    /// snapshot for the same date. Readers never see a partial file.
    pub async fn write(
        &self,
        records: &[ProductRecord],
        date: NaiveDate,
    ) -> Result<ArtifactId, ScoutError> {
        let snapshot = Snapshot::new(date, records.to_vec());
        let path = self.artifact_path(date);

        self.write_atomic(&snapshot, &path)
            .await
            .map_err(ScoutError::Storage)?;

        info!("💾 Saved {} records to {}", snapshot.count, path.display());
        Ok(ArtifactId { date, path })
    }

    async fn write_atomic(&self, snapshot: &Snapshot, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.dir.join(format!(
            ".{}{}.{}.{}.tmp",
            PREFIX,
            snapshot.date.format("%Y-%m-%d"),
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        let written = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(json.as_bytes()).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp, path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("Failed to write {}", path.display()));
        }

        Ok(())
    }

    /// Load the snapshot stored for `date`
    pub async fn read(&self, date: NaiveDate) -> Result<Snapshot, ScoutError> {
        Self::load(&self.artifact_path(date)).await
    }

    pub async fn load(path: &Path) -> Result<Snapshot, ScoutError> {
        let load = async {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str::<Snapshot>(&raw)
                .with_context(|| format!("Malformed snapshot {}", path.display()))
        };
        load.await.map_err(ScoutError::Storage)
    }

    /// All snapshots on disk, keyed by date. A missing directory is an empty index.
    pub async fn index(&self) -> Result<BTreeMap<NaiveDate, PathBuf>, ScoutError> {
        let mut index = BTreeMap::new();

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(index),
            Err(e) => {
                return Err(ScoutError::Storage(anyhow::Error::new(e).context(format!(
                    "Failed to list {}",
                    self.dir.display()
                ))))
            }
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ScoutError::Storage(e.into()))?
        {
            let name = entry.file_name();
            match name.to_str().and_then(parse_artifact_name) {
                Some(date) => {
                    index.insert(date, entry.path());
                }
                None => debug!("Ignoring {:?}", name),
            }
        }

        Ok(index)
    }

    /// Snapshot with the greatest date key, if any exists
    pub async fn latest(&self) -> Result<Option<ArtifactId>, ScoutError> {
        let index = self.index().await?;
        Ok(index
            .into_iter()
            .next_back()
            .map(|(date, path)| ArtifactId { date, path }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn records() -> Vec<ProductRecord> {
        vec![
            ProductRecord::from_extracted(
                1,
                "Sun Cream".into(),
                "18,000원".into(),
                "https://shop.example/1".into(),
            ),
            ProductRecord::from_extracted(2, "Cleansing Oil".into(), String::new(), String::new()),
        ]
    }

    #[test]
    fn artifact_names_round_trip_through_the_parser() {
        assert_eq!(parse_artifact_name("ranking_2024-05-01.json"), Some(date(2024, 5, 1)));
        assert_eq!(parse_artifact_name(".ranking_2024-05-01.json.42.0.tmp"), None);
        assert_eq!(parse_artifact_name("ranking_latest.json"), None);
        assert_eq!(parse_artifact_name("notes.txt"), None);
    }

    #[tokio::test]
    async fn written_snapshot_reads_back_unchanged() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let written = records();

        let id = store.write(&written, date(2024, 5, 1)).await.unwrap();
        assert_eq!(id.path, dir.path().join("ranking_2024-05-01.json"));

        let snapshot = store.read(date(2024, 5, 1)).await.unwrap();
        assert_eq!(snapshot.date, date(2024, 5, 1));
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.items, written);
    }

    #[tokio::test]
    async fn same_day_write_replaces_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        store.write(&records(), date(2024, 5, 1)).await.unwrap();
        store.write(&records()[..1], date(2024, 5, 1)).await.unwrap();

        let snapshot = store.read(date(2024, 5, 1)).await.unwrap();
        assert_eq!(snapshot.count, 1);

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["ranking_2024-05-01.json".to_string()]);
    }

    #[tokio::test]
    async fn concurrent_same_day_writes_both_land() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let all = records();

        let (first, second) = tokio::join!(
            store.write(&all, date(2024, 5, 1)),
            store.write(&all[..1], date(2024, 5, 1)),
        );
        first.unwrap();
        second.unwrap();

        let count = store.read(date(2024, 5, 1)).await.unwrap().count;
        assert!(count == 1 || count == 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn latest_picks_greatest_date_key() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        store.write(&records(), date(2024, 4, 30)).await.unwrap();
        store.write(&records(), date(2024, 5, 2)).await.unwrap();
        store.write(&records(), date(2024, 5, 1)).await.unwrap();
        std::fs::write(dir.path().join("ranking_notes.json"), "{}").unwrap();

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.date, date(2024, 5, 2));
        assert_eq!(store.index().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn missing_directory_has_no_latest() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("never-created"));

        assert!(store.latest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn legacy_artifact_without_metadata_still_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ranking_2024-01-02.json");
        std::fs::write(
            &path,
            r#"{"date":"2024-01-02","count":1,"items":[{"rank":1,"name":"A","price":"1원","link":""}]}"#,
        )
        .unwrap();

        let snapshot = SnapshotStore::load(&path).await.unwrap();
        assert_eq!(snapshot.items[0].name, "A");
        assert_eq!(snapshot.items[0].price_value, None);
    }
}
