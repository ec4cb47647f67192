//! On-disk snapshot store.
//!
//! Every symbol owns a directory under the store root. Inside it each tracked
//! timeframe has one canonical CSV plus any number of versioned copies, named
//! by [`crate::naming`].

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use market_data_ingestor::models::{bar::Bar, timeframe::Timeframe};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    naming::{self, ArtifactName},
    series::Series,
};

const STAGING_SUFFIX: &str = "partial";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Malformed CSV in {path:?}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_err(path: &Path) -> impl FnOnce(csv::Error) -> StoreError + '_ {
    move |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding every artifact of `symbol`.
    pub fn namespace(&self, symbol: &str) -> PathBuf {
        self.root.join(symbol)
    }

    pub fn canonical_path(&self, symbol: &str, tf: Timeframe) -> PathBuf {
        self.namespace(symbol).join(naming::canonical_name(symbol, tf))
    }

    /// Loads the canonical series. A missing file is an empty series, not an error.
    pub fn read(&self, symbol: &str, tf: Timeframe) -> Result<Series, StoreError> {
        let path = self.canonical_path(symbol, tf);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Series::new()),
            Err(e) => return Err(io_err(&path)(e)),
        };

        let bars = csv::Reader::from_reader(file)
            .deserialize::<Bar>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(csv_err(&path))?;
        Ok(Series::from_bars(bars))
    }

    /// Replaces the canonical series.
    ///
    /// The content is staged in `<canonical>.partial`, the old canonical is
    /// removed and the staged file renamed into place.
    pub fn write(&self, symbol: &str, tf: Timeframe, series: &Series) -> Result<PathBuf, StoreError> {
        let dir = self.namespace(symbol);
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let canonical = self.canonical_path(symbol, tf);
        let staged = canonical.with_extension(format!("{}.{STAGING_SUFFIX}", naming::EXTENSION));

        {
            let mut writer = csv::Writer::from_path(&staged).map_err(csv_err(&staged))?;
            for bar in series {
                writer.serialize(bar).map_err(csv_err(&staged))?;
            }
            writer.flush().map_err(io_err(&staged))?;
        }

        match fs::remove_file(&canonical) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(&canonical)(e)),
        }
        fs::rename(&staged, &canonical).map_err(io_err(&canonical))?;

        debug!(symbol, timeframe = %tf, bars = series.len(), path = ?canonical, "canonical written");
        Ok(canonical)
    }

    /// Materialises a versioned copy of the canonical artifact stamped with
    /// `now` at the timeframe's granularity.
    ///
    /// Returns the new file name, or `None` when that name already exists.
    /// The canonical file stays in place for the next pass.
    pub fn version(
        &self,
        symbol: &str,
        tf: Timeframe,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, StoreError> {
        let canonical = self.canonical_path(symbol, tf);
        let name = naming::versioned_name(symbol, tf, now);
        let target = self.namespace(symbol).join(&name);

        if target.exists() {
            debug!(symbol, timeframe = %tf, artifact = %name, "version already present, skipping");
            return Ok(None);
        }

        // canonical is always replaced by rename, so a hard link keeps this
        // version's content intact
        match fs::hard_link(&canonical, &target) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(io_err(&canonical)(e)),
            Err(e) => {
                debug!(error = %e, "hard link failed, copying instead");
                fs::copy(&canonical, &target).map_err(io_err(&target))?;
            }
        }

        info!(symbol, timeframe = %tf, artifact = %name, "version created");
        Ok(Some(name))
    }

    /// File name of the newest versioned artifact for (`symbol`, `tf`).
    pub fn latest_version(&self, symbol: &str, tf: Timeframe) -> Result<Option<String>, StoreError> {
        let newest = self
            .artifacts(symbol, &[tf])?
            .into_iter()
            .filter_map(|(name, kind)| match kind {
                Some(ArtifactName::Versioned { captured, .. }) => Some((captured, name)),
                _ => None,
            })
            .max_by_key(|(captured, _)| *captured)
            .map(|(_, name)| name);
        Ok(newest)
    }

    /// Garbage-collects the namespace of `symbol`.
    ///
    /// Deletes every file that is neither canonical nor versioned for one of
    /// `tracked`. With `max_versions`, also deletes the oldest versions beyond
    /// that count per timeframe. Sub-directories are left alone. Returns the
    /// number of files removed.
    pub fn prune(
        &self,
        symbol: &str,
        tracked: &[Timeframe],
        max_versions: Option<usize>,
    ) -> Result<usize, StoreError> {
        let dir = self.namespace(symbol);
        let mut doomed: Vec<String> = Vec::new();
        let mut versions: HashMap<Timeframe, Vec<(DateTime<Utc>, String)>> = HashMap::new();

        for (name, kind) in self.artifacts(symbol, tracked)? {
            match kind {
                None => doomed.push(name),
                Some(ArtifactName::Versioned {
                    timeframe,
                    captured,
                }) => versions.entry(timeframe).or_default().push((captured, name)),
                Some(ArtifactName::Canonical(_)) => {}
            }
        }

        if let Some(keep) = max_versions {
            for (_, mut list) in versions {
                if list.len() <= keep {
                    continue;
                }
                list.sort_by(|a, b| b.0.cmp(&a.0));
                doomed.extend(list.into_iter().skip(keep).map(|(_, name)| name));
            }
        }

        let mut removed = 0;
        for name in doomed {
            let path = dir.join(&name);
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(symbol, file = %name, "pruned");
                    removed += 1;
                }
                Err(e) => warn!(symbol, file = %name, error = %e, "failed to prune"),
            }
        }

        if removed > 0 {
            info!(symbol, removed, "namespace pruned");
        }
        Ok(removed)
    }

    /// Regular files of the namespace, classified against `tracked`.
    ///
    /// A missing namespace lists as empty.
    fn artifacts(
        &self,
        symbol: &str,
        tracked: &[Timeframe],
    ) -> Result<Vec<(String, Option<ArtifactName>)>, StoreError> {
        let dir = self.namespace(symbol);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&dir)(e)),
        };

        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err(&dir))?;
            let file_type = entry.file_type().map_err(io_err(&entry.path()))?;
            if !file_type.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let kind = naming::classify(&name, symbol, tracked);
            out.push((name, kind));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    use super::*;

    fn tf(s: &str) -> Timeframe {
        s.parse().unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
    }

    fn sample(n: i64) -> Series {
        (0..n)
            .map(|i| {
                let p = 100.0 + i as f64;
                Bar::new(t0() + Duration::hours(i), p, p + 1.0, p - 1.0, p + 0.5, 1000.0)
            })
            .collect()
    }

    fn files(dir: &Path) -> Vec<String> {
        let mut v: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        v.sort();
        v
    }

    #[test]
    fn missing_canonical_reads_empty() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());
        assert!(store.read("SYM", tf("1h")).unwrap().is_empty());
    }

    #[test]
    fn write_then_read_preserves_series() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let series = sample(3);

        let path = store.write("SYM", tf("1h"), &series).unwrap();
        assert!(path.ends_with("SYM/SYM_1h.csv"));
        assert_eq!(store.read("SYM", tf("1h")).unwrap(), series);

        let header = fs::read_to_string(&path).unwrap();
        assert!(header.starts_with("timestamp,open,high,low,close,volume\n"));
        // staging file is gone
        assert_eq!(files(&store.namespace("SYM")), vec!["SYM_1h.csv"]);
    }

    #[test]
    fn write_replaces_previous_canonical() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());
        store.write("SYM", tf("1h"), &sample(5)).unwrap();
        store.write("SYM", tf("1h"), &sample(2)).unwrap();
        assert_eq!(store.read("SYM", tf("1h")).unwrap().len(), 2);
    }

    #[test]
    fn malformed_csv_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());
        fs::create_dir_all(store.namespace("SYM")).unwrap();
        fs::write(store.canonical_path("SYM", tf("1h")), "timestamp,open\nnot-a-date,x\n").unwrap();
        assert!(matches!(
            store.read("SYM", tf("1h")),
            Err(StoreError::Csv { .. })
        ));
    }

    #[test]
    fn version_snapshots_content_and_skips_collisions() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());
        store.write("SYM", tf("1h"), &sample(3)).unwrap();

        let now = t0() + Duration::minutes(17);
        let name = store.version("SYM", tf("1h"), now).unwrap();
        assert_eq!(name.as_deref(), Some("SYM_1h_01.01.2024__10.csv"));
        // same hour: collision, silently skipped
        assert_eq!(store.version("SYM", tf("1h"), now + Duration::minutes(30)).unwrap(), None);

        // later writes leave the version untouched
        store.write("SYM", tf("1h"), &sample(5)).unwrap();
        let versioned = store.namespace("SYM").join("SYM_1h_01.01.2024__10.csv");
        let rows = csv::Reader::from_path(versioned).unwrap().records().count();
        assert_eq!(rows, 3);
        assert_eq!(store.read("SYM", tf("1h")).unwrap().len(), 5);
    }

    #[test]
    fn version_without_canonical_fails() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());
        fs::create_dir_all(store.namespace("SYM")).unwrap();
        assert!(matches!(
            store.version("SYM", tf("1h"), t0()),
            Err(StoreError::Io { .. })
        ));
    }

    #[test]
    fn latest_version_picks_newest_capture() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());
        assert_eq!(store.latest_version("SYM", tf("1h")).unwrap(), None);

        store.write("SYM", tf("1h"), &sample(1)).unwrap();
        for h in [3, 1, 2] {
            store.version("SYM", tf("1h"), t0() + Duration::hours(h)).unwrap();
        }
        // belongs to another timeframe
        store.write("SYM", tf("1d"), &sample(1)).unwrap();
        store.version("SYM", tf("1d"), t0() + Duration::days(3)).unwrap();

        assert_eq!(
            store.latest_version("SYM", tf("1h")).unwrap().as_deref(),
            Some("SYM_1h_01.01.2024__13.csv")
        );
    }

    #[test]
    fn prune_removes_only_unrecognised_files() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let ns = store.namespace("SYM");
        fs::create_dir_all(ns.join("nested")).unwrap();
        for name in ["SYM_1h.csv", "SYM_1h_01.01.2024__10.csv", "SYM_junk.txt"] {
            fs::write(ns.join(name), "").unwrap();
        }

        let removed = store.prune("SYM", &[tf("1h")], None).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(
            files(&ns),
            vec!["SYM_1h.csv", "SYM_1h_01.01.2024__10.csv", "nested"]
        );
    }

    #[test]
    fn prune_drops_untracked_timeframes_and_old_versions() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let ns = store.namespace("SYM");
        fs::create_dir_all(&ns).unwrap();
        for name in [
            "SYM_1h.csv",
            "SYM_1h_01.01.2024__10.csv",
            "SYM_1h_01.01.2024__11.csv",
            "SYM_1h_01.01.2024__12.csv",
            "SYM_5m.csv",
            "SYM_1h.csv.partial",
        ] {
            fs::write(ns.join(name), "").unwrap();
        }

        let removed = store.prune("SYM", &[tf("1h")], Some(2)).unwrap();
        assert_eq!(removed, 3);
        assert_eq!(
            files(&ns),
            vec![
                "SYM_1h.csv",
                "SYM_1h_01.01.2024__11.csv",
                "SYM_1h_01.01.2024__12.csv"
            ]
        );
    }

    #[test]
    fn prune_missing_namespace_is_noop() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());
        assert_eq!(store.prune("SYM", &[tf("1h")], Some(1)).unwrap(), 0);
    }
}
