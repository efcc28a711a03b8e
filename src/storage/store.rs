use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior, params};
use serde::{Deserialize, Serialize};

use super::schema::{self, SCHEMA_VERSION};
use crate::analytics::{ProviderAxis, ProviderCounts};
use crate::error::{Error, Result};

/// One persisted observation of the catalog: when it was taken, how many
/// models existed, and how they split across the two provider axes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub total_count: u64,
    pub inference_providers: BTreeMap<String, u64>,
    pub model_providers: BTreeMap<String, u64>,
}

impl Snapshot {
    pub fn counts(&self, axis: ProviderAxis) -> &BTreeMap<String, u64> {
        match axis {
            ProviderAxis::Inference => &self.inference_providers,
            ProviderAxis::Origin => &self.model_providers,
        }
    }
}

/// Snapshot store over a single SQLite file
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if needed) a snapshot database
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Store::attach(conn)
    }

    /// Open an existing snapshot database, failing up front when the file is
    /// missing rather than silently creating an empty one
    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::StoreNotFound(path.display().to_string()));
        }
        Store::open(path)
    }

    /// In-memory store, mainly for tests
    pub fn open_in_memory() -> Result<Self> {
        Store::attach(Connection::open_in_memory()?)
    }

    fn attach(conn: Connection) -> Result<Self> {
        // WAL so the viewer can read while the collector writes
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;

        schema::create_tables(&conn)?;

        match schema::get_meta(&conn, "version")? {
            Some(value) => {
                let found = value.parse::<i64>().unwrap_or(0);
                if found != SCHEMA_VERSION {
                    return Err(Error::SchemaVersion {
                        found,
                        expected: SCHEMA_VERSION,
                    });
                }
            }
            None => {
                schema::set_meta(&conn, "version", &SCHEMA_VERSION.to_string())?;
                schema::set_meta(&conn, "created_at", &Utc::now().to_rfc3339())?;
            }
        }

        Ok(Store { conn })
    }

    /// Persist `counts` stamped `now`, unless the newest stored snapshot is
    /// younger than `min_gap`. Returns whether a row was written.
    ///
    /// The age check and the insert run inside one immediate transaction, so
    /// two collectors racing on the same file cannot both pass the check.
    /// The comparison is inclusive: a snapshot exactly `min_gap` old no
    /// longer blocks.
    pub fn insert_if_due(
        &mut self,
        counts: &ProviderCounts,
        now: DateTime<Utc>,
        min_gap: Duration,
    ) -> Result<bool> {
        let now_ms = now.timestamp_millis();
        let min_gap_ms = min_gap.as_millis() as i64;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(last_ms) = schema::last_snapshot_timestamp(&tx)? {
            if now_ms - last_ms < min_gap_ms {
                // dropping the transaction rolls it back
                return Ok(false);
            }
        }

        tx.execute(
            "INSERT INTO snapshots (taken_at_ms, total_count) VALUES (?, ?)",
            params![now_ms, counts.total as i64],
        )?;
        let snapshot_id = tx.last_insert_rowid();

        {
            let mut insert_provider = tx
                .prepare_cached("INSERT OR IGNORE INTO providers (name, axis) VALUES (?, ?)")?;
            let mut find_provider =
                tx.prepare_cached("SELECT id FROM providers WHERE name = ? AND axis = ?")?;
            let mut insert_count = tx.prepare_cached(
                "INSERT INTO provider_counts (snapshot_id, provider_id, count) VALUES (?, ?, ?)",
            )?;

            for axis in ProviderAxis::ALL {
                for (name, count) in counts.for_axis(axis) {
                    insert_provider.execute(params![name, axis.db_code()])?;
                    let provider_id: i64 = find_provider
                        .query_row(params![name, axis.db_code()], |row| row.get(0))?;
                    insert_count.execute(params![snapshot_id, provider_id, *count as i64])?;
                }
            }
        }

        tx.commit()?;
        Ok(true)
    }

    /// Load the full history, ascending by timestamp, with both provider
    /// maps materialized per snapshot
    pub fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, taken_at_ms, total_count FROM snapshots ORDER BY taken_at_ms ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut snapshots = Vec::new();
        let mut index: HashMap<i64, usize> = HashMap::new();
        for row in rows {
            let (id, taken_at_ms, total_count) = row?;
            let taken_at = DateTime::from_timestamp_millis(taken_at_ms)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            index.insert(id, snapshots.len());
            snapshots.push(Snapshot {
                taken_at,
                total_count: total_count as u64,
                inference_providers: BTreeMap::new(),
                model_providers: BTreeMap::new(),
            });
        }

        let mut stmt = self.conn.prepare(
            "SELECT pc.snapshot_id, p.name, p.axis, pc.count
             FROM provider_counts pc
             JOIN providers p ON p.id = pc.provider_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        for row in rows {
            let (snapshot_id, name, axis_code, count) = row?;
            let Some(&i) = index.get(&snapshot_id) else {
                continue;
            };
            let Some(axis) = ProviderAxis::from_db_code(axis_code) else {
                continue;
            };
            let map = match axis {
                ProviderAxis::Inference => &mut snapshots[i].inference_providers,
                ProviderAxis::Origin => &mut snapshots[i].model_providers,
            };
            map.insert(name, count as u64);
        }

        Ok(snapshots)
    }

    /// Number of stored snapshots
    pub fn snapshot_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Timestamp of the newest stored snapshot
    pub fn last_taken_at(&self) -> Result<Option<DateTime<Utc>>> {
        let last = schema::last_snapshot_timestamp(&self.conn)?;
        Ok(last.map(|ms| DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)))
    }

    /// Delete the entire history. Returns how many snapshots were removed.
    pub fn clear(&mut self) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM provider_counts", [])?;
        tx.execute("DELETE FROM providers", [])?;
        let removed = tx.execute("DELETE FROM snapshots", [])?;
        tx.commit()?;
        Ok(removed)
    }

    pub fn set_source_url(&self, url: &str) -> Result<()> {
        schema::set_meta(&self.conn, "source_url", url)?;
        Ok(())
    }

    pub fn source_url(&self) -> Result<Option<String>> {
        Ok(schema::get_meta(&self.conn, "source_url")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const GAP: Duration = Duration::from_secs(12 * 60 * 60);

    fn at(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, min, 0).unwrap()
    }

    fn counts(total: u64, inference: &[(&str, u64)], origin: &[(&str, u64)]) -> ProviderCounts {
        ProviderCounts {
            total,
            inference: inference.iter().map(|(n, c)| (n.to_string(), *c)).collect(),
            origin: origin.iter().map(|(n, c)| (n.to_string(), *c)).collect(),
        }
    }

    #[test]
    fn first_insert_always_recorded() {
        let mut store = Store::open_in_memory().unwrap();
        let written = store
            .insert_if_due(&counts(10, &[("Groq", 10)], &[]), at(1, 9, 0), GAP)
            .unwrap();
        assert!(written);
        assert_eq!(store.snapshot_count().unwrap(), 1);
    }

    #[test]
    fn repeated_cycles_inside_the_window_write_once() {
        let mut store = Store::open_in_memory().unwrap();
        let c = counts(10, &[], &[]);

        assert!(store.insert_if_due(&c, at(1, 9, 0), GAP).unwrap());
        // collector keeps polling every few minutes; none of these may land
        for minute in [5, 10, 60, 120, 600] {
            let now = at(1, 9, 0) + chrono::Duration::minutes(minute);
            assert!(!store.insert_if_due(&c, now, GAP).unwrap());
        }
        assert_eq!(store.snapshot_count().unwrap(), 1);
    }

    #[test]
    fn gap_boundary_is_inclusive() {
        let mut store = Store::open_in_memory().unwrap();
        let c = counts(10, &[], &[]);

        assert!(store.insert_if_due(&c, at(1, 9, 0), GAP).unwrap());
        // one millisecond short still blocks
        let almost = at(1, 21, 0) - chrono::Duration::milliseconds(1);
        assert!(!store.insert_if_due(&c, almost, GAP).unwrap());
        // exactly 12h later is due
        assert!(store.insert_if_due(&c, at(1, 21, 0), GAP).unwrap());
        assert_eq!(store.snapshot_count().unwrap(), 2);
    }

    #[test]
    fn guard_measures_from_the_newest_snapshot() {
        let mut store = Store::open_in_memory().unwrap();
        let c = counts(10, &[], &[]);

        assert!(store.insert_if_due(&c, at(1, 0, 0), GAP).unwrap());
        assert!(store.insert_if_due(&c, at(1, 13, 0), GAP).unwrap());
        // 14h after the first snapshot, but only 1h after the second
        assert!(!store.insert_if_due(&c, at(1, 14, 0), GAP).unwrap());
    }

    #[test]
    fn list_roundtrips_provider_maps() {
        let mut store = Store::open_in_memory().unwrap();
        let c = counts(
            42,
            &[("Groq", 30), ("Unknown", 12)],
            &[("Meta", 25), ("DeepSeek", 17)],
        );
        store.insert_if_due(&c, at(1, 9, 0), GAP).unwrap();

        let snapshots = store.list_snapshots().unwrap();
        assert_eq!(snapshots.len(), 1);
        let snapshot = &snapshots[0];
        assert_eq!(snapshot.taken_at, at(1, 9, 0));
        assert_eq!(snapshot.total_count, 42);
        assert_eq!(snapshot.inference_providers, c.inference);
        assert_eq!(snapshot.model_providers, c.origin);
    }

    #[test]
    fn snapshots_come_back_ascending() {
        let mut store = Store::open_in_memory().unwrap();
        for day in 1..=3 {
            let c = counts(day as u64 * 10, &[], &[]);
            assert!(store.insert_if_due(&c, at(day, 9, 0), GAP).unwrap());
        }

        let totals: Vec<u64> = store
            .list_snapshots()
            .unwrap()
            .iter()
            .map(|s| s.total_count)
            .collect();
        assert_eq!(totals, vec![10, 20, 30]);
    }

    #[test]
    fn provider_set_can_grow_between_snapshots() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .insert_if_due(&counts(5, &[("Groq", 5)], &[]), at(1, 9, 0), GAP)
            .unwrap();
        store
            .insert_if_due(
                &counts(8, &[("Groq", 5), ("Novita", 3)], &[]),
                at(2, 9, 0),
                GAP,
            )
            .unwrap();

        let snapshots = store.list_snapshots().unwrap();
        assert!(!snapshots[0].inference_providers.contains_key("Novita"));
        assert_eq!(snapshots[1].inference_providers.get("Novita"), Some(&3));
    }

    #[test]
    fn clear_removes_everything_and_the_store_stays_usable() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .insert_if_due(&counts(5, &[("Groq", 5)], &[]), at(1, 9, 0), GAP)
            .unwrap();
        store
            .insert_if_due(&counts(6, &[("Groq", 6)], &[]), at(2, 9, 0), GAP)
            .unwrap();

        assert_eq!(store.clear().unwrap(), 2);
        assert_eq!(store.snapshot_count().unwrap(), 0);
        assert!(store.list_snapshots().unwrap().is_empty());

        // a fresh history can start immediately
        assert!(
            store
                .insert_if_due(&counts(7, &[], &[]), at(2, 10, 0), GAP)
                .unwrap()
        );
    }

    #[test]
    fn last_taken_at_tracks_the_newest_row() {
        let mut store = Store::open_in_memory().unwrap();
        assert_eq!(store.last_taken_at().unwrap(), None);

        store
            .insert_if_due(&counts(5, &[], &[]), at(1, 9, 0), GAP)
            .unwrap();
        assert_eq!(store.last_taken_at().unwrap(), Some(at(1, 9, 0)));
    }

    #[test]
    fn source_url_survives_in_meta() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.source_url().unwrap(), None);
        store.set_source_url("https://example.supabase.co").unwrap();
        assert_eq!(
            store.source_url().unwrap().as_deref(),
            Some("https://example.supabase.co")
        );
    }

    #[test]
    fn stored_history_feeds_the_trend_pipeline() {
        use crate::analytics::{ProviderSelection, TimeRange, build_series, daily_series};

        let mut store = Store::open_in_memory().unwrap();

        // three days of collect cycles; the same-day retries never land
        for day in 1..=3 {
            let c = counts(
                40 + day as u64,
                &[("Groq", 4 + day as u64), ("Cerebras", 2)],
                &[("Meta", 11)],
            );
            assert!(store.insert_if_due(&c, at(day, 9, 0), GAP).unwrap());
            assert!(!store.insert_if_due(&c, at(day, 15, 0), GAP).unwrap());
        }

        let history = store.list_snapshots().unwrap();
        let bucketed = daily_series(&history, TimeRange::All, at(3, 18, 0));
        assert_eq!(bucketed.len(), 3);

        // no selection: a single series carrying the totals
        let series = build_series(&bucketed, &ProviderSelection::default());
        assert_eq!(series.len(), 1);
        let totals: Vec<u64> = series[0].points.iter().map(|p| p.value).collect();
        assert_eq!(totals, vec![41, 42, 43]);

        // one provider selected: its counts replace the total
        let selection = ProviderSelection::default().toggled(ProviderAxis::Inference, "Groq");
        let series = build_series(&bucketed, &selection);
        assert_eq!(series.len(), 1);
        let values: Vec<u64> = series[0].points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![5, 6, 7]);
    }

    #[test]
    fn rejects_databases_from_a_different_schema_version() {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        schema::set_meta(&conn, "version", "999").unwrap();

        match Store::attach(conn) {
            Err(Error::SchemaVersion { found, expected }) => {
                assert_eq!(found, 999);
                assert_eq!(expected, SCHEMA_VERSION);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a schema version error"),
        }
    }
}
