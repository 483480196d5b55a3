//! Process-wide directory of upgrade tables, keyed by namespace.
//!
//! Migration steps are authored in separate files that cannot share a
//! reference to their table without an import cycle. Instead each step
//! carries a dotted unit path (e.g. `gigbridge.db.v03_add_topic`) and the
//! directory resolves it to the owning table by prefix.

use std::sync::{Arc, LazyLock, Mutex};

use dashmap::DashMap;
use gigbridge_common::{Error, Result};
use tracing::info;

use crate::database::Database;
use crate::upgrade::{UpgradeStep, UpgradeTable};

static UPGRADE_TABLES: LazyLock<DashMap<String, Arc<Mutex<UpgradeTable>>>> =
    LazyLock::new(DashMap::new);

/// Creates an empty upgrade table under `name`, replacing any existing one.
/// Call once per logical database namespace at startup.
pub fn declare_namespace(name: &str) {
    info!("declared migration namespace: {name}");
    UPGRADE_TABLES.insert(
        name.to_string(),
        Arc::new(Mutex::new(UpgradeTable::new(name))),
    );
}

/// Finds the table owning `unit_path` by walking its dotted prefixes from
/// shortest to longest and returning the first declared namespace.
pub fn resolve_owner(unit_path: &str) -> Result<Arc<Mutex<UpgradeTable>>> {
    if unit_path.is_empty() {
        return Err(Error::UnknownUpgradeNamespace(unit_path.to_string()));
    }
    let mut prefix = String::new();
    for part in unit_path.split('.') {
        if !prefix.is_empty() {
            prefix.push('.');
        }
        prefix.push_str(part);
        if let Some(table) = UPGRADE_TABLES.get(&prefix) {
            return Ok(Arc::clone(table.value()));
        }
    }
    Err(Error::UnknownUpgradeNamespace(unit_path.to_string()))
}

/// Resolves the owner of `unit_path` and registers the step there, appending
/// when `position` is `None`.
pub fn register_into_owner(
    unit_path: &str,
    position: Option<usize>,
    step: UpgradeStep,
) -> Result<()> {
    let table = resolve_owner(unit_path)?;
    let mut table = table
        .lock()
        .map_err(|_| Error::Database("upgrade table lock poisoned".into()))?;
    match position {
        Some(index) => table.register_at(index, step),
        None => table.register(step),
    }
    Ok(())
}

/// Runs the named namespace's upgrade table against `db`.
pub fn upgrade(namespace: &str, db: &Database) -> Result<()> {
    let table = UPGRADE_TABLES
        .get(namespace)
        .map(|t| Arc::clone(t.value()))
        .ok_or_else(|| Error::UnknownUpgradeNamespace(namespace.to_string()))?;
    let table = table
        .lock()
        .map_err(|_| Error::Database("upgrade table lock poisoned".into()))?;
    table.upgrade(db)
}

/// Configures whether the named namespace tolerates a database newer than
/// its upgrade table.
pub fn allow_unsupported(namespace: &str, allow: bool) -> Result<()> {
    let table = UPGRADE_TABLES
        .get(namespace)
        .map(|t| Arc::clone(t.value()))
        .ok_or_else(|| Error::UnknownUpgradeNamespace(namespace.to_string()))?;
    table
        .lock()
        .map_err(|_| Error::Database("upgrade table lock poisoned".into()))?
        .allow_unsupported(allow);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{declare_namespace, register_into_owner, resolve_owner, upgrade};
    use crate::database::Database;
    use crate::upgrade::UpgradeStep;
    use gigbridge_common::Error;

    #[test]
    fn resolves_by_shortest_matching_prefix() {
        declare_namespace("restest");
        let table = resolve_owner("restest.db.v01_initial").expect("owner should resolve");
        assert_eq!(table.lock().unwrap().len(), 0);

        // An exact match works too.
        resolve_owner("restest").expect("exact name should resolve");
    }

    #[test]
    fn prefers_the_shortest_declared_prefix() {
        declare_namespace("preftest.db");
        declare_namespace("preftest");

        let owner = resolve_owner("preftest.db.v01").expect("owner should resolve");
        let mut guard = owner.lock().unwrap();
        guard.register(UpgradeStep::noop());
        drop(guard);

        // The step landed in "preftest", not "preftest.db".
        let short = resolve_owner("preftest").expect("short namespace should resolve");
        assert_eq!(short.lock().unwrap().len(), 1);
    }

    #[test]
    fn unknown_path_is_an_error() {
        let err = resolve_owner("never.declared.anywhere").expect_err("should fail");
        assert!(matches!(err, Error::UnknownUpgradeNamespace(_)));

        let err = resolve_owner("").expect_err("empty path should fail");
        assert!(matches!(err, Error::UnknownUpgradeNamespace(_)));
    }

    #[test]
    fn register_into_owner_places_and_pads() {
        declare_namespace("padtest");
        register_into_owner("padtest.steps.v03", Some(2), UpgradeStep::noop())
            .expect("registration should succeed");
        register_into_owner("padtest.steps.v04", None, UpgradeStep::noop())
            .expect("registration should succeed");

        let table = resolve_owner("padtest").expect("owner should resolve");
        assert_eq!(table.lock().unwrap().len(), 4);
    }

    #[test]
    fn upgrade_runs_the_named_namespace() {
        declare_namespace("runtest");
        register_into_owner(
            "runtest.v01",
            None,
            UpgradeStep::from_conn_only(|conn| {
                conn.execute("CREATE TABLE runtest_marker (x INTEGER)", [])
                    .map_err(|e| Error::Database(e.to_string()))?;
                Ok(None)
            }),
        )
        .expect("registration should succeed");

        let db = Database::in_memory().expect("in-memory database should open");
        upgrade("runtest", &db).expect("upgrade should succeed");

        let conn = db.acquire().expect("lock should not be poisoned");
        let exists: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='runtest_marker'",
                [],
                |row| row.get(0),
            )
            .expect("sqlite_master query should succeed");
        assert_eq!(exists, 1);
    }

    #[test]
    fn upgrading_an_undeclared_namespace_fails() {
        let db = Database::in_memory().expect("in-memory database should open");
        let err = upgrade("ghost", &db).expect_err("should fail");
        assert!(matches!(err, Error::UnknownUpgradeNamespace(_)));
    }
}
