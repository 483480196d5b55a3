use gigbridge_common::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::database::{Database, Scheme};

/// Migration step body. Returns `Ok(Some(version))` to report the version the
/// database actually ended up at, or `Ok(None)` to accept the step's computed
/// target.
pub type UpgradeFn = Box<dyn Fn(&Connection, Scheme) -> Result<Option<usize>> + Send + Sync>;

/// Explicit destination version for a step: fixed, or computed against the
/// live connection (e.g. to consolidate squashed migrations).
enum UpgradesTo {
    Version(usize),
    Computed(Box<dyn Fn(&Connection, Scheme) -> Result<usize> + Send + Sync>),
}

/// One unit of schema change plus its execution metadata.
pub struct UpgradeStep {
    body: UpgradeFn,
    description: String,
    transaction: bool,
    upgrades_to: Option<UpgradesTo>,
}

impl UpgradeStep {
    pub fn new(
        body: impl Fn(&Connection, Scheme) -> Result<Option<usize>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            body: Box::new(body),
            description: String::new(),
            transaction: true,
            upgrades_to: None,
        }
    }

    /// Adapter for bodies that only need the connection.
    pub fn from_conn_only(
        body: impl Fn(&Connection) -> Result<Option<usize>> + Send + Sync + 'static,
    ) -> Self {
        Self::new(move |conn, _scheme| body(conn))
    }

    /// Placeholder that does nothing and advances the version by exactly one.
    /// Used to fill gaps left by out-of-order registration.
    pub fn noop() -> Self {
        Self::new(|_conn, _scheme| Ok(None))
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Run the body outside a transaction, for DDL that some engines forbid
    /// inside one. A failure mid-step then leaves the database partially
    /// migrated with the version row at its pre-step value.
    pub fn no_transaction(mut self) -> Self {
        self.transaction = false;
        self
    }

    /// Declares the version the database is at after this step, overriding
    /// the implicit `index + 1`.
    pub fn upgrades_to(mut self, version: usize) -> Self {
        self.upgrades_to = Some(UpgradesTo::Version(version));
        self
    }

    /// Like [`upgrades_to`](Self::upgrades_to), but the destination is
    /// computed from the connection and scheme at execution time.
    pub fn upgrades_to_computed(
        mut self,
        f: impl Fn(&Connection, Scheme) -> Result<usize> + Send + Sync + 'static,
    ) -> Self {
        self.upgrades_to = Some(UpgradesTo::Computed(Box::new(f)));
        self
    }
}

/// Ordered list of migration steps for one logical database, plus the
/// executor that walks a live database up to the latest version.
pub struct UpgradeTable {
    upgrades: Vec<UpgradeStep>,
    allow_unsupported: bool,
    version_table_name: String,
    database_name: String,
}

impl std::fmt::Debug for UpgradeTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradeTable")
            .field("upgrades", &self.upgrades.len())
            .field("allow_unsupported", &self.allow_unsupported)
            .field("version_table_name", &self.version_table_name)
            .field("database_name", &self.database_name)
            .finish()
    }
}

impl UpgradeTable {
    pub fn new(database_name: impl Into<String>) -> Self {
        Self {
            upgrades: Vec::new(),
            allow_unsupported: false,
            version_table_name: "version".to_string(),
            database_name: database_name.into(),
        }
    }

    /// When set, a persisted version newer than this table is a warning
    /// instead of a fatal error.
    pub fn allow_unsupported(&mut self, allow: bool) -> &mut Self {
        self.allow_unsupported = allow;
        self
    }

    pub fn version_table_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.version_table_name = name.into();
        self
    }

    pub fn len(&self) -> usize {
        self.upgrades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upgrades.is_empty()
    }

    /// Appends a step at the end of the list.
    pub fn register(&mut self, step: UpgradeStep) {
        self.upgrades.push(step);
    }

    /// Places a step at an explicit 0-based position. In-range positions are
    /// overwritten; positions past the end are reached by padding with no-op
    /// placeholders first. Migration files may be loaded in any order, so
    /// both must land the step exactly where it was declared.
    pub fn register_at(&mut self, index: usize, step: UpgradeStep) {
        while self.upgrades.len() <= index {
            self.upgrades.push(UpgradeStep::noop());
        }
        self.upgrades[index] = step;
    }

    fn save_version(&self, conn: &Connection, version: usize) -> Result<()> {
        debug!("saving current version (v{version}) to database");
        conn.execute(&format!("DELETE FROM {}", self.version_table_name), [])
            .map_err(|e| Error::Database(format!("failed to clear version row: {e}")))?;
        conn.execute(
            &format!(
                "INSERT INTO {} (version) VALUES (?1)",
                self.version_table_name
            ),
            [version as i64],
        )
        .map_err(|e| Error::Database(format!("failed to save version: {e}")))?;
        Ok(())
    }

    /// Walks the database from its persisted version to the latest one.
    ///
    /// Safe to call repeatedly: once current it is a no-op. Each transactional
    /// step commits its schema change and the new version together, so an
    /// interrupted upgrade resumes from the last committed step.
    pub fn upgrade(&self, db: &Database) -> Result<()> {
        let mut conn = db.acquire()?;
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (version INTEGER PRIMARY KEY)",
                self.version_table_name
            ),
            [],
        )
        .map_err(|e| Error::Database(format!("failed to create version table: {e}")))?;

        let row: Option<i64> = conn
            .query_row(
                &format!("SELECT version FROM {} LIMIT 1", self.version_table_name),
                [],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(Error::Database(format!("failed to read version: {other}"))),
            })?;
        let mut version = row.unwrap_or(0).max(0) as usize;

        if self.upgrades.len() < version {
            let err = Error::UnsupportedDatabaseVersion {
                database: self.database_name.clone(),
                version,
                latest: self.upgrades.len(),
            };
            if !self.allow_unsupported {
                return Err(err);
            }
            warn!("{err}");
            return Ok(());
        } else if self.upgrades.len() == version {
            debug!("database {} at v{version}, not upgrading", self.database_name);
            return Ok(());
        }

        let scheme = db.scheme();
        while version < self.upgrades.len() {
            let old_version = version;
            let step = &self.upgrades[version];
            let new_version = match &step.upgrades_to {
                Some(UpgradesTo::Version(v)) => *v,
                Some(UpgradesTo::Computed(f)) => f(&conn, scheme)?,
                None => version + 1,
            };
            if step.description.is_empty() {
                debug!(
                    "upgrading {} ({}) from v{old_version} to v{new_version}",
                    self.database_name,
                    scheme.as_str()
                );
            } else {
                debug!(
                    "upgrading {} ({}) from v{old_version} to v{new_version}: {}",
                    self.database_name,
                    scheme.as_str(),
                    step.description
                );
            }
            if step.transaction {
                let tx = conn
                    .transaction()
                    .map_err(|e| Error::Database(format!("failed to open transaction: {e}")))?;
                version = (step.body)(&tx, scheme)?.unwrap_or(new_version);
                self.save_version(&tx, version)?;
                tx.commit()
                    .map_err(|e| Error::Database(format!("failed to commit upgrade: {e}")))?;
            } else {
                version = (step.body)(&conn, scheme)?.unwrap_or(new_version);
                self.save_version(&conn, version)?;
            }
            if version != new_version {
                warn!(
                    "upgrading {} actually went from v{old_version} to v{version}",
                    self.database_name
                );
            }
        }
        Ok(())
    }
}
