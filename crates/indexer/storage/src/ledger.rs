//! SQLite backed ledger.

use crate::{LedgerReader, LedgerWriter, StorageError};
use alloy_primitives::{Address, B256};
use ethscribe_protocol::{Bid, Ethscription, EventId, LedgerEvent, Listing};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params, types::Type};
use std::{
    fmt::{self, Display},
    path::Path,
    str::FromStr,
    sync::{Mutex, MutexGuard},
};
use tracing::{debug, info};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS ethscriptions (
        hash_id TEXT PRIMARY KEY,
        sha TEXT NOT NULL UNIQUE,
        creator TEXT NOT NULL,
        owner TEXT NOT NULL,
        prev_owner TEXT,
        created_at INTEGER NOT NULL,
        block_number INTEGER NOT NULL,
        content TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_ethscriptions_owner ON ethscriptions(owner);

    CREATE TABLE IF NOT EXISTS listings (
        hash_id TEXT PRIMARY KEY,
        min_value TEXT NOT NULL,
        listed_by TEXT NOT NULL,
        to_address TEXT,
        tx_hash TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS bids (
        hash_id TEXT PRIMARY KEY,
        from_address TEXT NOT NULL,
        value TEXT NOT NULL,
        tx_hash TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS events (
        id TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        hash_id TEXT NOT NULL,
        from_address TEXT NOT NULL,
        to_address TEXT NOT NULL,
        value TEXT NOT NULL,
        block_number INTEGER NOT NULL,
        block_timestamp INTEGER NOT NULL,
        tx_index INTEGER NOT NULL,
        log_index INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_events_hash_id ON events(hash_id);

    CREATE TABLE IF NOT EXISTS cursors (
        chain_id INTEGER PRIMARY KEY,
        block_number INTEGER NOT NULL
    );
";

const ETHSCRIPTION_COLUMNS: &str =
    "hash_id, sha, creator, owner, prev_owner, created_at, block_number, content";

const EVENT_COLUMNS: &str = "id, kind, hash_id, from_address, to_address, value, block_number, \
     block_timestamp, tx_index";

/// Ledger backed by a single SQLite connection.
///
/// Writes are serialised behind the connection mutex, so two mutations of the same hash id
/// never interleave.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl fmt::Debug for SqliteLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteLedger").finish_non_exhaustive()
    }
}

impl SqliteLedger {
    /// Creates or opens a ledger at the given path.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;",
        )?;
        let ledger = Self::init(conn)?;
        info!(target: "ledger", path = %path.display(), "Opened ledger");
        Ok(ledger)
    }

    /// Creates an in-memory ledger. Mostly useful for tests.
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn find_ethscription(
        &self,
        column: &str,
        key: B256,
    ) -> Result<Option<Ethscription>, StorageError> {
        let sql = format!("SELECT {ETHSCRIPTION_COLUMNS} FROM ethscriptions WHERE {column} = ?1");
        let found =
            self.conn()?.query_row(&sql, params![hex(&key)], read_ethscription).optional()?;
        Ok(found)
    }
}

impl LedgerReader for SqliteLedger {
    fn ethscription_by_hash_id(&self, hash_id: B256) -> Result<Option<Ethscription>, StorageError> {
        self.find_ethscription("hash_id", hash_id)
    }

    fn ethscription_by_sha(&self, sha: B256) -> Result<Option<Ethscription>, StorageError> {
        self.find_ethscription("sha", sha)
    }

    fn listing(&self, hash_id: B256) -> Result<Option<Listing>, StorageError> {
        let listing = self
            .conn()?
            .query_row(
                "SELECT hash_id, min_value, listed_by, to_address, tx_hash
                 FROM listings WHERE hash_id = ?1",
                params![hex(&hash_id)],
                |row| {
                    Ok(Listing {
                        hash_id: parse_col(row, 0)?,
                        min_value: parse_col(row, 1)?,
                        listed_by: parse_col(row, 2)?,
                        to_address: parse_opt_col(row, 3)?,
                        tx_hash: parse_col(row, 4)?,
                    })
                },
            )
            .optional()?;
        Ok(listing)
    }

    fn bid(&self, hash_id: B256) -> Result<Option<Bid>, StorageError> {
        let bid = self
            .conn()?
            .query_row(
                "SELECT hash_id, from_address, value, tx_hash FROM bids WHERE hash_id = ?1",
                params![hex(&hash_id)],
                |row| {
                    Ok(Bid {
                        hash_id: parse_col(row, 0)?,
                        from_address: parse_col(row, 1)?,
                        value: parse_col(row, 2)?,
                        tx_hash: parse_col(row, 3)?,
                    })
                },
            )
            .optional()?;
        Ok(bid)
    }

    fn event(&self, id: EventId) -> Result<Option<LedgerEvent>, StorageError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
        let event =
            self.conn()?.query_row(&sql, params![id.to_string()], read_event).optional()?;
        Ok(event)
    }

    fn events_for(&self, hash_id: B256) -> Result<Vec<LedgerEvent>, StorageError> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE hash_id = ?1
             ORDER BY block_number, tx_index, log_index, rowid"
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(params![hex(&hash_id)], read_event)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    fn cursor(&self, chain_id: u64) -> Result<Option<u64>, StorageError> {
        let cursor = self
            .conn()?
            .query_row(
                "SELECT block_number FROM cursors WHERE chain_id = ?1",
                params![chain_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(cursor)
    }
}

impl LedgerWriter for SqliteLedger {
    fn insert_ethscription(&self, ethscription: &Ethscription) -> Result<(), StorageError> {
        let sql = format!(
            "INSERT INTO ethscriptions ({ETHSCRIPTION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        );
        let result = self.conn()?.execute(
            &sql,
            params![
                hex(&ethscription.hash_id),
                hex(&ethscription.sha),
                hex(&ethscription.creator),
                hex(&ethscription.owner),
                ethscription.prev_owner.as_ref().map(hex),
                ethscription.created_at,
                ethscription.block_number,
                ethscription.content,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::ConflictError(format!(
                    "ethscription {} already exists",
                    ethscription.hash_id
                )))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn update_owner(
        &self,
        hash_id: B256,
        owner: Address,
        prev_owner: Address,
    ) -> Result<(), StorageError> {
        self.conn()?.execute(
            "UPDATE ethscriptions SET owner = ?2, prev_owner = ?3 WHERE hash_id = ?1",
            params![hex(&hash_id), hex(&owner), hex(&prev_owner)],
        )?;
        Ok(())
    }

    fn upsert_listing(&self, listing: &Listing) -> Result<(), StorageError> {
        self.conn()?.execute(
            "INSERT INTO listings (hash_id, min_value, listed_by, to_address, tx_hash)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(hash_id) DO UPDATE SET
                 min_value = excluded.min_value,
                 listed_by = excluded.listed_by,
                 to_address = excluded.to_address,
                 tx_hash = excluded.tx_hash",
            params![
                hex(&listing.hash_id),
                listing.min_value.to_string(),
                hex(&listing.listed_by),
                listing.to_address.as_ref().map(hex),
                hex(&listing.tx_hash),
            ],
        )?;
        Ok(())
    }

    fn delete_listing(&self, hash_id: B256) -> Result<(), StorageError> {
        let removed = self
            .conn()?
            .execute("DELETE FROM listings WHERE hash_id = ?1", params![hex(&hash_id)])?;
        debug!(target: "ledger", %hash_id, removed, "Deleted listing");
        Ok(())
    }

    fn upsert_bid(&self, bid: &Bid) -> Result<(), StorageError> {
        self.conn()?.execute(
            "INSERT INTO bids (hash_id, from_address, value, tx_hash)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(hash_id) DO UPDATE SET
                 from_address = excluded.from_address,
                 value = excluded.value,
                 tx_hash = excluded.tx_hash",
            params![
                hex(&bid.hash_id),
                hex(&bid.from_address),
                bid.value.to_string(),
                hex(&bid.tx_hash),
            ],
        )?;
        Ok(())
    }

    fn delete_bid(&self, hash_id: B256) -> Result<(), StorageError> {
        let removed =
            self.conn()?.execute("DELETE FROM bids WHERE hash_id = ?1", params![hex(&hash_id)])?;
        debug!(target: "ledger", %hash_id, removed, "Deleted bid");
        Ok(())
    }

    fn append_event(&self, event: &LedgerEvent) -> Result<bool, StorageError> {
        let inserted = self.conn()?.execute(
            "INSERT OR IGNORE INTO events (
                 id, kind, hash_id, from_address, to_address, value,
                 block_number, block_timestamp, tx_index, log_index
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                event.id.to_string(),
                event.kind.as_str(),
                hex(&event.hash_id),
                hex(&event.from),
                hex(&event.to),
                event.value.to_string(),
                event.block_number,
                event.block_timestamp,
                event.tx_index,
                event.id.log_index,
            ],
        )?;
        Ok(inserted > 0)
    }

    fn set_cursor(&self, chain_id: u64, block_number: u64) -> Result<(), StorageError> {
        self.conn()?.execute(
            "INSERT INTO cursors (chain_id, block_number) VALUES (?1, ?2)
             ON CONFLICT(chain_id) DO UPDATE SET block_number = excluded.block_number",
            params![chain_id, block_number],
        )?;
        Ok(())
    }
}

/// Lower-case, `0x`-prefixed hex, so stored keys compare the same regardless of input casing.
fn hex<T: fmt::LowerHex>(value: &T) -> String {
    format!("{value:#x}")
}

fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|err: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.to_string().into())
    })
}

fn parse_opt_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        raw.parse().map_err(|err: T::Err| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.to_string().into())
        })
    })
    .transpose()
}

fn read_ethscription(row: &Row<'_>) -> rusqlite::Result<Ethscription> {
    Ok(Ethscription {
        hash_id: parse_col(row, 0)?,
        sha: parse_col(row, 1)?,
        creator: parse_col(row, 2)?,
        owner: parse_col(row, 3)?,
        prev_owner: parse_opt_col(row, 4)?,
        created_at: row.get(5)?,
        block_number: row.get(6)?,
        content: row.get(7)?,
    })
}

fn read_event(row: &Row<'_>) -> rusqlite::Result<LedgerEvent> {
    Ok(LedgerEvent {
        id: parse_col(row, 0)?,
        kind: parse_col(row, 1)?,
        hash_id: parse_col(row, 2)?,
        from: parse_col(row, 3)?,
        to: parse_col(row, 4)?,
        value: parse_col(row, 5)?,
        block_number: row.get(6)?,
        block_timestamp: row.get(7)?,
        tx_index: row.get(8)?,
    })
}
