use crate::model::{
    BusinessPatch, BusinessRecord, BusinessStatus, EnrichmentFilter, NewOutreachLog, OutreachLog,
    RegistryDetails, SourceCoverage, StorageError, StoredBusiness,
};
use crate::storage::BusinessStore;
use crate::utils::identity_key;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const BUSINESS_COLUMNS: &str = "id, name, location, address, telephone, email, website, source, status,
    company_number, company_status, company_type, date_of_creation,
    industry, employee_count, description, social_media,
    created_at, updated_at, last_contacted";

const OUTREACH_COLUMNS: &str =
    "id, business_id, email_sent, phone_called, notes, template_used, sent_at, response_received";

pub struct SqliteStorage {
    conn: Connection,
}

/// Fixed-width UTC timestamps so text comparison matches time order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl SqliteStorage {
    /// Opens the database (`:memory:` works) and runs migrations.
    pub fn new(db_path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS businesses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                identity_key TEXT NOT NULL,
                name TEXT NOT NULL,
                location TEXT NOT NULL,
                address TEXT,
                telephone TEXT,
                email TEXT,
                website TEXT,
                source TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'New',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                last_contacted TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_businesses_identity ON businesses (identity_key);

            CREATE TABLE IF NOT EXISTS outreach_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                business_id INTEGER NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
                email_sent INTEGER NOT NULL DEFAULT 0,
                phone_called INTEGER NOT NULL DEFAULT 0,
                notes TEXT,
                template_used TEXT,
                sent_at TEXT NOT NULL,
                response_received INTEGER NOT NULL DEFAULT 0
            );
            ",
        )?;

        // Registry and enrichment columns arrived after the first schema
        for column in [
            "company_number",
            "company_status",
            "company_type",
            "date_of_creation",
            "industry",
            "employee_count",
            "description",
            "social_media",
        ] {
            Self::migrate_add_column_if_missing(&conn, "businesses", column, "TEXT")?;
        }

        Ok(Self { conn })
    }

    fn migrate_add_column_if_missing(
        conn: &Connection,
        table: &str,
        column: &str,
        column_def: &str,
    ) -> Result<(), StorageError> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let existing_columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<_, _>>()?;

        if !existing_columns.iter().any(|c| c == column) {
            let alter_sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, column_def);
            conn.execute(&alter_sql, [])?;
        }

        Ok(())
    }

    pub fn find_by_id(&self, id: i64) -> Result<StoredBusiness, StorageError> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM businesses WHERE id = ?1", BUSINESS_COLUMNS),
                params![id],
                Self::map_business,
            )
            .optional()?
            .ok_or(StorageError::NotFound(id))
    }

    pub fn count_businesses(&self) -> Result<usize, StorageError> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM businesses", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn update_status(&self, id: i64, status: BusinessStatus) -> Result<StoredBusiness, StorageError> {
        let changed = self.conn.execute(
            "UPDATE businesses SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), timestamp(Utc::now()), id],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(id));
        }
        self.find_by_id(id)
    }

    /// Stamps `last_contacted` and moves the business to `Contacted`.
    pub fn mark_contacted(&self, id: i64) -> Result<StoredBusiness, StorageError> {
        let now = timestamp(Utc::now());
        let changed = self.conn.execute(
            "UPDATE businesses SET last_contacted = ?1, status = ?2, updated_at = ?1 WHERE id = ?3",
            params![now, BusinessStatus::Contacted.as_str(), id],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(id));
        }
        self.find_by_id(id)
    }

    /// Never-contacted `New` businesses, oldest first.
    pub fn list_uncontacted(&self, limit: usize) -> Result<Vec<StoredBusiness>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM businesses WHERE last_contacted IS NULL AND status = ?1 ORDER BY id ASC LIMIT ?2",
            BUSINESS_COLUMNS
        ))?;
        let rows = stmt.query_map(params![BusinessStatus::New.as_str(), limit as i64], Self::map_business)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn stats_by_source(&self) -> Result<Vec<SourceCoverage>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT source,
                    COUNT(*),
                    COUNT(CASE WHEN email IS NOT NULL AND email != '' THEN 1 END),
                    COUNT(CASE WHEN website IS NOT NULL AND website != '' THEN 1 END),
                    COUNT(CASE WHEN telephone IS NOT NULL AND telephone != '' THEN 1 END)
             FROM businesses GROUP BY source ORDER BY COUNT(*) DESC, source ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SourceCoverage {
                source: row.get(0)?,
                count: row.get::<_, i64>(1)? as usize,
                with_email: row.get::<_, i64>(2)? as usize,
                with_website: row.get::<_, i64>(3)? as usize,
                with_phone: row.get::<_, i64>(4)? as usize,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn status_counts(&self) -> Result<Vec<(BusinessStatus, usize)>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM businesses GROUP BY status ORDER BY COUNT(*) DESC, status ASC")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

        let mut counts = Vec::new();
        for row in rows {
            let (status, count) = row?;
            counts.push((status.parse()?, count as usize));
        }
        Ok(counts)
    }

    /// Removes businesses created more than `days` ago; their outreach logs go with them.
    pub fn delete_older_than(&self, days: i64) -> Result<usize, StorageError> {
        let cutoff = timestamp(Utc::now() - Duration::days(days));
        Ok(self
            .conn
            .execute("DELETE FROM businesses WHERE created_at < ?1", params![cutoff])?)
    }

    pub fn create_outreach_log(&self, log: &NewOutreachLog) -> Result<OutreachLog, StorageError> {
        self.conn.execute(
            "INSERT INTO outreach_logs (business_id, email_sent, phone_called, notes, template_used, sent_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                log.business_id,
                log.email_sent,
                log.phone_called,
                log.notes,
                log.template_used,
                timestamp(Utc::now()),
            ],
        )?;
        self.find_outreach_log(self.conn.last_insert_rowid())
    }

    /// Newest first.
    pub fn outreach_logs_for_business(&self, business_id: i64) -> Result<Vec<OutreachLog>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM outreach_logs WHERE business_id = ?1 ORDER BY id DESC",
            OUTREACH_COLUMNS
        ))?;
        let rows = stmt.query_map(params![business_id], Self::map_outreach_log)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// The one mutation an outreach log allows.
    pub fn set_response_received(&self, log_id: i64, received: bool) -> Result<OutreachLog, StorageError> {
        let changed = self.conn.execute(
            "UPDATE outreach_logs SET response_received = ?1 WHERE id = ?2",
            params![received, log_id],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(log_id));
        }
        self.find_outreach_log(log_id)
    }

    fn find_outreach_log(&self, id: i64) -> Result<OutreachLog, StorageError> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM outreach_logs WHERE id = ?1", OUTREACH_COLUMNS),
                params![id],
                Self::map_outreach_log,
            )
            .optional()?
            .ok_or(StorageError::NotFound(id))
    }

    fn parse_timestamp(row: &Row, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
        let raw: String = row.get(idx)?;
        raw.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    }

    fn map_business(row: &Row) -> Result<StoredBusiness, rusqlite::Error> {
        let status: String = row.get(8)?;
        let status = status.parse::<BusinessStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let last_contacted = match row.get::<_, Option<String>>(19)? {
            Some(_) => Some(Self::parse_timestamp(row, 19)?),
            None => None,
        };

        Ok(StoredBusiness {
            id: row.get(0)?,
            record: BusinessRecord {
                name: row.get(1)?,
                location: row.get(2)?,
                address: row.get(3)?,
                telephone: row.get(4)?,
                email: row.get(5)?,
                website: row.get(6)?,
                source: row.get(7)?,
                status,
                registry: RegistryDetails {
                    company_number: row.get(9)?,
                    company_status: row.get(10)?,
                    company_type: row.get(11)?,
                    date_of_creation: row.get(12)?,
                },
            },
            industry: row.get(13)?,
            employee_count: row.get(14)?,
            description: row.get(15)?,
            social_media: row.get(16)?,
            created_at: Self::parse_timestamp(row, 17)?,
            updated_at: Self::parse_timestamp(row, 18)?,
            last_contacted,
        })
    }

    fn map_outreach_log(row: &Row) -> Result<OutreachLog, rusqlite::Error> {
        Ok(OutreachLog {
            id: row.get(0)?,
            business_id: row.get(1)?,
            email_sent: row.get(2)?,
            phone_called: row.get(3)?,
            notes: row.get(4)?,
            template_used: row.get(5)?,
            sent_at: Self::parse_timestamp(row, 6)?,
            response_received: row.get(7)?,
        })
    }
}

impl BusinessStore for SqliteStorage {
    fn exists_by_identity(&self, name: &str, location: &str) -> Result<bool, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM businesses WHERE identity_key = ?1 LIMIT 1")?;
        let mut rows = stmt.query(params![identity_key(name, location)])?;
        Ok(rows.next()?.is_some())
    }

    fn insert(&self, record: &BusinessRecord) -> Result<StoredBusiness, StorageError> {
        let now = timestamp(Utc::now());
        self.conn.execute(
            "INSERT INTO businesses (
                identity_key, name, location, address, telephone, email, website, source, status,
                company_number, company_status, company_type, date_of_creation,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
            params![
                record.identity_key(),
                record.name,
                record.location,
                record.address,
                record.telephone,
                record.email,
                record.website,
                record.source,
                record.status.as_str(),
                record.registry.company_number,
                record.registry.company_status,
                record.registry.company_type,
                record.registry.date_of_creation,
                now,
            ],
        )?;
        self.find_by_id(self.conn.last_insert_rowid())
    }

    fn list_needing_enrichment(&self, filter: EnrichmentFilter) -> Result<Vec<StoredBusiness>, StorageError> {
        let mut missing = Vec::new();
        if filter.missing_email {
            missing.push("email IS NULL OR email = ''");
        }
        if filter.missing_website {
            missing.push("website IS NULL OR website = ''");
        }
        if filter.missing_telephone {
            missing.push("telephone IS NULL OR telephone = ''");
        }
        let condition = if missing.is_empty() {
            "1 = 1".to_string()
        } else {
            missing.join(" OR ")
        };
        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM businesses WHERE {} ORDER BY id DESC LIMIT ?1",
            BUSINESS_COLUMNS, condition
        ))?;
        let rows = stmt.query_map(params![limit], Self::map_business)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn update_fields(&self, id: i64, patch: &BusinessPatch) -> Result<StoredBusiness, StorageError> {
        let columns = patch.columns();
        if columns.is_empty() {
            return self.find_by_id(id);
        }

        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
            .collect();
        let sql = format!(
            "UPDATE businesses SET {}, updated_at = ?{} WHERE id = ?{}",
            assignments.join(", "),
            columns.len() + 1,
            columns.len() + 2
        );

        let mut values: Vec<Value> = columns.iter().map(|(_, v)| Value::Text(v.to_string())).collect();
        values.push(Value::Text(timestamp(Utc::now())));
        values.push(Value::Integer(id));

        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(StorageError::NotFound(id));
        }
        self.find_by_id(id)
    }
}
