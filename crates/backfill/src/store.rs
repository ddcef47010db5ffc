use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};


/// One persisted row per (network, contract, token).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub network: String,
    pub contract_address: String,
    pub collection_name: Option<String>,
    pub token_id: u64,
    pub token_name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub mint_date: Option<DateTime<Utc>>,
    pub ai_image_description: Option<String>,
}

impl TokenRecord {
    /// A row missing any of the fetched fields triggers a re-fetch on
    /// the next run.
    pub fn is_complete(&self) -> bool {
        fn present(field: &Option<String>) -> bool {
            field.as_deref().is_some_and(|v| !v.is_empty())
        }
        present(&self.collection_name)
            && present(&self.token_name)
            && present(&self.description)
            && present(&self.image_url)
    }
}


/// Sqlite-backed metadata store. Single writer, committed after each
/// token's mutation; re-runs update rows in place.
pub struct MetadataStore {
    conn: Connection,
}

impl MetadataStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS nft_metadata (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                network_name TEXT NOT NULL,
                contract_address TEXT NOT NULL,
                collection_name TEXT,
                token_id INTEGER NOT NULL,
                token_name TEXT,
                description TEXT,
                image_url TEXT,
                mint_date TEXT,
                ai_image_description TEXT
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_nft_metadata_token
                ON nft_metadata (network_name, contract_address, token_id);",
        )
        .context("failed to create the nft_metadata table")?;
        Ok(Self { conn })
    }

    pub fn get(
        &self,
        network: &str,
        contract_address: &str,
        token_id: u64,
    ) -> anyhow::Result<Option<TokenRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT network_name, contract_address, collection_name, token_id,
                        token_name, description, image_url, mint_date, ai_image_description
                 FROM nft_metadata
                 WHERE network_name = ?1 AND contract_address = ?2 AND token_id = ?3",
                params![network, contract_address, token_id],
                |row| {
                    Ok(RawRow {
                        network: row.get(0)?,
                        contract_address: row.get(1)?,
                        collection_name: row.get(2)?,
                        token_id: row.get(3)?,
                        token_name: row.get(4)?,
                        description: row.get(5)?,
                        image_url: row.get(6)?,
                        mint_date: row.get(7)?,
                        ai_image_description: row.get(8)?,
                    })
                },
            )
            .optional()?;

        record.map(RawRow::into_record).transpose()
    }

    /// Inserts the row or updates the fetched fields in place. The AI
    /// description is deliberately left untouched here; it is written
    /// independently via [`MetadataStore::set_ai_description`].
    pub fn upsert(&self, record: &TokenRecord) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO nft_metadata (
                network_name, contract_address, collection_name, token_id,
                token_name, description, image_url, mint_date, ai_image_description
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (network_name, contract_address, token_id) DO UPDATE SET
                collection_name = excluded.collection_name,
                token_name = excluded.token_name,
                description = excluded.description,
                image_url = excluded.image_url,
                mint_date = excluded.mint_date",
            params![
                record.network,
                record.contract_address,
                record.collection_name,
                record.token_id,
                record.token_name,
                record.description,
                record.image_url,
                record.mint_date.map(|date| date.to_rfc3339()),
                record.ai_image_description,
            ],
        )?;
        Ok(())
    }

    pub fn set_ai_description(
        &self,
        network: &str,
        contract_address: &str,
        token_id: u64,
        description: &str,
    ) -> anyhow::Result<()> {
        let updated = self.conn.execute(
            "UPDATE nft_metadata SET ai_image_description = ?4
             WHERE network_name = ?1 AND contract_address = ?2 AND token_id = ?3",
            params![network, contract_address, token_id, description],
        )?;
        anyhow::ensure!(
            updated == 1,
            "no row for token {} on {}/{}",
            token_id,
            network,
            contract_address
        );
        Ok(())
    }

    pub fn count(&self) -> anyhow::Result<u64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM nft_metadata", [], |row| row.get(0))?)
    }
}


struct RawRow {
    network: String,
    contract_address: String,
    collection_name: Option<String>,
    token_id: u64,
    token_name: Option<String>,
    description: Option<String>,
    image_url: Option<String>,
    mint_date: Option<String>,
    ai_image_description: Option<String>,
}

impl RawRow {
    fn into_record(self) -> anyhow::Result<TokenRecord> {
        let mint_date = self
            .mint_date
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|date| date.with_timezone(&Utc))
                    .with_context(|| format!("invalid mint_date '{}' in the database", raw))
            })
            .transpose()?;

        Ok(TokenRecord {
            network: self.network,
            contract_address: self.contract_address,
            collection_name: self.collection_name,
            token_id: self.token_id,
            token_name: self.token_name,
            description: self.description,
            image_url: self.image_url,
            mint_date,
            ai_image_description: self.ai_image_description,
        })
    }
}
