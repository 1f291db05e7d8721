//! Postgres-backed implementation of the plugin store.
//!
//! # Purpose
//! Durable storage for tenant settings, currency rates, label records,
//! chosen rates, tracking numbers, the per-tenant post-office cache, and
//! OAuth state.
//!
//! # Schema management
//! `ensure_schema` runs at startup: `CREATE TABLE IF NOT EXISTS` for every
//! table plus `ALTER TABLE ... ADD COLUMN IF NOT EXISTS` for columns added
//! after first release. Both are idempotent, so the store tolerates
//! pre-existing schemas from older deployments and never needs a separate
//! migration step.
//!
//! # Concurrency
//! All isolation is delegated to Postgres; the application holds no
//! per-row locks. Upserts use `ON CONFLICT` so latest-wins semantics are
//! enforced by the database.
use super::{
    CurrencyRate, LabelRecord, PluginStore, ShippingSettings, StoreError, StoreResult, clamp_page,
    parse_enabled_services,
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use portage_canpost::{PostOffice, normalize_postal_code};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;

pub struct PostgresStore {
    pool: PgPool,
}

const ENSURE_TABLES: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS oauth_state (
        state VARCHAR(128) PRIMARY KEY,
        used BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS plugin_oauth (
        client_id BIGINT PRIMARY KEY,
        access_token TEXT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS shipping_settings (
        client_id BIGINT PRIMARY KEY,
        account_number VARCHAR(255) NOT NULL,
        enabled_services TEXT NOT NULL,
        default_postal_code VARCHAR(10) NOT NULL DEFAULT '',
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS currency_rates (
        id BIGSERIAL PRIMARY KEY,
        client_id BIGINT NOT NULL,
        currency_code VARCHAR(8) NOT NULL,
        rate_to_cad DOUBLE PRECISION NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (client_id, currency_code)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS chosen_shipping_rates (
        invoice_id VARCHAR(255) PRIMARY KEY,
        rate_id VARCHAR(255) NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS tracking_numbers (
        invoice_id VARCHAR(255) PRIMARY KEY,
        tracking_number VARCHAR(255) NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS label_records (
        id VARCHAR(64) PRIMARY KEY,
        shipment_id VARCHAR(64) NOT NULL,
        tracking_number VARCHAR(64) NOT NULL,
        invoice_uuid VARCHAR(255) NOT NULL DEFAULT '',
        rate_id VARCHAR(255) NOT NULL DEFAULT '',
        carrier VARCHAR(64) NOT NULL DEFAULT '',
        service_code VARCHAR(64) NOT NULL,
        service_name VARCHAR(255) NOT NULL DEFAULT '',
        shipping_charges_cents BIGINT NOT NULL DEFAULT 0,
        delivery_date VARCHAR(32) NOT NULL DEFAULT '',
        delivery_days INT NOT NULL DEFAULT 0,
        refund_link TEXT,
        weight DOUBLE PRECISION NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS client_post_offices (
        id BIGSERIAL PRIMARY KEY,
        client_id BIGINT NOT NULL,
        search_postal_code VARCHAR(10) NOT NULL,
        office_id VARCHAR(20) NOT NULL,
        office_name VARCHAR(100) NOT NULL,
        office_location VARCHAR(100),
        office_address VARCHAR(100),
        city VARCHAR(50),
        province VARCHAR(2),
        office_postal_code VARCHAR(10),
        latitude DOUBLE PRECISION,
        longitude DOUBLE PRECISION,
        distance_km DOUBLE PRECISION,
        bilingual BOOLEAN DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (client_id, search_postal_code, office_id)
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_client_postal
        ON client_post_offices (client_id, search_postal_code)"#,
];

// Columns added after the first release; pre-existing schemas gain them
// on startup.
const ENSURE_COLUMNS: &[&str] = &[
    "ALTER TABLE label_records ADD COLUMN IF NOT EXISTS invoice_uuid VARCHAR(255) NOT NULL DEFAULT ''",
    "ALTER TABLE label_records ADD COLUMN IF NOT EXISTS rate_id VARCHAR(255) NOT NULL DEFAULT ''",
    "ALTER TABLE label_records ADD COLUMN IF NOT EXISTS carrier VARCHAR(64) NOT NULL DEFAULT ''",
    "ALTER TABLE label_records ADD COLUMN IF NOT EXISTS service_name VARCHAR(255) NOT NULL DEFAULT ''",
    "ALTER TABLE label_records ADD COLUMN IF NOT EXISTS shipping_charges_cents BIGINT NOT NULL DEFAULT 0",
    "ALTER TABLE label_records ADD COLUMN IF NOT EXISTS delivery_date VARCHAR(32) NOT NULL DEFAULT ''",
    "ALTER TABLE label_records ADD COLUMN IF NOT EXISTS delivery_days INT NOT NULL DEFAULT 0",
    "ALTER TABLE label_records ADD COLUMN IF NOT EXISTS refund_link TEXT",
    "ALTER TABLE shipping_settings ADD COLUMN IF NOT EXISTS default_postal_code VARCHAR(10) NOT NULL DEFAULT ''",
];

impl PostgresStore {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        // Explicit pool bounds: hanging forever on database failures is not
        // acceptable for a request-serving plugin.
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .context("connect to postgres")?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in ENSURE_TABLES.iter().chain(ENSURE_COLUMNS) {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("ensure schema: {statement}"))?;
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct DbLabelRecord {
    id: String,
    shipment_id: String,
    tracking_number: String,
    invoice_uuid: String,
    rate_id: String,
    carrier: String,
    service_code: String,
    service_name: String,
    shipping_charges_cents: i64,
    delivery_date: String,
    delivery_days: i32,
    refund_link: Option<String>,
    weight: f64,
    created_at: DateTime<Utc>,
}

impl From<DbLabelRecord> for LabelRecord {
    fn from(row: DbLabelRecord) -> Self {
        LabelRecord {
            id: row.id,
            shipment_id: row.shipment_id,
            tracking_number: row.tracking_number,
            invoice_uuid: row.invoice_uuid,
            rate_id: row.rate_id,
            carrier: row.carrier,
            service_code: row.service_code,
            service_name: row.service_name,
            shipping_charges_cents: row.shipping_charges_cents,
            delivery_date: row.delivery_date,
            delivery_days: row.delivery_days,
            refund_link: row.refund_link.unwrap_or_default(),
            weight: row.weight,
            created_at: Some(row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct DbPostOffice {
    office_id: String,
    office_name: String,
    office_location: Option<String>,
    office_address: Option<String>,
    city: Option<String>,
    province: Option<String>,
    office_postal_code: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    distance_km: Option<f64>,
    bilingual: Option<bool>,
}

impl From<DbPostOffice> for PostOffice {
    fn from(row: DbPostOffice) -> Self {
        PostOffice {
            office_id: row.office_id,
            name: row.office_name,
            location: row.office_location.unwrap_or_default(),
            office_address: row.office_address.unwrap_or_default(),
            city: row.city.unwrap_or_default(),
            province: row.province.unwrap_or_default(),
            postal_code: row.office_postal_code.unwrap_or_default(),
            latitude: row.latitude.unwrap_or_default(),
            longitude: row.longitude.unwrap_or_default(),
            distance: row.distance_km.unwrap_or_default(),
            bilingual: row.bilingual.unwrap_or_default(),
        }
    }
}

const POST_OFFICE_COLUMNS: &str = "office_id, office_name, office_location, office_address, \
     city, province, office_postal_code, latitude, longitude, distance_km, bilingual";

const LABEL_RECORD_COLUMNS: &str = "id, shipment_id, tracking_number, invoice_uuid, rate_id, \
     carrier, service_code, service_name, shipping_charges_cents, delivery_date, delivery_days, \
     refund_link, weight, created_at";

fn parse_day_bound(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

#[async_trait]
impl PluginStore for PostgresStore {
    async fn save_shipping_settings(
        &self,
        client_id: i64,
        account_number: &str,
        enabled_services: &[String],
    ) -> StoreResult<()> {
        let services = enabled_services.join(",");
        sqlx::query(
            r#"INSERT INTO shipping_settings (client_id, account_number, enabled_services)
               VALUES ($1, $2, $3)
               ON CONFLICT (client_id) DO UPDATE
               SET account_number = EXCLUDED.account_number,
                   enabled_services = EXCLUDED.enabled_services,
                   updated_at = NOW()"#,
        )
        .bind(client_id)
        .bind(account_number)
        .bind(services)
        .execute(&self.pool)
        .await
        .context("save shipping settings")?;
        Ok(())
    }

    async fn load_shipping_settings(&self, client_id: i64) -> StoreResult<Option<ShippingSettings>> {
        let row = sqlx::query(
            r#"SELECT account_number, enabled_services, default_postal_code
               FROM shipping_settings WHERE client_id = $1"#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .context("load shipping settings")?;

        Ok(row.map(|row| ShippingSettings {
            account_number: row.get("account_number"),
            enabled_services: parse_enabled_services(row.get::<String, _>("enabled_services").as_str()),
            default_postal_code: row.get("default_postal_code"),
        }))
    }

    async fn save_default_postal_code(&self, client_id: i64, postal_code: &str) -> StoreResult<()> {
        let postal = postal_code.trim().to_uppercase();
        sqlx::query(
            r#"INSERT INTO shipping_settings (client_id, account_number, enabled_services, default_postal_code)
               VALUES ($1, '', '', $2)
               ON CONFLICT (client_id) DO UPDATE
               SET default_postal_code = EXCLUDED.default_postal_code,
                   updated_at = NOW()"#,
        )
        .bind(client_id)
        .bind(postal)
        .execute(&self.pool)
        .await
        .context("save default postal code")?;
        Ok(())
    }

    async fn save_currency_rate(
        &self,
        client_id: i64,
        currency_code: &str,
        rate_to_cad: f64,
    ) -> StoreResult<()> {
        let code = currency_code.trim().to_uppercase();
        if code.is_empty() {
            return Err(StoreError::Invalid("currency code is required".to_string()));
        }
        if rate_to_cad <= 0.0 {
            return Err(StoreError::Invalid(
                "rate_to_cad must be greater than zero".to_string(),
            ));
        }
        sqlx::query(
            r#"INSERT INTO currency_rates (client_id, currency_code, rate_to_cad)
               VALUES ($1, $2, $3)
               ON CONFLICT (client_id, currency_code) DO UPDATE
               SET rate_to_cad = EXCLUDED.rate_to_cad, updated_at = NOW()"#,
        )
        .bind(client_id)
        .bind(code)
        .bind(rate_to_cad)
        .execute(&self.pool)
        .await
        .context("save currency rate")?;
        Ok(())
    }

    async fn load_currency_rate(
        &self,
        client_id: i64,
        currency_code: &str,
    ) -> StoreResult<Option<f64>> {
        let code = currency_code.trim().to_uppercase();
        if code.is_empty() {
            return Ok(None);
        }
        let rate = sqlx::query_scalar::<_, f64>(
            "SELECT rate_to_cad FROM currency_rates WHERE client_id = $1 AND currency_code = $2",
        )
        .bind(client_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .context("load currency rate")?;
        Ok(rate)
    }

    async fn load_currency_rates(&self, client_id: i64) -> StoreResult<Vec<CurrencyRate>> {
        let rows = sqlx::query(
            r#"SELECT currency_code, rate_to_cad, updated_at
               FROM currency_rates WHERE client_id = $1 ORDER BY currency_code"#,
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await
        .context("load currency rates")?;
        Ok(rows
            .into_iter()
            .map(|row| CurrencyRate {
                currency_code: row.get("currency_code"),
                rate_to_cad: row.get("rate_to_cad"),
                updated_at: row.get("updated_at"),
            })
            .collect())
    }

    async fn save_chosen_rate(&self, invoice_id: &str, rate_id: &str) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO chosen_shipping_rates (invoice_id, rate_id)
               VALUES ($1, $2)
               ON CONFLICT (invoice_id) DO UPDATE
               SET rate_id = EXCLUDED.rate_id, updated_at = NOW()"#,
        )
        .bind(invoice_id)
        .bind(rate_id)
        .execute(&self.pool)
        .await
        .context("save chosen rate")?;
        Ok(())
    }

    async fn load_chosen_rate(&self, invoice_id: &str) -> StoreResult<Option<String>> {
        let rate_id = sqlx::query_scalar::<_, String>(
            "SELECT rate_id FROM chosen_shipping_rates WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .context("load chosen rate")?;
        Ok(rate_id)
    }

    async fn save_tracking_number(&self, invoice_id: &str, tracking: &str) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO tracking_numbers (invoice_id, tracking_number)
               VALUES ($1, $2)
               ON CONFLICT (invoice_id) DO UPDATE
               SET tracking_number = EXCLUDED.tracking_number, updated_at = NOW()"#,
        )
        .bind(invoice_id)
        .bind(tracking)
        .execute(&self.pool)
        .await
        .context("save tracking number")?;
        Ok(())
    }

    async fn load_tracking_number(&self, invoice_id: &str) -> StoreResult<Option<String>> {
        let tracking = sqlx::query_scalar::<_, String>(
            "SELECT tracking_number FROM tracking_numbers WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .context("load tracking number")?;
        Ok(tracking)
    }

    async fn load_latest_tracking_number(&self) -> StoreResult<Option<String>> {
        let tracking = sqlx::query_scalar::<_, String>(
            "SELECT tracking_number FROM tracking_numbers ORDER BY updated_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .context("load latest tracking number")?;
        Ok(tracking)
    }

    async fn save_label_record(&self, record: &LabelRecord) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO label_records (
                   id, shipment_id, tracking_number, invoice_uuid, rate_id, carrier,
                   service_code, service_name, shipping_charges_cents, delivery_date,
                   delivery_days, refund_link, weight
               ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
        )
        .bind(&record.id)
        .bind(&record.shipment_id)
        .bind(&record.tracking_number)
        .bind(&record.invoice_uuid)
        .bind(&record.rate_id)
        .bind(&record.carrier)
        .bind(&record.service_code)
        .bind(&record.service_name)
        .bind(record.shipping_charges_cents)
        .bind(&record.delivery_date)
        .bind(record.delivery_days)
        .bind(&record.refund_link)
        .bind(record.weight)
        .execute(&self.pool)
        .await
        .context("save label record")?;
        Ok(())
    }

    async fn load_label_record(&self, label_id: &str) -> StoreResult<Option<LabelRecord>> {
        let label_id = label_id.trim();
        if label_id.is_empty() {
            return Ok(None);
        }
        let row = sqlx::query_as::<_, DbLabelRecord>(&format!(
            "SELECT {LABEL_RECORD_COLUMNS} FROM label_records WHERE id = $1 LIMIT 1"
        ))
        .bind(label_id)
        .fetch_optional(&self.pool)
        .await
        .context("load label record")?;
        Ok(row.map(LabelRecord::from))
    }

    async fn load_refund_link(&self, label_id: &str) -> StoreResult<Option<String>> {
        let label_id = label_id.trim();
        if label_id.is_empty() {
            return Ok(None);
        }
        let link = sqlx::query_scalar::<_, Option<String>>(
            "SELECT refund_link FROM label_records WHERE id = $1 LIMIT 1",
        )
        .bind(label_id)
        .fetch_optional(&self.pool)
        .await
        .context("load refund link")?;
        Ok(link.flatten().map(|link| link.trim().to_string()))
    }

    async fn load_label_records_page(
        &self,
        from_date: &str,
        to_date: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<LabelRecord>, bool)> {
        let (limit, offset) = clamp_page(if limit <= 0 { 10 } else { limit }, offset);

        let mut query = format!(
            "SELECT {LABEL_RECORD_COLUMNS} FROM label_records WHERE (carrier = $1 OR carrier = '')"
        );
        let from_bound = parse_day_bound(from_date);
        let to_bound = parse_day_bound(to_date);
        if from_bound.is_some() {
            query.push_str(" AND created_at >= $4");
        }
        if to_bound.is_some() {
            query.push_str(if from_bound.is_some() {
                " AND created_at < $5"
            } else {
                " AND created_at < $4"
            });
        }
        query.push_str(" ORDER BY created_at DESC LIMIT $2 OFFSET $3");

        let mut fetch = sqlx::query_as::<_, DbLabelRecord>(&query)
            .bind("Canada Post")
            .bind(limit + 1)
            .bind(offset);
        if let Some(from) = from_bound {
            fetch = fetch.bind(from.and_time(chrono::NaiveTime::MIN).and_utc());
        }
        if let Some(to) = to_bound {
            // Exclusive upper bound at the following midnight keeps the
            // whole end day in range.
            let next_day = to.succ_opt().unwrap_or(to);
            fetch = fetch.bind(next_day.and_time(chrono::NaiveTime::MIN).and_utc());
        }

        let rows = fetch
            .fetch_all(&self.pool)
            .await
            .context("load label records page")?;
        let has_next = rows.len() as i64 > limit;
        Ok((
            rows.into_iter()
                .take(limit as usize)
                .map(LabelRecord::from)
                .collect(),
            has_next,
        ))
    }

    async fn save_post_offices(
        &self,
        client_id: i64,
        search_postal_code: &str,
        offices: &[PostOffice],
    ) -> StoreResult<()> {
        if offices.is_empty() {
            return Ok(());
        }
        let postal = normalize_postal_code(search_postal_code);
        let mut tx = self.pool.begin().await.context("begin post office tx")?;
        for office in offices {
            if office.office_id.trim().is_empty() {
                continue;
            }
            sqlx::query(
                r#"INSERT INTO client_post_offices (
                       client_id, search_postal_code, office_id, office_name, office_location,
                       office_address, city, province, office_postal_code, latitude, longitude,
                       distance_km, bilingual
                   ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                   ON CONFLICT (client_id, search_postal_code, office_id)
                   DO UPDATE SET updated_at = NOW()"#,
            )
            .bind(client_id)
            .bind(&postal)
            .bind(office.office_id.trim())
            .bind(office.name.trim())
            .bind(office.location.trim())
            .bind(office.office_address.trim())
            .bind(office.city.trim())
            .bind(office.province.trim())
            .bind(office.postal_code.trim())
            .bind(office.latitude)
            .bind(office.longitude)
            .bind(office.distance)
            .bind(office.bilingual)
            .execute(&mut *tx)
            .await
            .context("insert post office")?;
        }
        tx.commit().await.context("commit post office tx")?;
        Ok(())
    }

    async fn load_post_offices(
        &self,
        client_id: i64,
        search_postal_code: &str,
    ) -> StoreResult<Vec<PostOffice>> {
        let postal = normalize_postal_code(search_postal_code);
        let rows = sqlx::query_as::<_, DbPostOffice>(&format!(
            "SELECT {POST_OFFICE_COLUMNS} FROM client_post_offices
             WHERE client_id = $1 AND search_postal_code = $2
             ORDER BY distance_km ASC"
        ))
        .bind(client_id)
        .bind(postal)
        .fetch_all(&self.pool)
        .await
        .context("load post offices")?;
        Ok(rows.into_iter().map(PostOffice::from).collect())
    }

    async fn load_all_post_offices(&self, client_id: i64) -> StoreResult<Vec<PostOffice>> {
        let rows = sqlx::query_as::<_, DbPostOffice>(&format!(
            "SELECT {POST_OFFICE_COLUMNS} FROM client_post_offices
             WHERE client_id = $1
             ORDER BY distance_km ASC"
        ))
        .bind(client_id)
        .fetch_all(&self.pool)
        .await
        .context("load all post offices")?;
        Ok(rows.into_iter().map(PostOffice::from).collect())
    }

    async fn find_office_id_by_display(
        &self,
        client_id: i64,
        display: &str,
    ) -> StoreResult<Option<String>> {
        let office_id = sqlx::query_scalar::<_, String>(
            r#"SELECT office_id FROM client_post_offices
               WHERE client_id = $1
               AND (office_location || ' - ' || office_address || ' (' || city || ')') = $2
               LIMIT 1"#,
        )
        .bind(client_id)
        .bind(display)
        .fetch_optional(&self.pool)
        .await
        .context("find office by display")?;
        Ok(office_id.map(|id| id.trim().to_string()))
    }

    async fn used_postal_codes(&self, client_id: i64) -> StoreResult<Vec<String>> {
        let postals = sqlx::query_scalar::<_, String>(
            r#"SELECT DISTINCT search_postal_code FROM client_post_offices
               WHERE client_id = $1 ORDER BY search_postal_code"#,
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await
        .context("load used postal codes")?;
        Ok(postals
            .into_iter()
            .map(|postal| postal.trim().to_string())
            .filter(|postal| !postal.is_empty())
            .collect())
    }

    async fn used_postal_codes_page(
        &self,
        client_id: i64,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<String>, bool)> {
        let (limit, offset) = clamp_page(limit, offset);
        let rows = sqlx::query(
            r#"SELECT search_postal_code, MAX(created_at) AS last_created
               FROM client_post_offices
               WHERE client_id = $1
               GROUP BY search_postal_code
               ORDER BY last_created DESC
               LIMIT $2 OFFSET $3"#,
        )
        .bind(client_id)
        .bind(limit + 1)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("load used postal codes page")?;

        let postals: Vec<String> = rows
            .into_iter()
            .map(|row| row.get::<String, _>("search_postal_code").trim().to_string())
            .filter(|postal| !postal.is_empty())
            .collect();
        let has_next = postals.len() as i64 > limit;
        Ok((postals.into_iter().take(limit as usize).collect(), has_next))
    }

    async fn delete_postal_code(&self, client_id: i64, postal_code: &str) -> StoreResult<()> {
        let postal = normalize_postal_code(postal_code);
        sqlx::query(
            "DELETE FROM client_post_offices WHERE client_id = $1 AND search_postal_code = $2",
        )
        .bind(client_id)
        .bind(postal)
        .execute(&self.pool)
        .await
        .context("delete postal code")?;
        Ok(())
    }

    async fn save_access_token(&self, client_id: i64, access_token: &str) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO plugin_oauth (client_id, access_token)
               VALUES ($1, $2)
               ON CONFLICT (client_id) DO UPDATE
               SET access_token = EXCLUDED.access_token, updated_at = NOW()"#,
        )
        .bind(client_id)
        .bind(access_token)
        .execute(&self.pool)
        .await
        .context("save access token")?;
        Ok(())
    }

    async fn load_access_token(&self, client_id: i64) -> StoreResult<Option<String>> {
        let token = sqlx::query_scalar::<_, String>(
            "SELECT access_token FROM plugin_oauth WHERE client_id = $1",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .context("load access token")?;
        Ok(token)
    }

    async fn save_oauth_state(&self, state: &str) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO oauth_state (state) VALUES ($1)
               ON CONFLICT (state) DO NOTHING"#,
        )
        .bind(state)
        .execute(&self.pool)
        .await
        .context("save oauth state")?;
        Ok(())
    }

    async fn consume_oauth_state(&self, state: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE oauth_state SET used = TRUE WHERE state = $1 AND used = FALSE",
        )
        .bind(state)
        .execute(&self.pool)
        .await
        .context("consume oauth state")?;
        Ok(result.rows_affected() == 1)
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("postgres health check")?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
