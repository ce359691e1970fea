//! Postgres-backed clinic store.
//!
//! Every write is one SQL transaction:
//!
//! - calendar writes take a transaction-scoped advisory lock per calendar
//!   date (`pg_advisory_xact_lock`), in ascending date order, before reading
//!   the day's appointments; an edited appointment's row is locked first
//!   (`SELECT ... FOR UPDATE`) so its current date is stable
//! - stock movements lock the item row (`SELECT ... FOR UPDATE`), insert the
//!   ledger row and bump `quantity` in the same transaction
//!
//! ## Error Mapping
//!
//! | SQLx error | StoreError |
//! |------------|------------|
//! | `PoolClosed`, `PoolTimedOut`, `Io`, `Tls` | `Unavailable` |
//! | `ColumnDecode`, `Decode`, `ColumnNotFound` | `Corrupted` |
//! | `Database` and anything else | `Transaction` |
//!
//! The store traits are synchronous. The store owns a small tokio runtime
//! and blocks on it; when called from inside another tokio runtime the call
//! is wrapped in `block_in_place`, which requires the multi-threaded flavor.

use std::future::Future;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{info, instrument};

use clinic_core::{
    AppointmentId, DomainError, Entity, InventoryItemId, PatientId, ServiceId, TransactionId,
};
use clinic_inventory::{
    Category, InventoryItem, InventoryTransaction, ItemDetails, LedgerDecision, NewTransaction,
    Reason, StockMovement, plan_movement,
};
use clinic_scheduling::{
    Appointment, AppointmentCommand, AppointmentDraft, AppointmentStatus, Patient, ServiceOffering,
};

use super::r#trait::{
    AppointmentFilter, AppointmentStore, CatalogStore, ClinicStore, InventoryStore, MovementOutcome,
    NewServiceOffering, StoreError, StoreResult, WriteResult,
};

const SCHEMA: &str = include_str!("schema.sql");

/// First key of the two-key advisory lock; the second is the date.
const CALENDAR_LOCK_CLASS: i32 = 0x4341_4c00;

const APPOINTMENT_COLUMNS: &str = "id, patient_id, service_id, appointment_date, start_time, \
     duration_minutes, status, notes, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, name, category, unit, quantity, threshold, cost_per_unit_cents, \
     supplier, expiry_date, notes, updated_at";

const TRANSACTION_COLUMNS: &str = "id, item_id, delta, reason, appointment_id, occurred_at, notes";

type PgTx = Transaction<'static, Postgres>;

/// Connection settings for [`PostgresClinicStore::connect`].
#[derive(Debug, Clone)]
pub struct PostgresSettings {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

pub struct PostgresClinicStore {
    pool: PgPool,
    runtime: Option<tokio::runtime::Runtime>,
}

impl std::fmt::Debug for PostgresClinicStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresClinicStore")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

impl PostgresClinicStore {
    /// Open a pool and make sure the schema exists.
    pub fn connect(settings: &PostgresSettings) -> StoreResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("clinic-pg")
            .enable_all()
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to start store runtime: {e}")))?;

        let options = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout);
        let pool = block_on(&runtime, options.connect(&settings.url))
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self {
            pool,
            runtime: Some(runtime),
        };
        store.run(store.migrate())??;
        info!(max_connections = settings.max_connections, "postgres store ready");
        Ok(store)
    }

    fn run<F: Future>(&self, fut: F) -> StoreResult<F::Output> {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("store runtime stopped".to_string()))?;
        Ok(block_on(runtime, fut))
    }

    async fn begin(&self) -> StoreResult<PgTx> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }

    #[instrument(skip(self), err)]
    async fn migrate(&self) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Migration(e.to_string()))?;
        }
        tx.commit()
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))
    }

    // -- calendar --------------------------------------------------------

    async fn execute_async(
        &self,
        command: &AppointmentCommand,
        at: NaiveDateTime,
    ) -> WriteResult<Appointment> {
        let mut tx = self.begin().await?;

        let existing = match command.target() {
            Some(id) => fetch_appointment_for_update(&mut tx, id).await?,
            None => None,
        };

        let mut dates: Vec<NaiveDate> = existing
            .iter()
            .map(|a| a.date)
            .chain(command.slot().map(|s| s.date))
            .collect();
        dates.sort();
        dates.dedup();
        for date in &dates {
            lock_calendar_date(&mut tx, *date).await?;
        }

        let same_day = match command.slot() {
            Some(slot) => appointments_on(&mut tx, slot.date).await?,
            None => Vec::new(),
        };

        let draft = match command.decide(existing.as_ref(), &same_day) {
            Ok(draft) => draft,
            Err(rejection) => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(rejection.into());
            }
        };

        let saved = match existing {
            Some(current) => update_appointment(&mut tx, current.id, &draft, at).await?,
            None => insert_appointment(&mut tx, &draft, at).await?,
        };
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(saved)
    }

    async fn delete_appointment_async(&self, id: AppointmentId) -> WriteResult<()> {
        let mut tx = self.begin().await?;
        let Some(current) = fetch_appointment_for_update(&mut tx, id).await? else {
            return Err(DomainError::not_found("Appointment", id).into());
        };
        lock_calendar_date(&mut tx, current.date).await?;
        sqlx::query("DELETE FROM appointments WHERE id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_appointment", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(())
    }

    async fn list_appointments_async(&self, filter: AppointmentFilter) -> StoreResult<Vec<Appointment>> {
        // Optional filters as nullable parameters, one statement for all shapes.
        let (patient, from, to): (Option<i64>, Option<NaiveDate>, Option<NaiveDate>) = match filter {
            AppointmentFilter::All => (None, None, None),
            AppointmentFilter::OnDate(date) => (None, Some(date), Some(date)),
            AppointmentFilter::ForPatient(patient) => (Some(patient.get()), None, None),
            AppointmentFilter::Between(from, to) => (None, Some(from), Some(to)),
        };
        let sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
             WHERE ($1::BIGINT IS NULL OR patient_id = $1) \
               AND ($2::DATE IS NULL OR appointment_date >= $2) \
               AND ($3::DATE IS NULL OR appointment_date <= $3) \
             ORDER BY appointment_date, start_time, id"
        );
        let rows = sqlx::query(&sql)
            .bind(patient)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_appointments", e))?;
        rows.iter().map(appointment_from_row).collect()
    }

    // -- inventory -------------------------------------------------------

    async fn create_item_async(
        &self,
        details: ItemDetails,
        opening: Option<NewTransaction>,
        at: NaiveDateTime,
    ) -> StoreResult<InventoryItem> {
        let mut tx = self.begin().await?;
        let row = sqlx::query(
            r#"
            INSERT INTO inventory_items (
                name, category, unit, quantity, threshold, cost_per_unit_cents,
                supplier, expiry_date, notes, updated_at
            )
            VALUES ($1, $2, $3, 0, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(&details.name)
        .bind(details.category.as_str())
        .bind(&details.unit)
        .bind(details.threshold)
        .bind(details.cost_per_unit_cents)
        .bind(&details.supplier)
        .bind(details.expiry_date)
        .bind(&details.notes)
        .bind(at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
        let id = InventoryItemId::new(get(&row, "id")?);

        let mut item = InventoryItem::new(id, details, at);
        if let Some(new) = opening {
            let entry = insert_transaction(&mut tx, id, new, at).await?;
            bump_quantity(&mut tx, &mut item, &entry).await?;
        }
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(item)
    }

    async fn update_item_details_async(
        &self,
        id: InventoryItemId,
        details: ItemDetails,
        at: NaiveDateTime,
    ) -> WriteResult<InventoryItem> {
        let sql = format!(
            "UPDATE inventory_items SET name = $2, category = $3, unit = $4, threshold = $5, \
             cost_per_unit_cents = $6, supplier = $7, expiry_date = $8, notes = $9, updated_at = $10 \
             WHERE id = $1 RETURNING {ITEM_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.get())
            .bind(&details.name)
            .bind(details.category.as_str())
            .bind(&details.unit)
            .bind(details.threshold)
            .bind(details.cost_per_unit_cents)
            .bind(&details.supplier)
            .bind(details.expiry_date)
            .bind(&details.notes)
            .bind(at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_item", e))?;
        match row {
            Some(row) => Ok(item_from_row(&row)?),
            None => Err(DomainError::not_found("Inventory item", id).into()),
        }
    }

    async fn apply_movement_async(
        &self,
        id: InventoryItemId,
        movement: &StockMovement,
        at: NaiveDateTime,
    ) -> WriteResult<MovementOutcome> {
        let mut tx = self.begin().await?;
        let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_item", e))?;
        let Some(row) = row else {
            return Err(DomainError::not_found("Inventory item", id).into());
        };
        let mut item = item_from_row(&row)?;
        let previous_quantity = item.quantity();

        let new = match plan_movement(&item, movement) {
            Ok(LedgerDecision::Record(new)) => new,
            Ok(LedgerDecision::NoChange) => {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                return Ok(MovementOutcome {
                    item,
                    previous_quantity,
                    transaction: None,
                });
            }
            Err(rejection) => {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(rejection.into());
            }
        };

        let entry = insert_transaction(&mut tx, id, new, at).await?;
        bump_quantity(&mut tx, &mut item, &entry).await?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;

        Ok(MovementOutcome {
            item,
            previous_quantity,
            transaction: Some(entry),
        })
    }

    async fn delete_item_async(&self, id: InventoryItemId) -> WriteResult<()> {
        let mut tx = self.begin().await?;
        let locked = sqlx::query("SELECT id FROM inventory_items WHERE id = $1 FOR UPDATE")
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_item", e))?;
        if locked.is_none() {
            return Err(DomainError::not_found("Inventory item", id).into());
        }

        let row = sqlx::query("SELECT COUNT(*) AS n FROM inventory_transactions WHERE item_id = $1")
            .bind(id.get())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("count_transactions", e))?;
        let transactions: i64 = get(&row, "n")?;
        if transactions > 0 {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(DomainError::HasHistory {
                transactions: transactions as u64,
            }
            .into());
        }

        sqlx::query("DELETE FROM inventory_items WHERE id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(())
    }

    async fn ledger_snapshot_async(&self) -> StoreResult<Vec<(InventoryItem, Vec<InventoryTransaction>)>> {
        let mut tx = self.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("snapshot_isolation", e))?;

        let items = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM inventory_items ORDER BY id"))
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("snapshot_items", e))?;
        let entries = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM inventory_transactions ORDER BY item_id, id"
        ))
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("snapshot_transactions", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;

        let mut entries = entries
            .iter()
            .map(transaction_from_row)
            .collect::<StoreResult<Vec<_>>>()?
            .into_iter()
            .peekable();
        let mut snapshot = Vec::with_capacity(items.len());
        for row in &items {
            let item = item_from_row(row)?;
            let mut ledger = Vec::new();
            while let Some(entry) = entries.next_if(|e| e.item_id <= item.id()) {
                if entry.item_id == item.id() {
                    ledger.push(entry);
                }
            }
            snapshot.push((item, ledger));
        }
        Ok(snapshot)
    }
}

impl Drop for PostgresClinicStore {
    fn drop(&mut self) {
        // Dropping a runtime blocks, which is not allowed inside async code.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn block_on<F: Future>(runtime: &tokio::runtime::Runtime, fut: F) -> F::Output {
    if tokio::runtime::Handle::try_current().is_ok() {
        tokio::task::block_in_place(|| runtime.block_on(fut))
    } else {
        runtime.block_on(fut)
    }
}

async fn lock_calendar_date(tx: &mut PgTx, date: NaiveDate) -> StoreResult<()> {
    use chrono::Datelike;
    sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind(CALENDAR_LOCK_CLASS)
        .bind(date.num_days_from_ce())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_calendar_date", e))?;
    Ok(())
}

async fn fetch_appointment_for_update(tx: &mut PgTx, id: AppointmentId) -> StoreResult<Option<Appointment>> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1 FOR UPDATE");
    let row = sqlx::query(&sql)
        .bind(id.get())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_appointment", e))?;
    row.as_ref().map(appointment_from_row).transpose()
}

async fn appointments_on(tx: &mut PgTx, date: NaiveDate) -> StoreResult<Vec<Appointment>> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE appointment_date = $1");
    let rows = sqlx::query(&sql)
        .bind(date)
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("appointments_on", e))?;
    rows.iter().map(appointment_from_row).collect()
}

async fn insert_appointment(tx: &mut PgTx, draft: &AppointmentDraft, at: NaiveDateTime) -> StoreResult<Appointment> {
    let sql = format!(
        "INSERT INTO appointments (patient_id, service_id, appointment_date, start_time, \
         duration_minutes, status, notes, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8) RETURNING {APPOINTMENT_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(draft.patient_id.get())
        .bind(draft.service_id.map(ServiceId::get))
        .bind(draft.date)
        .bind(draft.start)
        .bind(draft.duration_minutes as i32)
        .bind(draft.status.as_str())
        .bind(&draft.notes)
        .bind(at)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_appointment", e))?;
    appointment_from_row(&row)
}

async fn update_appointment(
    tx: &mut PgTx,
    id: AppointmentId,
    draft: &AppointmentDraft,
    at: NaiveDateTime,
) -> StoreResult<Appointment> {
    let sql = format!(
        "UPDATE appointments SET patient_id = $2, service_id = $3, appointment_date = $4, \
         start_time = $5, duration_minutes = $6, status = $7, notes = $8, updated_at = $9 \
         WHERE id = $1 RETURNING {APPOINTMENT_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(id.get())
        .bind(draft.patient_id.get())
        .bind(draft.service_id.map(ServiceId::get))
        .bind(draft.date)
        .bind(draft.start)
        .bind(draft.duration_minutes as i32)
        .bind(draft.status.as_str())
        .bind(&draft.notes)
        .bind(at)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("update_appointment", e))?;
    appointment_from_row(&row)
}

async fn insert_transaction(
    tx: &mut PgTx,
    item_id: InventoryItemId,
    new: NewTransaction,
    at: NaiveDateTime,
) -> StoreResult<InventoryTransaction> {
    let row = sqlx::query(
        r#"
        INSERT INTO inventory_transactions (item_id, delta, reason, appointment_id, occurred_at, notes)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(item_id.get())
    .bind(new.delta)
    .bind(new.reason.as_str())
    .bind(new.appointment_id.map(AppointmentId::get))
    .bind(at)
    .bind(&new.notes)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_transaction", e))?;

    Ok(InventoryTransaction {
        id: TransactionId::new(get(&row, "id")?),
        item_id,
        delta: new.delta,
        reason: new.reason,
        appointment_id: new.appointment_id,
        occurred_at: at,
        notes: new.notes,
    })
}

/// Apply `entry` to the locked item and to its row, checking they agree.
async fn bump_quantity(tx: &mut PgTx, item: &mut InventoryItem, entry: &InventoryTransaction) -> StoreResult<()> {
    item.apply(entry);
    let row = sqlx::query(
        "UPDATE inventory_items SET quantity = quantity + $2, updated_at = $3 WHERE id = $1 RETURNING quantity",
    )
    .bind(item.id().get())
    .bind(entry.delta)
    .bind(entry.occurred_at)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_quantity", e))?;
    let stored: i64 = get(&row, "quantity")?;
    if stored != item.quantity() {
        return Err(StoreError::Corrupted(format!(
            "item {} quantity {} disagrees with ledger-applied {}",
            item.id(),
            stored,
            item.quantity()
        )));
    }
    Ok(())
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Corrupted(format!("column {column}: {e}")))
}

fn parse<T: std::str::FromStr<Err = DomainError>>(column: &str, raw: &str) -> StoreResult<T> {
    raw.parse()
        .map_err(|e: DomainError| StoreError::Corrupted(format!("column {column}: {e}")))
}

fn appointment_from_row(row: &PgRow) -> StoreResult<Appointment> {
    let duration: i32 = get(row, "duration_minutes")?;
    let status: String = get(row, "status")?;
    Ok(Appointment {
        id: AppointmentId::new(get(row, "id")?),
        patient_id: PatientId::new(get(row, "patient_id")?),
        service_id: get::<Option<i64>>(row, "service_id")?.map(ServiceId::new),
        date: get(row, "appointment_date")?,
        start: get::<NaiveTime>(row, "start_time")?,
        duration_minutes: u32::try_from(duration)
            .map_err(|_| StoreError::Corrupted(format!("negative duration {duration}")))?,
        status: parse::<AppointmentStatus>("status", &status)?,
        notes: get(row, "notes")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn item_from_row(row: &PgRow) -> StoreResult<InventoryItem> {
    let category: String = get(row, "category")?;
    let details = ItemDetails {
        name: get(row, "name")?,
        category: parse::<Category>("category", &category)?,
        unit: get(row, "unit")?,
        threshold: get(row, "threshold")?,
        cost_per_unit_cents: get(row, "cost_per_unit_cents")?,
        supplier: get(row, "supplier")?,
        expiry_date: get(row, "expiry_date")?,
        notes: get(row, "notes")?,
    };
    Ok(InventoryItem::restore(
        InventoryItemId::new(get(row, "id")?),
        details,
        get(row, "quantity")?,
        get(row, "updated_at")?,
    ))
}

fn transaction_from_row(row: &PgRow) -> StoreResult<InventoryTransaction> {
    let reason: String = get(row, "reason")?;
    Ok(InventoryTransaction {
        id: TransactionId::new(get(row, "id")?),
        item_id: InventoryItemId::new(get(row, "item_id")?),
        delta: get(row, "delta")?,
        reason: parse::<Reason>("reason", &reason)?,
        appointment_id: get::<Option<i64>>(row, "appointment_id")?.map(AppointmentId::new),
        occurred_at: get(row, "occurred_at")?,
        notes: get(row, "notes")?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolClosed => StoreError::Unavailable(format!("connection pool closed in {operation}")),
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("timed out acquiring a connection in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("i/o error in {operation}: {e}")),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {operation}: {e}")),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupted(format!("decode error in {operation}: {err}"))
        }
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            StoreError::Transaction(format!(
                "database error in {operation} [{code}]: {}",
                db_err.message()
            ))
        }
        other => StoreError::Transaction(format!("sqlx error in {operation}: {other}")),
    }
}

impl AppointmentStore for PostgresClinicStore {
    fn get_appointment(&self, id: AppointmentId) -> StoreResult<Option<Appointment>> {
        self.run(async {
            let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1");
            let row = sqlx::query(&sql)
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_appointment", e))?;
            row.as_ref().map(appointment_from_row).transpose()
        })?
    }

    fn list_appointments(&self, filter: AppointmentFilter) -> StoreResult<Vec<Appointment>> {
        self.run(self.list_appointments_async(filter))?
    }

    fn execute(&self, command: &AppointmentCommand, at: NaiveDateTime) -> WriteResult<Appointment> {
        self.run(self.execute_async(command, at))?
    }

    fn delete_appointment(&self, id: AppointmentId) -> WriteResult<()> {
        self.run(self.delete_appointment_async(id))?
    }
}

impl InventoryStore for PostgresClinicStore {
    fn get_item(&self, id: InventoryItemId) -> StoreResult<Option<InventoryItem>> {
        self.run(async {
            let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1");
            let row = sqlx::query(&sql)
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_item", e))?;
            row.as_ref().map(item_from_row).transpose()
        })?
    }

    fn list_items(&self) -> StoreResult<Vec<InventoryItem>> {
        self.run(async {
            let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items ORDER BY lower(name), id");
            let rows = sqlx::query(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("list_items", e))?;
            rows.iter().map(item_from_row).collect()
        })?
    }

    fn create_item(
        &self,
        details: ItemDetails,
        opening: Option<NewTransaction>,
        at: NaiveDateTime,
    ) -> StoreResult<InventoryItem> {
        self.run(self.create_item_async(details, opening, at))?
    }

    fn update_item_details(
        &self,
        id: InventoryItemId,
        details: ItemDetails,
        at: NaiveDateTime,
    ) -> WriteResult<InventoryItem> {
        self.run(self.update_item_details_async(id, details, at))?
    }

    fn apply_movement(
        &self,
        id: InventoryItemId,
        movement: &StockMovement,
        at: NaiveDateTime,
    ) -> WriteResult<MovementOutcome> {
        self.run(self.apply_movement_async(id, movement, at))?
    }

    fn delete_item(&self, id: InventoryItemId) -> WriteResult<()> {
        self.run(self.delete_item_async(id))?
    }

    fn item_transactions(&self, id: InventoryItemId) -> StoreResult<Vec<InventoryTransaction>> {
        self.run(async {
            let sql = format!(
                "SELECT {TRANSACTION_COLUMNS} FROM inventory_transactions WHERE item_id = $1 ORDER BY id"
            );
            let rows = sqlx::query(&sql)
                .bind(id.get())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("item_transactions", e))?;
            rows.iter().map(transaction_from_row).collect()
        })?
    }

    fn recent_transactions(&self, limit: usize) -> StoreResult<Vec<InventoryTransaction>> {
        self.run(async {
            let sql = format!(
                "SELECT {TRANSACTION_COLUMNS} FROM inventory_transactions \
                 ORDER BY occurred_at DESC, id DESC LIMIT $1"
            );
            let rows = sqlx::query(&sql)
                .bind(i64::try_from(limit).unwrap_or(i64::MAX))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("recent_transactions", e))?;
            rows.iter().map(transaction_from_row).collect()
        })?
    }

    fn ledger_snapshot(&self) -> StoreResult<Vec<(InventoryItem, Vec<InventoryTransaction>)>> {
        self.run(self.ledger_snapshot_async())?
    }
}

impl CatalogStore for PostgresClinicStore {
    fn get_patient(&self, id: PatientId) -> StoreResult<Option<Patient>> {
        self.run(async {
            let row = sqlx::query("SELECT id, name FROM patients WHERE id = $1")
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_patient", e))?;
            row.map(|row| {
                Ok(Patient {
                    id: PatientId::new(get(&row, "id")?),
                    name: get(&row, "name")?,
                })
            })
            .transpose()
        })?
    }

    fn get_service(&self, id: ServiceId) -> StoreResult<Option<ServiceOffering>> {
        self.run(async {
            let row = sqlx::query(
                "SELECT id, name, duration_minutes, price_cents, active FROM services WHERE id = $1",
            )
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_service", e))?;
            row.as_ref().map(service_from_row).transpose()
        })?
    }

    fn add_patient(&self, name: &str) -> StoreResult<Patient> {
        self.run(async {
            let row = sqlx::query("INSERT INTO patients (name) VALUES ($1) RETURNING id")
                .bind(name.trim())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("insert_patient", e))?;
            Ok(Patient {
                id: PatientId::new(get(&row, "id")?),
                name: name.trim().to_string(),
            })
        })?
    }

    fn add_service(&self, service: NewServiceOffering) -> StoreResult<ServiceOffering> {
        self.run(async {
            let row = sqlx::query(
                r#"
                INSERT INTO services (name, duration_minutes, price_cents, active)
                VALUES ($1, $2, $3, $4)
                RETURNING id, name, duration_minutes, price_cents, active
                "#,
            )
            .bind(&service.name)
            .bind(service.duration_minutes as i32)
            .bind(service.price_cents)
            .bind(service.active)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_service", e))?;
            service_from_row(&row)
        })?
    }
}

fn service_from_row(row: &PgRow) -> StoreResult<ServiceOffering> {
    let duration: i32 = get(row, "duration_minutes")?;
    Ok(ServiceOffering {
        id: ServiceId::new(get(row, "id")?),
        name: get(row, "name")?,
        duration_minutes: u32::try_from(duration)
            .map_err(|_| StoreError::Corrupted(format!("negative duration {duration}")))?,
        price_cents: get(row, "price_cents")?,
        active: get(row, "active")?,
    })
}

impl ClinicStore for PostgresClinicStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    fn close(&self) -> StoreResult<()> {
        self.run(self.pool.close())
    }
}
