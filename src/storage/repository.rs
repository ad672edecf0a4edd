use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};

use crate::domain::{
    Bill, BillId, BillStatus, Cycle, Group, GroupId, GroupMember, PaymentAccount, PaymentMethod,
};

use super::{BillStore, GroupReader, GroupStore, MIGRATION_001_INITIAL, StoreError, StoreResult};

const GROUP_COLUMNS: &str = "id, name, amount_cents, amount_per_member, due_day, members_json, discord_guild_id, owner_id, payment_method, payment_account, created_at";

const BILL_COLUMNS: &str = "id, group_id, member_id, year, month, amount_due, amount_paid, currency, status, description, proof_json, created_at, updated_at, submitted_at, verified_at, rejected_at";

const INSERT_BILL: &str = r#"
    INSERT INTO bills (id, group_id, member_id, year, month, amount_due, amount_paid, currency, status, description, proof_json, created_at, updated_at, submitted_at, verified_at, rejected_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_GROUP: &str = r#"
    UPDATE groups
    SET name = ?, amount_cents = ?, amount_per_member = ?, due_day = ?, members_json = ?,
        discord_guild_id = ?, owner_id = ?, payment_method = ?, payment_account = ?
    WHERE id = ?
"#;

/// SQLite-backed store for groups and bills.
///
/// The pool holds a single connection so every write goes through one
/// serialized handle.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Safe to run more than once.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Bump a named counter and return the new value.
    async fn next_sequence<'e, E>(executor: E, name: &str) -> Result<i64>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = ?
            RETURNING value
            "#,
        )
        .bind(name)
        .fetch_one(executor)
        .await
        .with_context(|| format!("Failed to get next {}", name))?;

        Ok(row.get("value"))
    }

    async fn insert_bill<'e, E>(executor: E, bill: &Bill) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query(INSERT_BILL)
            .bind(bill.id)
            .bind(bill.group_id)
            .bind(&bill.member_id)
            .bind(bill.year)
            .bind(bill.month as i64)
            .bind(bill.amount_due)
            .bind(bill.amount_paid)
            .bind(&bill.currency)
            .bind(bill.status.as_str())
            .bind(&bill.description)
            .bind(&bill.proof)
            .bind(bill.created_at.to_rfc3339())
            .bind(bill.updated_at.to_rfc3339())
            .bind(bill.submitted_at.map(|dt| dt.to_rfc3339()))
            .bind(bill.verified_at.map(|dt| dt.to_rfc3339()))
            .bind(bill.rejected_at.map(|dt| dt.to_rfc3339()))
            .execute(executor)
            .await
            .context("Failed to save bill")?;
        Ok(())
    }

    async fn write_group<'e, E>(executor: E, id: GroupId, group: &Group) -> Result<u64>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let members_json = serde_json::to_string(&group.members)?;

        let result = sqlx::query(UPDATE_GROUP)
            .bind(&group.name)
            .bind(group.amount)
            .bind(group.amount_per_member)
            .bind(group.due_day as i64)
            .bind(&members_json)
            .bind(&group.discord_guild_id)
            .bind(&group.owner_id)
            .bind(group.payment_account.method.as_str())
            .bind(&group.payment_account.account)
            .bind(id)
            .execute(executor)
            .await
            .context("Failed to update group")?;

        Ok(result.rows_affected())
    }

    fn rows_to_bills(rows: Vec<SqliteRow>) -> Result<Vec<Bill>> {
        rows.iter().map(Self::row_to_bill).collect()
    }

    fn row_to_group(row: &SqliteRow) -> Result<Group> {
        let members_json: String = row.get("members_json");
        let method_str: String = row.get("payment_method");
        let created_at_str: String = row.get("created_at");
        let due_day: i64 = row.get("due_day");

        Ok(Group {
            id: row.get("id"),
            name: row.get("name"),
            amount: row.get("amount_cents"),
            amount_per_member: row.get("amount_per_member"),
            due_day: u32::try_from(due_day).context("Invalid due_day")?,
            members: serde_json::from_str::<Vec<GroupMember>>(&members_json)
                .context("Invalid members_json")?,
            discord_guild_id: row.get("discord_guild_id"),
            owner_id: row.get("owner_id"),
            payment_account: PaymentAccount {
                method: PaymentMethod::from_str(&method_str)
                    .ok_or_else(|| anyhow::anyhow!("Invalid payment method: {}", method_str))?,
                account: row.get("payment_account"),
            },
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at timestamp")?,
        })
    }

    fn row_to_bill(row: &SqliteRow) -> Result<Bill> {
        let status_str: String = row.get("status");
        let month: i64 = row.get("month");
        let year: i64 = row.get("year");
        let created_at_str: String = row.get("created_at");
        let updated_at_str: String = row.get("updated_at");

        Ok(Bill {
            id: row.get("id"),
            group_id: row.get("group_id"),
            member_id: row.get("member_id"),
            year: i32::try_from(year).context("Invalid year")?,
            month: u32::try_from(month).context("Invalid month")?,
            amount_due: row.get("amount_due"),
            amount_paid: row.get("amount_paid"),
            currency: row.get("currency"),
            status: BillStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid bill status: {}", status_str))?,
            description: row.get("description"),
            proof: row.get("proof_json"),
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at timestamp")?,
            updated_at: parse_timestamp(&updated_at_str).context("Invalid updated_at timestamp")?,
            submitted_at: parse_optional_timestamp(row.get("submitted_at"))
                .context("Invalid submitted_at timestamp")?,
            verified_at: parse_optional_timestamp(row.get("verified_at"))
                .context("Invalid verified_at timestamp")?,
            rejected_at: parse_optional_timestamp(row.get("rejected_at"))
                .context("Invalid rejected_at timestamp")?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

fn parse_optional_timestamp(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_timestamp).transpose()
}

// ========================
// Group operations
// ========================

impl GroupReader for Repository {
    async fn get_group(&self, id: GroupId) -> StoreResult<Group> {
        let row = sqlx::query(&format!("SELECT {} FROM groups WHERE id = ?", GROUP_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch group")?;

        match row {
            Some(row) => Ok(Self::row_to_group(&row)?),
            None => Err(StoreError::NotFound),
        }
    }

    async fn list_groups_by_due_day(&self, day: u32) -> StoreResult<Vec<Group>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM groups WHERE due_day = ? ORDER BY id",
            GROUP_COLUMNS
        ))
        .bind(day as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list groups by due day")?;

        Ok(rows
            .iter()
            .map(Self::row_to_group)
            .collect::<Result<Vec<_>>>()?)
    }
}

impl GroupStore for Repository {
    async fn next_group_id(&self) -> StoreResult<GroupId> {
        Ok(Self::next_sequence(&self.pool, "group_id").await?)
    }

    async fn save_group(&self, group: &Group) -> StoreResult<()> {
        let members_json = serde_json::to_string(&group.members).context("Failed to encode members")?;

        sqlx::query(
            r#"
            INSERT INTO groups (id, name, amount_cents, amount_per_member, due_day, members_json, discord_guild_id, owner_id, payment_method, payment_account, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(group.id)
        .bind(&group.name)
        .bind(group.amount)
        .bind(group.amount_per_member)
        .bind(group.due_day as i64)
        .bind(&members_json)
        .bind(&group.discord_guild_id)
        .bind(&group.owner_id)
        .bind(group.payment_account.method.as_str())
        .bind(&group.payment_account.account)
        .bind(group.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save group")?;
        Ok(())
    }

    async fn update_group(&self, id: GroupId, group: &Group) -> StoreResult<()> {
        match Self::write_group(&self.pool, id, group).await? {
            0 => Err(StoreError::NotFound),
            _ => Ok(()),
        }
    }

    async fn delete_group(&self, id: GroupId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM groups WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete group")?;

        match result.rows_affected() {
            0 => Err(StoreError::NotFound),
            _ => Ok(()),
        }
    }

    async fn save_rollover(&self, group: &Group, mut bills: Vec<Bill>) -> StoreResult<Vec<Bill>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin rollover transaction")?;

        for bill in bills.iter_mut() {
            bill.id = Self::next_sequence(&mut *tx, "bill_id").await?;
            Self::insert_bill(&mut *tx, bill).await?;
        }

        if Self::write_group(&mut *tx, group.id, group).await? == 0 {
            // Dropping the transaction rolls it back.
            return Err(StoreError::NotFound);
        }

        tx.commit()
            .await
            .context("Failed to commit rollover transaction")?;
        Ok(bills)
    }
}

// ========================
// Bill operations
// ========================

impl BillStore for Repository {
    async fn next_bill_id(&self) -> StoreResult<BillId> {
        Ok(Self::next_sequence(&self.pool, "bill_id").await?)
    }

    async fn save_bill(&self, bill: &Bill) -> StoreResult<()> {
        Ok(Self::insert_bill(&self.pool, bill).await?)
    }

    async fn get_bill(&self, id: BillId) -> StoreResult<Bill> {
        let row = sqlx::query(&format!("SELECT {} FROM bills WHERE id = ?", BILL_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch bill")?;

        match row {
            Some(row) => Ok(Self::row_to_bill(&row)?),
            None => Err(StoreError::NotFound),
        }
    }

    async fn get_bill_by_cycle(
        &self,
        group_id: GroupId,
        member_id: &str,
        cycle: Cycle,
    ) -> StoreResult<Bill> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM bills WHERE group_id = ? AND member_id = ? AND year = ? AND month = ? ORDER BY id LIMIT 1",
            BILL_COLUMNS
        ))
        .bind(group_id)
        .bind(member_id)
        .bind(cycle.year)
        .bind(cycle.month as i64)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch bill by cycle")?;

        match row {
            Some(row) => Ok(Self::row_to_bill(&row)?),
            None => Err(StoreError::NotFound),
        }
    }

    async fn list_bills_by_group_and_member(
        &self,
        group_id: GroupId,
        member_id: &str,
    ) -> StoreResult<Vec<Bill>> {
        let query = format!(
            "SELECT {} FROM bills WHERE group_id = ? AND member_id = ? ORDER BY year DESC, month DESC, id DESC",
            BILL_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(group_id)
            .bind(member_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list bills for group member")?;
        Ok(Self::rows_to_bills(rows)?)
    }

    async fn list_bills_by_member(&self, member_id: &str) -> StoreResult<Vec<Bill>> {
        let query = format!(
            "SELECT {} FROM bills WHERE member_id = ? ORDER BY year DESC, month DESC, id DESC",
            BILL_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(member_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list bills for member")?;
        Ok(Self::rows_to_bills(rows)?)
    }

    async fn list_bills_by_group(&self, group_id: GroupId) -> StoreResult<Vec<Bill>> {
        let query = format!(
            "SELECT {} FROM bills WHERE group_id = ? ORDER BY year DESC, month DESC, member_id ASC, id DESC",
            BILL_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(group_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list bills for group")?;
        Ok(Self::rows_to_bills(rows)?)
    }

    async fn update_bill(&self, bill: &Bill) -> StoreResult<Bill> {
        let result = sqlx::query(
            r#"
            UPDATE bills
            SET group_id = ?, member_id = ?, year = ?, month = ?, amount_due = ?, amount_paid = ?,
                currency = ?, status = ?, description = ?, proof_json = ?, updated_at = ?,
                submitted_at = ?, verified_at = ?, rejected_at = ?
            WHERE id = ?
            "#,
        )
        .bind(bill.group_id)
        .bind(&bill.member_id)
        .bind(bill.year)
        .bind(bill.month as i64)
        .bind(bill.amount_due)
        .bind(bill.amount_paid)
        .bind(&bill.currency)
        .bind(bill.status.as_str())
        .bind(&bill.description)
        .bind(&bill.proof)
        .bind(bill.updated_at.to_rfc3339())
        .bind(bill.submitted_at.map(|dt| dt.to_rfc3339()))
        .bind(bill.verified_at.map(|dt| dt.to_rfc3339()))
        .bind(bill.rejected_at.map(|dt| dt.to_rfc3339()))
        .bind(bill.id)
        .execute(&self.pool)
        .await
        .context("Failed to update bill")?;

        match result.rows_affected() {
            0 => Err(StoreError::NotFound),
            _ => Ok(bill.clone()),
        }
    }
}
