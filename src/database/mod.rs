use std::str::FromStr;

use base64::engine::general_purpose;
use base64::Engine;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Connection, Pool, Row, Sqlite};

use crate::error::{ServiceError, ServiceResult};
use crate::models::{Admin, LedgerEntry, LedgerEntryType, Member, Session, Stats};

mod migration;
#[cfg(test)]
mod tests;

/// History queries return at most this many rows, newest first.
const HISTORY_LIMIT: i64 = 50;

/// Note attached to the history row of an initial point grant.
const INITIAL_GRANT_NOTE: &str = "Initial point grant";

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<Sqlite>,
}

impl AppState {
    pub async fn connect(url: &str) -> AppState {
        let options = SqliteConnectOptions::from_str(url)
            .expect("parse database url")
            .create_if_missing(true)
            .foreign_keys(true);

        // A single connection serializes all store access. The balance guard
        // in `apply_ledger_entry` relies on this.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("connect to database");

        AppState::from_pool(pool).await
    }

    pub async fn from_pool(pool: Pool<Sqlite>) -> AppState {
        let migrator = Migrator::new(migration::sqlite_migrations())
            .await
            .expect("load migrations");
        migrator.run(&pool).await.expect("run migrations");

        AppState { pool }
    }
}

pub struct DatabaseConnection {
    pub connection: PoolConnection<Sqlite>,
}

fn admin_from_row(row: &SqliteRow) -> ServiceResult<Admin> {
    Ok(Admin {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
    })
}

fn member_from_row(row: &SqliteRow) -> ServiceResult<Member> {
    Ok(Member {
        id: row.try_get("id")?,
        member_no: row.try_get("member_no")?,
        name: row.try_get("name")?,
        points: row.try_get("points")?,
        created_at: row.try_get("created_at")?,
    })
}

fn ledger_entry_from_row(row: &SqliteRow) -> ServiceResult<LedgerEntry> {
    Ok(LedgerEntry {
        id: row.try_get("id")?,
        member_id: row.try_get("member_id")?,
        entry_type: entry_type_from_str(row.try_get("type")?)?,
        amount: row.try_get("amount")?,
        note: row.try_get("note")?,
        created_at: row.try_get("created_at")?,
    })
}

fn entry_type_to_str(entry_type: LedgerEntryType) -> &'static str {
    match entry_type {
        LedgerEntryType::Accrue => "accrue",
        LedgerEntryType::Consume => "consume",
        LedgerEntryType::Adjust => "adjust",
    }
}

fn entry_type_from_str(value: &str) -> ServiceResult<LedgerEntryType> {
    match value {
        "accrue" => Ok(LedgerEntryType::Accrue),
        "consume" => Ok(LedgerEntryType::Consume),
        "adjust" => Ok(LedgerEntryType::Adjust),
        other => Err(ServiceError::InternalServerError(format!(
            "unknown ledger entry type '{other}'"
        ))),
    }
}

/// Map a unique constraint violation to a `Conflict` error.
fn unique_violation(err: sqlx::Error, conflict: &'static str) -> ServiceError {
    match err.as_database_error() {
        Some(db_err) if db_err.message().contains("UNIQUE") => ServiceError::Conflict(conflict),
        _ => err.into(),
    }
}

impl DatabaseConnection {
    pub async fn get_all_admins(&mut self) -> ServiceResult<Vec<Admin>> {
        let rows = sqlx::query(
            "SELECT id, username, password_hash, created_at FROM admins ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&mut *self.connection)
        .await?;

        rows.iter().map(admin_from_row).collect()
    }

    pub async fn get_admin_by_id(&mut self, id: i64) -> ServiceResult<Option<Admin>> {
        let row = sqlx::query("SELECT id, username, password_hash, created_at FROM admins WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.connection)
            .await?;

        row.as_ref().map(admin_from_row).transpose()
    }

    pub async fn get_admin_by_username(&mut self, username: &str) -> ServiceResult<Option<Admin>> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, created_at FROM admins WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&mut *self.connection)
        .await?;

        row.as_ref().map(admin_from_row).transpose()
    }

    pub async fn create_admin(
        &mut self,
        username: &str,
        password_hash: &[u8],
    ) -> ServiceResult<Admin> {
        let created_at = Utc::now();

        let result = sqlx::query(
            "INSERT INTO admins (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(created_at)
        .execute(&mut *self.connection)
        .await
        .map_err(|err| unique_violation(err, "An admin with this username already exists!"))?;

        Ok(Admin {
            id: result.last_insert_rowid(),
            username: username.to_owned(),
            password_hash: password_hash.to_owned(),
            created_at,
        })
    }

    pub async fn update_admin_password(
        &mut self,
        id: i64,
        password_hash: &[u8],
    ) -> ServiceResult<()> {
        let result = sqlx::query("UPDATE admins SET password_hash = ?1 WHERE id = ?2")
            .bind(password_hash)
            .bind(id)
            .execute(&mut *self.connection)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }

        Ok(())
    }

    pub async fn delete_admin(&mut self, id: i64) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM admins WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.connection)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }

        Ok(())
    }

    pub async fn count_admins(&mut self) -> ServiceResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM admins")
            .fetch_one(&mut *self.connection)
            .await?;

        Ok(row.try_get("count")?)
    }

    pub async fn create_session_token(
        &mut self,
        admin_id: i64,
        valid_until: DateTime<Utc>,
    ) -> ServiceResult<String> {
        let token_bytes: [u8; 32] = rand::random();
        let token = general_purpose::URL_SAFE_NO_PAD.encode(token_bytes);

        sqlx::query("INSERT INTO sessions (token, admin_id, valid_until) VALUES (?1, ?2, ?3)")
            .bind(&token)
            .bind(admin_id)
            .bind(valid_until)
            .execute(&mut *self.connection)
            .await?;

        Ok(token)
    }

    pub async fn get_session_by_session_token(
        &mut self,
        token: &str,
    ) -> ServiceResult<Option<Session>> {
        let row = sqlx::query(
            "SELECT sessions.token, sessions.valid_until, \
                    admins.id, admins.username, admins.password_hash, admins.created_at \
             FROM sessions \
             INNER JOIN admins ON admins.id = sessions.admin_id \
             WHERE sessions.token = ?1 AND sessions.valid_until > ?2",
        )
        .bind(token)
        .bind(Utc::now())
        .fetch_optional(&mut *self.connection)
        .await?;

        match row {
            Some(row) => Ok(Some(Session {
                admin: admin_from_row(&row)?,
                token: row.try_get("token")?,
                valid_until: row.try_get("valid_until")?,
            })),
            None => Ok(None),
        }
    }

    pub async fn delete_session_token(&mut self, token: &str) -> ServiceResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?1")
            .bind(token)
            .execute(&mut *self.connection)
            .await?;

        Ok(())
    }

    pub async fn get_all_members(&mut self, search: Option<&str>) -> ServiceResult<Vec<Member>> {
        let query = match search {
            Some(term) => sqlx::query(
                "SELECT id, member_no, name, points, created_at FROM members \
                 WHERE instr(name, ?1) > 0 OR instr(member_no, ?1) > 0 \
                 ORDER BY created_at DESC, id DESC",
            )
            .bind(term),
            None => sqlx::query(
                "SELECT id, member_no, name, points, created_at FROM members \
                 ORDER BY created_at DESC, id DESC",
            ),
        };

        let rows = query.fetch_all(&mut *self.connection).await?;
        rows.iter().map(member_from_row).collect()
    }

    pub async fn get_member_by_id(&mut self, id: i64) -> ServiceResult<Option<Member>> {
        let row = sqlx::query("SELECT id, member_no, name, points, created_at FROM members WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.connection)
            .await?;

        row.as_ref().map(member_from_row).transpose()
    }

    /// Insert a new member. A nonzero initial balance additionally writes an
    /// accrual history row in the same transaction.
    pub async fn create_member(
        &mut self,
        member_no: &str,
        name: &str,
        points: i64,
    ) -> ServiceResult<Member> {
        let created_at = Utc::now();
        let mut tx = self.connection.begin().await?;

        let result = sqlx::query(
            "INSERT INTO members (member_no, name, points, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(member_no)
        .bind(name)
        .bind(points)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| unique_violation(err, "A member with this member number already exists!"))?;
        let id = result.last_insert_rowid();

        if points > 0 {
            sqlx::query(
                "INSERT INTO point_history (member_id, type, amount, note, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(id)
            .bind(entry_type_to_str(LedgerEntryType::Accrue))
            .bind(points)
            .bind(INITIAL_GRANT_NOTE)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Member {
            id,
            member_no: member_no.to_owned(),
            name: name.to_owned(),
            points,
            created_at,
        })
    }

    /// Update a member's identity fields. Points are only ever touched by
    /// `apply_ledger_entry`.
    pub async fn update_member(
        &mut self,
        id: i64,
        member_no: &str,
        name: &str,
    ) -> ServiceResult<()> {
        let result = sqlx::query("UPDATE members SET member_no = ?1, name = ?2 WHERE id = ?3")
            .bind(member_no)
            .bind(name)
            .bind(id)
            .execute(&mut *self.connection)
            .await
            .map_err(|err| unique_violation(err, "A member with this member number already exists!"))?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }

        Ok(())
    }

    /// Delete a member together with its full point history.
    pub async fn delete_member(&mut self, id: i64) -> ServiceResult<()> {
        let mut tx = self.connection.begin().await?;

        sqlx::query("DELETE FROM point_history WHERE member_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM members WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Apply a ledger entry to a member's balance and append the matching
    /// history row in one transaction.
    ///
    /// The history row stores the caller's original amount, the balance math
    /// uses the normalized value from `LedgerEntryType::apply`. A result
    /// below zero rejects the whole operation.
    pub async fn apply_ledger_entry(
        &mut self,
        member_id: i64,
        entry_type: LedgerEntryType,
        amount: i64,
        note: Option<&str>,
    ) -> ServiceResult<i64> {
        let mut tx = self.connection.begin().await?;

        let row = sqlx::query("SELECT points FROM members WHERE id = ?1")
            .bind(member_id)
            .fetch_optional(&mut *tx)
            .await?;
        let points: i64 = match row {
            Some(row) => row.try_get("points")?,
            None => return Err(ServiceError::NotFound),
        };

        let new_balance = entry_type.apply(points, amount);
        if new_balance < 0 {
            return Err(ServiceError::BadRequest("Insufficient point balance!"));
        }

        sqlx::query("UPDATE members SET points = ?1 WHERE id = ?2")
            .bind(new_balance)
            .bind(member_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO point_history (member_id, type, amount, note, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(member_id)
        .bind(entry_type_to_str(entry_type))
        .bind(amount)
        .bind(note)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(new_balance)
    }

    pub async fn get_history_by_member(&mut self, member_id: i64) -> ServiceResult<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            "SELECT id, member_id, type, amount, note, created_at FROM point_history \
             WHERE member_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
        )
        .bind(member_id)
        .bind(HISTORY_LIMIT)
        .fetch_all(&mut *self.connection)
        .await?;

        rows.iter().map(ledger_entry_from_row).collect()
    }

    pub async fn get_stats(
        &mut self,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> ServiceResult<Stats> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM members")
            .fetch_one(&mut *self.connection)
            .await?;
        let total_members: i64 = row.try_get("count")?;

        let row = sqlx::query("SELECT COALESCE(SUM(points), 0) AS total FROM members")
            .fetch_one(&mut *self.connection)
            .await?;
        let total_points: i64 = row.try_get("total")?;

        let row = sqlx::query("SELECT COUNT(*) AS count FROM members WHERE created_at >= ?1 AND created_at < ?2")
            .bind(day_start)
            .bind(day_end)
            .fetch_one(&mut *self.connection)
            .await?;
        let today_new: i64 = row.try_get("count")?;

        Ok(Stats {
            total_members,
            total_points,
            today_new,
        })
    }
}
