use chrono::{DateTime, Utc};

#[derive(Debug, PartialEq, Clone)]
pub struct Admin {
    pub id: i64,
    pub username: String,
    pub password_hash: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Member {
    pub id: i64,
    pub member_no: String,
    pub name: String,
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, PartialEq, Hash, Eq, Clone, Copy)]
pub enum LedgerEntryType {
    Accrue,
    Consume,
    Adjust,
}

impl LedgerEntryType {
    /// Compute the balance that results from applying an entry of this type.
    ///
    /// The sign of `amount` is normalized here and not trusted from the caller:
    /// `Accrue` and `Consume` work with the absolute value, `Adjust` replaces
    /// the balance with `amount` as given.
    pub fn apply(self, balance: i64, amount: i64) -> i64 {
        match self {
            LedgerEntryType::Accrue => balance + amount.abs(),
            LedgerEntryType::Consume => balance - amount.abs(),
            LedgerEntryType::Adjust => amount,
        }
    }
}

/// One row of a member's point audit trail.
///
/// `amount` holds the caller's original value, not the normalized delta.
#[derive(Debug, PartialEq, Clone)]
pub struct LedgerEntry {
    pub id: i64,
    pub member_id: i64,
    pub entry_type: LedgerEntryType,
    pub amount: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Session {
    pub admin: Admin,
    pub token: String,
    pub valid_until: DateTime<Utc>,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Stats {
    pub total_members: i64,
    pub total_points: i64,
    pub today_new: i64,
}
