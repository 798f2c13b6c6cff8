//! Records kept by the data store and the on-disk snapshot layout.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a user stands in the audit workflow.
///
/// Denials walk `Pending -> Suspend -> Dying -> Denied`; each step burns one of
/// the three chances a user gets.
///
/// Written by name. Older data files store the variant index instead, which
/// is read as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "StoredStatus")]
pub enum AuditStatus {
    Pending,
    Suspend,
    Dying,
    Approved,
    Expired,
    Denied,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredStatus {
    Index(u8),
    Name(String),
}

impl TryFrom<StoredStatus> for AuditStatus {
    type Error = String;

    fn try_from(stored: StoredStatus) -> Result<Self, Self::Error> {
        let status = match stored {
            StoredStatus::Index(0) => AuditStatus::Pending,
            StoredStatus::Index(1) => AuditStatus::Suspend,
            StoredStatus::Index(2) => AuditStatus::Dying,
            StoredStatus::Index(3) => AuditStatus::Approved,
            StoredStatus::Index(4) => AuditStatus::Expired,
            StoredStatus::Index(5) => AuditStatus::Denied,
            StoredStatus::Index(n) => return Err(format!("unknown audit status {}", n)),
            StoredStatus::Name(name) => match name.as_str() {
                "Pending" => AuditStatus::Pending,
                "Suspend" => AuditStatus::Suspend,
                "Dying" => AuditStatus::Dying,
                "Approved" => AuditStatus::Approved,
                "Expired" => AuditStatus::Expired,
                "Denied" => AuditStatus::Denied,
                _ => return Err(format!("unknown audit status '{}'", name)),
            },
        };
        Ok(status)
    }
}

/// Outcome of denying a user once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenialStep {
    pub next: AuditStatus,
    pub chances_left: u8,
}

impl AuditStatus {
    /// The state a denial moves this user to, or `None` if the user can no
    /// longer be denied (already approved, expired or denied).
    pub fn denial_step(self) -> Option<DenialStep> {
        let (next, chances_left) = match self {
            AuditStatus::Pending => (AuditStatus::Suspend, 2),
            AuditStatus::Suspend => (AuditStatus::Dying, 1),
            AuditStatus::Dying => (AuditStatus::Denied, 0),
            AuditStatus::Approved | AuditStatus::Expired | AuditStatus::Denied => return None,
        };
        Some(DenialStep { next, chances_left })
    }

    /// Whether an auditor may approve a user in this state.
    ///
    /// Expired users may be approved again to receive a fresh passcode.
    pub fn can_approve(self) -> bool {
        !matches!(self, AuditStatus::Approved | AuditStatus::Denied)
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuditStatus::Pending => "Pending",
            AuditStatus::Suspend => "Suspend",
            AuditStatus::Dying => "Dying",
            AuditStatus::Approved => "Approved",
            AuditStatus::Expired => "Expired",
            AuditStatus::Denied => "Denied",
        };
        f.write_str(name)
    }
}

/// Audit record for a single QQ account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(alias = "QqId")]
    pub qq_id: u64,
    #[serde(alias = "Status")]
    pub status: AuditStatus,
    /// Empty when no passcode is issued
    #[serde(default, alias = "Passcode")]
    pub passcode: String,
    #[serde(alias = "CreatedAt", deserialize_with = "stored_time")]
    pub created_at: DateTime<Utc>,
    #[serde(alias = "UpdatedAt", deserialize_with = "stored_time")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, alias = "ExpiresAt", alias = "ExpriedAt", deserialize_with = "stored_time_opt")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// RFC 3339, or a timestamp without offset which is taken as UTC.
fn parse_stored_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|t| t.and_utc())
        })
}

fn stored_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_stored_time(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw)))
}

fn stored_time_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_stored_time(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw))),
        None => Ok(None),
    }
}

impl UserInfo {
    /// A fresh pending record.
    pub fn pending(qq_id: u64, now: DateTime<Utc>) -> Self {
        Self {
            qq_id,
            status: AuditStatus::Pending,
            passcode: String::new(),
            created_at: now,
            updated_at: now,
            expires_at: None,
        }
    }

    pub fn has_passcode(&self) -> bool {
        !self.passcode.is_empty()
    }

    /// Approved with a deadline that has already passed.
    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == AuditStatus::Approved && self.expires_at.is_some_and(|at| at < now)
    }
}

/// Snapshot written to the data file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(default, alias = "Users")]
    pub users: Vec<UserInfo>,
    #[serde(default, alias = "BlackList")]
    pub black_list: Vec<u64>,
}
