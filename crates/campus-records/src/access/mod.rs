//! Administrative sign-in hygiene: two-factor codes and login attempts.
//!
//! Credentials are verified elsewhere; these rows only record what happened so
//! that stale entries can be purged on a schedule.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::CoreContext;
use crate::directory::active_user;
use crate::events::EventPublisher;
use crate::ids::{Actor, LoginAttemptId, TwoFactorCodeId, UserId};
use crate::records_error::{RecordsError, Violation};
use crate::store::{Constrained, Database};

/// Minutes a freshly issued code stays valid.
pub const TWO_FACTOR_TTL_MINUTES: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoFactorCode {
    pub id: TwoFactorCodeId,
    pub user: UserId,
    pub code: String,
    pub ip_address: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl TwoFactorCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && !self.is_expired(now)
    }
}

impl Constrained for TwoFactorCode {
    const ENTITY: &'static str = "two-factor code";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub id: LoginAttemptId,
    pub username: String,
    pub ip_address: String,
    pub user_agent: String,
    pub attempted_at: DateTime<Utc>,
    pub success: bool,
    pub failure_reason: String,
}

impl Constrained for LoginAttempt {
    const ENTITY: &'static str = "login attempt";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLoginAttempt {
    pub username: String,
    pub ip_address: String,
    #[serde(default)]
    pub user_agent: String,
    pub success: bool,
    #[serde(default)]
    pub failure_reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub codes_removed: usize,
    pub attempts_removed: usize,
}

pub struct AccessService<D, E> {
    ctx: CoreContext<D, E>,
}

impl<D, E> AccessService<D, E>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(ctx: CoreContext<D, E>) -> Self {
        Self { ctx }
    }

    /// Store a six-digit code issued to a user; it expires after
    /// [`TWO_FACTOR_TTL_MINUTES`].
    pub fn issue_code(
        &self,
        user: UserId,
        code: &str,
        ip_address: &str,
    ) -> Result<TwoFactorCode, RecordsError> {
        if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Violation::InvalidFormat {
                field: "code",
                value: code.to_string(),
            }
            .into());
        }
        let now = self.ctx.now();
        self.ctx.commit(|tables, _| {
            active_user(tables, user)?;
            let id = tables.two_factor_codes.insert_with(|id| TwoFactorCode {
                id,
                user,
                code: code.to_string(),
                ip_address: ip_address.to_string(),
                created_at: now,
                expires_at: now + Duration::minutes(TWO_FACTOR_TTL_MINUTES),
                used_at: None,
            })?;
            Ok(tables.two_factor_codes.fetch(id)?.clone())
        })
    }

    /// Consume a valid code for the user. Returns false when no unused, unexpired
    /// code matches.
    pub fn redeem_code(&self, user: UserId, code: &str) -> Result<bool, RecordsError> {
        let now = self.ctx.now();
        self.ctx.commit(|tables, _| {
            let Some(id) = tables
                .two_factor_codes
                .find(|row| row.user == user && row.code == code && row.is_valid(now))
                .map(|row| row.id)
            else {
                return Ok(false);
            };
            tables
                .two_factor_codes
                .update(id, |row| row.used_at = Some(now))?;
            Ok(true)
        })
    }

    pub fn record_login_attempt(
        &self,
        attempt: NewLoginAttempt,
    ) -> Result<LoginAttempt, RecordsError> {
        let now = self.ctx.now();
        self.ctx.commit(|tables, _| {
            let id = tables.login_attempts.insert_with(|id| LoginAttempt {
                id,
                username: attempt.username,
                ip_address: attempt.ip_address,
                user_agent: attempt.user_agent,
                attempted_at: now,
                success: attempt.success,
                failure_reason: attempt.failure_reason,
            })?;
            Ok(tables.login_attempts.fetch(id)?.clone())
        })
    }

    /// Delete expired two-factor codes and login attempts older than the configured
    /// retention window, both measured from `now`.
    pub fn cleanup_expired_access_records(
        &self,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<CleanupReport, RecordsError> {
        let retention = Duration::days(i64::from(self.ctx.policy().login_attempt_retention_days));
        let cutoff = now - retention;
        let report = self.ctx.commit(|tables, _| {
            Ok(CleanupReport {
                codes_removed: tables.two_factor_codes.retain(|row| !row.is_expired(now)),
                attempts_removed: tables
                    .login_attempts
                    .retain(|row| row.attempted_at >= cutoff),
            })
        })?;

        info!(
            codes_removed = report.codes_removed,
            attempts_removed = report.attempts_removed,
            %cutoff,
            %actor,
            "expired access records removed"
        );
        Ok(report)
    }
}
