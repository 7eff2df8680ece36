//! Notification rows fanned out to recipients. Channel delivery (mail, SMS) belongs
//! to whoever subscribes to `NotificationQueued`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::CoreContext;
use crate::directory::active_user;
use crate::events::{DomainEvent, EventPublisher, Outbox};
use crate::ids::{Actor, NotificationId, UserId};
use crate::records_error::{RecordsError, Violation};
use crate::store::{Constrained, Database, Tables};
use crate::validation::required;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Academic,
    Fee,
    Exam,
    General,
    Emergency,
    Event,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    #[serde(default)]
    pub priority: Priority,
    pub recipients: Vec<UserId>,
    #[serde(default)]
    pub send_email: bool,
    #[serde(default)]
    pub send_sms: bool,
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewNotification {
    pub fn validate(&self) -> Result<(), Violation> {
        required("title", &self.title)?;
        required("message", &self.message)?;
        if self.recipients.is_empty() {
            return Err(Violation::Required {
                field: "recipients",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub sender: UserId,
    pub recipients: BTreeSet<UserId>,
    /// Recipients who have opened the notification.
    pub read_by: BTreeSet<UserId>,
    pub send_email: bool,
    pub send_sms: bool,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn is_read_by(&self, user: UserId) -> bool {
        self.read_by.contains(&user)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }
}

impl Constrained for Notification {
    const ENTITY: &'static str = "notification";
}

pub struct NotificationService<D, E> {
    ctx: CoreContext<D, E>,
}

impl<D, E> NotificationService<D, E>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(ctx: CoreContext<D, E>) -> Self {
        Self { ctx }
    }

    pub fn send(&self, actor: Actor, new: NewNotification) -> Result<Notification, RecordsError> {
        let now = self.ctx.now();
        let notification = self.ctx.commit(|tables, outbox| {
            let id = queue(tables, outbox, actor.user(), new, now)?;
            Ok(tables.notifications.fetch(id)?.clone())
        })?;

        info!(
            notification = %notification.id,
            recipients = notification.recipients.len(),
            %actor,
            "notification queued"
        );
        Ok(notification)
    }

    /// Mark a notification read for the acting user, who must be a recipient.
    pub fn mark_read(
        &self,
        actor: Actor,
        notification: NotificationId,
    ) -> Result<Notification, RecordsError> {
        let reader = actor.user();
        let updated = self.ctx.commit(|tables, _| {
            if !tables.notifications.fetch(notification)?.recipients.contains(&reader) {
                return Err(RecordsError::not_found(
                    "notification",
                    format!("{notification} for user {reader}"),
                ));
            }
            tables.notifications.update(notification, |row| {
                row.read_by.insert(reader);
            })?;
            Ok(tables.notifications.fetch(notification)?.clone())
        })?;

        debug!(%notification, %actor, "notification read");
        Ok(updated)
    }

    /// Unexpired notifications addressed to a user, newest first.
    pub fn inbox(&self, user: UserId, unread_only: bool) -> Result<Vec<Notification>, RecordsError> {
        let now = self.ctx.now();
        self.ctx.query(|tables| {
            let mut rows: Vec<_> = tables
                .notifications
                .filter(|row| {
                    row.recipients.contains(&user)
                        && !row.is_expired(now)
                        && !(unread_only && row.is_read_by(user))
                })
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            rows
        })
    }
}

/// Insert a notification row inside an open unit of work and stage its event.
pub(crate) fn queue(
    tables: &mut Tables,
    outbox: &mut Outbox,
    sender: UserId,
    new: NewNotification,
    now: DateTime<Utc>,
) -> Result<NotificationId, RecordsError> {
    new.validate()?;
    for recipient in &new.recipients {
        active_user(tables, *recipient)?;
    }

    let recipients: BTreeSet<UserId> = new.recipients.into_iter().collect();
    let event_recipients = recipients.iter().copied().collect();
    let id = tables.notifications.insert_with(|id| Notification {
        id,
        title: new.title,
        message: new.message,
        notification_type: new.notification_type,
        priority: new.priority,
        sender,
        recipients,
        read_by: BTreeSet::new(),
        send_email: new.send_email,
        send_sms: new.send_sms,
        scheduled_time: new.scheduled_time,
        created_at: now,
        expires_at: new.expires_at,
    })?;

    outbox.push(DomainEvent::NotificationQueued {
        notification: id,
        recipients: event_recipients,
    });
    Ok(id)
}
