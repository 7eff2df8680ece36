use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::config::PolicyConfig;
use crate::events::{EventPublisher, Outbox};
use crate::records_error::RecordsError;
use crate::store::{Database, Tables};

/// Source of "now" for registration windows, timestamps and expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant; used by batches that replay a given date and by tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Shared handles every service works through.
pub struct CoreContext<D, E> {
    db: Arc<D>,
    events: Arc<E>,
    clock: Arc<dyn Clock>,
    policy: PolicyConfig,
}

impl<D, E> Clone for CoreContext<D, E> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            events: Arc::clone(&self.events),
            clock: Arc::clone(&self.clock),
            policy: self.policy.clone(),
        }
    }
}

impl<D, E> CoreContext<D, E>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(db: Arc<D>, events: Arc<E>, clock: Arc<dyn Clock>, policy: PolicyConfig) -> Self {
        Self {
            db,
            events,
            clock,
            policy,
        }
    }

    pub fn database(&self) -> &Arc<D> {
        &self.db
    }

    pub fn events(&self) -> &Arc<E> {
        &self.events
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Read-only snapshot query.
    pub fn query<T>(&self, query: impl FnOnce(&Tables) -> T) -> Result<T, RecordsError> {
        Ok(self.db.read(query)?)
    }

    /// Fallible read that maps domain failures (missing rows, bad state).
    pub fn lookup<T>(
        &self,
        query: impl FnOnce(&Tables) -> Result<T, RecordsError>,
    ) -> Result<T, RecordsError> {
        self.db.read(query)?
    }

    /// Run a unit of work, then publish the events it staged. Nothing is published
    /// when the unit rolls back.
    pub fn commit<T>(
        &self,
        unit: impl FnOnce(&mut Tables, &mut Outbox) -> Result<T, RecordsError>,
    ) -> Result<T, RecordsError> {
        let mut outbox = Outbox::default();
        let value = self.db.write(|tables| unit(tables, &mut outbox))?;

        for event in outbox.into_events() {
            self.events.publish(event)?;
        }

        Ok(value)
    }
}
