//! One handle over every service, sharing a single store, event sink and clock.

use std::sync::Arc;

use crate::academics::AcademicsService;
use crate::access::AccessService;
use crate::billing::BillingService;
use crate::calendar::CalendarService;
use crate::config::PolicyConfig;
use crate::context::{Clock, CoreContext, SystemClock};
use crate::directory::DirectoryService;
use crate::enrollment::EnrollmentService;
use crate::events::{EventPublisher, MemoryEventLog};
use crate::grading::GradingService;
use crate::hostel::HostelService;
use crate::library::LibraryService;
use crate::notifications::NotificationService;
use crate::progression::ProgressionService;
use crate::reporting::ReportingService;
use crate::store::{Database, MemoryDatabase};
use crate::student_affairs::StudentAffairsService;
use crate::transcript::TranscriptService;

pub struct Campus<D, E> {
    ctx: CoreContext<D, E>,
    pub directory: DirectoryService<D, E>,
    pub calendar: CalendarService<D, E>,
    pub enrollment: EnrollmentService<D, E>,
    pub grading: GradingService<D, E>,
    pub transcript: TranscriptService<D, E>,
    pub billing: BillingService<D, E>,
    pub hostel: HostelService<D, E>,
    pub reporting: ReportingService<D, E>,
    pub academics: AcademicsService<D, E>,
    pub notifications: NotificationService<D, E>,
    pub library: LibraryService<D, E>,
    pub progression: ProgressionService<D, E>,
    pub access: AccessService<D, E>,
    pub student_affairs: StudentAffairsService<D, E>,
}

impl<D, E> Campus<D, E>
where
    D: Database + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(ctx: CoreContext<D, E>) -> Self {
        Self {
            directory: DirectoryService::new(ctx.clone()),
            calendar: CalendarService::new(ctx.clone()),
            enrollment: EnrollmentService::new(ctx.clone()),
            grading: GradingService::new(ctx.clone()),
            transcript: TranscriptService::new(ctx.clone()),
            billing: BillingService::new(ctx.clone()),
            hostel: HostelService::new(ctx.clone()),
            reporting: ReportingService::new(ctx.clone()),
            academics: AcademicsService::new(ctx.clone()),
            notifications: NotificationService::new(ctx.clone()),
            library: LibraryService::new(ctx.clone()),
            progression: ProgressionService::new(ctx.clone()),
            access: AccessService::new(ctx.clone()),
            student_affairs: StudentAffairsService::new(ctx.clone()),
            ctx,
        }
    }

    pub fn context(&self) -> &CoreContext<D, E> {
        &self.ctx
    }

    pub fn database(&self) -> &Arc<D> {
        self.ctx.database()
    }

    pub fn events(&self) -> &Arc<E> {
        self.ctx.events()
    }
}

impl<E> Campus<MemoryDatabase, E>
where
    E: EventPublisher + 'static,
{
    /// Wire the services over an existing in-process store.
    pub fn with_store(
        db: MemoryDatabase,
        events: E,
        clock: Arc<dyn Clock>,
        policy: PolicyConfig,
    ) -> Self {
        Self::new(CoreContext::new(
            Arc::new(db),
            Arc::new(events),
            clock,
            policy,
        ))
    }
}

impl Campus<MemoryDatabase, MemoryEventLog> {
    /// Empty in-memory campus on the system clock with default policy.
    pub fn in_memory() -> Self {
        Self::with_store(
            MemoryDatabase::new(),
            MemoryEventLog::default(),
            Arc::new(SystemClock),
            PolicyConfig::default(),
        )
    }

    pub fn in_memory_at(clock: Arc<dyn Clock>, policy: PolicyConfig) -> Self {
        Self::with_store(MemoryDatabase::new(), MemoryEventLog::default(), clock, policy)
    }
}
