// src/view.rs

use chrono::{Datelike, Months, NaiveDate};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::aggregator::{AggregateError, AttendanceAggregator};
use crate::hr_client::UserDirectory;
use crate::model::{Company, CompanyId, DisplayUser, UserId};

/// The company currently selected by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyContext {
    pub company: Company,
}

impl CompanyContext {
    pub fn new(company: Company) -> Self {
        Self { company }
    }

    pub fn id(&self) -> CompanyId {
        self.company.id
    }
}

/// The authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: UserId,
}

/// Time window of an aggregation; `None` widens to all years/months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Period {
    pub year: Option<i32>,
    /// Zero-based.
    pub month: Option<u32>,
}

impl Period {
    pub fn new(year: Option<i32>, month: Option<u32>) -> Self {
        Self { year, month }
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: Some(date.year()),
            month: Some(date.month0()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthOption {
    pub name: String,
    /// Zero-based month number.
    pub code: u32,
    pub year: i32,
}

/// Selectable months: the current one and the one before.
pub fn month_options(today: NaiveDate) -> Vec<MonthOption> {
    let previous = today
        .with_day(1)
        .and_then(|first| first.checked_sub_months(Months::new(1)))
        .unwrap_or(today);
    [today, previous]
        .into_iter()
        .map(|d| MonthOption {
            name: d.format("%B").to_string(),
            code: d.month0(),
            year: d.year(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Applied { generation: u64, users: usize },
    /// A newer reload started before this one completed; its result was dropped.
    Superseded { generation: u64 },
}

#[derive(Debug, Default)]
struct ViewState {
    users: Vec<DisplayUser>,
    applied_generation: u64,
}

/// Aggregated attendance table for one company selection.
pub struct AttendanceView<D: ?Sized> {
    aggregator: AttendanceAggregator,
    generation: AtomicU64,
    state: Mutex<ViewState>,
    directory: Arc<D>,
}

impl<D> AttendanceView<D>
where
    D: UserDirectory + ?Sized + 'static,
{
    pub fn new(directory: Arc<D>, aggregator: AttendanceAggregator) -> Self {
        Self {
            aggregator,
            generation: AtomicU64::new(0),
            state: Mutex::new(ViewState::default()),
            directory,
        }
    }

    pub fn aggregator(&self) -> &AttendanceAggregator {
        &self.aggregator
    }

    pub async fn users(&self) -> Vec<DisplayUser> {
        self.state.lock().await.users.clone()
    }

    pub async fn applied_generation(&self) -> u64 {
        self.state.lock().await.applied_generation
    }

    pub fn latest_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Starts a reload. The generation is taken at call time, so a later call
    /// always supersedes an earlier one regardless of completion order.
    pub fn reload(
        &self,
        company: &CompanyContext,
        period: Period,
    ) -> impl Future<Output = Result<ReloadOutcome, AggregateError>> + '_ {
        let generation = self.begin();
        let company_id = company.id();
        async move { self.complete_reload(generation, company_id, period).await }
    }

    async fn complete_reload(
        &self,
        generation: u64,
        company_id: CompanyId,
        period: Period,
    ) -> Result<ReloadOutcome, AggregateError> {
        debug!(
            "Reload #{} started for company {} ({:?})",
            generation, company_id, period
        );
        let result = self
            .aggregator
            .aggregate(&*self.directory, company_id, period.year, period.month)
            .await;

        let mut state = self.state.lock().await;
        if self.latest_generation() != generation {
            debug!("Reload #{} superseded, dropping its result", generation);
            return Ok(ReloadOutcome::Superseded { generation });
        }

        let users = result?;
        let count = users.len();
        state.users = users;
        state.applied_generation = generation;
        info!("Reload #{} applied: {} users", generation, count);
        Ok(ReloadOutcome::Applied {
            generation,
            users: count,
        })
    }

    /// Runs a reload inside `scope`; it is aborted if the scope closes first.
    pub fn spawn_reload(
        self: &Arc<Self>,
        scope: &mut ViewScope,
        company: &CompanyContext,
        period: Period,
    ) {
        let generation = self.begin();
        let company_id = company.id();
        let view = Arc::clone(self);
        scope.spawn(async move {
            match view.complete_reload(generation, company_id, period).await {
                Ok(outcome) => debug!("Background reload finished: {:?}", outcome),
                Err(e) => error!("Background reload #{} failed: {}", generation, e),
            }
        });
    }
}

/// Owns the in-flight work of a view; everything still pending is aborted on close/drop.
#[derive(Debug, Default)]
pub struct ViewScope {
    tasks: Vec<JoinHandle<()>>,
}

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(tokio::spawn(task));
    }

    pub fn pending(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }

    /// Waits for every task still owned by the scope.
    pub async fn join_all(&mut self) {
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    error!("View task panicked: {}", e);
                }
            }
        }
    }

    pub fn close(&mut self) {
        let pending = self.pending();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if pending > 0 {
            debug!("View scope closed, aborted {} pending tasks", pending);
        }
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.close();
    }
}
