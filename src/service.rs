//! Simulated remote task API.
//!
//! Every call waits out an artificial delay and then, with a configurable
//! probability, fails with a generic error before touching storage. Both knobs
//! exist to exercise loading and error paths of a client without a network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::config::ConfigError;
use crate::models::{Task, TaskPatch};
use crate::storage::{load_tasks, save_tasks, Storage, StorageError};

/// Operations offered by the task API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Create,
    Update,
    Delete,
    Reorder,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Reorder => "reorder",
        }
    }

    /// Generic message reported when the operation fails.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Self::List => "Failed to load tasks",
            Self::Create => "Failed to add task",
            Self::Update => "Failed to update task",
            Self::Delete => "Failed to delete task",
            Self::Reorder => "Failed to reorder tasks",
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Injected failure, unrelated to the input.
    #[error("{}", .0.failure_message())]
    Injected(Operation),

    #[error("Task not found")]
    NotFound { id: String },

    #[error("{0}")]
    Storage(#[from] StorageError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[async_trait]
pub trait TaskService: Send + Sync {
    /// Returns the full persisted collection in stored order.
    async fn get_all(&self) -> ServiceResult<Vec<Task>>;

    /// Persists a new task built from `title` and returns it.
    async fn create(&self, title: &str) -> ServiceResult<Task>;

    /// Applies `patch` to the stored task with `id`.
    async fn update(&self, id: &str, patch: TaskPatch) -> ServiceResult<Task>;

    async fn delete(&self, id: &str) -> ServiceResult<()>;

    /// Replaces the stored collection with `tasks`, in that order.
    async fn reorder(&self, tasks: &[Task]) -> ServiceResult<()>;
}

// =============================================================================
// Fault injection
// =============================================================================

/// Latency and failure knobs of [`SimulatedService`].
#[derive(Debug, Clone, PartialEq)]
pub struct FaultConfig {
    /// Fixed delay before every operation completes.
    pub delay: Duration,
    /// Probability (0.0 - 1.0) that an operation fails.
    pub failure_rate: f64,
    /// Seed for the failure roll. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_FAILURE_RATE: f64 = 0.1;

impl Default for FaultConfig {
    fn default() -> Self {
        Self { delay: DEFAULT_DELAY, failure_rate: DEFAULT_FAILURE_RATE, seed: None }
    }
}

impl FaultConfig {
    /// No delay, never fails.
    pub fn none() -> Self {
        Self { delay: Duration::ZERO, failure_rate: 0.0, seed: None }
    }

    /// No delay, every operation fails.
    pub fn always_fail() -> Self {
        Self { delay: Duration::ZERO, failure_rate: 1.0, seed: None }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(ConfigError::InvalidFailureRate(self.failure_rate));
        }
        Ok(())
    }
}

// =============================================================================
// Storage-backed service
// =============================================================================

/// [`TaskService`] over a [`Storage`] blob with injected latency and failures.
pub struct SimulatedService {
    storage: Arc<dyn Storage>,
    faults: FaultConfig,
    rng: Mutex<StdRng>,
}

impl SimulatedService {
    pub fn new(storage: Arc<dyn Storage>, faults: FaultConfig) -> Result<Self, ConfigError> {
        faults.validate()?;
        let rng = match faults.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { storage, faults, rng: Mutex::new(rng) })
    }

    /// Waits out the delay, then rolls for an injected failure.
    async fn gate(&self, op: Operation) -> ServiceResult<()> {
        if !self.faults.delay.is_zero() {
            tokio::time::sleep(self.faults.delay).await;
        }
        let rate = self.faults.failure_rate;
        if rate > 0.0 && self.rng.lock().gen_bool(rate) {
            tracing::warn!(op = op.as_str(), "Injected failure");
            return Err(ServiceError::Injected(op));
        }
        tracing::debug!(op = op.as_str(), "Operation passed fault gate");
        Ok(())
    }
}

#[async_trait]
impl TaskService for SimulatedService {
    async fn get_all(&self) -> ServiceResult<Vec<Task>> {
        self.gate(Operation::List).await?;
        Ok(load_tasks(self.storage.as_ref())?)
    }

    async fn create(&self, title: &str) -> ServiceResult<Task> {
        self.gate(Operation::Create).await?;
        let task = Task::new(title);
        let mut tasks = load_tasks(self.storage.as_ref())?;
        tasks.push(task.clone());
        save_tasks(self.storage.as_ref(), &tasks)?;
        Ok(task)
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> ServiceResult<Task> {
        self.gate(Operation::Update).await?;
        let mut tasks = load_tasks(self.storage.as_ref())?;
        let task = match tasks.iter_mut().find(|t| t.id == id) {
            Some(t) => t,
            None => return Err(ServiceError::NotFound { id: id.to_string() }),
        };
        task.apply(&patch);
        let updated = task.clone();
        save_tasks(self.storage.as_ref(), &tasks)?;
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.gate(Operation::Delete).await?;
        let mut tasks = load_tasks(self.storage.as_ref())?;
        tasks.retain(|t| t.id != id);
        save_tasks(self.storage.as_ref(), &tasks)?;
        Ok(())
    }

    async fn reorder(&self, tasks: &[Task]) -> ServiceResult<()> {
        self.gate(Operation::Reorder).await?;
        save_tasks(self.storage.as_ref(), tasks)?;
        Ok(())
    }
}
