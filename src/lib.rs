//! # Taskmaster
//!
//! A single-user task list: create, edit, complete, delete, search, filter,
//! sort and reorder tasks. Tasks live in a JSON blob behind a simulated task
//! API that adds latency and random failures, so the loading and error paths
//! of the client get exercised without a real server.

pub mod commands;
pub mod config;
pub mod models;
pub mod notify;
pub mod projection;
pub mod reorder;
pub mod service;
pub mod storage;
pub mod store;
pub mod tui;

use std::sync::Arc;

use config::{Config, ConfigError};
use notify::Notifier;
use service::SimulatedService;
use storage::{FileStorage, StorageError};
use store::TaskStore;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpenError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Wires file storage, the simulated service and a store together.
pub fn open_store(
    config: &Config,
    notifier: Arc<dyn Notifier>,
) -> Result<(Arc<TaskStore>, Arc<FileStorage>), OpenError> {
    let storage = Arc::new(FileStorage::new(&config.dir)?);
    let service = SimulatedService::new(storage.clone(), config.faults.clone())?;
    let store = Arc::new(TaskStore::new(Arc::new(service), notifier));
    Ok((store, storage))
}
