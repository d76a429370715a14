//! Durable background queue for mediateam.
//!
//! This crate moves side effects out of process using Redis:
//!
//! - **Jobs**: serialised side effects ([`SideEffectJob`])
//! - **Dispatch**: [`RedisSideEffectQueue`] pushes jobs to apalis-redis storage
//! - **Workers**: [`side_effect_worker`] runs each job through the executor
//! - **Scheduler**: periodic maintenance tasks

pub mod dispatch;
pub mod jobs;
pub mod scheduler;
pub mod workers;

pub use dispatch::{RedisSideEffectQueue, connect_storage};
pub use jobs::*;
pub use scheduler::{MaintenanceQueue, SchedulerConfig, run_scheduler};
pub use workers::*;
