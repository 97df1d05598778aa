//! Impls - ports の実装
//!
//! - **InMemoryTaskStore**: 開発・テスト用
//! - **PgTaskStore**: PostgreSQL（本番用）
//! - **SimulatedExecutor**: 遅延して成功するだけの executor

pub mod memory;
pub mod postgres;
pub mod simulated;

pub use self::memory::{FaultPoint, InMemoryTaskStore};
pub use self::postgres::{MIGRATOR, PgTaskStore};
pub use self::simulated::SimulatedExecutor;
