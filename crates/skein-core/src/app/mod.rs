//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてスケジューラを実装します。
//!
//! # 主要コンポーネント
//! - **SchedulerBuilder**: 構築と起動時検証
//! - **Scheduler**: worker / reaper の起動と graceful shutdown
//! - **WorkerLoop**: poll loop（claim→execute→writeback）
//! - **ReaperLoop**: 期限切れ RUNNING タスクの回収
//! - **Pacing**: idle / error backoff

pub mod builder;
pub mod pacing;
pub mod reaper_loop;
pub mod scheduler;
pub mod status;
pub mod worker_loop;

// 主要な型を再エクスポート
pub use self::builder::{App, BuildError, SchedulerBuilder};
pub use self::pacing::{Backoff, Pacing, Wake};
pub use self::reaper_loop::ReaperLoop;
pub use self::scheduler::Scheduler;
pub use self::status::StatusCounts;
pub use self::worker_loop::{CycleReport, WorkerLoop};
