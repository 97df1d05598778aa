//! skein-core
//!
//! Core building blocks for the Skein task scheduler.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, task, errors）
//! - **ports**: 抽象化レイヤー（TaskStore, TaskExecutor, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（builder, scheduler, worker_loop, reaper_loop）
//! - **impls**: 実装（PostgreSQL、開発用の in-memory store、SimulatedExecutor）
//! - **config**: スケジューラの設定値とデフォルト
//!
//! Tasks are durable rows. Any number of scheduler processes can poll the
//! same store: claiming is atomic and disjoint, and tasks abandoned in
//! `Running` are returned to `Pending` once the liveness window passes.

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
