/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! cpusim – simulated CPU resource engine
//!
//! A per-instance CPU model that multiplexes computational processes over a
//! fixed number of active slots, using a pluggable scheduling discipline, on
//! top of a single-threaded discrete-event kernel.
//!
//! ```text
//! lib.rs
//! ├── error       – ConfigError / KernelError / ProcessError / SimError
//! ├── kernel/     – virtual clock + time-ordered event queue
//! ├── process     – demand-tracking processes and their arena
//! ├── scheduler/  – FIFO, LIFO, SPN, round robin, MLFQ
//! ├── cpu/        – CPU resource, burst completion, utilisation tracking
//! ├── request     – seam towards the request layer (completions)
//! ├── config/     – CPU configuration and YAML scenario files
//! └── scenario    – runs a scenario and records a trace
//! ```

pub mod config;
pub mod cpu;
pub mod error;
pub mod kernel;
pub mod process;
pub mod request;
pub mod scenario;
pub mod scheduler;
