// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Refit operates a single deployed application: show its version, refresh
//! its working copy from the remote repository it was deployed from, and
//! control its service unit. The interesting part is the refresh: a guarded,
//! deliberately destructive discard-local-state operation described in
//! [`refresh`].

pub mod config;
pub mod manifest;
pub mod path;
pub mod refresh;
pub mod repo;
pub mod service;
pub mod syncer;
pub mod syscall;
