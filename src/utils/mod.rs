// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Shared utilities

pub mod colors;
pub mod progress;
