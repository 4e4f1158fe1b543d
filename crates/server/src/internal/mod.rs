// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

//! Internal API consulted by the SSH front-end and Git hooks.

mod post;

pub use post::*;
