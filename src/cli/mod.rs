// Copyright 2024-2026 msgpipe-core Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI module for msgpipe-core operator commands.
//!
//! ## Usage
//!
//! ```bash
//! msgpipe-cli probe            # Exercise a local pipe end to end, exits 0 on success
//! msgpipe-cli config show      # Effective configuration as JSON
//! msgpipe-cli config validate  # Check MSGPIPE_* variables
//! ```

pub mod config_cmd;
pub mod probe_cmd;

pub use probe_cmd::{run_probe, ProbeCheck};
