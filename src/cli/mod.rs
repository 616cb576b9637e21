//! # CLI Module
//!
//! Command line for the demo service and for checking route documentation.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Run the demo API:
//!
//! ```bash
//! swaggerware serve --addr 127.0.0.1:8080
//! ```
//!
//! ### `spec`
//!
//! Print the merged Swagger document as JSON:
//!
//! ```bash
//! swaggerware spec --host api.example.com
//! ```
//!
//! ### `check`
//!
//! Build the specification and compile every schema. Prints every issue
//! found and exits non-zero when there are any:
//!
//! ```bash
//! swaggerware check
//! ```
//!
//! Every command accepts `--config <FILE>` (default `config/config.yaml`).

mod commands;


pub use commands::{print_issues, run_cli, Cli, Commands};
