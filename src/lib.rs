//! # Deploy Release
//!
//! Builds deployable release archives for composer-based web applications.
//!
//! A release build mirrors the application's git repository, exports one
//! branch into a numbered release directory, installs dependencies and
//! packages the result as `release-NNNN.tar.gz`.
//!
//! ## Features
//!
//! - **Fail-fast steps**: every step stops the build on failure and names itself
//! - **Vendor cache**: dependency trees are keyed by the SHA-1 of `composer.lock`
//!   and reused instead of reinstalled
//! - **Release manifests**: a JSON manifest per release records the last phase reached
//! - **Per-repository locking**: concurrent builds of one repository are serialized
//!
//! ## Usage
//!
//! ```bash
//! deploy_release create --repository kis
//! deploy_release create --repository kis --branch develop --create-tag -n
//! deploy_release repository add kis git@github.com:example/kis.git
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cli;
pub mod config;
pub mod error;
pub mod process;
pub mod prompt;
pub mod release;
pub mod state;
pub mod store;

pub use cli::Args;
pub use config::BuilderConfig;
pub use error::{BuildError, CliError, ReleaseError, Result};
pub use process::{CommandSpec, OutputSink, ProcessOutcome, ProcessRunner, SystemRunner};
pub use prompt::{RepositoryValidator, UserPrompt};
pub use release::{ReleaseBuilder, ReleaseOutcome, ReleaseRequest};
pub use state::{ReleaseManifest, ReleasePhase};
pub use store::{RepositoryRecord, RepositoryStore};
