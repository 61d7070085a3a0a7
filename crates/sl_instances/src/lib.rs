//! # Installing, launching and updating for the Shampuneum launcher
//!
//! This is a crate of the Shampuneum launcher
//! for everything that happens to the game install
//! and to the launcher itself.
//!
//! **Not recommended to use in your own projects!**
//!
//! This module contains functions to:
//! - Install the client ([`install_client`]): Java, the game,
//!   Fabric, the content bundle and the config files, in that order
//! - Resolve a single game version ([`resolve_version`])
//! - Log in ([`auth::login`])
//! - Prepare a launch ([`prepare_launch`])
//! - Check for, download and apply launcher updates ([`launcher_update`])
//!
//! Progress of every long-running operation is published through
//! a [`sl_core::ProgressSender`], errors come back as `Result`s.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

pub mod auth;
mod download;
mod install;
pub mod launch;
pub mod launcher_update;

pub use auth::{login, AuthError, Session};
pub use download::{resolve_version, DownloadError, GameDownloader};
pub use install::{
    install_client, write_config_files, InstallEnv, InstallError, InstallOptions, InstallResult,
};
pub use launch::{prepare_launch, GameLauncher, LaunchError, LaunchOptions, LaunchRequest};
pub use launcher_update::{check_for_updates, download_update, install_update, UpdateError};
