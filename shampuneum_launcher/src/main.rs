//! Shampuneum Launcher: installs, updates and prepares
//! the Shampuneum modded client.
//!
//! # Crate structure
//! - [`cli`]: the command line front-end
//! - [`config`]: the settings store, `config.json`
//! - [`state`]: application context and the progress printer
//!
//! The heavy lifting lives in the `sl_*` crates:
//! - `sl_core`: downloads, errors, logging, the install root
//! - `sl_java_handler`: finding or downloading Java
//! - `sl_mod_manager`: Fabric and the content bundles
//! - `sl_instances`: the installer, login, launch prep and self-update

mod cli;
mod config;
mod state;

fn main() {
    cli::start_cli();
}
