use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use sl_core::{err, print::LogConfig, ProgressSender, LAUNCHER_VERSION_NAME};

use crate::state::{spawn_progress_printer, AppContext};

mod command;

const SITE: &str = "https://shampuneum.net";

#[derive(Parser)]
#[cfg_attr(target_os = "windows", command(name = ".\\shampuneum_launcher.exe"))]
#[cfg_attr(not(target_os = "windows"), command(name = "./shampuneum_launcher"))]
#[command(version = LAUNCHER_VERSION_NAME)]
#[command(long_about = long_about())]
struct Cli {
    #[clap(subcommand)]
    command: Option<SubCmd>,
    #[arg(long)]
    #[arg(help = "Don't write a log file for this run")]
    no_log_file: bool,
}

#[derive(Subcommand)]
enum SubCmd {
    #[command(about = "Logs in and installs (or repairs) the client")]
    Install(InstallArgs),
    #[command(about = "Shows what is installed")]
    Status,
    #[command(about = "Deletes every game file (settings and logs are kept)")]
    Clean {
        #[arg(short, long)]
        #[arg(help = "Deletes without confirmation")]
        force: bool,
    },
    #[command(about = "Logs in and prints what would be launched, as JSON")]
    LaunchInfo {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    #[clap(subcommand)]
    Update(UpdateCmd),
    #[clap(subcommand)]
    Settings(SettingsCmd),
}

#[derive(Args)]
pub struct InstallArgs {
    #[arg(short, long)]
    pub username: String,
    #[arg(short, long)]
    pub password: String,
    #[arg(long)]
    #[arg(help = "ULTRA, MEDIUM or LOW (default: last used, or ULTRA)")]
    pub modpack: Option<String>,
    #[arg(long)]
    pub fov: Option<f32>,
    #[arg(long)]
    pub render_distance: Option<u32>,
    #[arg(long)]
    pub max_fps: Option<u32>,
    #[arg(long)]
    #[arg(help = "Game language, like ru_ru or en_us")]
    pub language: Option<String>,
    #[arg(long)]
    #[arg(help = "Join the Shampuneum server straight from the main menu")]
    pub auto_connect: bool,
    #[arg(long)]
    #[arg(help = "Use this Java binary instead of detecting one")]
    pub java: Option<PathBuf>,
}

#[derive(Subcommand)]
#[command(about = "Checks for and installs launcher updates")]
enum UpdateCmd {
    #[command(about = "Checks once and prints the result")]
    Check,
    #[command(about = "Downloads and applies the latest version")]
    Install,
    #[command(about = "Stops asking about this version")]
    Skip { version: String },
    #[command(about = "Keeps checking every 30 minutes")]
    Watch,
}

#[derive(Subcommand)]
#[command(about = "Shows or changes launcher settings")]
enum SettingsCmd {
    Show,
    #[command(long_about = r"Changes a setting. Use `default` as the value to reset it.

Keys: max_memory, min_memory, java_path, modpack, fov, render_distance,
max_fps, language, auto_connect_server, last_username, auto_update_check")]
    Set { key: String, value: String },
}

fn long_about() -> String {
    format!(
        r"
Shampuneum Launcher: installs and updates the Shampuneum client

Website: {SITE}"
    )
}

fn print_intro() {
    println!(
        " {} {}\n {}\n\n For a list of commands type\n {}",
        "Shampuneum Launcher".purple().bold(),
        LAUNCHER_VERSION_NAME.purple(),
        "Installs and updates the Shampuneum client".green().bold(),
        "./shampuneum_launcher --help".yellow()
    );
}

pub fn start_cli() {
    let cli = Cli::parse();
    if cli.no_log_file {
        sl_core::print::set_config(LogConfig {
            terminal: true,
            file: false,
        });
    }

    let Some(subcommand) = cli.command else {
        print_intro();
        return;
    };

    let (sender, receiver) = std::sync::mpsc::channel();
    let printer = spawn_progress_printer(receiver);

    let mut ctx = match AppContext::load(ProgressSender::new(sender)) {
        Ok(n) => n,
        Err(error) => {
            err!("{error}");
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(n) => n,
        Err(error) => {
            err!("Could not start the async runtime: {error}");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        match subcommand {
            SubCmd::Install(args) => {
                command::spawn_startup_update_check(&ctx);
                command::install(&mut ctx, args).await
            }
            SubCmd::Status => command::status(&ctx).await,
            SubCmd::Clean { force } => command::clean(&ctx, force).await,
            SubCmd::LaunchInfo { username, password } => {
                command::launch_info(&mut ctx, &username, &password).await
            }
            SubCmd::Update(UpdateCmd::Check) => command::update_check(&ctx).await,
            SubCmd::Update(UpdateCmd::Install) => command::update_install(&ctx).await,
            SubCmd::Update(UpdateCmd::Skip { version }) => {
                command::update_skip(&mut ctx, &version).await
            }
            SubCmd::Update(UpdateCmd::Watch) => command::update_watch(&ctx).await,
            SubCmd::Settings(SettingsCmd::Show) => command::settings_show(&ctx),
            SubCmd::Settings(SettingsCmd::Set { key, value }) => {
                command::settings_set(&mut ctx, &key, &value).await
            }
        }
    });
    runtime.shutdown_background();

    // Closes the progress channel so the printer can finish
    drop(ctx);
    _ = printer.join();
    quit(result);
}

fn quit(res: Result<(), Box<dyn std::error::Error + 'static>>) {
    let code = if let Err(err) = res {
        err!("{err}");
        1
    } else {
        0
    };
    sl_core::logger_finish();
    std::process::exit(code);
}
