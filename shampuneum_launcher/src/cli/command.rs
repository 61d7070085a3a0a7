use std::time::Duration;

use owo_colors::OwoColorize;
use sl_core::{fabric_version_id, info, pt, warn, FABRIC_LOADER_VERSION, GAME_VERSION};
use sl_instances::{
    launcher_update::{self, UpdateCheck, UpdateConfig, UpdateInstaller, UpdateRelease},
    login, prepare_launch, GameLauncher, InstallEnv, LaunchOptions, LaunchRequest,
};
use sl_java_handler::{JavaProvisioner, RuntimeHandle};

use crate::{cli::InstallArgs, config::LauncherConfig, state::AppContext};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

pub async fn install(ctx: &mut AppContext, args: InstallArgs) -> CmdResult {
    let Some(_guard) = ctx.begin() else {
        return Err("an install or launch is already running".into());
    };

    let env = InstallEnv::new(&ctx.root());
    let session = ctx
        .session
        .insert(login(&env.endpoints.login, &args.username, &args.password).await?);
    info!("Logged in as {} ({})", session.username, session.access);
    ctx.config.last_username = Some(session.username.clone());

    let mut options = ctx.config.install_options();
    if let Some(modpack) = args.modpack {
        options.modpack = modpack;
    }
    if let Some(fov) = args.fov {
        options.fov = fov;
    }
    if let Some(render_distance) = args.render_distance {
        options.render_distance = render_distance;
    }
    if let Some(max_fps) = args.max_fps {
        options.max_fps = max_fps;
    }
    if let Some(language) = args.language {
        options.language = language;
    }
    if args.auto_connect {
        options.auto_connect_server = true;
    }
    if args.java.is_some() {
        options.java_path = args.java;
    }

    let result = sl_instances::install_client(&ctx.root(), &env, &options, &ctx.progress).await?;
    println!("{result}");

    ctx.config.remember(&options);
    ctx.save_config().await?;
    Ok(())
}

pub async fn status(ctx: &AppContext) -> CmdResult {
    let status = ctx.root().status().await;
    let installed = if status.client_installed {
        "installed".green().bold().to_string()
    } else {
        "not installed".red().bold().to_string()
    };
    println!("Client: {installed}");
    println!("Folder: {}", status.root.display());
    if status.versions_available.is_empty() {
        println!("Versions: {}", "none".bright_black());
    } else {
        println!("Versions:");
        for version in &status.versions_available {
            println!("  {version}");
        }
    }
    Ok(())
}

pub async fn clean(ctx: &AppContext, force: bool) -> CmdResult {
    let Some(_guard) = ctx.begin() else {
        return Err("an install or launch is already running".into());
    };
    let root = ctx.root();
    if !force {
        println!(
            "{} {:?}?",
            "Are you SURE you want to delete every game file in".yellow().bold(),
            root.path()
        );
        println!("Mods, versions, libraries and game settings will be removed");
        if !confirm_action()? {
            println!("Cancelled");
            return Ok(());
        }
    }
    root.cleanup().await?;
    info!("Deleted game files in {:?}", root.path());
    Ok(())
}

fn confirm_action() -> Result<bool, std::io::Error> {
    use std::io::Write;

    loop {
        print!("[Y/n] ");
        std::io::stdout().flush()?;

        let mut user_input = String::new();
        std::io::stdin().read_line(&mut user_input)?;

        match user_input.trim().to_lowercase().as_str() {
            "y" | "yes" | "" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => println!("\nInvalid input. Please respond with 'Y' or 'n'.\n"),
        }
    }
}

/// Prints the request instead of starting the game.
struct PrintLauncher;

impl GameLauncher for PrintLauncher {
    type Handle = ();
    type Error = serde_json::Error;

    fn launch(&self, request: &LaunchRequest) -> Result<(), serde_json::Error> {
        println!("{}", serde_json::to_string_pretty(request)?);
        Ok(())
    }
}

/// Java for launching without downloading anything:
/// the configured one, else the launcher's own, else the system's.
fn launch_runtime(ctx: &AppContext) -> RuntimeHandle {
    if let Some(path) = &ctx.config.java_path {
        return RuntimeHandle::Path(path.clone());
    }
    let pinned = JavaProvisioner::new(ctx.root().java_dir()).pinned_binary();
    if pinned.exists() {
        RuntimeHandle::Path(pinned)
    } else {
        RuntimeHandle::System
    }
}

pub async fn launch_info(ctx: &mut AppContext, username: &str, password: &str) -> CmdResult {
    let Some(_guard) = ctx.begin() else {
        return Err("an install or launch is already running".into());
    };

    let root = ctx.root();
    let env = InstallEnv::new(&root);
    let mut options = LaunchOptions::new(
        launch_runtime(ctx),
        fabric_version_id(FABRIC_LOADER_VERSION, GAME_VERSION),
        GAME_VERSION.to_owned(),
    );
    options.memory_max = ctx.config.c_max_memory();
    options.memory_min = ctx.config.c_min_memory();
    options.auto_connect_server = ctx.config.auto_connect_server.unwrap_or_default();

    let session = ctx
        .session
        .insert(login(&env.endpoints.login, username, password).await?);
    let request = prepare_launch(&root, session, &options).await?;
    PrintLauncher.launch(&request)?;

    ctx.config.last_username = Some(request.username.clone());
    ctx.save_config().await?;
    Ok(())
}

fn print_release(release: &UpdateRelease) {
    println!(
        "{} {} -> {}",
        "Update available:".green().bold(),
        sl_core::LAUNCHER_VERSION_NAME,
        release.version.bold()
    );
    println!(
        "  {} ({}{})",
        release.file_name,
        launcher_update::format_bytes(release.size_bytes),
        if release.is_portable { ", portable" } else { "" }
    );
    if let Some(date) = &release.publish_date {
        println!("  Released {date}");
    }
    println!("\n{}\n", release.changelog);
    println!(
        "Install with {} or skip with {}",
        "update install".yellow(),
        format!("update skip {}", release.version).yellow()
    );
}

pub async fn update_check(ctx: &AppContext) -> CmdResult {
    let config = UpdateConfig::default();
    let check = launcher_update::check_for_updates(
        &config,
        ctx.config.skipped_version.as_deref(),
        &ctx.progress,
    )
    .await?;
    match check {
        UpdateCheck::UpToDate => println!("Launcher is up to date ({})", config.current_version),
        UpdateCheck::Skipped(version) => {
            println!("Version {version} is available but was skipped");
        }
        UpdateCheck::Available(release) => print_release(&release),
    }
    Ok(())
}

pub async fn update_install(ctx: &AppContext) -> CmdResult {
    let Some(_guard) = ctx.begin() else {
        return Err("an install or launch is already running".into());
    };

    let config = UpdateConfig::default();
    // Asking for it explicitly overrides a skip
    let release = match launcher_update::check_for_updates(&config, None, &ctx.progress).await? {
        UpdateCheck::Available(release) => release,
        UpdateCheck::UpToDate | UpdateCheck::Skipped(_) => {
            println!("Launcher is up to date ({})", config.current_version);
            return Ok(());
        }
    };

    let dest = std::env::temp_dir().join("shampuneum-update");
    let downloaded =
        launcher_update::download_update(&config, &release, &dest, &ctx.progress).await?;
    let installer = UpdateInstaller::for_download(&downloaded)?;

    match launcher_update::install_update(&installer, &downloaded, &ctx.progress).await? {
        launcher_update::ApplyOutcome::RestartPending => {
            info!("Restarting into version {}", release.version);
            sl_core::logger_finish();
            tokio::time::sleep(Duration::from_secs(1)).await;
            std::process::exit(0);
        }
        launcher_update::ApplyOutcome::Overlaid => {
            info!("Updated to {}, restart the launcher to use it", release.version);
        }
    }
    Ok(())
}

pub async fn update_skip(ctx: &mut AppContext, version: &str) -> CmdResult {
    ctx.config.skip_version(version);
    ctx.save_config().await?;
    pt!("Won't ask about version {version} again");
    Ok(())
}

pub async fn update_watch(ctx: &AppContext) -> CmdResult {
    let config = UpdateConfig::default();
    let dir = ctx.launcher_dir.clone();
    info!(
        "Checking for updates every {} minutes",
        config.check_interval.as_secs() / 60
    );
    launcher_update::auto_check(
        &config,
        None,
        // Re-read, `update skip` may run in another terminal
        || {
            LauncherConfig::load_s(&dir)
                .ok()
                .and_then(|n| n.skipped_version)
        },
        |check| {
            if let UpdateCheck::Available(release) = check {
                print_release(release);
            }
        },
        &ctx.progress,
    )
    .await;
    Ok(())
}

/// Best-effort check in the background of a long command.
/// Its outcome only ever ends up in the log.
pub fn spawn_startup_update_check(ctx: &AppContext) {
    if !ctx.config.c_auto_update_check() {
        return;
    }
    let skipped = ctx.config.skipped_version.clone();
    tokio::spawn(async move {
        let config = UpdateConfig::default();
        tokio::time::sleep(config.first_check_delay).await;
        // Not on the shared channel: it would interleave with install progress
        match launcher_update::check_for_updates(
            &config,
            skipped.as_deref(),
            &sl_core::ProgressSender::none(),
        )
        .await
        {
            Ok(UpdateCheck::Available(release)) => info!(
                "Launcher update {} is available, run `update install`",
                release.version
            ),
            Ok(_) => {}
            Err(error) => warn!("Startup update check failed:\n{error}"),
        }
    });
}

pub fn settings_show(ctx: &AppContext) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(&ctx.config)?);
    pt!("Stored in {:?}", ctx.launcher_dir.join("config.json"));
    Ok(())
}

pub async fn settings_set(ctx: &mut AppContext, key: &str, value: &str) -> CmdResult {
    ctx.config.set(key, value)?;
    ctx.save_config().await?;
    info!("Set {key} to {value}");
    Ok(())
}
