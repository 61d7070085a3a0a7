use std::{fmt::Display, path::PathBuf, process::exit, time::SystemTime};

use clap::Parser;
use owo_colors::OwoColorize;
use sl_core::{
    eeprintln, print::LogConfig, InstallRoot, ProgressEvent, ProgressSender, GAME_VERSION,
};
use sl_instances::{
    prepare_launch, InstallEnv, InstallOptions, LaunchOptions, Session,
};
use sl_java_handler::RuntimeHandle;

mod layout;

#[derive(clap::Parser)]
#[command(
    long_about = "An end-to-end test that installs the full client from the real servers into a scratch folder and checks the result. Needs a network connection."
)]
struct Cli {
    #[arg(short, long)]
    #[arg(help = "Whether to reuse existing test files instead of starting from an empty folder")]
    existing: bool,
    #[arg(long, default_value = "ULTRA")]
    modpack: String,
    #[arg(long)]
    #[arg(help = "Install a second time and check nothing big was downloaded again")]
    twice: bool,
    #[arg(short, long)]
    #[arg(help = "See all the logs to diagnose issues")]
    verbose: bool,
}

fn attempt<T, E: Display>(r: Result<T, E>) -> T {
    match r {
        Ok(n) => n,
        Err(err) => {
            eeprintln!("\nERROR: {err}");
            exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    set_terminal(cli.verbose);
    let root = InstallRoot::new(setup_dir());

    if !cli.existing {
        attempt(root.cleanup().await);
    }

    let options = InstallOptions {
        modpack: cli.modpack.clone(),
        ..Default::default()
    };
    let env = InstallEnv::new(&root);

    println!("Installing into {:?}", root.path());
    let result = attempt(install(&root, &env, &options).await);
    println!("{result}");

    let mut fails = Vec::new();
    for check in layout::verify(&root) {
        report(&check.name, &check.result);
        if check.result.is_err() {
            fails.push(check.name);
        }
    }

    let session = Session {
        username: "TestPlayer".to_owned(),
        access: "test".to_owned(),
    };
    let launch = LaunchOptions::new(
        RuntimeHandle::System,
        result.version_id.clone(),
        GAME_VERSION.to_owned(),
    );
    let prepared = prepare_launch(&root, &session, &launch)
        .await
        .map(|_| ())
        .map_err(|err| err.to_string());
    report("launch request", &prepared);
    if prepared.is_err() {
        fails.push("launch request".to_owned());
    }

    if cli.twice {
        let jar = root.version_jar(GAME_VERSION);
        let before = modified(&jar);
        println!("\nInstalling again");
        attempt(install(&root, &env, &options).await);
        let unchanged = if before.is_some() && before == modified(&jar) {
            Ok(())
        } else {
            Err("client jar was downloaded again".to_owned())
        };
        report("second install skips binaries", &unchanged);
        if unchanged.is_err() {
            fails.push("second install".to_owned());
        }
    }

    if !fails.is_empty() {
        println!("\nTEST FAILURES:");
        for name in fails {
            println!("{name}");
        }
        exit(1);
    }
    println!("\n{}", "All checks passed".green().bold());
}

async fn install(
    root: &InstallRoot,
    env: &InstallEnv,
    options: &InstallOptions,
) -> Result<sl_instances::InstallResult, sl_instances::InstallError> {
    let (sender, receiver) = std::sync::mpsc::channel::<ProgressEvent>();
    let printer = std::thread::spawn(move || {
        while let Ok(event) = receiver.recv() {
            println!("  [{}] {}", event.phase, event.message.bright_black());
        }
    });
    let result = sl_instances::install_client(root, env, options, &ProgressSender::new(sender)).await;
    _ = printer.join();
    result
}

fn report(name: &str, result: &Result<(), String>) {
    match result {
        Ok(()) => println!("{} {name}", "PASS".green().bold()),
        Err(err) => println!("{} {name}: {err}", "FAIL".red().bold()),
    }
}

fn modified(path: &std::path::Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|n| n.modified()).ok()
}

fn setup_dir() -> PathBuf {
    let new_dir = PathBuf::from(file!())
        .parent()
        .and_then(|n| n.parent())
        .map_or_else(|| PathBuf::from("."), |n| n.join("ShampuneumTest"));
    let logs_dir = new_dir.join("logs");
    _ = std::fs::remove_dir_all(&logs_dir);
    unsafe {
        std::env::set_var(sl_core::file_utils::LAUNCHER_DIR_ENV, &new_dir);
    }
    attempt(sl_core::file_utils::get_launcher_dir())
}

fn set_terminal(terminal: bool) {
    sl_core::print::set_config(LogConfig {
        terminal,
        file: false,
    });
}
