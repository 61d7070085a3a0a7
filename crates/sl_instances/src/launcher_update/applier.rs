use std::{
    future::Future,
    path::{Path, PathBuf},
    process::Stdio,
};

use sl_core::{file_utils, info, no_window, pt, IntoIoError, IoError};

use super::UpdateError;

const LOG_FILE_NAME: &str = "shampuneum-update.log";
const STAGING_DIR_NAME: &str = "shampuneum-update-staging";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A helper script took over. The launcher
    /// should exit now so its exe can be replaced.
    RestartPending,
    /// Files replaced in place, nothing else to do.
    Overlaid,
}

/// Puts a downloaded update into effect.
pub trait SelfUpdateApplier {
    fn apply(
        &self,
        downloaded: &Path,
    ) -> impl Future<Output = Result<ApplyOutcome, UpdateError>> + Send;
}

/// Replaces a single executable that is currently running.
///
/// A running exe can't overwrite itself (on Windows it can't
/// even be deleted), so a detached script does it after
/// the launcher exits:
///
/// 1. wait, then kill leftover launcher processes by name
/// 2. copy the new file next to the old one under a temp name
/// 3. delete the old exe, rename the new one into place
/// 4. start it, delete the download and the script itself
///
/// Every step is appended to [`ScriptApplier::log_file`].
#[derive(Debug, Clone)]
pub struct ScriptApplier {
    pub target_exe: PathBuf,
    /// Process name to kill, like `Shampuneum.exe`.
    pub process_name: String,
    /// Where the script and its log go.
    pub work_dir: PathBuf,
}

impl ScriptApplier {
    /// # Errors
    /// If the running executable can't be located.
    pub fn for_current_exe() -> Result<Self, UpdateError> {
        let target_exe = std::env::current_exe().map_err(|err| IoError::Io {
            error: err.to_string(),
            path: PathBuf::from("<current exe>"),
        })?;
        let process_name = target_exe
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            target_exe,
            process_name,
            work_dir: std::env::temp_dir(),
        })
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.work_dir.join(LOG_FILE_NAME)
    }

    #[must_use]
    pub fn script_path(&self) -> PathBuf {
        self.work_dir.join(if cfg!(target_os = "windows") {
            "shampuneum-update.bat"
        } else {
            "shampuneum-update.sh"
        })
    }

    #[must_use]
    pub fn render_script(&self, new_file: &Path) -> String {
        if cfg!(target_os = "windows") {
            self.render_batch(new_file)
        } else {
            self.render_shell(new_file)
        }
    }

    #[must_use]
    pub fn render_batch(&self, new_file: &Path) -> String {
        let q = |p: &Path| format!("\"{}\"", p.display());
        let old = q(&self.target_exe);
        let staged = q(&staged_path(&self.target_exe));
        let new = q(new_file);
        let log = q(&self.log_file());
        let name = &self.process_name;

        format!(
            r#"@echo off
echo [%date% %time%] Updating {name} >> {log}
timeout /t 2 /nobreak > nul
taskkill /f /im "{name}" >> {log} 2>&1
timeout /t 1 /nobreak > nul
copy /y {new} {staged} >> {log} 2>&1
if errorlevel 1 (
    echo [%date% %time%] Copy failed >> {log}
    exit /b 1
)
del /f /q {old} >> {log} 2>&1
move /y {staged} {old} >> {log} 2>&1
echo [%date% %time%] Starting new version >> {log}
start "" {old}
del /f /q {new} >> {log} 2>&1
(goto) 2>nul & del "%~f0"
"#
        )
    }

    #[must_use]
    pub fn render_shell(&self, new_file: &Path) -> String {
        let old = sh_quote(&self.target_exe);
        let staged = sh_quote(&staged_path(&self.target_exe));
        let new = sh_quote(new_file);
        let log = sh_quote(&self.log_file());
        let name = sh_quote(Path::new(comm_name(&self.process_name)));

        format!(
            r#"#!/bin/sh
echo "[$(date)] Updating launcher" >> {log}
sleep 2
pkill -x {name} >> {log} 2>&1
sleep 1
if ! cp {new} {staged} >> {log} 2>&1; then
    echo "[$(date)] Copy failed" >> {log}
    exit 1
fi
rm -f {old} >> {log} 2>&1
mv {staged} {old} >> {log} 2>&1
chmod +x {old}
echo "[$(date)] Starting new version" >> {log}
nohup {old} > /dev/null 2>&1 &
rm -f {new}
rm -f "$0"
"#
        )
    }
}

fn staged_path(exe: &Path) -> PathBuf {
    let mut name = exe.file_name().unwrap_or_default().to_os_string();
    name.push(".new");
    exe.with_file_name(name)
}

/// Linux keeps only the first 15 bytes of a process name
/// (`/proc/<pid>/comm`), and `pkill -x` matches against that.
fn comm_name(name: &str) -> &str {
    const TASK_COMM_LEN: usize = 15;
    if !cfg!(target_os = "linux") || name.len() <= TASK_COMM_LEN {
        return name;
    }
    let mut end = TASK_COMM_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

fn sh_quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

impl SelfUpdateApplier for ScriptApplier {
    async fn apply(&self, downloaded: &Path) -> Result<ApplyOutcome, UpdateError> {
        let script = self.script_path();
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .dir(&self.work_dir)?;
        tokio::fs::write(&script, self.render_script(downloaded))
            .await
            .path(&script)?;
        #[cfg(target_family = "unix")]
        file_utils::set_executable(&script).await?;

        info!("Handing over to update script {script:?}");
        pt!("Log: {:?}", self.log_file());

        let mut command = if cfg!(target_os = "windows") {
            let mut command = std::process::Command::new("cmd");
            command.arg("/C").arg(&script);
            command
        } else {
            let mut command = std::process::Command::new("sh");
            command.arg(&script);
            command
        };
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        no_window!(command);
        command
            .spawn()
            .map_err(|err| UpdateError::Spawn(err, script.clone()))?;

        Ok(ApplyOutcome::RestartPending)
    }
}

/// Unpacks a ZIP build over the launcher's directory.
///
/// Extracts into a staging dir first, so a broken
/// archive leaves the installed files untouched.
#[derive(Debug, Clone)]
pub struct ArchiveOverlay {
    pub app_dir: PathBuf,
    pub staging_dir: PathBuf,
}

impl ArchiveOverlay {
    #[must_use]
    pub fn new(app_dir: PathBuf) -> Self {
        Self {
            app_dir,
            staging_dir: std::env::temp_dir().join(STAGING_DIR_NAME),
        }
    }
}

impl SelfUpdateApplier for ArchiveOverlay {
    async fn apply(&self, downloaded: &Path) -> Result<ApplyOutcome, UpdateError> {
        file_utils::recreate_dir(&self.staging_dir).await?;

        pt!("Extracting update to {:?}", self.staging_dir);
        if let Err(err) = file_utils::extract_zip_file(downloaded, &self.staging_dir).await {
            _ = tokio::fs::remove_dir_all(&self.staging_dir).await;
            return Err(err.into());
        }

        info!("Copying update into {:?}", self.app_dir);
        file_utils::copy_dir_recursive(&self.staging_dir, &self.app_dir).await?;

        tokio::fs::remove_dir_all(&self.staging_dir)
            .await
            .dir(&self.staging_dir)?;
        file_utils::remove_if_exists(downloaded).await;
        Ok(ApplyOutcome::Overlaid)
    }
}

/// Picks how to apply a download: `.zip` builds are
/// overlaid, anything else replaces the running exe.
#[derive(Debug, Clone)]
pub enum UpdateInstaller {
    Script(ScriptApplier),
    Overlay(ArchiveOverlay),
}

impl UpdateInstaller {
    /// # Errors
    /// If the running executable can't be located.
    pub fn for_download(downloaded: &Path) -> Result<Self, UpdateError> {
        let is_zip = downloaded
            .extension()
            .is_some_and(|n| n.eq_ignore_ascii_case("zip"));
        let script = ScriptApplier::for_current_exe()?;
        if is_zip {
            let app_dir = script
                .target_exe
                .parent()
                .map_or_else(|| PathBuf::from("."), Path::to_owned);
            Ok(Self::Overlay(ArchiveOverlay::new(app_dir)))
        } else {
            Ok(Self::Script(script))
        }
    }
}

impl SelfUpdateApplier for UpdateInstaller {
    async fn apply(&self, downloaded: &Path) -> Result<ApplyOutcome, UpdateError> {
        match self {
            UpdateInstaller::Script(n) => n.apply(downloaded).await,
            UpdateInstaller::Overlay(n) => n.apply(downloaded).await,
        }
    }
}
