use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, RecvTimeoutError},
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use owo_colors::OwoColorize;
use sl_core::{
    file_utils, warn, InstallRoot, IoError, JsonFileError, Phase, ProgressEvent, ProgressSender,
    Severity,
};
use sl_instances::Session;

use crate::config::LauncherConfig;

/// How long a running update download may go
/// without progress before we warn about it.
pub const HANG_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a command needs, created once at startup.
pub struct AppContext {
    pub launcher_dir: PathBuf,
    pub config: LauncherConfig,
    /// Set after a successful login.
    pub session: Option<Session>,
    pub progress: ProgressSender,
    busy: Arc<AtomicBool>,
}

impl AppContext {
    pub fn load(progress: ProgressSender) -> Result<Self, AppError> {
        let launcher_dir = file_utils::get_launcher_dir()?;
        let config = LauncherConfig::load_s(&launcher_dir)?;
        Ok(Self::with_config(launcher_dir, config, progress))
    }

    pub fn with_config(launcher_dir: PathBuf, config: LauncherConfig, progress: ProgressSender) -> Self {
        Self {
            launcher_dir,
            config,
            session: None,
            progress,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The game lives right inside the launcher folder.
    pub fn root(&self) -> InstallRoot {
        InstallRoot::new(self.launcher_dir.clone())
    }

    pub async fn save_config(&self) -> Result<(), JsonFileError> {
        self.config.save(&self.launcher_dir).await
    }

    /// Marks the launcher busy until the guard is dropped.
    /// `None` if an install or launch is already in flight.
    pub fn begin(&self) -> Option<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BusyGuard(self.busy.clone()))
    }
}

pub struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("could not open the launcher folder:\n{0}")]
    Io(#[from] IoError),
    #[error("could not read the launcher config:\n{0}")]
    Config(#[from] JsonFileError),
}

/// Notices when the update download stops moving.
#[derive(Debug, Default)]
pub struct HangWatch {
    /// When the last percentage arrived, while below 100%.
    last_progress: Option<Instant>,
    warned: bool,
}

impl HangWatch {
    pub fn observe(&mut self, event: &ProgressEvent, now: Instant) {
        if event.phase != Phase::UpdateDownload {
            return;
        }
        match event.percent {
            Some(100) => self.last_progress = None,
            Some(_) => {
                self.last_progress = Some(now);
                self.warned = false;
            }
            None if event.severity == Severity::Error => self.last_progress = None,
            None => {}
        }
    }

    /// `true` once per stall.
    pub fn is_stalled(&mut self, now: Instant) -> bool {
        let stalled = self
            .last_progress
            .is_some_and(|last| now.duration_since(last) > HANG_TIMEOUT);
        if stalled && !self.warned {
            self.warned = true;
            return true;
        }
        false
    }
}

/// Prints progress events on a background thread
/// until every sender is gone.
pub fn spawn_progress_printer(receiver: Receiver<ProgressEvent>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut watch = HangWatch::default();
        loop {
            match receiver.recv_timeout(Duration::from_secs(1)) {
                Ok(event) => {
                    watch.observe(&event, Instant::now());
                    print_event(&event);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            if watch.is_stalled(Instant::now()) {
                warn!(
                    "No download progress for {}s, the download may be stuck",
                    HANG_TIMEOUT.as_secs()
                );
            }
        }
    })
}

fn print_event(event: &ProgressEvent) {
    let phase = format!("[{}]", event.phase);
    match (event.severity, event.percent) {
        (_, Some(percent)) => {
            println!("{} {percent:>3}% {}", phase.bright_black(), event.message);
        }
        // Already in the log through `info!`
        (Severity::Info, None) => {}
        (Severity::Success, None) => println!("{} {}", phase.green(), event.message),
        (Severity::Warning, None) => println!("{} {}", phase.yellow(), event.message),
        (Severity::Error, None) => println!("{} {}", phase.red().bold(), event.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn download(percent: u8) -> ProgressEvent {
        ProgressEvent {
            phase: Phase::UpdateDownload,
            percent: Some(percent),
            message: String::new(),
            severity: Severity::Info,
        }
    }

    #[test]
    fn one_install_at_a_time() {
        let ctx = AppContext::with_config(PathBuf::from("."), LauncherConfig::default(), ProgressSender::none());
        let guard = ctx.begin().unwrap();
        assert!(ctx.begin().is_none());
        drop(guard);
        assert!(ctx.begin().is_some());
    }

    #[test]
    fn warns_once_per_stall() {
        let start = Instant::now();
        let mut watch = HangWatch::default();
        assert!(!watch.is_stalled(start + Duration::from_secs(60)));

        watch.observe(&download(40), start);
        assert!(!watch.is_stalled(start + Duration::from_secs(10)));
        assert!(watch.is_stalled(start + Duration::from_secs(31)));
        assert!(!watch.is_stalled(start + Duration::from_secs(45)));

        // Progress resumes, then stalls again
        watch.observe(&download(41), start + Duration::from_secs(50));
        assert!(watch.is_stalled(start + Duration::from_secs(81)));
    }

    #[test]
    fn finished_downloads_never_stall() {
        let start = Instant::now();
        let mut watch = HangWatch::default();
        watch.observe(&download(99), start);
        watch.observe(&download(100), start);
        assert!(!watch.is_stalled(start + Duration::from_secs(120)));
    }
}
