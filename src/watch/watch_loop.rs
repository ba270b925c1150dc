//! Continuous folder monitoring.
//!
//! [`WatchLoop::run`] subscribes to filesystem events for the input folder,
//! converts every settled `created`/`modified` Office file, and ticks once
//! per `tick_interval` to evict expired cooldown entries. It returns when the
//! caller's [`CancellationToken`] fires or [`WatchLoop::shutdown`] is called;
//! conversions already running are awaited, not aborted.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example(pipeline: std::sync::Arc<office2md::ConversionPipeline>) -> Result<(), office2md::Office2MdError> {
//! use office2md::{WatchConfig, WatchLoop};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = WatchConfig::builder("./inbox", "./markdown").build()?;
//! let watch = WatchLoop::new(config, pipeline);
//! let cancel = CancellationToken::new();
//! watch.run(cancel).await?;
//! # Ok(())
//! # }
//! ```

use super::{classify, is_watched_path, ChangeDebouncer, WatchedChange};
use crate::batch::panic_message;
use crate::config::WatchConfig;
use crate::error::Office2MdError;
use crate::pipeline::ConversionPipeline;
use crate::report::ReporterHandle;
use chrono::{DateTime, Local};
use futures::FutureExt;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Snapshot returned by [`WatchLoop::statistics`].
#[derive(Debug, Clone, Serialize)]
pub struct WatchStatistics {
    pub watching: bool,
    pub pending_count: usize,
    pub last_event_at: Option<DateTime<Local>>,
}

/// Everything that exists only while watching.
struct ActiveWatch {
    watcher: RecommendedWatcher,
    debouncer: ChangeDebouncer,
    listener: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

/// Watches a folder and converts Office files as they settle.
pub struct WatchLoop {
    config: WatchConfig,
    pipeline: Arc<ConversionPipeline>,
    reporter: ReporterHandle,
    active: Mutex<Option<ActiveWatch>>,
    shutdown_requested: AtomicBool,
    cancel: CancellationToken,
    conversions: TaskTracker,
}

impl WatchLoop {
    /// Uses the pipeline's reporter for change events.
    pub fn new(config: WatchConfig, pipeline: Arc<ConversionPipeline>) -> Self {
        let reporter = Arc::clone(pipeline.reporter());
        Self {
            config,
            pipeline,
            reporter,
            active: Mutex::new(None),
            shutdown_requested: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            conversions: TaskTracker::new(),
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveWatch>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to filesystem events and queue existing files.
    ///
    /// Creates the input and output folders when missing. Calling `start`
    /// while already watching does nothing. Must run inside a tokio runtime.
    pub fn start(&self) -> Result<(), Office2MdError> {
        let mut active = self.lock();
        if active.is_some() {
            debug!("Watch already started");
            return Ok(());
        }

        for dir in [&self.config.input_dir, &self.config.output_dir] {
            std::fs::create_dir_all(dir).map_err(|e| Office2MdError::CreateDirFailed {
                path: dir.clone(),
                source: e,
            })?;
        }

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let _ = raw_tx.send(res);
        })
        .map_err(|e| self.watch_failed(e))?;

        let mode = if self.config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(&self.config.input_dir, mode)
            .map_err(|e| self.watch_failed(e))?;

        let (debouncer, changes) = ChangeDebouncer::new(self.config.debounce, self.config.cooldown);
        let listener = tokio::spawn(listen(raw_rx, debouncer.clone()));
        let dispatcher = tokio::spawn(dispatch(
            changes,
            Arc::clone(&self.pipeline),
            self.config.output_dir.clone(),
            Arc::clone(&self.reporter),
            self.conversions.clone(),
            self.cancel.clone(),
        ));

        info!(
            input_dir = %self.config.input_dir.display(),
            output_dir = %self.config.output_dir.display(),
            recursive = self.config.recursive,
            debounce_ms = self.config.debounce.as_millis() as u64,
            cooldown_ms = self.config.cooldown.as_millis() as u64,
            "Watching for Office files"
        );

        let existing = debouncer.scan_existing_files(&self.config.input_dir, self.config.recursive);
        if existing > 0 {
            info!(files = existing, "Queued existing files");
        }

        *active = Some(ActiveWatch {
            watcher,
            debouncer,
            listener,
            dispatcher,
        });
        Ok(())
    }

    fn watch_failed(&self, e: notify::Error) -> Office2MdError {
        Office2MdError::WatchFailed {
            path: self.config.input_dir.clone(),
            detail: e.to_string(),
        }
    }

    /// Unsubscribe and discard debounce state. Conversions already handed
    /// to the pipeline keep running. Does nothing when not watching.
    pub fn stop(&self) {
        let Some(mut active) = self.lock().take() else {
            return;
        };
        if let Err(e) = active.watcher.unwatch(&self.config.input_dir) {
            debug!(error = %e, "Unwatch failed");
        }
        active.debouncer.clear();
        active.listener.abort();
        active.dispatcher.abort();
        info!(input_dir = %self.config.input_dir.display(), "Stopped watching");
    }

    pub fn is_watching(&self) -> bool {
        self.lock().is_some()
    }

    pub fn statistics(&self) -> WatchStatistics {
        match self.lock().as_ref() {
            Some(active) => WatchStatistics {
                watching: true,
                pending_count: active.debouncer.pending_count(),
                last_event_at: active.debouncer.last_event_at(),
            },
            None => WatchStatistics {
                watching: false,
                pending_count: 0,
                last_event_at: None,
            },
        }
    }

    /// Request shutdown: stop watching and make [`run`](Self::run) return.
    ///
    /// Returns `true` for the call that performed the shutdown and `false`
    /// for every later call.
    pub fn shutdown(&self) -> bool {
        if self.shutdown_requested.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already requested");
            return false;
        }
        info!("Shutting down watch loop");
        self.cancel.cancel();
        self.stop();
        true
    }

    /// Shut down on Ctrl-C, and on SIGTERM where available, then cancel
    /// `cancel`. Repeated signals go through the same guarded
    /// [`shutdown`](Self::shutdown).
    ///
    /// SIGTERM is subscribed before this returns. The handler task ends
    /// once the watch loop is dropped.
    pub fn stop_on_signals(self: &Arc<Self>, cancel: CancellationToken) -> std::io::Result<JoinHandle<()>> {
        #[cfg(unix)]
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        let watch: Weak<Self> = Arc::downgrade(self);

        Ok(tokio::spawn(async move {
            loop {
                #[cfg(unix)]
                let received = tokio::select! {
                    r = tokio::signal::ctrl_c() => r.ok().map(|()| "SIGINT"),
                    r = terminate.recv() => r.map(|()| "SIGTERM"),
                };
                #[cfg(not(unix))]
                let received = tokio::signal::ctrl_c().await.ok().map(|()| "Ctrl-C");

                let Some(signal) = received else {
                    warn!("Signal listener closed");
                    break;
                };
                let Some(watch) = watch.upgrade() else {
                    break;
                };
                if watch.shutdown() {
                    info!(signal, "Termination signal received, waiting for running conversions");
                } else {
                    debug!(signal, "Termination signal received again");
                }
                cancel.cancel();
            }
        }))
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Start watching and tick until `cancel` fires or [`shutdown`](Self::shutdown)
    /// is called, then wait for running conversions to finish.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), Office2MdError> {
        if self.is_shutdown() {
            return Ok(());
        }
        self.start()?;

        let mut tick = tokio::time::interval(self.config.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Cancellation requested");
                    break;
                }
                _ = self.cancel.cancelled() => break,
                _ = tick.tick() => {
                    if self.is_shutdown() {
                        break;
                    }
                    let debouncer = self.lock().as_ref().map(|a| a.debouncer.clone());
                    if let Some(d) = debouncer {
                        let evicted = d.cleanup_expired();
                        if evicted > 0 {
                            debug!(evicted, "Expired cooldown entries removed");
                        }
                    }
                }
            }
        }

        self.shutdown();
        self.conversions.close();
        if !self.conversions.is_empty() {
            info!(running = self.conversions.len(), "Waiting for running conversions");
        }
        self.conversions.wait().await;
        info!("Watch loop finished");
        Ok(())
    }
}

impl Drop for WatchLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Forward raw notify events to the debouncer.
async fn listen(
    mut raw: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
    debouncer: ChangeDebouncer,
) {
    while let Some(result) = raw.recv().await {
        match result {
            Ok(event) => {
                for (path, kind) in classify(&event) {
                    if is_watched_path(&path) {
                        debouncer.ingest(path, kind);
                    }
                }
            }
            Err(e) => warn!(error = %e, "Filesystem watcher error"),
        }
    }
}

/// Hand settled changes to the pipeline, one tracked task per change.
async fn dispatch(
    mut changes: mpsc::UnboundedReceiver<WatchedChange>,
    pipeline: Arc<ConversionPipeline>,
    output_dir: PathBuf,
    reporter: ReporterHandle,
    conversions: TaskTracker,
    cancel: CancellationToken,
) {
    while let Some(change) = changes.recv().await {
        reporter.on_change_detected(&change);
        if !change.kind.triggers_conversion() {
            debug!(path = %change.path.display(), kind = %change.kind, "Change observed, not converted");
            continue;
        }
        if cancel.is_cancelled() {
            break;
        }

        if !tokio::fs::try_exists(&change.path).await.unwrap_or(false) {
            debug!(path = %change.path.display(), kind = %change.kind, "File gone before conversion, skipped");
            continue;
        }

        info!(path = %change.path.display(), kind = %change.kind, "Converting changed file");
        let pipeline = Arc::clone(&pipeline);
        let output_dir = output_dir.clone();
        conversions.spawn(async move {
            let outcome = AssertUnwindSafe(pipeline.convert(&change.path, &output_dir))
                .catch_unwind()
                .await;
            if let Err(payload) = outcome {
                error!(
                    path = %change.path.display(),
                    detail = %panic_message(payload.as_ref()),
                    "Conversion panicked"
                );
            }
        });
    }
}
