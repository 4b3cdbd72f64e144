// ABOUTME: Preparation step that activates gallery thumbnails one by one so lazy images load before the DOM scan.
// ABOUTME: Sequential, with a settle delay after each activation and a cooperative cancellation flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ExtractError;

/// Thumbnails whose activation swaps a hi-res image into the gallery.
pub const ACTIVATION_SELECTORS: &[&str] = &[
    "#altImages li.item",
    "#altImages li.imageThumbnail",
    "#altImages .a-button-thumbnail",
];

/// The live page, as seen by the preparation step.
///
/// Implemented by whatever owns the rendered document (a browser driver, a test double).
/// Targets must be returned in document order.
#[async_trait]
pub trait ThumbnailActivator: Send {
    type Target: Send + Sync;

    async fn targets(&mut self, selectors: &[&str]) -> Result<Vec<Self::Target>, ExtractError>;

    async fn activate(&mut self, target: &Self::Target) -> Result<(), ExtractError>;
}

/// Shared cancellation signal, checked before each activation.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one preparation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareReport {
    pub activated: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Activates every target in order, waiting `settle` after each one.
///
/// Activation failures are logged and counted; the loop moves on. Cancellation stops
/// the loop before the next activation and is reported, not raised.
pub async fn prepare<A>(activator: &mut A, settle: Duration, cancel: &CancelFlag) -> PrepareReport
where
    A: ThumbnailActivator + ?Sized,
{
    let mut report = PrepareReport::default();

    let targets = match activator.targets(ACTIVATION_SELECTORS).await {
        Ok(targets) => targets,
        Err(err) => {
            warn!(error = %err, "could not list thumbnails to activate");
            return report;
        }
    };
    debug!(count = targets.len(), "activating thumbnails");

    for (index, target) in targets.iter().enumerate() {
        if cancel.is_cancelled() {
            debug!(index, "preparation cancelled");
            report.cancelled = true;
            break;
        }

        match activator.activate(target).await {
            Ok(()) => report.activated += 1,
            Err(err) => {
                warn!(index, error = %err, "thumbnail activation failed");
                report.failed += 1;
            }
        }

        tokio::time::sleep(settle).await;
    }

    report
}
