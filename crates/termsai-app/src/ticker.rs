use std::time::Duration;

use tokio::task::JoinHandle;

use termsai_core::text::is_loading_message;

/// Trailing-dots animation for long-running progress messages.
///
/// The ticker never touches the view itself; it hands each frame to a writer
/// that returns `false` once the owning session may no longer write. Each
/// frame carries the generation it was spawned under; `stop` bumps the
/// generation, so a writer holding the same lock as the caller of `stop` can
/// drop frames from a superseded animation.
#[derive(Debug, Default)]
pub struct LoadingTicker {
    current: Option<String>,
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl LoadingTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// React to a new progress message.
    ///
    /// Returns `true` when the caller should display `message` now. A repeat
    /// of the message already being animated returns `false` and leaves the
    /// animation alone.
    pub fn update<F>(&mut self, message: &str, tick: Duration, write: F) -> bool
    where
        F: Fn(&str, u64) -> bool + Send + 'static,
    {
        if !is_loading_message(message) {
            self.stop();
            return true;
        }
        if self.current.as_deref() == Some(message) && self.is_running() {
            return false;
        }

        self.stop();
        self.current = Some(message.to_string());
        let base = message.to_string();
        let generation = self.generation;
        self.handle = Some(tokio::spawn(async move {
            let mut dots = 0;
            loop {
                tokio::time::sleep(tick).await;
                dots = (dots + 1) % 4;
                if !write(&format!("{base}{}", ".".repeat(dots)), generation) {
                    break;
                }
            }
        }));
        true
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.current = None;
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }
}

impl Drop for LoadingTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
