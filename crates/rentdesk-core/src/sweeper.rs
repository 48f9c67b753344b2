//! Background task that drops expired cache entries on an interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::Sweep;

pub struct CacheSweeper {
    handle: Option<JoinHandle<()>>,
}

impl CacheSweeper {
    /// Spawn the sweep loop on the current tokio runtime. The first sweep
    /// runs one full `interval` after start.
    pub fn start(interval: Duration, caches: Vec<Arc<dyn Sweep>>) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed: usize = caches.iter().map(|cache| cache.sweep_expired()).sum();
                if removed > 0 {
                    debug!("Swept {} expired cache entries", removed);
                }
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn dispose(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;

    #[tokio::test]
    async fn test_sweeper_drops_expired_entries() {
        let cache = Arc::new(TtlCache::new(Duration::ZERO));
        cache.put("page", 1u32);
        assert_eq!(cache.len(), 1);

        let mut sweeper =
            CacheSweeper::start(Duration::from_millis(20), vec![cache.clone() as Arc<dyn Sweep>]);
        assert!(sweeper.is_running());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.is_empty());

        sweeper.dispose();
        assert!(!sweeper.is_running());
    }
}
