use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

use crate::config::RandomizerConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::ClassMapStore;

/// 防抖落盘 —— 后台线程在存储“脏”且静默期已过时落盘，
/// 把连续的大量 `get_or_create` 合并成一次写入。
///
/// `shutdown()`（或 Drop）总会在退出前做最后一次落盘。
pub struct DebouncedFlusher {
    store: Arc<ClassMapStore>,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

struct Shared {
    stopping: Mutex<bool>,
    wake: Condvar,
    last_error: Mutex<Option<StoreError>>,
}

impl DebouncedFlusher {
    pub fn spawn(store: Arc<ClassMapStore>, quiet: Duration) -> Self {
        let shared = Arc::new(Shared {
            stopping: Mutex::new(false),
            wake: Condvar::new(),
            last_error: Mutex::new(None),
        });

        let handle = {
            let store = store.clone();
            let shared = shared.clone();
            std::thread::spawn(move || run(&store, &shared, quiet))
        };

        Self {
            store,
            shared,
            handle: Some(handle),
        }
    }

    /// 按配置的 `flushDebounceMs` 启动；未配置时返回 None，
    /// 此时应在每次转换后立即落盘。
    pub fn from_config(store: Arc<ClassMapStore>, config: &RandomizerConfig) -> Option<Self> {
        let quiet = config.flush_debounce()?;
        debug!(quiet_ms = quiet.as_millis() as u64, "starting debounced class map flusher");
        Some(Self::spawn(store, quiet))
    }

    /// 取走后台落盘最近一次的失败
    pub fn take_error(&self) -> Option<StoreError> {
        self.shared.last_error.lock().take()
    }

    /// 停止后台线程并做最后一次落盘。
    ///
    /// 最后一次落盘成功时，之前后台落盘的失败已被覆盖，不再返回。
    pub fn shutdown(mut self) -> StoreResult<()> {
        self.stop()
    }

    fn stop(&mut self) -> StoreResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        *self.shared.stopping.lock() = true;
        self.shared.wake.notify_all();
        join_flusher(handle);

        if self.store.is_dirty() {
            self.store.flush()?;
        }
        self.take_error();
        Ok(())
    }
}

impl Drop for DebouncedFlusher {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            error!(error = %err, "final class map flush failed");
        }
    }
}

/// 等待后台线程退出，线程 panic 时记录下来而不是向上传播
fn join_flusher(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        error!("class map flusher thread panicked");
    }
}

fn run(store: &ClassMapStore, shared: &Shared, quiet: Duration) {
    let mut stopping = shared.stopping.lock();
    while !*stopping {
        let timeout = match store.last_mutation() {
            Some(at) if store.is_dirty() => quiet.saturating_sub(at.elapsed()),
            _ => quiet,
        };
        shared.wake.wait_for(&mut stopping, timeout.max(Duration::from_millis(1)));
        if *stopping {
            break;
        }

        let due = store.is_dirty()
            && store
                .last_mutation()
                .is_some_and(|at| Instant::now().duration_since(at) >= quiet);
        if due {
            // 落盘期间不持有 stopping 锁
            parking_lot::MutexGuard::unlocked(&mut stopping, || {
                debug!("debounced class map flush");
                if let Err(err) = store.flush() {
                    error!(error = %err, "debounced class map flush failed");
                    *shared.last_error.lock() = Some(err);
                }
            });
        }
    }
}
