use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Background;

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Cancel;

/// Returned by [`Ctx::sleep`] when the context is cancelled before the
/// pause elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "context cancelled")
    }
}

impl std::error::Error for Interrupted {}

#[derive(Debug)]
enum Kind {
    Background,
    Cancel { done: AtomicBool },
}

/// Cancellation context handed to every thread.
///
/// `Ctx<Background>` can only observe cancellation, `Ctx<Cancel>` can also
/// trigger it. Cancelling a context cancels every context derived from it
/// with [`Ctx::with_cancel`], and dropping the last handle of a context
/// cancels its children.
#[derive(Debug, Clone)]
pub struct Ctx<K> {
    inner: Arc<InnerCtx>,
    _phantom: PhantomData<K>,
}

#[derive(Debug)]
struct InnerCtx {
    kind: Kind,
    children: Arc<Mutex<Vec<Weak<InnerCtx>>>>,
    // `done` is flipped while holding this lock so sleepers can't miss the wakeup.
    wakeup_lock: Mutex<()>,
    wakeup: Condvar,
}

impl Drop for InnerCtx {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InnerCtx {
    fn new(kind: Kind) -> Self {
        Self {
            kind,
            children: Arc::new(Mutex::new(Vec::new())),
            wakeup_lock: Mutex::new(()),
            wakeup: Condvar::new(),
        }
    }

    fn cancel(&self) {
        if let Kind::Cancel { done } = &self.kind {
            let _guard = lock(&self.wakeup_lock);
            done.store(true, Ordering::Release);
            self.wakeup.notify_all();
        }
        let mut children = lock(&self.children);
        children.retain(|weak| weak.strong_count() > 0);
        children.iter().for_each(|weak| {
            if let Some(inner) = weak.upgrade() {
                if !inner.is_done() {
                    inner.cancel();
                }
            }
        });
    }

    fn is_done(&self) -> bool {
        if let Kind::Cancel { done } = &self.kind {
            return done.load(Ordering::Acquire);
        }
        false
    }
}

pub fn background() -> Ctx<Background> {
    Ctx {
        inner: Arc::new(InnerCtx::new(Kind::Background)),
        _phantom: PhantomData::<Background>,
    }
}

impl<K> Ctx<K> {
    pub fn with_cancel(&self) -> Ctx<Cancel> {
        let inner = Arc::new(InnerCtx::new(Kind::Cancel {
            done: AtomicBool::new(false),
        }));
        lock(&self.inner.children).push(Arc::downgrade(&inner));

        // The parent may have been cancelled before the child was registered.
        if self.inner.is_done() {
            inner.cancel();
        }

        Ctx {
            inner,
            _phantom: PhantomData::<Cancel>,
        }
    }

    pub fn to_background(&self) -> Ctx<Background> {
        Ctx {
            inner: Arc::clone(&self.inner),
            _phantom: PhantomData::<Background>,
        }
    }

    pub fn is_done(&self) -> bool {
        self.inner.is_done()
    }

    /// Blocks the current thread for `duration`, waking up early if the
    /// context gets cancelled.
    ///
    /// Returns `Err(Interrupted)` when the context is (or becomes) cancelled
    /// before the duration elapses.
    pub fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        let guard = lock(&self.inner.wakeup_lock);
        let (_guard, _timeout) = self
            .inner
            .wakeup
            .wait_timeout_while(guard, duration, |_| !self.inner.is_done())
            .unwrap_or_else(PoisonError::into_inner);

        if self.inner.is_done() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }
}

impl Ctx<Cancel> {
    pub fn cancel(&self) {
        self.inner.cancel();
    }
}
