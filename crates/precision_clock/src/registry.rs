// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cell::RefCell;
use std::io;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use tracing::error;

use crate::wait_handle::WaitHandle;

/// Creates the kernel resource behind a new [`WaitHandle`].
pub(crate) type HandleFactory = fn() -> io::Result<WaitHandle>;

thread_local! {
    /// Handles created for the current thread, at most one per registry.
    ///
    /// Tearing down the thread's storage drops every entry, which releases the handles.
    static THREAD_HANDLES: RefCell<Vec<CachedHandle>> = const { RefCell::new(Vec::new()) };
}

/// Hands out one lazily created [`WaitHandle`] per calling thread.
///
/// Handles are cached in thread-local storage, so repeated sleeps on the same thread reuse the
/// same kernel resource without taking any lock. Each registry keeps its own handles; a thread
/// that sleeps on two clocks holds two handles.
///
/// A handle is released exactly once: when its thread exits, when the thread calls
/// [`unregister`][Self::unregister], or lazily after the registry itself is gone.
#[derive(Debug)]
pub(crate) struct WaitHandleRegistry {
    shared: Arc<RegistryShared>,
    factory: HandleFactory,
}

#[derive(Debug, Default)]
struct RegistryShared {
    live: AtomicUsize,
}

impl WaitHandleRegistry {
    pub fn new() -> Self {
        Self::with_factory(WaitHandle::new)
    }

    pub fn with_factory(factory: HandleFactory) -> Self {
        Self {
            shared: Arc::default(),
            factory,
        }
    }

    /// Returns the calling thread's handle, creating it on first use.
    ///
    /// Returns `None` if the handle cannot be created. The failure is logged and the caller is
    /// expected to fall back to a direct wait.
    pub fn get_or_create_handle(&self) -> Option<Arc<WaitHandle>> {
        let result = THREAD_HANDLES.try_with(|cache| {
            let mut cache = cache.borrow_mut();

            // Entries of registries that no longer exist are dead weight.
            cache.retain(|entry| entry.owner.strong_count() > 0);

            if let Some(entry) = cache.iter().find(|entry| entry.belongs_to(&self.shared)) {
                return Some(Arc::clone(&entry.handle));
            }

            match (self.factory)() {
                Ok(handle) => {
                    let handle = Arc::new(handle);
                    cache.push(CachedHandle::new(&self.shared, Arc::clone(&handle)));
                    Some(handle)
                }
                Err(err) => {
                    error!(error = %err, "failed to create wait handle, falling back to direct wait");
                    None
                }
            }
        });

        result.unwrap_or_else(|_| {
            error!("thread-local storage is torn down, falling back to direct wait");
            None
        })
    }

    /// Releases the calling thread's handle ahead of thread exit.
    ///
    /// Returns `false` if the thread held no handle for this registry.
    pub fn unregister(&self) -> bool {
        THREAD_HANDLES
            .try_with(|cache| {
                let mut cache = cache.borrow_mut();
                let before = cache.len();
                cache.retain(|entry| !entry.belongs_to(&self.shared));
                cache.len() != before
            })
            .unwrap_or(false)
    }

    /// Number of threads currently holding a handle from this registry.
    pub fn live_handles(&self) -> usize {
        self.shared.live.load(Ordering::Acquire)
    }
}

/// The handle one thread uses with one registry.
///
/// Dropping the entry is the release callback.
struct CachedHandle {
    owner: Weak<RegistryShared>,
    handle: Arc<WaitHandle>,
}

impl CachedHandle {
    fn new(owner: &Arc<RegistryShared>, handle: Arc<WaitHandle>) -> Self {
        owner.live.fetch_add(1, Ordering::AcqRel);

        Self {
            owner: Arc::downgrade(owner),
            handle,
        }
    }

    // The weak reference keeps the allocation alive, so the address cannot be reused by a
    // newer registry.
    fn belongs_to(&self, registry: &Arc<RegistryShared>) -> bool {
        ptr::eq(self.owner.as_ptr(), Arc::as_ptr(registry))
    }
}

impl Drop for CachedHandle {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.upgrade() {
            owner.live.fetch_sub(1, Ordering::AcqRel);
        }
    }
}
