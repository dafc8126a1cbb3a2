//! Host context handle.
//!
//! An opaque, cheaply cloneable handle the host passes to every harness. The
//! harness never looks inside; it only forwards the handle to the service's
//! startup hooks so they can resolve whatever shared resources they need.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

type Extension = Arc<dyn Any + Send + Sync>;

/// Shared resource handle supplied by the hosting runtime.
#[derive(Clone)]
pub struct HostContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    host_name: String,
    extensions: RwLock<HashMap<TypeId, Extension>>,
}

impl HostContext {
    /// Creates an empty context for the named host.
    #[must_use]
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                host_name: host_name.into(),
                extensions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Returns the host name.
    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.inner.host_name
    }

    /// Stores a shared value, replacing any previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&self, value: T) {
        self.inner
            .extensions
            .write()
            .insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Looks up a shared value by type.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let extension = self.inner.extensions.read().get(&TypeId::of::<T>()).cloned()?;
        extension.downcast::<T>().ok()
    }

    /// Returns true if a value of type `T` is stored.
    #[must_use]
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.inner.extensions.read().contains_key(&TypeId::of::<T>())
    }
}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContext")
            .field("host_name", &self.inner.host_name)
            .field("extensions", &self.inner.extensions.read().len())
            .finish()
    }
}
