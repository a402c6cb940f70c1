use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_ANONYMOUS: AtomicU64 = AtomicU64::new(0);

/// Identity under which a derived store is memoized.
///
/// Two selectors with equal keys derive the same store from a given source;
/// the function body plays no part in the comparison.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SelectorKey {
    /// Caller-supplied name.
    Named(Cow<'static, str>),
    /// Unique identity minted by [`Selector::anonymous`].
    Anonymous(u64),
}

impl SelectorKey {
    fn fresh() -> Self {
        SelectorKey::Anonymous(NEXT_ANONYMOUS.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SelectorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorKey::Named(name) => f.write_str(name),
            SelectorKey::Anonymous(id) => write!(f, "#{}", id),
        }
    }
}

impl From<&'static str> for SelectorKey {
    fn from(name: &'static str) -> Self {
        SelectorKey::Named(Cow::Borrowed(name))
    }
}

impl From<String> for SelectorKey {
    fn from(name: String) -> Self {
        SelectorKey::Named(Cow::Owned(name))
    }
}

/// A pure projection from a store's value, tagged with a memoization key.
///
/// Cloning a selector keeps its key, so every clone derives the same store.
/// Selectors built separately with [`Selector::anonymous`] never share a key,
/// even when their bodies are identical.
///
/// # Examples
///
/// ```
/// use statemesh::{Selector, Store};
///
/// let store = Store::new(3);
/// let doubled = Selector::new("doubled", |n: &i32| n * 2);
///
/// let a = store.derive(&doubled);
/// let b = store.derive(&doubled.clone());
/// assert!(a.ptr_eq(&b));
/// assert_eq!(a.get(), 6);
/// ```
pub struct Selector<T, R> {
    key: SelectorKey,
    project: Arc<dyn Fn(&T) -> R + Send + Sync>,
}

impl<T, R> Selector<T, R> {
    /// Create a selector memoized under an explicit key.
    pub fn new<K, F>(key: K, project: F) -> Self
    where
        K: Into<SelectorKey>,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            project: Arc::new(project),
        }
    }

    /// Create a selector with a freshly minted identity.
    pub fn anonymous<F>(project: F) -> Self
    where
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        Self {
            key: SelectorKey::fresh(),
            project: Arc::new(project),
        }
    }

    /// Identity under which derived stores are memoized.
    pub fn key(&self) -> &SelectorKey {
        &self.key
    }

    /// Apply the projection.
    pub fn apply(&self, value: &T) -> R {
        (self.project)(value)
    }
}

impl<T, R> Clone for Selector<T, R> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            project: Arc::clone(&self.project),
        }
    }
}

impl<T, R> fmt::Debug for Selector<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector").field("key", &self.key).finish()
    }
}
