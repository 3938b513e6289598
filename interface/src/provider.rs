/*
 * Copyright 2020 Nikhil Marathe <nsm.nikhil@gmail.com>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Deferred values.
//!
//! Anything that may depend on user configuration that has not run yet is handed around as a
//! [`Provider`]. Nothing here caches: every `get` recomputes, so a provider obtained during
//! configuration sees the final value when it is finally resolved at execution time.

use std::{
    collections::HashSet,
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("no value has been set for {0}")]
    Missing(String),
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

type Compute<T> = dyn Fn() -> Result<T, ProviderError> + Send + Sync;

pub struct Provider<T> {
    compute: Arc<Compute<T>>,
}

impl<T> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Provider {
            compute: self.compute.clone(),
        }
    }
}

impl<T> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Provider{{..}}")
    }
}

impl<T: Send + Sync + 'static> Provider<T> {
    pub fn of(value: T) -> Provider<T>
    where
        T: Clone,
    {
        Provider {
            compute: Arc::new(move || Ok(value.clone())),
        }
    }

    pub fn from_fn<F>(f: F) -> Provider<T>
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Provider {
            compute: Arc::new(move || f().map_err(ProviderError::Failed)),
        }
    }

    pub fn get(&self) -> Result<T, ProviderError> {
        (self.compute)()
    }

    pub fn map<U, F>(&self, f: F) -> Provider<U>
    where
        U: Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let inner = self.compute.clone();
        Provider {
            compute: Arc::new(move || inner().map(&f)),
        }
    }
}

/// A value the user may assign at any point during configuration.
pub struct Property<T> {
    name: String,
    value: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Property {
            name: self.name.clone(),
            value: self.value.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("value", &*value)
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Property<T> {
    pub fn new<S: Into<String>>(name: S) -> Property<T> {
        Property {
            name: name.into(),
            value: Arc::new(Mutex::new(None)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set(&self, value: T) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    pub fn is_present(&self) -> bool {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn get(&self) -> Option<T> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn provider(&self) -> Provider<T> {
        let property = self.clone();
        Provider {
            compute: Arc::new(move || {
                property
                    .get()
                    .ok_or_else(|| ProviderError::Missing(property.name.clone()))
            }),
        }
    }
}

/// Ordered binary roots. The first occurrence of a path wins, later duplicates are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classpath {
    entries: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl Classpath {
    pub fn new() -> Classpath {
        Classpath::default()
    }

    /// Returns false if `path` was already present.
    pub fn push<P: Into<PathBuf>>(&mut self, path: P) -> bool {
        let path = path.into();
        if self.seen.contains(&path) {
            return false;
        }
        self.seen.insert(path.clone());
        self.entries.push(path);
        true
    }

    pub fn append<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        for path in paths {
            self.push(path);
        }
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.entries.iter()
    }

    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        self.seen.contains(path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for Classpath {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        let mut classpath = Classpath::new();
        classpath.append(iter);
        classpath
    }
}

impl IntoIterator for Classpath {
    type Item = PathBuf;
    type IntoIter = std::vec::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Classpath {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn providers_are_lazy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let provider = Provider::from_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(21)
        });
        let doubled = provider.map(|v| v * 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(doubled.get().unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn property_set_after_provider_creation() {
        let version: Property<String> = Property::new("scala.scalaVersion");
        let provider = version.provider().map(|v| format!("v{}", v));
        assert!(matches!(provider.get(), Err(ProviderError::Missing(_))));
        version.set("2.13.12".to_owned());
        assert_eq!(provider.get().unwrap(), "v2.13.12");
    }

    #[test]
    fn failures_propagate_through_map() {
        let failing: Provider<i32> = Provider::from_fn(|| anyhow::bail!("nope"));
        let doubled = failing.map(|a| a * 2);
        assert!(matches!(doubled.get(), Err(ProviderError::Failed(_))));
    }

    #[test]
    fn classpath_first_occurrence_wins() {
        let classpath: Classpath = vec!["a", "b", "a", "c", "b"].into_iter().collect();
        assert_eq!(
            classpath.entries(),
            &[
                PathBuf::from("a"),
                PathBuf::from("b"),
                PathBuf::from("c")
            ]
        );
    }
}
