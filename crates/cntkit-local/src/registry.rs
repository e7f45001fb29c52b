use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use cntkit_core::ContextSettings;
use tracing::debug;

use crate::{LocalContext, ProcessRunner};

/// Owns the local contexts of one session, keyed by handle.
///
/// Contexts are created on first lookup and only torn down through
/// [`ContextRegistry::remove`] or [`ContextRegistry::close_all`].
pub struct ContextRegistry {
    root: PathBuf,
    settings: ContextSettings,
    runner: ProcessRunner,
    clean_up: bool,
    contexts: HashMap<String, LocalContext>,
}

impl ContextRegistry {
    pub fn new(root: impl Into<PathBuf>, settings: ContextSettings, runner: ProcessRunner) -> Self {
        Self {
            root: root.into(),
            settings,
            runner,
            clean_up: true,
            contexts: HashMap::new(),
        }
    }

    /// Clean-up flag given to every context created from now on.
    pub fn with_clean_up(mut self, clean_up: bool) -> Self {
        self.clean_up = clean_up;
        self
    }

    pub fn get_or_create(&mut self, handle: &str) -> Result<&mut LocalContext> {
        match self.contexts.entry(handle.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                debug!(handle, "creating context");
                let ctx = LocalContext::new(&self.root, handle, self.settings, self.runner.clone())?
                    .with_clean_up(self.clean_up);
                Ok(entry.insert(ctx))
            }
        }
    }

    /// Creates a context under a random handle that is neither registered
    /// nor left on disk by an earlier session, and returns the handle.
    pub fn create_fresh(&mut self) -> Result<String> {
        let handle = loop {
            let candidate = rand::random::<u64>().to_string();
            let on_disk = self.root.join(format!("_cntk_{candidate}")).exists();
            if !on_disk && !self.contexts.contains_key(&candidate) {
                break candidate;
            }
        };
        self.get_or_create(&handle)?;
        Ok(handle)
    }

    pub fn get(&self, handle: &str) -> Option<&LocalContext> {
        self.contexts.get(handle)
    }

    pub fn handles(&self) -> impl Iterator<Item = &str> {
        self.contexts.keys().map(String::as_str)
    }

    /// Unregisters and tears down a context. Returns false if the handle
    /// was not registered.
    pub fn remove(&mut self, handle: &str) -> Result<bool> {
        match self.contexts.remove(handle) {
            Some(ctx) => {
                ctx.finish()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Unregisters a context without tearing it down, leaving its staging
    /// directory for inspection.
    pub fn release(&mut self, handle: &str) -> Option<LocalContext> {
        self.contexts.remove(handle)
    }

    pub fn close_all(&mut self) -> Result<()> {
        for (_, ctx) in self.contexts.drain() {
            ctx.finish()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(root: &std::path::Path) -> ContextRegistry {
        ContextRegistry::new(root, ContextSettings::default(), ProcessRunner::new("cntk"))
    }

    #[test]
    fn same_handle_same_context() -> Result<()> {
        let root = tempfile::tempdir()?;
        let mut reg = registry(root.path());

        let first = reg.get_or_create("a")?.staging().dir().to_path_buf();
        let second = reg.get_or_create("a")?.staging().dir().to_path_buf();
        assert_eq!(first, second);
        assert_eq!(reg.handles().count(), 1);
        Ok(())
    }

    #[test]
    fn fresh_handles_are_distinct() -> Result<()> {
        let root = tempfile::tempdir()?;
        let mut reg = registry(root.path());

        let a = reg.create_fresh()?;
        let b = reg.create_fresh()?;
        assert_ne!(a, b);
        assert!(reg.get(&a).is_some());
        assert!(root.path().join(format!("_cntk_{b}")).is_dir());
        Ok(())
    }

    #[test]
    fn remove_tears_down() -> Result<()> {
        let root = tempfile::tempdir()?;
        let mut reg = registry(root.path());

        let dir = reg.get_or_create("gone")?.staging().dir().to_path_buf();
        assert!(reg.remove("gone")?);
        assert!(!dir.exists());
        assert!(reg.get("gone").is_none());
        assert!(!reg.remove("gone")?);
        Ok(())
    }

    #[test]
    fn release_and_clean_up_flag_keep_directories() -> Result<()> {
        let root = tempfile::tempdir()?;
        let mut reg = registry(root.path());
        let dir = reg.get_or_create("kept")?.staging().dir().to_path_buf();
        assert!(reg.release("kept").is_some());
        assert!(dir.exists());

        let mut reg = registry(root.path()).with_clean_up(false);
        let dir = reg.get_or_create("also_kept")?.staging().dir().to_path_buf();
        reg.close_all()?;
        assert!(dir.exists());
        assert_eq!(reg.handles().count(), 0);
        Ok(())
    }
}
