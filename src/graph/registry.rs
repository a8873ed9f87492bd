use rustc_hash::FxHashMap;

use super::NodeId;
use crate::error::DelayError;
use crate::nodes::SharedWriter;

#[derive(Clone)]
pub struct WriterEntry {
    pub node: NodeId,
    pub state: SharedWriter,
}

/// Named delay writers of one graph. Readers look their buffer up here
/// during `prepare`.
#[derive(Default)]
pub struct WriterRegistry {
    writers: FxHashMap<String, WriterEntry>,
}

impl WriterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first writer registered under a name wins.
    pub fn register(
        &mut self,
        name: String,
        node: NodeId,
        state: SharedWriter,
    ) -> Result<(), DelayError> {
        if self.writers.contains_key(&name) {
            return Err(DelayError::DuplicateWriter(name));
        }
        self.writers.insert(name, WriterEntry { node, state });
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<&WriterEntry> {
        self.writers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.writers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

impl std::fmt::Debug for WriterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.writers.iter().map(|(name, entry)| (name, entry.node)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::nodes::DelayWriterState;

    #[test]
    fn test_duplicate_name_keeps_first() {
        let mut registry = WriterRegistry::new();
        let first = Rc::new(RefCell::new(DelayWriterState::new(100.0)));
        let second = Rc::new(RefCell::new(DelayWriterState::new(200.0)));

        assert!(registry.register("buf1".into(), NodeId(1), first).is_ok());
        assert_eq!(
            registry.register("buf1".into(), NodeId(2), second),
            Err(DelayError::DuplicateWriter("buf1".into()))
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("buf1").map(|e| e.node), Some(NodeId(1)));
        assert!(registry.resolve("buf2").is_none());
    }
}
