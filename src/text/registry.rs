use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::dom::{Document, NodeId};
use crate::text::{extract, ExtractOptions, VisibleTextSnapshot};

/// Caches one visible-text snapshot per root element.
///
/// A snapshot is handed out as an `Arc` and never mutated. The next
/// [`get`](Self::get) recomputes it after [`mark_stale`](Self::mark_stale) or
/// once the document generation has moved past the snapshot's.
#[derive(Debug, Default)]
pub struct SnapshotRegistry {
    opts: ExtractOptions,
    entries: Mutex<HashMap<NodeId, Entry>>,
}

#[derive(Debug)]
struct Entry {
    snapshot: Arc<VisibleTextSnapshot>,
    stale: bool,
}

impl SnapshotRegistry {
    pub fn new(opts: ExtractOptions) -> Self {
        Self { opts, entries: Mutex::new(HashMap::new()) }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<NodeId, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current snapshot of `root`, recomputed if missing, stale or taken from
    /// an older generation of `doc`.
    pub fn get(&self, doc: &Document, root: NodeId) -> Arc<VisibleTextSnapshot> {
        let mut entries = self.entries();
        let current = |e: &&Entry| !e.stale && e.snapshot.generation == doc.generation();
        if let Some(entry) = entries.get(&root).filter(current) {
            return Arc::clone(&entry.snapshot);
        }
        let snapshot = Arc::new(extract(doc, root, self.opts));
        log::debug!("snapshot for {:?} recomputed (generation {})", root, snapshot.generation);
        entries.insert(root, Entry { snapshot: Arc::clone(&snapshot), stale: false });
        snapshot
    }

    /// Invalidate every cached snapshot.
    pub fn mark_stale(&self) {
        for entry in self.entries().values_mut() {
            entry.stale = true;
        }
    }

    pub fn is_stale(&self, root: NodeId) -> bool {
        self.entries().get(&root).map_or(true, |e| e.stale)
    }
}

/// Polling stand-in for mutation and resize observers.
///
/// While observing, every [`poll`](Self::poll) compares the document's
/// mutation generation and the viewport size with the last values seen and
/// marks the registry stale on any change.
#[derive(Debug)]
pub struct DomWatch {
    registry: Arc<SnapshotRegistry>,
    observing: bool,
    generation: u64,
    viewport: (f32, f32),
}

impl DomWatch {
    pub fn new(registry: Arc<SnapshotRegistry>) -> Self {
        Self { registry, observing: false, generation: 0, viewport: (0.0, 0.0) }
    }

    pub fn registry(&self) -> &Arc<SnapshotRegistry> {
        &self.registry
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    /// Start observing. Anything may have changed while disconnected, so the
    /// registry is marked stale straight away.
    pub fn observe(&mut self, doc: &Document, viewport: (f32, f32)) {
        self.observing = true;
        self.generation = doc.generation();
        self.viewport = viewport;
        self.registry.mark_stale();
    }

    pub fn disconnect(&mut self) {
        self.observing = false;
    }

    /// Returns `true` when a change was detected.
    pub fn poll(&mut self, doc: &Document, viewport: (f32, f32)) -> bool {
        if !self.observing {
            return false;
        }
        let changed = doc.generation() != self.generation || viewport != self.viewport;
        if changed {
            log::debug!("document changed (generation {}), snapshots stale", doc.generation());
            self.generation = doc.generation();
            self.viewport = viewport;
            self.registry.mark_stale();
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parser::parse_html;

    #[test]
    fn caches_until_marked_stale() {
        let doc = parse_html("<body><p id='p'>before</p></body>", "");
        let body = doc.body().unwrap();
        let registry = SnapshotRegistry::default();

        let a = registry.get(&doc, body);
        let b = registry.get(&doc, body);
        assert!(Arc::ptr_eq(&a, &b));

        registry.mark_stale();
        assert!(registry.is_stale(body));
        let c = registry.get(&doc, body);
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(!registry.is_stale(body));
    }

    #[test]
    fn mutations_invalidate_without_a_poll() {
        let mut doc = parse_html("<body><p id='p'>before</p></body>", "");
        let body = doc.body().unwrap();
        let registry = SnapshotRegistry::default();
        assert!(registry.get(&doc, body).text.starts_with("before"));

        let p = doc.element_by_id("p").unwrap();
        let text = doc.children(p)[0];
        doc.set_text(text, "after").unwrap();
        let snap = registry.get(&doc, body);
        assert!(snap.text.starts_with("after"));
        assert_eq!(snap.generation, doc.generation());
    }

    #[test]
    fn watch_marks_stale_on_mutation_and_resize() {
        let mut doc = parse_html("<body><p id='p'>x</p></body>", "");
        let body = doc.body().unwrap();
        let registry = Arc::new(SnapshotRegistry::default());
        let mut watch = DomWatch::new(Arc::clone(&registry));

        registry.get(&doc, body);
        assert!(!watch.poll(&doc, (800.0, 600.0)));

        watch.observe(&doc, (800.0, 600.0));
        assert!(registry.is_stale(body));
        registry.get(&doc, body);
        assert!(!watch.poll(&doc, (800.0, 600.0)));

        let p = doc.element_by_id("p").unwrap();
        doc.set_attribute(p, "style", "display:none").unwrap();
        assert!(watch.poll(&doc, (800.0, 600.0)));
        assert!(registry.is_stale(body));

        registry.get(&doc, body);
        assert!(watch.poll(&doc, (400.0, 600.0)));

        watch.disconnect();
        doc.set_attribute(p, "style", "").unwrap();
        assert!(!watch.poll(&doc, (400.0, 600.0)));
    }
}
