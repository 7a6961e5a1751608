use std::collections::HashMap;

/// Connections requested against names that did not exist yet.
///
/// Keyed by the missing target name; each entry lists the requesters in the
/// order they asked. An entry is drained exactly once, when the target is created.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PendingConnections {
    waiting: HashMap<String, Vec<String>>,
}

impl PendingConnections {
    pub fn register(&mut self, target: &str, requester: &str) {
        let list = self.waiting.entry(target.to_owned()).or_default();
        if !list.iter().any(|r| r == requester) {
            list.push(requester.to_owned());
        }
    }

    /// Removes and returns everything waiting on `target`.
    pub fn take(&mut self, target: &str) -> Vec<String> {
        self.waiting.remove(target).unwrap_or_default()
    }

    pub fn requesters(&self, target: &str) -> &[String] {
        self.waiting.get(target).map(Vec::as_slice).unwrap_or_default()
    }

    /// Forgets `name` both as a target and as a requester.
    pub fn purge(&mut self, name: &str) {
        self.waiting.remove(name);
        self.waiting.retain(|_, list| {
            list.retain(|r| r != name);
            !list.is_empty()
        });
    }

    /// Follows a requester through a rename.
    pub fn rename_requester(&mut self, from: &str, to: &str) {
        for list in self.waiting.values_mut() {
            for r in list.iter_mut().filter(|r| *r == from) {
                *r = to.to_owned();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drained_once() {
        let mut p = PendingConnections::default();
        p.register("b1", "l1");
        p.register("b1", "l2");
        p.register("b1", "l1");
        assert_eq!(p.requesters("b1"), ["l1", "l2"]);
        assert_eq!(p.take("b1"), vec!["l1", "l2"]);
        assert!(p.take("b1").is_empty());
        assert!(p.is_empty());
    }

    #[test]
    fn purge_and_rename() {
        let mut p = PendingConnections::default();
        p.register("b1", "l1");
        p.register("b2", "l1");
        p.register("b2", "l2");
        p.register("l9", "b7");

        p.rename_requester("l2", "l3");
        assert_eq!(p.requesters("b2"), ["l1", "l3"]);

        p.purge("l1");
        assert!(p.requesters("b1").is_empty());
        assert_eq!(p.requesters("b2"), ["l3"]);

        p.purge("l9");
        assert_eq!(p.len(), 1);
    }
}
