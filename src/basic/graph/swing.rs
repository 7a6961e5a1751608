use super::elements::ElementId;

/// Holds the single swing bus of a topology.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SwingRegistry {
    current: Option<ElementId>,
}

/// Effect of a bus type change on the swing registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingChange {
    /// The registry did not change.
    Unaffected,
    /// The bus became the swing bus; `demoted` is the previous swing bus, now a generator.
    Promoted { demoted: Option<ElementId> },
    /// The swing bus stopped being swing and the registry is empty.
    Cleared,
}

impl SwingRegistry {
    pub fn current(&self) -> Option<ElementId> {
        self.current
    }

    /// Registers `id` and returns the previously registered bus, if it was a different one.
    pub(crate) fn promote(&mut self, id: ElementId) -> Option<ElementId> {
        self.current.replace(id).filter(|prev| *prev != id)
    }

    /// Empties the registry if it holds `id`.
    pub(crate) fn clear_if(&mut self, id: ElementId) -> bool {
        if self.current == Some(id) {
            self.current = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promote_and_clear() {
        let mut reg = SwingRegistry::default();
        assert_eq!(reg.promote(ElementId(1)), None);
        assert_eq!(reg.promote(ElementId(1)), None);
        assert_eq!(reg.promote(ElementId(2)), Some(ElementId(1)));
        assert!(!reg.clear_if(ElementId(1)));
        assert!(reg.clear_if(ElementId(2)));
        assert_eq!(reg.current(), None);
    }
}
