use std::fmt;

use serde::Serialize;

/// Summary of an initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InitReport {
    /// Registered classes, after merging.
    pub classes: usize,
    /// Methods with at least one virtual parameter.
    pub methods: usize,
    /// Longest v-table, in slots.
    pub slots: usize,
    /// Dispatch table cells over all methods.
    pub cells: usize,
    /// Methods with a concrete class combination that has no applicable overrider.
    pub not_implemented: usize,
    /// Methods with a concrete class combination that has no unique best overrider.
    pub ambiguous: usize,
    /// Overriders that no concrete class combination ever reaches.
    pub unused: Vec<UnusedOverrider>,
    /// Ambiguous class combinations, recorded when ambiguity is not an error.
    pub ambiguities: Vec<Ambiguity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnusedOverrider {
    pub method: String,
    pub overrider: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ambiguity {
    pub method: String,
    pub classes: Vec<String>,
}

impl fmt::Display for InitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} classes, {} methods, {} slots, {} cells, {} not implemented, {} ambiguous",
            self.classes, self.methods, self.slots, self.cells, self.not_implemented, self.ambiguous
        )?;
        if !self.unused.is_empty() {
            write!(f, ", {} unused overriders", self.unused.len())?;
        }
        Ok(())
    }
}
