use std::hash::Hash;

/// Key types usable in a label-keyed metric map.
///
/// A key maps to the label set of the series it selects. Label names must be
/// the same for every key of a given type; values may vary freely.
pub trait MetricLabels: Eq + Hash + Clone + Send + Sync + 'static {
    /// `(label name, label value)` pairs for this key.
    fn label_pairs(&self) -> Vec<(&'static str, String)>;
}

/// Two-part key distinguishing series within one logical metric.
///
/// Exported as `{item="...",name="..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
    pub name: String,
    pub item: String,
}

impl Label {
    pub fn new(name: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            item: item.into(),
        }
    }
}

impl MetricLabels for Label {
    fn label_pairs(&self) -> Vec<(&'static str, String)> {
        vec![("name", self.name.clone()), ("item", self.item.clone())]
    }
}

/// Unlabeled metrics use the unit key: one series, no labels.
impl MetricLabels for () {
    fn label_pairs(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}
