//! Class names and the on-screen legend.

use std::fmt;

/// Ordered class names; a class id is an index into this list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSet {
    names: Vec<String>,
}

impl ClassSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, id: usize) -> bool {
        id < self.names.len()
    }

    pub fn name(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().map(String::as_str).enumerate()
    }

    /// One `"<id>: <name>"` line per class.
    pub fn legend(&self) -> Vec<String> {
        self.iter().map(|(id, name)| format!("{id}: {name}")).collect()
    }
}

impl fmt::Display for ClassSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legend_lists_ids_in_order() {
        let classes = ClassSet::new(["car", "person"]);
        assert_eq!(classes.legend(), vec!["0: car", "1: person"]);
        assert_eq!(classes.name(1), Some("person"));
        assert!(!classes.contains(2));
        assert_eq!(classes.to_string(), "car, person");
    }
}
