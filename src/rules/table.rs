//! Ordered rule tables.
//!
//! A table keeps rules in control-document order and is scanned linearly;
//! the first rule that claims a path wins. Regex rules can overlap, so a map
//! lookup would change which rule applies.

/// A rule identified by the pattern it was authored under.
pub trait Keyed {
    fn key(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable<T> {
    rules: Vec<T>,
}

impl<T> Default for RuleTable<T> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<T: Keyed> RuleTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. A rule with the same key is replaced in place (keeping
    /// its original position) and returned.
    pub fn insert(&mut self, rule: T) -> Option<T> {
        match self.rules.iter_mut().find(|r| r.key() == rule.key()) {
            Some(slot) => Some(std::mem::replace(slot, rule)),
            None => {
                self.rules.push(rule);
                None
            }
        }
    }
}

impl<T> RuleTable<T> {
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.rules.iter()
    }

    /// First rule satisfying `predicate`, in table order.
    pub fn first_match<F>(&self, mut predicate: F) -> Option<&T>
    where
        F: FnMut(&T) -> bool,
    {
        self.rules.iter().find(|r| predicate(r))
    }

    /// First non-`None` result of `f`, in table order.
    pub fn find_map<R, F>(&self, f: F) -> Option<R>
    where
        F: FnMut(&T) -> Option<R>,
    {
        self.rules.iter().find_map(f)
    }
}

impl<T: Keyed> FromIterator<T> for RuleTable<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut table = Self::new();
        for rule in iter {
            table.insert(rule);
        }
        table
    }
}

impl<'a, T> IntoIterator for &'a RuleTable<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
