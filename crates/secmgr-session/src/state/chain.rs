//! Persistent append-only sequence with structural sharing.
//!
//! A [`Chain`] is a reversed linked list of reference-counted nodes. Every
//! node records the length of the chain ending at it, so appending `k`
//! elements and taking the suffix after a known ancestor are both O(k).

use std::sync::Arc;

struct Node<T> {
    value: T,
    len: usize,
    parent: Option<Arc<Node<T>>>,
}

/// Immutable sequence supporting cheap append and suffix extraction.
pub struct Chain<T> {
    head: Option<Arc<Node<T>>>,
}

impl<T> Chain<T> {
    /// The empty chain.
    pub fn new() -> Self {
        Self { head: None }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.head.as_ref().map_or(0, |node| node.len)
    }

    /// Whether the chain has no elements.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Returns a new chain with `value` appended. `self` is unchanged.
    pub fn push(&self, value: T) -> Self {
        let len = self.len() + 1;
        Self {
            head: Some(Arc::new(Node {
                value,
                len,
                parent: self.head.clone(),
            })),
        }
    }

    /// Returns a new chain with every element of `values` appended.
    pub fn extend(&self, values: impl IntoIterator<Item = T>) -> Self {
        values
            .into_iter()
            .fold(self.clone(), |chain, value| chain.push(value))
    }

    /// Elements from last to first.
    pub fn iter_rev(&self) -> RevIter<'_, T> {
        RevIter {
            next: self.head.as_deref(),
        }
    }

    /// The node holding the element at 1-based position `len`, walking back
    /// from the head.
    fn node_at_len(&self, len: usize) -> Option<&Node<T>> {
        let mut node = self.head.as_deref();
        while let Some(current) = node {
            if current.len == len {
                return Some(current);
            }
            node = current.parent.as_deref();
        }
        None
    }
}

impl<T: Clone> Chain<T> {
    /// Elements from first to last.
    pub fn to_vec(&self) -> Vec<T> {
        let mut values: Vec<T> = self.iter_rev().cloned().collect();
        values.reverse();
        values
    }
}

impl<T: Clone + PartialEq> Chain<T> {
    /// The elements appended to `ancestor` to produce `self`, in order.
    ///
    /// Returns `None` when `ancestor` is not a prefix of `self`. The check is
    /// O(1) when both chains share the ancestor's nodes; chains rebuilt from
    /// storage fall back to comparing the prefix element by element.
    pub fn suffix_after(&self, ancestor: &Chain<T>) -> Option<Vec<T>> {
        let ancestor_len = ancestor.len();
        if ancestor_len > self.len() {
            return None;
        }

        let mut suffix = Vec::with_capacity(self.len() - ancestor_len);
        let mut node = self.head.as_deref();
        while let Some(current) = node {
            if current.len == ancestor_len {
                break;
            }
            suffix.push(current.value.clone());
            node = current.parent.as_deref();
        }

        let shares_prefix = match (node, ancestor.head.as_deref()) {
            (None, None) => true,
            (Some(ours), Some(theirs)) => {
                std::ptr::eq(ours, theirs) || Self::same_elements(Some(ours), Some(theirs))
            }
            _ => false,
        };
        if !shares_prefix {
            return None;
        }

        suffix.reverse();
        Some(suffix)
    }

    fn same_elements(mut a: Option<&Node<T>>, mut b: Option<&Node<T>>) -> bool {
        loop {
            match (a, b) {
                (None, None) => return true,
                (Some(x), Some(y)) => {
                    if std::ptr::eq(x, y) {
                        return true;
                    }
                    if x.len != y.len || x.value != y.value {
                        return false;
                    }
                    a = x.parent.as_deref();
                    b = y.parent.as_deref();
                }
                _ => return false,
            }
        }
    }

    /// Whether `prefix` is a prefix of `self`.
    pub fn starts_with(&self, prefix: &Chain<T>) -> bool {
        if prefix.is_empty() {
            return true;
        }
        match self.node_at_len(prefix.len()) {
            Some(node) => Self::same_elements(Some(node), prefix.head.as_deref()),
            None => false,
        }
    }
}

impl<T> Clone for Chain<T> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Chain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut values: Vec<&T> = self.iter_rev().collect();
        values.reverse();
        f.debug_list().entries(values).finish()
    }
}

impl<T> Default for Chain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialEq> PartialEq for Chain<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let mut a = self.head.as_deref();
        let mut b = other.head.as_deref();
        while let (Some(x), Some(y)) = (a, b) {
            if std::ptr::eq(x, y) {
                return true;
            }
            if x.value != y.value {
                return false;
            }
            a = x.parent.as_deref();
            b = y.parent.as_deref();
        }
        true
    }
}

impl<T: Eq> Eq for Chain<T> {}

impl<T> FromIterator<T> for Chain<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Chain::new(), |chain, value| chain.push(value))
    }
}

// Unlink nodes one at a time so that dropping a long chain does not recurse
// once per element.
impl<T> Drop for Chain<T> {
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut owned) => next = owned.parent.take(),
                Err(_) => break,
            }
        }
    }
}

/// Iterator over a chain from last element to first.
pub struct RevIter<'a, T> {
    next: Option<&'a Node<T>>,
}

impl<'a, T> Iterator for RevIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.parent.as_deref();
        Some(&node.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_does_not_mutate() {
        let a: Chain<u32> = Chain::new().push(1);
        let b = a.push(2);
        assert_eq!(a.to_vec(), vec![1]);
        assert_eq!(b.to_vec(), vec![1, 2]);
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn test_suffix_after_shared_ancestor() {
        let base: Chain<u32> = [1, 2, 3].into_iter().collect();
        let extended = base.extend([4, 5]);
        assert_eq!(extended.suffix_after(&base), Some(vec![4, 5]));
        assert_eq!(extended.suffix_after(&extended), Some(vec![]));
        assert_eq!(extended.suffix_after(&Chain::new()), Some(vec![1, 2, 3, 4, 5]));
    }

    #[test]
    fn test_suffix_after_rebuilt_ancestor() {
        let extended: Chain<u32> = [1, 2, 3, 4].into_iter().collect();
        let rebuilt: Chain<u32> = [1, 2].into_iter().collect();
        assert_eq!(extended.suffix_after(&rebuilt), Some(vec![3, 4]));
    }

    #[test]
    fn test_suffix_after_divergent_is_none() {
        let base: Chain<u32> = [1, 2].into_iter().collect();
        let left = base.push(3);
        let right = base.push(4);
        assert_eq!(left.suffix_after(&right), None);
        assert_eq!(base.suffix_after(&left), None);
        assert!(left.starts_with(&base));
        assert!(!left.starts_with(&right));
    }

    #[test]
    fn test_equality_is_structural() {
        let a: Chain<u32> = [1, 2].into_iter().collect();
        let b: Chain<u32> = [1, 2].into_iter().collect();
        assert_eq!(a, b);
        assert_ne!(a, b.push(3));
    }

    #[test]
    fn test_long_chain_drops() {
        let chain: Chain<u32> = (0..200_000).collect();
        assert_eq!(chain.len(), 200_000);
        drop(chain);
    }
}
