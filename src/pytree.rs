//! Nested containers of arrays and their structure descriptors.
//!
//! A [`PyTree`] is a tuple, list or string-keyed dict whose leaves are
//! arrays, nested arbitrarily. Flattening yields the leaves in canonical
//! order (depth first, dict entries by sorted key) together with a
//! [`TreeDef`]; unflattening a matching leaf sequence rebuilds the tree.

use crate::error::{Error, Result};
use crate::Array;
use std::collections::BTreeMap;
use std::fmt;

/// A nested structure of arrays.
///
/// # Examples
///
/// ```
/// # use jax_jacfwd::{Array, PyTree, Shape};
/// let x = Array::from_vec(vec![1.0, 2.0], Shape::new(vec![2]));
/// let tree = PyTree::tuple(vec![x.clone().into(), PyTree::list(vec![x.into(), PyTree::None])]);
/// let (leaves, def) = tree.flatten();
/// assert_eq!(leaves.len(), 2);
/// assert_eq!(def.to_string(), "PyTreeDef((*, [*, None]))");
/// assert_eq!(def.unflatten(leaves).unwrap(), tree);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum PyTree {
    /// A single array
    Leaf(Array),
    /// An immutable positional sequence
    Tuple(Vec<PyTree>),
    /// A mutable positional sequence
    List(Vec<PyTree>),
    /// A mapping with string keys, iterated in key order
    Dict(BTreeMap<String, PyTree>),
    /// An empty node without leaves
    None,
}

impl PyTree {
    /// Wrap an array.
    pub fn leaf(array: Array) -> Self {
        PyTree::Leaf(array)
    }

    /// Build a tuple node.
    pub fn tuple(items: Vec<PyTree>) -> Self {
        PyTree::Tuple(items)
    }

    /// Build a list node.
    pub fn list(items: Vec<PyTree>) -> Self {
        PyTree::List(items)
    }

    /// Build a dict node.
    pub fn dict<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, PyTree)>,
    {
        PyTree::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Flatten into leaves (canonical order) and structure.
    pub fn flatten(&self) -> (Vec<Array>, TreeDef) {
        let mut leaves = Vec::new();
        let def = self.flatten_into(&mut leaves);
        (leaves, def)
    }

    fn flatten_into(&self, leaves: &mut Vec<Array>) -> TreeDef {
        match self {
            PyTree::Leaf(array) => {
                leaves.push(array.clone());
                TreeDef::Leaf
            }
            PyTree::Tuple(items) => {
                TreeDef::Tuple(items.iter().map(|item| item.flatten_into(leaves)).collect())
            }
            PyTree::List(items) => {
                TreeDef::List(items.iter().map(|item| item.flatten_into(leaves)).collect())
            }
            PyTree::Dict(entries) => TreeDef::Dict(
                entries.iter().map(|(k, v)| (k.clone(), v.flatten_into(leaves))).collect(),
            ),
            PyTree::None => TreeDef::None,
        }
    }

    /// Structure of this tree.
    pub fn tree_def(&self) -> TreeDef {
        self.flatten().1
    }

    /// Leaves in canonical order.
    pub fn leaves(&self) -> Vec<Array> {
        self.flatten().0
    }

    /// The array, if this is a leaf.
    pub fn as_leaf(&self) -> Option<&Array> {
        match self {
            PyTree::Leaf(array) => Some(array),
            _ => None,
        }
    }

    /// Children of a tuple or list.
    pub fn elements(&self) -> Option<&[PyTree]> {
        match self {
            PyTree::Tuple(items) | PyTree::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns true for tuples and lists.
    pub fn is_sequence(&self) -> bool {
        self.elements().is_some()
    }

    /// Child `index` of a tuple or list.
    pub fn get(&self, index: usize) -> Option<&PyTree> {
        self.elements().and_then(|items| items.get(index))
    }

    /// Entry `key` of a dict.
    pub fn get_key(&self, key: &str) -> Option<&PyTree> {
        match self {
            PyTree::Dict(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Short name of the node kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            PyTree::Leaf(_) => "Array",
            PyTree::Tuple(_) => "tuple",
            PyTree::List(_) => "list",
            PyTree::Dict(_) => "dict",
            PyTree::None => "None",
        }
    }

    /// Apply `f` to every leaf, keeping the structure.
    pub fn map<F>(&self, mut f: F) -> PyTree
    where
        F: FnMut(&Array) -> Array,
    {
        self.map_inner(&mut f)
    }

    fn map_inner<F>(&self, f: &mut F) -> PyTree
    where
        F: FnMut(&Array) -> Array,
    {
        match self {
            PyTree::Leaf(array) => PyTree::Leaf(f(array)),
            PyTree::Tuple(items) => PyTree::Tuple(items.iter().map(|i| i.map_inner(f)).collect()),
            PyTree::List(items) => PyTree::List(items.iter().map(|i| i.map_inner(f)).collect()),
            PyTree::Dict(entries) => {
                PyTree::Dict(entries.iter().map(|(k, v)| (k.clone(), v.map_inner(f))).collect())
            }
            PyTree::None => PyTree::None,
        }
    }
}

impl From<Array> for PyTree {
    fn from(array: Array) -> Self {
        PyTree::Leaf(array)
    }
}

/// Structure descriptor of a [`PyTree`].
///
/// Two trees are conformant iff their descriptors are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeDef {
    /// Leaf position
    Leaf,
    /// Tuple of sub-structures
    Tuple(Vec<TreeDef>),
    /// List of sub-structures
    List(Vec<TreeDef>),
    /// Dict entries in key order
    Dict(Vec<(String, TreeDef)>),
    /// Empty node
    None,
}

impl TreeDef {
    /// Number of leaf positions.
    pub fn num_leaves(&self) -> usize {
        match self {
            TreeDef::Leaf => 1,
            TreeDef::Tuple(items) | TreeDef::List(items) => items.iter().map(TreeDef::num_leaves).sum(),
            TreeDef::Dict(entries) => entries.iter().map(|(_, def)| def.num_leaves()).sum(),
            TreeDef::None => 0,
        }
    }

    /// Rebuild a tree from leaves in canonical order.
    pub fn unflatten(&self, leaves: Vec<Array>) -> Result<PyTree> {
        self.unflatten_subtrees(leaves.into_iter().map(PyTree::Leaf).collect())
    }

    /// Rebuild a tree whose leaf positions are filled with whole subtrees.
    ///
    /// This nests one structure inside another, as when every output leaf
    /// of a function gets a Jacobian shaped like the inputs.
    pub fn unflatten_subtrees(&self, subtrees: Vec<PyTree>) -> Result<PyTree> {
        if subtrees.len() != self.num_leaves() {
            return Err(Error::Reshape(format!(
                "{} expects {} leaves, got {}",
                self,
                self.num_leaves(),
                subtrees.len()
            )));
        }
        let mut iter = subtrees.into_iter();
        Ok(self.build(&mut iter))
    }

    fn build(&self, iter: &mut std::vec::IntoIter<PyTree>) -> PyTree {
        match self {
            TreeDef::Leaf => iter.next().unwrap_or(PyTree::None),
            TreeDef::Tuple(items) => PyTree::Tuple(items.iter().map(|d| d.build(iter)).collect()),
            TreeDef::List(items) => PyTree::List(items.iter().map(|d| d.build(iter)).collect()),
            TreeDef::Dict(entries) => {
                PyTree::Dict(entries.iter().map(|(k, d)| (k.clone(), d.build(iter))).collect())
            }
            TreeDef::None => PyTree::None,
        }
    }

    fn fmt_inner(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeDef::Leaf => f.write_str("*"),
            TreeDef::None => f.write_str("None"),
            TreeDef::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt_inner(f)?;
                }
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            TreeDef::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt_inner(f)?;
                }
                f.write_str("]")
            }
            TreeDef::Dict(entries) => {
                f.write_str("{")?;
                for (i, (key, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "'{}': ", key)?;
                    item.fmt_inner(f)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl fmt::Display for TreeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PyTreeDef(")?;
        self.fmt_inner(f)?;
        f.write_str(")")
    }
}

/// Flatten a tree into leaves and structure.
pub fn tree_flatten(tree: &PyTree) -> (Vec<Array>, TreeDef) {
    tree.flatten()
}

/// Rebuild a tree from a structure and leaves.
pub fn tree_unflatten(def: &TreeDef, leaves: Vec<Array>) -> Result<PyTree> {
    def.unflatten(leaves)
}
