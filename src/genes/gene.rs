use crate::genes::catalog::{FunctionKind, OperatorKind};

/// What a gene node is. Leaves are `Constant` and `Parameter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneKind {
    Constant,
    Parameter(usize),
    Operator(OperatorKind),
    Function(FunctionKind),
}

/// A node in an expression tree.
///
/// Every node carries a scalar `multiple`. A constant's value is its multiple.
/// Children are owned by their parent; there are no back references, so the
/// parent of a node is found by walking a path from the root.
#[derive(Debug, Clone, PartialEq)]
pub struct Gene {
    pub(crate) kind: GeneKind,
    pub(crate) multiple: f64,
    pub(crate) children: Vec<Gene>,
}

impl Gene {
    pub fn constant(value: f64) -> Self {
        Self {
            kind: GeneKind::Constant,
            multiple: value,
            children: Vec::new(),
        }
    }

    pub fn parameter(id: usize) -> Self {
        Self {
            kind: GeneKind::Parameter(id),
            multiple: 1.0,
            children: Vec::new(),
        }
    }

    pub fn operator(op: OperatorKind, children: Vec<Gene>) -> Self {
        Self {
            kind: GeneKind::Operator(op),
            multiple: 1.0,
            children,
        }
    }

    pub fn sum(children: Vec<Gene>) -> Self {
        Self::operator(OperatorKind::Sum, children)
    }

    pub fn product(children: Vec<Gene>) -> Self {
        Self::operator(OperatorKind::Product, children)
    }

    pub fn division(child: Gene) -> Self {
        Self::operator(OperatorKind::Division, vec![child])
    }

    pub fn function(func: FunctionKind, child: Gene) -> Self {
        Self {
            kind: GeneKind::Function(func),
            multiple: 1.0,
            children: vec![child],
        }
    }

    pub(crate) fn function_empty(func: FunctionKind) -> Self {
        Self {
            kind: GeneKind::Function(func),
            multiple: 1.0,
            children: Vec::new(),
        }
    }

    pub fn with_multiple(mut self, multiple: f64) -> Self {
        self.multiple = multiple;
        self
    }

    pub fn kind(&self) -> GeneKind {
        self.kind
    }

    pub fn multiple(&self) -> f64 {
        self.multiple
    }

    pub fn set_multiple(&mut self, multiple: f64) {
        self.multiple = multiple;
    }

    pub fn children(&self) -> &[Gene] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, GeneKind::Constant | GeneKind::Parameter(_))
    }

    pub fn is_constant(&self) -> bool {
        self.kind == GeneKind::Constant
    }

    pub fn is_operator(&self, op: OperatorKind) -> bool {
        self.kind == GeneKind::Operator(op)
    }

    pub fn is_sum(&self) -> bool {
        self.is_operator(OperatorKind::Sum)
    }

    pub fn is_product(&self) -> bool {
        self.is_operator(OperatorKind::Product)
    }

    pub fn is_division(&self) -> bool {
        self.is_operator(OperatorKind::Division)
    }

    /// Whether another child may be attached without breaking the arity rules.
    pub fn can_accept_child(&self) -> bool {
        match self.kind {
            GeneKind::Constant | GeneKind::Parameter(_) => false,
            GeneKind::Operator(op) => op
                .max_children()
                .map_or(true, |max| self.children.len() < max),
            GeneKind::Function(_) => self.children.is_empty(),
        }
    }

    /// Whether one child may be removed without breaking the arity rules.
    pub fn can_spare_child(&self) -> bool {
        match self.kind {
            GeneKind::Operator(OperatorKind::Sum) | GeneKind::Operator(OperatorKind::Product) => {
                self.children.len() > 1
            }
            _ => false,
        }
    }

    /// Arity rules for the whole subtree: leaves have no children, a Division
    /// holds at most one child and a Function exactly one.
    pub fn is_well_formed(&self) -> bool {
        let own = match self.kind {
            GeneKind::Constant | GeneKind::Parameter(_) => self.children.is_empty(),
            GeneKind::Operator(OperatorKind::Division) => self.children.len() <= 1,
            GeneKind::Operator(_) => true,
            GeneKind::Function(_) => self.children.len() == 1,
        };
        own && self.children.iter().all(Gene::is_well_formed)
    }

    /// Evaluates the subtree for one set of parameter values.
    ///
    /// A zero multiple short-circuits to zero even when the subtree itself
    /// would be NaN or infinite.
    pub fn calculate(&self, values: &[f64]) -> f64 {
        if self.multiple == 0.0 {
            return 0.0;
        }
        let value = match self.kind {
            GeneKind::Constant => return self.multiple,
            GeneKind::Parameter(id) => values.get(id).copied().unwrap_or(f64::NAN),
            GeneKind::Operator(OperatorKind::Sum) => {
                self.children.iter().map(|c| c.calculate(values)).sum()
            }
            GeneKind::Operator(OperatorKind::Product) => {
                self.children.iter().map(|c| c.calculate(values)).product()
            }
            GeneKind::Operator(OperatorKind::Division) => match self.children.first() {
                Some(child) => 1.0 / child.calculate(values),
                None => 1.0,
            },
            GeneKind::Function(func) => match self.children.first() {
                Some(child) => func.apply(child.calculate(values)),
                None => f64::NAN,
            },
        };
        self.multiple * value
    }

    /// Number of nodes in the subtree.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Gene::size).sum::<usize>()
    }

    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Gene::depth).max().unwrap_or(0)
    }

    pub fn contains_parameter(&self) -> bool {
        matches!(self.kind, GeneKind::Parameter(_))
            || self.children.iter().any(Gene::contains_parameter)
    }

    /// Highest parameter id referenced anywhere in the subtree.
    pub fn max_parameter(&self) -> Option<usize> {
        let own = match self.kind {
            GeneKind::Parameter(id) => Some(id),
            _ => None,
        };
        self.children
            .iter()
            .filter_map(Gene::max_parameter)
            .chain(own)
            .max()
    }

    /// All node paths in pre-order, starting with the root's empty path.
    pub fn paths(&self) -> Vec<Vec<usize>> {
        let mut paths = Vec::with_capacity(self.size());
        let mut current = Vec::new();
        self.collect_paths(&mut current, &mut paths);
        paths
    }

    fn collect_paths(&self, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        out.push(current.clone());
        for (index, child) in self.children.iter().enumerate() {
            current.push(index);
            child.collect_paths(current, out);
            current.pop();
        }
    }

    pub fn get(&self, path: &[usize]) -> Option<&Gene> {
        path.iter()
            .try_fold(self, |node, &index| node.children.get(index))
    }

    pub fn get_mut(&mut self, path: &[usize]) -> Option<&mut Gene> {
        let mut node = self;
        for &index in path {
            node = node.children.get_mut(index)?;
        }
        Some(node)
    }

    /// Swaps the node at `path` for `gene`, returning the node it displaced.
    pub fn replace_at(&mut self, path: &[usize], gene: Gene) -> Option<Gene> {
        self.get_mut(path)
            .map(|node| std::mem::replace(node, gene))
    }

    /// Detaches the node at a non-empty `path`.
    pub fn remove_at(&mut self, path: &[usize]) -> Option<Gene> {
        let (last, parent_path) = path.split_last()?;
        let parent = self.get_mut(parent_path)?;
        if *last < parent.children.len() {
            Some(parent.children.remove(*last))
        } else {
            None
        }
    }

    pub fn push_child(&mut self, child: Gene) -> bool {
        if self.can_accept_child() {
            self.children.push(child);
            true
        } else {
            false
        }
    }
}
