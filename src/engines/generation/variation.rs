use crate::genes::Gene;

/// Deterministic neighbourhood of `root`, produced one gene path at a time.
///
/// For every path: remove the node when its parent can spare it, promote each
/// child of a composite into the node's place, and nudge the multiple of a
/// non-constant node by one in either direction.
pub fn variations(root: Gene) -> impl Iterator<Item = Gene> + Send {
    let original = root.to_string();
    let mut paths: Option<std::vec::IntoIter<Vec<usize>>> = None;
    let mut pending: std::vec::IntoIter<Gene> = Vec::new().into_iter();
    std::iter::from_fn(move || loop {
        if let Some(next) = pending.next() {
            return Some(next);
        }
        let path = paths.get_or_insert_with(|| root.paths().into_iter()).next()?;
        let candidates: Vec<Gene> = variants_at(&root, &path)
            .into_iter()
            .filter(|g| g.contains_parameter() && g.to_string() != original)
            .collect();
        pending = candidates.into_iter();
    })
}

fn variants_at(root: &Gene, path: &[usize]) -> Vec<Gene> {
    let mut out = Vec::new();
    let Some(node) = root.get(path) else {
        return out;
    };

    if let Some((_, parent_path)) = path.split_last() {
        if root.get(parent_path).map_or(false, Gene::can_spare_child) {
            let mut removed = root.clone();
            if removed.remove_at(path).is_some() {
                out.push(removed);
            }
        }
    }

    for child in node.children() {
        let scaled = child.multiple() * node.multiple();
        let lifted = child.clone().with_multiple(scaled);
        if path.is_empty() {
            out.push(lifted);
        } else {
            let mut promoted = root.clone();
            promoted.replace_at(path, lifted);
            out.push(promoted);
        }
    }

    if !node.is_constant() {
        for delta in [1.0, -1.0] {
            let multiple = node.multiple() + delta;
            if multiple == 0.0 {
                continue;
            }
            let mut nudged = root.clone();
            if let Some(target) = nudged.get_mut(path) {
                target.set_multiple(multiple);
                out.push(nudged);
            }
        }
    }
    out
}
