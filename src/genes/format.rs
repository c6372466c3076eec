//! Canonical string form of a gene tree.
//!
//! The string doubles as the genome hash, so children are sorted with
//! [`canonical_order`] before being joined: trees that differ only in child
//! order render identically.

use crate::genes::catalog::OperatorKind;
use crate::genes::gene::{Gene, GeneKind};
use std::cmp::Ordering;
use std::fmt;

/// Renders a number the way it appears inside an expression.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if value == 0.0 {
        "0".to_string()
    } else {
        format!("{}", value)
    }
}

/// Parameters are `a`..`z`, then `[26]`, `[27]` and so on.
pub fn parameter_name(id: usize) -> String {
    if id < 26 {
        ((b'a' + id as u8) as char).to_string()
    } else {
        format!("[{}]", id)
    }
}

fn multiple_prefix(multiple: f64) -> String {
    if multiple == 1.0 {
        String::new()
    } else if multiple == -1.0 {
        "-".to_string()
    } else {
        format_number(multiple)
    }
}

fn category(gene: &Gene) -> u8 {
    match gene.kind {
        GeneKind::Parameter(_) => 0,
        GeneKind::Operator(_) | GeneKind::Function(_) => 1,
        GeneKind::Constant => 2,
    }
}

fn is_negative(gene: &Gene) -> bool {
    gene.multiple < 0.0
}

/// Ordering of sibling genes: constants last, positive before negative,
/// parameters before composites, larger magnitude first, then by string.
pub fn canonical_order(a: (&Gene, &str), b: (&Gene, &str)) -> Ordering {
    let (ga, sa) = a;
    let (gb, sb) = b;
    ga.is_constant()
        .cmp(&gb.is_constant())
        .then_with(|| is_negative(ga).cmp(&is_negative(gb)))
        .then_with(|| category(ga).cmp(&category(gb)))
        .then_with(|| gb.multiple.abs().total_cmp(&ga.multiple.abs()))
        .then_with(|| sa.cmp(sb))
}

/// Children paired with their rendered strings, in canonical order.
fn sorted_children<'a>(children: impl Iterator<Item = &'a Gene>) -> Vec<(&'a Gene, String)> {
    let mut rendered: Vec<(&Gene, String)> = children.map(|c| (c, render(c, c.multiple))).collect();
    rendered.sort_by(|a, b| canonical_order((a.0, &a.1), (b.0, &b.1)));
    rendered
}

/// Renders `gene` as if its multiple were `multiple`.
pub(crate) fn render(gene: &Gene, multiple: f64) -> String {
    match gene.kind {
        GeneKind::Constant => format_number(multiple),
        GeneKind::Parameter(id) => format!("{}{}", multiple_prefix(multiple), parameter_name(id)),
        GeneKind::Operator(OperatorKind::Sum) => {
            let mut body = String::new();
            for (index, (child, text)) in sorted_children(gene.children.iter()).into_iter().enumerate() {
                if index == 0 {
                    body.push_str(&text);
                } else if is_negative(child) {
                    body.push_str(" - ");
                    body.push_str(&render(child, -child.multiple));
                } else {
                    body.push_str(" + ");
                    body.push_str(&text);
                }
            }
            format!("{}({})", multiple_prefix(multiple), body)
        }
        GeneKind::Operator(OperatorKind::Product) => {
            let (divisors, factors): (Vec<&Gene>, Vec<&Gene>) = gene
                .children
                .iter()
                .partition(|c| c.is_division() && c.multiple == 1.0 && c.children.len() == 1);
            let mut body = sorted_children(factors.into_iter())
                .into_iter()
                .map(|(_, text)| text)
                .collect::<Vec<_>>()
                .join("*");
            if body.is_empty() && !divisors.is_empty() {
                body.push('1');
            }
            for (_, text) in sorted_children(divisors.into_iter().flat_map(|d| d.children.iter())) {
                body.push('/');
                body.push_str(&text);
            }
            format!("{}({})", multiple_prefix(multiple), body)
        }
        GeneKind::Operator(OperatorKind::Division) => {
            let inner = gene
                .children
                .first()
                .map(|c| render(c, c.multiple))
                .unwrap_or_default();
            format!("{}(1/{})", multiple_prefix(multiple), inner)
        }
        GeneKind::Function(func) => {
            let argument = match gene.children.first() {
                Some(child) => {
                    let text = render(child, child.multiple);
                    if !child.is_leaf() && child.multiple == 1.0 && text.starts_with('(') {
                        text
                    } else {
                        format!("({})", text)
                    }
                }
                None => "()".to_string(),
            };
            format!("{}{}{}", multiple_prefix(multiple), func.symbol(), argument)
        }
    }
}

impl fmt::Display for Gene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self, self.multiple))
    }
}
