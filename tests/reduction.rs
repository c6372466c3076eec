use eqforge::genes::{FunctionKind, Gene, Reduction};
use eqforge::Genome;
use proptest::prelude::*;

fn canonical(text: &str) -> String {
    let genome = Genome::new(text.parse().unwrap());
    match genome.reduced_root().unwrap() {
        Some(root) => root.to_string(),
        None => genome.hash().to_string(),
    }
}

#[test]
fn canonicalisation_examples() {
    assert_eq!(canonical("(a - a)"), "(0)");
    assert_eq!(canonical("(a / a)"), "(1)");
    assert_eq!(canonical("(a - a - a)"), "-(a)");
    assert_eq!(canonical("((a*a) - b + 3 + 2)"), "((a*a) - b + 5)");
    assert_eq!(canonical("((a*a) - b + 3 + 2 - 1 - 4)"), "((a*a) - b)");
}

#[test]
fn extreme_multiples_collapse_to_constants() {
    let subtree = || {
        Gene::sum(vec![
            Gene::parameter(0),
            Gene::product(vec![Gene::parameter(1), Gene::parameter(0)]),
        ])
    };
    for extreme in [0.0, f64::INFINITY, f64::NEG_INFINITY] {
        let reduced = subtree().with_multiple(extreme).reduced().unwrap();
        assert_eq!(reduced, Gene::constant(extreme));
    }
    let nan = subtree().with_multiple(f64::NAN).reduced().unwrap();
    assert!(nan.is_constant());
    assert!(nan.multiple().is_nan());
}

#[test]
fn zero_multiple_wins_over_nan_children() {
    let gene = Gene::sum(vec![Gene::constant(f64::NAN), Gene::parameter(0)]).with_multiple(0.0);
    assert_eq!(gene.calculate(&[1.0]), 0.0);
    assert_eq!(gene.reduced().unwrap(), Gene::constant(0.0));
}

#[test]
fn constant_folding() {
    let folded: Gene = "(2 + 3)".parse::<Gene>().unwrap().reduced().unwrap();
    assert_eq!(folded, Gene::constant(5.0));
    let product: Gene = "(2*3*4)".parse::<Gene>().unwrap().reduced().unwrap();
    assert_eq!(product, Gene::constant(24.0));
    let root = Gene::function(FunctionKind::SquareRoot, Gene::constant(16.0));
    assert_eq!(root.reduced().unwrap(), Gene::constant(4.0));
}

#[test]
fn reducing_canonical_tree_reports_unchanged() {
    let mut gene: Gene = "((a*a) - b + 5)".parse().unwrap();
    assert_eq!(gene.reduce().unwrap(), Reduction::Unchanged);
    let mut reduced = "(a + a + b)".parse::<Gene>().unwrap().reduced().unwrap();
    assert_eq!(reduced.reduce().unwrap(), Reduction::Unchanged);
}

fn leaf() -> impl Strategy<Value = Gene> {
    prop_oneof![
        (1u8..6).prop_map(|v| Gene::constant(f64::from(v))),
        (0usize..3, prop::sample::select(vec![-2.0, -1.0, 1.0, 2.0, 3.0]))
            .prop_map(|(p, m)| Gene::parameter(p).with_multiple(m)),
    ]
}

fn tree() -> impl Strategy<Value = Gene> {
    leaf().prop_recursive(4, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Gene::sum),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Gene::product),
            inner.clone().prop_map(Gene::division),
            inner.prop_map(|g| Gene::function(FunctionKind::SquareRoot, g)),
        ]
    })
}

fn polynomial() -> impl Strategy<Value = Gene> {
    leaf().prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Gene::sum),
            prop::collection::vec(inner, 1..3).prop_map(Gene::product),
        ]
    })
}

proptest! {
    #[test]
    fn reduction_is_idempotent(gene in tree()) {
        let once = gene.reduced().unwrap();
        let twice = once.reduced().unwrap();
        prop_assert_eq!(once.to_string(), twice.to_string());
    }

    #[test]
    fn reduction_preserves_polynomial_values(
        gene in polynomial(),
        a in 1.0f64..2.0,
        b in 1.0f64..2.0,
        c in 1.0f64..2.0,
    ) {
        let values = [a, b, c];
        let before = gene.calculate(&values);
        let after = gene.reduced().unwrap().calculate(&values);
        prop_assert!((before - after).abs() <= 1e-9 * before.abs().max(1.0), "{} vs {}", before, after);
    }
}
