use eqforge::config::FactoryConfig;
use eqforge::engines::generation::LazySequence;
use eqforge::{Catalog, EqforgeError, Genome, GenomeFactory};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;

fn factory() -> GenomeFactory {
    GenomeFactory::new(
        Catalog::from_symbols(&["+", "*", "sqrt"]).unwrap(),
        FactoryConfig::default(),
    )
    .unwrap()
}

#[test]
fn concurrent_registration_yields_one_instance() {
    let factory = Arc::new(factory());
    let texts = ["(a + b)", "(b + a)", "(a + b)", "(b + a)"];
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let factory = Arc::clone(&factory);
            let text = texts[i % texts.len()];
            thread::spawn(move || factory.register_gene(text.parse().unwrap()).unwrap())
        })
        .collect();
    let registered: Vec<Arc<Genome>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let first = &registered[0];
    assert!(first.is_frozen());
    for genome in &registered {
        assert!(Arc::ptr_eq(first, genome));
    }
    assert_eq!(factory.registry().get("(a + b)").map(|g| Arc::ptr_eq(&g, first)), Some(true));
}

#[test]
fn concurrent_generation_never_duplicates() {
    let factory = Arc::new(factory());
    let seen = Arc::new(Mutex::new(HashSet::new()));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let factory = Arc::clone(&factory);
            let seen = Arc::clone(&seen);
            thread::spawn(move || {
                for _ in 0..25 {
                    if let Some(genome) = factory.generate().unwrap() {
                        assert!(seen.lock().unwrap().insert(genome.hash().to_string()));
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(seen.lock().unwrap().len(), factory.generated());
}

#[test]
fn mutation_registers_a_new_genome() {
    let factory = factory();
    let parent = factory.register_gene("((a*b) + sqrt(a))".parse().unwrap()).unwrap();
    let mut found = false;
    for _ in 0..20 {
        if let Some(mutant) = factory.mutate(&parent).unwrap() {
            assert_ne!(mutant.hash(), parent.hash());
            assert!(mutant.is_frozen());
            assert!(factory.registry().contains(mutant.hash()));
            found = true;
            break;
        }
    }
    assert!(found);
}

#[test]
fn crossover_rejects_inbreeding() {
    let factory = factory();
    let first = factory.register_gene("((a*b) + a)".parse().unwrap()).unwrap();
    let second = factory.register_gene("(sqrt(b) + (b*b))".parse().unwrap()).unwrap();

    assert!(factory.attempt_new_crossover(&first, &first).unwrap().is_none());

    let (left, right) = factory
        .crossover_any(&[Arc::clone(&first), Arc::clone(&second)])
        .unwrap()
        .expect("distinct parents should cross");
    let hashes = [first.hash(), second.hash()];
    assert_ne!(left.hash(), right.hash());
    assert!(!hashes.contains(&left.hash()));
    assert!(!hashes.contains(&right.hash()));
}

#[test]
fn variation_stream_is_shared_between_threads() {
    let genome = Arc::new(Genome::new("((a*b) + sqrt(a) + b)".parse().unwrap()));
    let claimed = Arc::new(Mutex::new(Vec::new()));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let genome = Arc::clone(&genome);
            let claimed = Arc::clone(&claimed);
            thread::spawn(move || {
                while let Some(variation) = genome.next_variation() {
                    claimed.lock().unwrap().push(variation);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let claimed = claimed.lock().unwrap();
    assert!(!claimed.is_empty());
    genome.restart_streams();
    let mut replay = Vec::new();
    while let Some(variation) = genome.next_variation() {
        replay.push(variation);
    }
    assert_eq!(replay.len(), claimed.len());
}

#[test]
fn lazy_sequence_materialises_on_demand() {
    let sequence = LazySequence::new(0..1_000_000u64);
    assert_eq!(sequence.next(), Some(0));
    assert_eq!(sequence.next(), Some(1));
    assert!(sequence.materialized() < 1_000);
    assert_eq!(sequence.get(10), Some(10));
    sequence.restart();
    assert_eq!(sequence.next(), Some(0));
}

#[test]
fn unregistered_copies_stay_editable() {
    let factory = factory();
    let genome = factory.register_gene("(a + b)".parse().unwrap()).unwrap();
    let mut copy = Genome::new(genome.root().clone());
    assert!(copy.modify(|root| root.set_multiple(2.0)).is_ok());
    assert!(matches!(
        factory.register_gene("(a + z)".parse().unwrap()),
        Err(EqforgeError::Contract(_))
    ));
}
