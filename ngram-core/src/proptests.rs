use super::*;

use ngram_types::{Strategy as Split, TrieConfig};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Reference matcher: tries every live ngram at every word start.
fn naive_evaluate(live: &BTreeSet<Vec<u8>>, doc: &[u8]) -> Vec<u8> {
    let mut hits: Vec<(usize, usize, &[u8])> = Vec::new();
    for start in 0..doc.len() {
        let word_start = doc[start] != b' ' && (start == 0 || doc[start - 1] == b' ');
        if !word_start {
            continue;
        }
        for g in live {
            let end = start + g.len();
            if g.is_empty() || !doc[start..].starts_with(g) {
                continue;
            }
            if end == doc.len() || doc[end] == b' ' {
                hits.push((start, end, g.as_slice()));
            }
        }
    }
    hits.sort();

    let mut seen: BTreeSet<&[u8]> = BTreeSet::new();
    let mut parts: Vec<&[u8]> = Vec::new();
    for (_, _, g) in hits {
        if seen.insert(g) {
            parts.push(g);
        }
    }
    if parts.is_empty() {
        b"-1".to_vec()
    } else {
        parts.join(&b'|')
    }
}

#[derive(Clone, Debug)]
enum Op {
    Add(Vec<u8>),
    Delete(Vec<u8>),
    Query(Vec<u8>),
}

/// Few letters: shared prefixes and word boundaries are common.
const NARROW: &[u8] = b"abc ";

/// Enough distinct bytes below one node to push it past medium fan-out.
const WIDE: &[u8] = b"abcdefghijklmnopqrstuvw   ";

fn text_strategy(max: usize) -> impl Strategy<Value = Vec<u8>> + Clone {
    alphabet_text(NARROW, max)
}

fn alphabet_text(alphabet: &'static [u8], max: usize) -> impl Strategy<Value = Vec<u8>> + Clone {
    prop::collection::vec(prop::sample::select(alphabet), 0..=max)
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    ops_over(NARROW)
}

fn ops_over(alphabet: &'static [u8]) -> impl Strategy<Value = Vec<Op>> {
    let ngram = alphabet_text(alphabet, 8);
    let op = prop_oneof![
        45 => ngram.clone().prop_map(Op::Add),
        20 => ngram.prop_map(Op::Delete),
        35 => alphabet_text(alphabet, 24).prop_map(Op::Query),
    ];
    prop::collection::vec(op, 0..=300)
}

fn check_against_reference(ops: &[Op], config: TrieConfig, shards: usize) -> Result<(), TestCaseError> {
    let mut index = NgramIndex::with_shards(config, shards);
    let mut live: BTreeSet<Vec<u8>> = BTreeSet::new();

    for op in ops {
        match op {
            Op::Add(g) => {
                index.add(g).expect("should add");
                live.insert(g.clone());
            }
            Op::Delete(g) => {
                prop_assert_eq!(index.delete(g), live.remove(g));
            }
            Op::Query(doc) => {
                prop_assert_eq!(query::evaluate(&index, doc), naive_evaluate(&live, doc));
            }
        }
        prop_assert_eq!(index.len(), live.len());
    }

    for g in &live {
        prop_assert!(index.contains(g));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 20_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_matches_reference(ops in ops_strategy()) {
        check_against_reference(&ops, TrieConfig::default(), 1)?;
    }

    #[test]
    fn prop_overflow_matches_reference(ops in ops_strategy(), depth in 0usize..6) {
        check_against_reference(&ops, TrieConfig::with_overflow(depth), 1)?;
    }

    #[test]
    fn prop_shards_match_reference(ops in ops_strategy(), shards in 1usize..5) {
        check_against_reference(&ops, TrieConfig::default(), shards)?;
    }

    #[test]
    fn prop_wide_alphabet_matches_reference(ops in ops_over(WIDE), depth in prop::option::of(0usize..6)) {
        let config = TrieConfig { overflow_depth: depth, ..TrieConfig::default() };
        check_against_reference(&ops, config, 1)?;
    }

    #[test]
    fn prop_wide_alphabet_shards_match_reference(ops in ops_over(WIDE), shards in 2usize..5) {
        check_against_reference(&ops, TrieConfig::default(), shards)?;
    }

    // Handles may move on a second pass when a shorter key splits the suffix
    // leaf of a longer one.
    #[test]
    fn prop_insert_is_idempotent(
        ngrams in prop::collection::vec(text_strategy(10), 0..50),
        docs in prop::collection::vec(text_strategy(24), 0..10),
    ) {
        let mut index = NgramIndex::new();
        for g in &ngrams {
            index.add(g).expect("should add");
        }
        let len = index.len();
        let before: Vec<_> = docs.iter().map(|d| query::evaluate(&index, d)).collect();

        for g in &ngrams {
            let node = index.add(g).expect("should add");
            prop_assert_eq!(index.shard(0).search_exact(g), Some(node));
            prop_assert!(index.contains(g));
        }
        prop_assert_eq!(index.len(), len);

        let after: Vec<_> = docs.iter().map(|d| query::evaluate(&index, d)).collect();
        prop_assert_eq!(after, before);
    }

    #[test]
    fn prop_exact_containment(g in text_strategy(10), tail in text_strategy(10)) {
        prop_assume!(!g.is_empty() && g[0] != b' ' && g[g.len() - 1] != b' ');
        let mut index = NgramIndex::new();
        index.add(&g).expect("should add");

        prop_assert_eq!(query::evaluate(&index, &g), g.clone());

        let mut doc = g.clone();
        doc.push(b' ');
        doc.extend_from_slice(&tail);
        let line = query::evaluate(&index, &doc);
        prop_assert!(line.split(|&b| b == b'|').any(|part| part == g.as_slice()));
    }

    #[test]
    fn prop_strategies_agree(
        ngrams in prop::collection::vec(text_strategy(8), 0..40),
        docs in prop::collection::vec(text_strategy(24), 0..20),
        threads in 1usize..5,
    ) {
        let reference = {
            let config = DispatchConfig::sequential();
            let mut index = NgramIndex::new();
            for g in &ngrams {
                index.add(g).expect("should add");
            }
            Dispatcher::new(config).expect("pool").evaluate_segment(&index, &docs)
        };

        for strategy in [Split::Queries, Split::Positions, Split::Shards] {
            let config = DispatchConfig { strategy, threads };
            let mut index = NgramIndex::with_shards(TrieConfig::default(), config.shards());
            for g in &ngrams {
                index.add(g).expect("should add");
            }
            let got = Dispatcher::new(config).expect("pool").evaluate_segment(&index, &docs);
            prop_assert_eq!(&got, &reference);
        }
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_insert_order_small_set() {
    let ngrams: Vec<&[u8]> = vec![b"a", b"a b", b"ab", b"a bc", b"b", b"abc"];
    let docs: [&[u8]; 4] = [b"a bc abc", b"ab a b", b"abc a", b"b a bc"];
    let live: BTreeSet<Vec<u8>> = ngrams.iter().map(|g| g.to_vec()).collect();

    for_each_permutation(&ngrams, |perm| {
        let mut index = NgramIndex::new();
        for g in &perm {
            index.add(g).expect("should add");
        }
        assert_eq!(index.len(), ngrams.len());
        for doc in docs {
            assert_eq!(query::evaluate(&index, doc), naive_evaluate(&live, doc), "{perm:?}");
        }
    });
}

#[test]
fn exhaustive_delete_order_small_set() {
    let ngrams: Vec<&[u8]> = vec![b"x", b"x y", b"x yz", b"xy", b"y"];
    let doc: &[u8] = b"x yz xy x y";

    for_each_permutation(&ngrams, |perm| {
        let mut index = NgramIndex::new();
        let mut live: BTreeSet<Vec<u8>> = BTreeSet::new();
        for g in &ngrams {
            index.add(g).expect("should add");
            live.insert(g.to_vec());
        }
        for g in perm {
            assert!(index.delete(g));
            live.remove(g);
            assert_eq!(index.len(), live.len());
            assert_eq!(query::evaluate(&index, doc), naive_evaluate(&live, doc));
        }
    });
}
