/// Tests for criterion-based pool selection and follow-chains
use examgen::exam::Answer;
use examgen::pool::{candidates, choose_from_pool, Pool, SelectError, SelectionOrder, Selector};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn item(name: &str) -> Answer {
    Answer {
        name: name.to_string(),
        correct: false,
        text: String::new(),
        before: Selector::None,
        after: Selector::None,
        follows: None,
    }
}

fn dependent(name: &str, anchor: &str) -> Answer {
    Answer {
        follows: Some(anchor.to_string()),
        ..item(name)
    }
}

fn pool(items: Vec<Answer>) -> Pool<Answer> {
    let mut pool = Pool::new();
    for entry in items {
        pool.insert(entry).unwrap();
    }
    pool
}

#[test]
fn test_chosen_never_exceeds_count_and_stays_in_pool() {
    let pool = pool(vec![
        item("mechanics-1"),
        item("mechanics-2"),
        item("optics-1"),
        item("optics-2"),
        item("optics-3"),
    ]);
    for seed in 0..50 {
        let mut rng = StdRng::seed_from_u64(seed);
        for limit in 0..=6 {
            let chosen = choose_from_pool(
                &pool,
                &Selector::All,
                limit,
                SelectionOrder::Shuffled,
                &mut rng,
            )
            .unwrap();
            assert!(chosen.len() <= limit);
            for name in &chosen {
                assert!(pool.contains(name));
            }
        }
    }
}

#[test]
fn test_none_selects_nothing() {
    let pool = pool(vec![item("a"), item("b")]);
    assert!(candidates(&Selector::None, &pool).unwrap().is_empty());
}

#[test]
fn test_pattern_selection_matches_whole_names() {
    let pool = pool(vec![item("optics-1"), item("optics-12"), item("waves-1")]);
    let chosen = candidates(&Selector::Pattern("optics-1".to_string()), &pool).unwrap();
    assert_eq!(chosen, vec!["optics-1"]);
    let chosen = candidates(&Selector::Pattern("optics-.*".to_string()), &pool).unwrap();
    assert_eq!(chosen, vec!["optics-1", "optics-12"]);
}

#[test]
fn test_pattern_list_union_keeps_first_occurrence() {
    let pool = pool(vec![item("a-1"), item("b-1"), item("b-2")]);
    let selector = Selector::Patterns(vec!["b-.*".to_string(), ".*-1".to_string()]);
    assert_eq!(
        candidates(&selector, &pool).unwrap(),
        vec!["b-1", "b-2", "a-1"]
    );
}

#[test]
fn test_followers_are_never_direct_candidates() {
    let pool = pool(vec![item("base"), dependent("extra", "base")]);
    for selector in [
        Selector::All,
        Selector::Pattern(".*".to_string()),
        Selector::Patterns(vec!["extra".to_string()]),
    ] {
        let chosen = candidates(&selector, &pool).unwrap();
        assert!(!chosen.contains(&"extra".to_string()), "{:?}", selector);
    }
}

#[test]
fn test_follower_always_arrives_with_anchor() {
    let pool = pool(vec![
        item("base"),
        dependent("extra", "base"),
        item("other-1"),
        item("other-2"),
    ]);
    for seed in 0..50 {
        let mut rng = StdRng::seed_from_u64(seed);
        let chosen =
            choose_from_pool(&pool, &Selector::All, 3, SelectionOrder::Shuffled, &mut rng).unwrap();
        if let Some(pos) = chosen.iter().position(|n| n == "extra") {
            assert!(pos > 0 && chosen[pos - 1] == "base", "{:?}", chosen);
        }
    }
}

#[test]
fn test_chain_that_cannot_fit_is_skipped_entirely() {
    let pool = pool(vec![
        item("base"),
        dependent("extra-1", "base"),
        dependent("extra-2", "extra-1"),
        item("single"),
    ]);
    for seed in 0..50 {
        let mut rng = StdRng::seed_from_u64(seed);
        let chosen =
            choose_from_pool(&pool, &Selector::All, 2, SelectionOrder::Shuffled, &mut rng).unwrap();
        // The three-item chain never fits a budget of two; no partial
        // chains may appear.
        assert_eq!(chosen, vec!["single"]);
    }
}

#[test]
fn test_invalid_regex_reports_the_pattern() {
    let pool = pool(vec![item("a")]);
    match candidates(&Selector::Pattern("[unclosed".to_string()), &pool) {
        Err(SelectError::InvalidPattern { pattern, .. }) => assert_eq!(pattern, "[unclosed"),
        other => panic!("expected invalid pattern, got {:?}", other),
    }
}

#[test]
fn test_declared_order_selection_is_deterministic() {
    let pool = pool(vec![item("z"), item("m"), item("a")]);
    let mut rng = StdRng::seed_from_u64(99);
    let chosen = choose_from_pool(
        &pool,
        &Selector::All,
        usize::MAX,
        SelectionOrder::Declared,
        &mut rng,
    )
    .unwrap();
    assert_eq!(chosen, vec!["z", "m", "a"]);
}
