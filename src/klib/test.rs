//! Testes da Biblioteca de Base (klib)
//!
//! Arena geracional, mapa de prioridades e o placar do framework de self
//! tests.

use super::arena::{Arena, Handle};
use super::bitmap::{PrioMap, PRIO_LEVELS};
use super::test_framework::{run_test_suite, TestCase, TestResult};

// =============================================================================
// ARENA
// =============================================================================

#[test]
fn stale_handle_never_reaches_new_tenant() {
    let mut arena = Arena::new();
    let first = arena.insert("primeiro").unwrap();
    assert!(first.is_valid());
    assert_eq!(arena.remove(first), Some("primeiro"));

    let second = arena.insert("segundo").unwrap();
    assert_eq!(second.index(), first.index());
    assert_ne!(second.generation(), first.generation());
    assert_eq!(arena.get(first), None);
    assert_eq!(arena.get(second), Some(&"segundo"));
    assert_eq!(arena.remove(first), None);
    assert_eq!(arena.len(), 1);
}

#[test]
fn exhausted_slot_is_retired() {
    let mut arena = Arena::new();
    let mut h = arena.insert(0u32).unwrap();
    while h.generation() < u16::MAX {
        arena.remove(h);
        h = arena.insert(h.generation() as u32).unwrap();
        assert_eq!(h.index(), 0);
    }

    // Geração esgotada: o slot 0 não volta a ser usado
    assert_eq!(arena.remove(h), Some(u16::MAX as u32 - 1));
    let next = arena.insert(7).unwrap();
    assert_eq!(next.index(), 1);
    assert_eq!(next.generation(), 1);
    assert_eq!(arena.get(h), None);
    assert_eq!(arena.len(), 1);
}

#[test]
fn insert_with_sees_its_own_handle() {
    let mut arena: Arena<Handle> = Arena::new();
    let h = arena.insert_with(|h| h).unwrap();
    assert_eq!(arena.get(h), Some(&h));
    assert!(!Handle::INVALID.is_valid());
    assert!(!arena.contains(Handle::INVALID));
    assert_eq!(Handle::from_u32(h.as_u32()), h);
}

#[test]
fn iteration_skips_free_slots() {
    let mut arena = Arena::new();
    let handles: alloc::vec::Vec<Handle> = (0..4).map(|i| arena.insert(i).unwrap()).collect();
    arena.remove(handles[1]);
    arena.remove(handles[2]);

    let live: alloc::vec::Vec<i32> = arena.iter().map(|(_, v)| *v).collect();
    assert_eq!(live, [0, 3]);
    for (_, v) in arena.iter_mut() {
        *v *= 10;
    }
    assert_eq!(arena.get(handles[3]), Some(&30));
}

// =============================================================================
// MAPA DE PRIORIDADES
// =============================================================================

#[test]
fn prio_map_tracks_highest_level() {
    let mut map = PrioMap::new();
    assert!(map.is_empty());
    assert_eq!(map.highest(), None);

    map.set(3);
    map.set(200);
    map.set(PRIO_LEVELS - 1);
    assert_eq!(map.highest(), Some(PRIO_LEVELS - 1));

    map.clear(PRIO_LEVELS - 1);
    assert_eq!(map.highest(), Some(200));
    assert!(map.test(3));
    assert!(!map.test(4));

    map.clear(200);
    map.clear(3);
    assert!(map.is_empty());
}

// =============================================================================
// FRAMEWORK DE SELF TESTS
// =============================================================================

fn passes() -> TestResult {
    TestResult::Passed
}

fn fails() -> TestResult {
    TestResult::Failed
}

fn skips() -> TestResult {
    TestResult::Skipped
}

#[test]
fn suite_report_counts_each_outcome() {
    let cases = [
        TestCase::new("a", passes),
        TestCase::new("b", passes),
        TestCase::new("c", fails),
        TestCase::new("d", skips),
    ];
    let mut report = run_test_suite("klib", &cases);
    assert_eq!((report.passed, report.failed, report.skipped), (2, 1, 1));
    assert!(!report.ok());

    report.merge(run_test_suite("vazia", &[]));
    assert_eq!(report.passed, 2);
}
