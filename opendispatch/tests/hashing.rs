//! Perfect hash properties over arbitrary identifier sets.

use opendispatch::vptr::hash::{FastPerfectHash, MinimalPerfectHash, TypeHash};
use opendispatch::TypeId;
use proptest::prelude::*;

fn ids(raw: std::collections::HashSet<u64>) -> Vec<TypeId> {
    raw.into_iter().map(TypeId::new).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn test_minimal_perfect_hash_is_a_bijection(raw in prop::collection::hash_set(any::<u64>(), 0..300)) {
        let ids = ids(raw);
        let mut hash = MinimalPerfectHash::default();
        let len = hash.initialize(&ids).unwrap();
        prop_assert_eq!(len, ids.len());

        let mut seen = vec![false; len];
        for id in &ids {
            let h = hash.hash(*id);
            prop_assert!(h < len);
            prop_assert!(!seen[h], "collision at {}", h);
            seen[h] = true;
        }
    }

    #[test]
    fn test_fast_perfect_hash_is_injective(raw in prop::collection::hash_set(any::<u64>(), 0..300)) {
        let ids = ids(raw);
        let mut hash = FastPerfectHash::default();
        let len = hash.initialize(&ids).unwrap();
        prop_assert!(len >= ids.len());

        let mut seen = vec![false; len];
        for id in &ids {
            let h = hash.hash(*id);
            prop_assert!(h < len);
            prop_assert!(!seen[h], "collision at {}", h);
            seen[h] = true;
        }
    }
}

#[test]
fn test_trivial_sets() {
    let mut hash = MinimalPerfectHash::default();
    assert_eq!(hash.initialize(&[]).unwrap(), 0);
    assert_eq!(hash.initialize(&[TypeId::new(99)]).unwrap(), 1);
    assert_eq!(hash.hash(TypeId::new(99)), 0);
}

#[test]
fn test_reinitialize_with_fewer_ids() {
    let mut hash = MinimalPerfectHash::default();
    let many: Vec<TypeId> = (0..100).map(|i| TypeId::from_name(&format!("unit::Class{i}"))).collect();
    assert_eq!(hash.initialize(&many).unwrap(), 100);
    assert_eq!(hash.initialize(&many[..10]).unwrap(), 10);
    for id in &many[..10] {
        assert!(hash.hash(*id) < 10);
    }
}
