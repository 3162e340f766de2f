use std::sync::Arc;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use proofdb_storage::{Database, Fork, ModificationTracker};
use proptest::prelude::*;

use crate::{
    hash::{branch_hash, leaf_hash},
    root_level, Error, HashCode, ListProof, ProofError, ProofListIndex, ProofListKey,
    StorageValue,
};

const LIST: &str = "list";

fn isolated_db() -> Database {
    Database::with_tracker(Arc::new(ModificationTracker::new()))
}

fn values(n: u64) -> Vec<u64> {
    (0..n).map(|i| i * 7 + 1).collect()
}

fn filled_fork(db: &Database, n: u64) -> Fork {
    let fork = db.fork();
    {
        let list = ProofListIndex::new(LIST, &fork);
        list.extend(values(n)).unwrap().expect("extend should succeed");
    }
    fork
}

/// Root computed from scratch, level by level.
fn reference_root(values: &[u64]) -> HashCode {
    let mut level: Vec<HashCode> = values.iter().map(|v| leaf_hash(&v.to_bytes())).collect();
    if level.is_empty() {
        return HashCode::zero();
    }
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => branch_hash(left, right),
                [orphan] => *orphan,
                _ => unreachable!(),
            })
            .collect();
    }
    level[0]
}

fn bytes_of(values: &[u64]) -> Vec<(u64, Vec<u8>)> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| (i as u64, v.to_bytes()))
        .collect()
}

#[test]
fn test_empty_list() {
    let db = isolated_db();
    let fork = db.fork();
    let list = ProofListIndex::<String>::new(LIST, &fork);

    assert_eq!(list.len().unwrap().unwrap(), 0);
    assert!(list.is_empty().unwrap().unwrap());
    assert_eq!(list.root_hash().unwrap().unwrap(), HashCode::zero());
    assert_eq!(list.last().unwrap().unwrap(), None);
    assert_matches!(
        list.get(0).unwrap(),
        Err(Error::IndexOutOfRange { index: 0, len: 0 })
    );
    assert_matches!(
        list.get_proof(0).unwrap(),
        Err(Error::IndexOutOfRange { index: 0, len: 0 })
    );

    let proof = list.get_range_proof(0, 0).unwrap().unwrap();
    assert_eq!(
        proof,
        ListProof {
            length: 0,
            entries: vec![],
            nodes: vec![],
        }
    );
    assert_eq!(proof.verify(&HashCode::zero()).unwrap(), vec![]);
}

#[test]
fn test_singleton_root_is_leaf_hash() {
    let db = isolated_db();
    let fork = db.fork();
    let list = ProofListIndex::<String>::new(LIST, &fork);
    list.push("V1".to_owned()).unwrap().unwrap();

    let root = list.root_hash().unwrap().unwrap();
    assert_eq!(root.bits(), 256);
    assert!(!root.is_zero());
    assert_eq!(root, HashCode::new(*blake3::hash(b"V1").as_bytes()));

    let proof = list.get_proof(0).unwrap().unwrap();
    assert!(proof.nodes.is_empty());
    assert_eq!(
        proof.verify_values::<String>(&root).unwrap(),
        vec![(0, "V1".to_owned())]
    );
    assert_eq!(list.get(0).unwrap().unwrap(), "V1");
}

#[test]
fn test_root_matches_reference() {
    let db = isolated_db();
    let fork = db.fork();
    let list = ProofListIndex::<u64>::new(LIST, &fork);
    let all = values(33);

    for (i, value) in all.iter().enumerate() {
        list.push(*value).unwrap().unwrap();
        assert_eq!(
            list.root_hash().unwrap().unwrap(),
            reference_root(&all[..=i]),
            "root mismatch for length {}",
            i + 1
        );
    }
    assert_eq!(list.len().unwrap().unwrap(), 33);
    assert_eq!(list.last().unwrap().unwrap(), Some(all[32]));
}

#[test]
fn test_get_out_of_range() {
    let db = isolated_db();
    let fork = filled_fork(&db, 3);
    let list = ProofListIndex::<u64>::new(LIST, &fork);

    assert_eq!(list.get(2).unwrap().unwrap(), values(3)[2]);
    assert_matches!(
        list.get(3).unwrap(),
        Err(Error::IndexOutOfRange { index: 3, len: 3 })
    );
    assert_matches!(
        list.get_proof(3).unwrap(),
        Err(e) if e.is_out_of_range()
    );
    assert_matches!(
        list.get_range_proof(2, 1).unwrap(),
        Err(Error::InvalidRange { from: 2, to: 1, len: 3 })
    );
    assert_matches!(
        list.get_range_proof(0, 4).unwrap(),
        Err(Error::InvalidRange { from: 0, to: 4, len: 3 })
    );
}

#[test]
fn test_every_index_proof_verifies() {
    let db = isolated_db();
    for n in 1..=17 {
        let fork = filled_fork(&db, n);
        let list = ProofListIndex::<u64>::new(LIST, &fork);
        let root = list.root_hash().unwrap().unwrap();

        for i in 0..n {
            let proof = list.get_proof(i).unwrap().unwrap();
            let proven = proof.verify_values::<u64>(&root).unwrap();
            assert_eq!(proven, vec![(i, list.get(i).unwrap().unwrap())]);
            assert!(proof.nodes.len() <= root_level(n) as usize);
        }
    }
}

#[test]
fn test_every_range_proof_verifies() {
    let db = isolated_db();
    for n in 0..=12 {
        let fork = filled_fork(&db, n);
        let list = ProofListIndex::<u64>::new(LIST, &fork);
        let root = list.root_hash().unwrap().unwrap();
        let expected = bytes_of(&values(n));

        for from in 0..=n {
            for to in from..=n {
                let proof = list.get_range_proof(from, to).unwrap().unwrap();
                let proven = proof.verify(&root).unwrap_or_else(|e| {
                    panic!("range [{}, {}) of {} failed: {}", from, to, n, e)
                });
                assert_eq!(proven, expected[from as usize..to as usize].to_vec());
            }
        }
    }
}

#[test]
fn test_range_proofs_for_five_elements() {
    let db = isolated_db();
    let fork = db.fork();
    let list = ProofListIndex::<String>::new(LIST, &fork);
    let elements: Vec<String> = (1..=5).map(|i| format!("V{}", i)).collect();
    list.extend(elements.clone()).unwrap().unwrap();
    let root = list.root_hash().unwrap().unwrap();

    let full = list.get_range_proof(0, 5).unwrap().unwrap();
    assert!(full.nodes.is_empty());
    let proven: Vec<String> = full
        .verify_values::<String>(&root)
        .unwrap()
        .into_iter()
        .map(|(_, v)| v)
        .collect();
    assert_eq!(proven, elements);

    let tail = list.get_range_proof(2, 5).unwrap().unwrap();
    assert_eq!(tail.nodes.len(), 1);
    assert_eq!(tail.nodes[0].0, ProofListKey::new(1, 0));
    let proven: Vec<String> = tail
        .verify_values::<String>(&root)
        .unwrap()
        .into_iter()
        .map(|(_, v)| v)
        .collect();
    assert_eq!(proven, elements[2..].to_vec());

    let first_half = list.get_range_proof(0, 2).unwrap().unwrap();
    assert_eq!(first_half.verify(&root).unwrap().len(), 2);
    let second_half = list.get_range_proof(2, 4).unwrap().unwrap();
    assert_eq!(second_half.verify(&root).unwrap().len(), 2);
}

#[test]
fn test_empty_range_proof_carries_root_only() {
    let db = isolated_db();
    let fork = filled_fork(&db, 6);
    let list = ProofListIndex::<u64>::new(LIST, &fork);
    let root = list.root_hash().unwrap().unwrap();

    let proof = list.get_range_proof(4, 4).unwrap().unwrap();
    assert!(proof.is_empty_range());
    assert_eq!(proof.nodes, vec![(ProofListKey::new(root_level(6), 0), root)]);
    assert_eq!(proof.verify(&root).unwrap(), vec![]);
}

#[test]
fn test_push_costs() {
    let db = isolated_db();
    let fork = db.fork();
    let list = ProofListIndex::<u64>::new(LIST, &fork);

    for k in 0u64..40 {
        let cost = list.push(k).cost;
        let new_len = k + 1;
        let levels = root_level(new_len) as u64;
        let max_hashes = u64::BITS - k.leading_zeros() + 1;

        assert!(u64::from(cost.hash_node_calls) <= u64::from(max_hashes));
        assert!(cost.hash_node_calls >= 1);
        // value + one node per level + length
        let written = (9 + 8) + (10 + 32) * (levels + 1) + (1 + 8);
        assert_eq!(cost.storage_written_bytes, written, "push #{}", k);
    }
}

#[test]
fn test_push_through_snapshot_fails() {
    let db = isolated_db();
    let snapshot = db.snapshot();
    let list = ProofListIndex::<u64>::new(LIST, &snapshot);

    assert_matches!(
        list.push(1).unwrap(),
        Err(Error::Storage(proofdb_storage::Error::ReadOnlyView(_)))
    );
    assert_matches!(
        list.clear().unwrap(),
        Err(Error::Storage(proofdb_storage::Error::ReadOnlyView(_)))
    );
}

#[test]
fn test_merged_list_readable_from_snapshot() {
    let db = isolated_db();
    let fork = filled_fork(&db, 9);
    let root = ProofListIndex::<u64>::new(LIST, &fork)
        .root_hash()
        .unwrap()
        .unwrap();

    let before = db.snapshot();
    db.merge(fork).unwrap().unwrap();
    let after = db.snapshot();

    let old = ProofListIndex::<u64>::new(LIST, &before);
    assert_eq!(old.len().unwrap().unwrap(), 0);
    assert_eq!(old.root_hash().unwrap().unwrap(), HashCode::zero());

    let new = ProofListIndex::<u64>::new(LIST, &after);
    assert_eq!(new.root_hash().unwrap().unwrap(), root);
    let proof = new.get_range_proof(3, 8).unwrap().unwrap();
    assert_eq!(proof.verify(&root).unwrap(), bytes_of(&values(9))[3..8].to_vec());
}

#[test]
fn test_clear_resets_list() {
    let db = isolated_db();
    let fork = filled_fork(&db, 5);
    let list = ProofListIndex::<u64>::new(LIST, &fork);

    list.clear().unwrap().unwrap();
    assert_eq!(list.len().unwrap().unwrap(), 0);
    assert_eq!(list.root_hash().unwrap().unwrap(), HashCode::zero());

    list.push(values(1)[0]).unwrap().unwrap();
    assert_eq!(list.root_hash().unwrap().unwrap(), reference_root(&values(1)));
}

#[test]
fn test_iter() {
    let db = isolated_db();
    let fork = filled_fork(&db, 6);
    let list = ProofListIndex::<u64>::new(LIST, &fork);

    let all: Vec<u64> = list.iter().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(all, values(6));

    let tail: Vec<u64> = list
        .iter_from(4)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(tail, values(6)[4..].to_vec());

    assert_eq!(list.iter_from(6).unwrap().count(), 0);
    assert_matches!(list.iter_from(7), Err(Error::InvalidRange { from: 7, .. }));

    let mut iter = list.iter().unwrap();
    iter.next().unwrap().unwrap();
    assert!(iter.cost().seek_count > 0);
}

#[test]
fn test_iter_detects_modification() {
    let db = isolated_db();
    let fork = filled_fork(&db, 4);
    let list = ProofListIndex::<u64>::new(LIST, &fork);

    let mut iter = list.iter().unwrap();
    assert_eq!(iter.next().unwrap().unwrap(), values(4)[0]);

    list.push(100).unwrap().unwrap();

    assert_matches!(
        iter.next(),
        Some(Err(Error::Storage(proofdb_storage::Error::StaleGeneration { .. })))
    );
    assert!(iter.next().is_none());
}

#[test]
fn test_readonly_iter_detects_write_through_fork() {
    let db = isolated_db();
    let fork = filled_fork(&db, 4);
    let readonly = fork.readonly().unwrap();
    let list = ProofListIndex::<u64>::new(LIST, &readonly);

    let mut iter = list.iter().unwrap();
    assert_eq!(iter.next().unwrap().unwrap(), values(4)[0]);

    ProofListIndex::<u64>::new(LIST, &fork).clear().unwrap().unwrap();

    assert_matches!(
        iter.next(),
        Some(Err(Error::Storage(proofdb_storage::Error::StaleGeneration { .. })))
    );
    assert!(iter.next().is_none());
}

#[test]
fn test_iter_after_dispose() {
    let db = isolated_db();
    let fork = filled_fork(&db, 2);
    let list = ProofListIndex::<u64>::new(LIST, &fork);
    let mut iter = list.iter().unwrap();

    fork.dispose().unwrap();

    assert_matches!(
        iter.next(),
        Some(Err(Error::Storage(proofdb_storage::Error::UseAfterDispose(_))))
    );
    assert_matches!(
        list.len().unwrap(),
        Err(Error::Storage(proofdb_storage::Error::UseAfterDispose(_)))
    );
}

fn proof_of_five(from: u64, to: u64) -> (ListProof, HashCode) {
    let db = isolated_db();
    let fork = filled_fork(&db, 5);
    let list = ProofListIndex::<u64>::new(LIST, &fork);
    (
        list.get_range_proof(from, to).unwrap().unwrap(),
        list.root_hash().unwrap().unwrap(),
    )
}

#[test]
fn test_tampered_value_rejected() {
    let (mut proof, root) = proof_of_five(1, 3);
    proof.entries[0].1 = 999u64.to_bytes();
    assert_matches!(proof.verify(&root), Err(ProofError::RootHashMismatch { expected, .. }) if expected == root);
}

#[test]
fn test_wrong_root_rejected() {
    let (proof, _) = proof_of_five(0, 5);
    assert_matches!(
        proof.verify(&HashCode::new([1; 32])),
        Err(ProofError::RootHashMismatch { .. })
    );
}

#[test]
fn test_missing_node_rejected() {
    let (mut proof, root) = proof_of_five(1, 2);
    assert!(!proof.nodes.is_empty());
    proof.nodes.pop();
    assert_matches!(proof.verify(&root), Err(ProofError::Malformed(_)));
}

#[test]
fn test_unused_node_rejected() {
    let (mut proof, root) = proof_of_five(0, 5);
    proof.nodes.push((ProofListKey::new(0, 1), HashCode::zero()));
    assert_matches!(proof.verify(&root), Err(ProofError::Malformed(_)));
}

#[test]
fn test_duplicate_node_rejected() {
    let (mut proof, root) = proof_of_five(1, 2);
    let node = proof.nodes[0];
    proof.nodes.push(node);
    assert_matches!(proof.verify(&root), Err(ProofError::Malformed(_)));
}

#[test]
fn test_node_outside_list_rejected() {
    let (mut proof, root) = proof_of_five(0, 5);
    proof.nodes.push((ProofListKey::new(9, 0), root));
    assert_matches!(proof.verify(&root), Err(ProofError::Malformed(_)));
}

#[test]
fn test_non_contiguous_entries_rejected() {
    let (mut proof, root) = proof_of_five(0, 3);
    proof.entries.remove(1);
    assert_matches!(proof.verify(&root), Err(ProofError::Malformed(_)));

    let (mut proof, root) = proof_of_five(0, 3);
    proof.entries.swap(0, 1);
    assert_matches!(proof.verify(&root), Err(ProofError::Malformed(_)));

    let (mut proof, root) = proof_of_five(0, 3);
    let duplicate = proof.entries[2].clone();
    proof.entries.push(duplicate);
    assert_matches!(proof.verify(&root), Err(ProofError::Malformed(_)));
}

#[test]
fn test_entries_beyond_length_rejected() {
    let (mut proof, root) = proof_of_five(3, 5);
    proof.entries.push((5, 0u64.to_bytes()));
    assert_matches!(proof.verify(&root), Err(ProofError::Malformed(_)));

    let (mut proof, root) = proof_of_five(0, 5);
    proof.length = 4;
    assert!(proof.verify(&root).is_err());
}

#[test]
fn test_malformed_empty_proofs_rejected() {
    let (mut proof, root) = proof_of_five(2, 2);
    proof.nodes.push((ProofListKey::new(0, 0), root));
    assert_matches!(proof.verify(&root), Err(ProofError::Malformed(_)));

    let (mut proof, root) = proof_of_five(2, 2);
    proof.nodes.clear();
    assert_matches!(proof.verify(&root), Err(ProofError::Malformed(_)));

    let bogus = ListProof {
        length: 0,
        entries: vec![(0, vec![1])],
        nodes: vec![],
    };
    assert_matches!(bogus.verify(&HashCode::zero()), Err(ProofError::Malformed(_)));
}

#[test]
fn test_verify_is_idempotent() {
    let (proof, root) = proof_of_five(1, 4);
    let first = proof.verify(&root);
    let second = proof.verify(&root);
    assert_eq!(first, second);
    assert!(first.is_ok());
}

#[test]
fn test_proof_encoding() {
    let (proof, root) = proof_of_five(1, 4);
    let bytes = proof.encode_to_vec().unwrap();
    let decoded = ListProof::decode_from_slice(&bytes).unwrap();
    assert_eq!(decoded, proof);
    assert!(decoded.verify(&root).is_ok());

    let mut trailing = bytes.clone();
    trailing.push(0);
    assert_matches!(ListProof::decode_from_slice(&trailing), Err(ProofError::Decode(_)));
    assert_matches!(
        ListProof::decode_from_slice(&bytes[..bytes.len() - 1]),
        Err(ProofError::Decode(_))
    );
}

#[test]
fn test_verify_values_reports_decode_errors() {
    let (proof, root) = proof_of_five(0, 1);
    // u64 values are 8 bytes, not valid hashes
    assert_matches!(
        proof.verify_values::<HashCode>(&root),
        Err(ProofError::Decode(_))
    );
}

#[test]
fn test_branch_presented_as_element_fails_typed_verification() {
    let db = isolated_db();
    let fork = filled_fork(&db, 4);
    let list = ProofListIndex::<u64>::new(LIST, &fork);
    let root = list.root_hash().unwrap().unwrap();
    let leaves: Vec<HashCode> = values(4).iter().map(|v| leaf_hash(&v.to_bytes())).collect();

    // children of node (1, 1) passed off as the last element of a 3-element list
    let mut blob = leaves[2].as_bytes().to_vec();
    blob.extend_from_slice(leaves[3].as_bytes());
    let forged = ListProof {
        length: 3,
        entries: vec![(2, blob)],
        nodes: vec![(ProofListKey::new(1, 0), branch_hash(&leaves[0], &leaves[1]))],
    };

    assert_eq!(forged.verify(&root).unwrap().len(), 1);
    assert_matches!(forged.verify_values::<u64>(&root), Err(ProofError::Decode(_)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_random_range_verifies(n in 1u64..80, a in any::<u64>(), b in any::<u64>()) {
        let db = isolated_db();
        let fork = filled_fork(&db, n);
        let list = ProofListIndex::<u64>::new(LIST, &fork);
        let root = list.root_hash().unwrap().unwrap();

        let (from, to) = {
            let (x, y) = (a % (n + 1), b % (n + 1));
            (x.min(y), x.max(y))
        };
        let proof = list.get_range_proof(from, to).unwrap().unwrap();
        let proven = proof.verify(&root).unwrap();
        prop_assert_eq!(proven, bytes_of(&values(n))[from as usize..to as usize].to_vec());
        prop_assert_eq!(root, reference_root(&values(n)));
    }
}
