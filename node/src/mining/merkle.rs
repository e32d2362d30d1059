//! Merkle root computation: the pairing algorithm is in scope (the hash
//! function itself is a pure utility, reused from `emberchain_core`).

use emberchain_core::hash::sha256d;
use emberchain_core::TxId;

/// Combines a level of hashes into the next level up, duplicating the last
/// hash when the level has an odd count.
fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left);
    buf[32..].copy_from_slice(right);
    sha256d(&buf)
}

/// Root of the Merkle tree over `txids`, in order. Returns the zero hash for
/// an empty input (never valid for a real block, which always has a coinbase).
pub fn calculate_merkle_root(txids: &[TxId]) -> [u8; 32] {
    if txids.is_empty() {
        return [0u8; 32];
    }
    let mut level: Vec<[u8; 32]> = txids.iter().map(|t| *t.as_bytes()).collect();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        level = level
            .chunks(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
    }
    level[0]
}

/// One sibling hash plus whether it sits to the left of the accumulator at
/// that level, sufficient to recompute the root from a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MerkleProofStep {
    pub sibling: [u8; 32],
    pub sibling_is_left: bool,
}

pub fn generate_merkle_proof(txids: &[TxId], index: usize) -> Option<Vec<MerkleProofStep>> {
    if index >= txids.len() {
        return None;
    }
    let mut level: Vec<[u8; 32]> = txids.iter().map(|t| *t.as_bytes()).collect();
    let mut idx = index;
    let mut proof = Vec::new();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        let sibling_idx = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
        proof.push(MerkleProofStep {
            sibling: level[sibling_idx],
            sibling_is_left: idx % 2 == 1,
        });
        level = level
            .chunks(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
        idx /= 2;
    }
    Some(proof)
}

pub fn verify_merkle_proof(leaf: &TxId, proof: &[MerkleProofStep], root: &[u8; 32]) -> bool {
    let mut acc = *leaf.as_bytes();
    for step in proof {
        acc = if step.sibling_is_left {
            hash_pair(&step.sibling, &acc)
        } else {
            hash_pair(&acc, &step.sibling)
        };
    }
    acc == *root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txid(seed: u8) -> TxId {
        TxId::from_bytes([seed; 32])
    }

    #[test]
    fn single_leaf_root_is_the_leaf() {
        let t = txid(1);
        assert_eq!(calculate_merkle_root(&[t]), *t.as_bytes());
    }

    #[test]
    fn odd_count_duplicates_last_leaf() {
        let a = txid(1);
        let b = txid(2);
        let c = txid(3);
        let root_odd = calculate_merkle_root(&[a, b, c]);
        let root_padded = calculate_merkle_root(&[a, b, c, c]);
        assert_eq!(root_odd, root_padded);
    }

    #[test]
    fn root_changes_with_order() {
        let a = txid(1);
        let b = txid(2);
        assert_ne!(calculate_merkle_root(&[a, b]), calculate_merkle_root(&[b, a]));
    }

    #[test]
    fn proof_round_trips_for_every_leaf() {
        let txids: Vec<TxId> = (1u8..=5).map(txid).collect();
        let root = calculate_merkle_root(&txids);
        for (i, leaf) in txids.iter().enumerate() {
            let proof = generate_merkle_proof(&txids, i).unwrap();
            assert!(verify_merkle_proof(leaf, &proof, &root));
        }
    }

    #[test]
    fn proof_out_of_range_is_none() {
        let txids = vec![txid(1)];
        assert!(generate_merkle_proof(&txids, 5).is_none());
    }
}
