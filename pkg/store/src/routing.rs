use core::hash::fnv1a_64;

/// Reserved document-id prefix (spec.md §6 "Reserved document field
/// names": "document IDs use a reserved prefix (`QN`)").
pub const RESERVED_ID_PREFIX: &str = "QN";

/// `(shard, shard_local_docid)` for a term under `N` shards (spec.md
/// §4.D "Multi-shard routing").
///
/// `term` is the full indexed term, e.g. `"QN123"` for a numeric-id
/// document or an ordinary content term otherwise.
pub fn route(term: &str, shard_count: u64) -> (u64, u64) {
    if let Some(rest) = term.strip_prefix(RESERVED_ID_PREFIX) {
        if let Ok(docid) = rest.parse::<u64>() {
            return route_by_docid(docid, shard_count);
        }
    }
    let shard = fnv1a_64(term.as_bytes()) % shard_count;
    (shard, 0)
}

/// `shard = (docid - 1) mod N`, `shard_local_docid = (docid - 1) div N + 1`
/// (spec.md §4.D, verified against seed test 1).
pub fn route_by_docid(docid: u64, shard_count: u64) -> (u64, u64) {
    let zero_based = docid - 1;
    (zero_based % shard_count, zero_based / shard_count + 1)
}

/// Inverse of [`route_by_docid`]: recovers the global docid from a shard
/// index and a shard-local docid (spec.md §4.D "Docid reconstruction",
/// spec.md §8 invariant "inverse recovery is exact").
pub fn global_docid(shard: u64, shard_local_docid: u64, shard_count: u64) -> u64 {
    (shard_local_docid - 1) * shard_count + shard + 1
}

/// Among `doccounts` (one entry per shard, indexed by shard number,
/// `None` for a shard with no endpoint currently on an active node),
/// picks the shard with the smallest doccount (spec.md §4.D
/// "Writable-shard picking for new documents").
pub fn pick_writable_shard(doccounts: &[Option<u64>]) -> Option<u64> {
    doccounts
        .iter()
        .enumerate()
        .filter_map(|(shard, count)| count.map(|c| (shard as u64, c)))
        .min_by_key(|&(_, count)| count)
        .map(|(shard, _)| shard)
}

/// Resolves a shard for a new document whose caller didn't pin a docid
/// (spec.md §4.D: "for term-routed inserts with the numeric-ID prefix but
/// `docid == 0`, generate candidate UUIDs until one hashes to a shard
/// currently on an active node"). `shard_is_active` reports whether a
/// shard number currently has an endpoint on an active node; `next_uuid`
/// yields a fresh candidate UUID (as its term-hashable string form) on
/// each call.
pub fn assign_new_document_shard(
    shard_count: u64,
    mut next_uuid: impl FnMut() -> String,
    shard_is_active: impl Fn(u64) -> bool,
) -> (u64, String) {
    loop {
        let candidate = next_uuid();
        let shard = fnv1a_64(candidate.as_bytes()) % shard_count;
        if shard_is_active(shard) {
            return (shard, candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_test_1_shard_routing() {
        // spec.md §8 seed test 1: N=4, global ids 1,2,5,10.
        let n = 4;
        assert_eq!(route_by_docid(1, n), (0, 1));
        assert_eq!(route_by_docid(2, n), (1, 1));
        assert_eq!(route_by_docid(5, n), (0, 2));
        assert_eq!(route_by_docid(10, n), (1, 3));
    }

    #[test]
    fn docid_reconstruction_is_exact() {
        let n = 4;
        for docid in 1..=50u64 {
            let (shard, local) = route_by_docid(docid, n);
            assert_eq!(global_docid(shard, local, n), docid);
        }
    }

    #[test]
    fn reserved_prefix_routes_by_docid_not_hash() {
        let n = 4;
        assert_eq!(route("QN5", n), route_by_docid(5, n));
    }

    #[test]
    fn ordinary_term_routes_by_hash() {
        let n = 4;
        let (shard, local) = route("some-content-term", n);
        assert!(shard < n);
        assert_eq!(local, 0, "term-routed inserts carry no shard-local docid of their own");
    }

    #[test]
    fn picks_the_shard_with_fewest_documents() {
        let counts = [Some(10), Some(3), None, Some(7)];
        assert_eq!(pick_writable_shard(&counts), Some(1));
    }

    #[test]
    fn no_active_shards_yields_none() {
        let counts: [Option<u64>; 2] = [None, None];
        assert_eq!(pick_writable_shard(&counts), None);
    }

    #[test]
    fn new_document_retries_until_an_active_shard_is_hit() {
        use std::cell::Cell;

        let candidates = ["aaa", "bbb", "ccc"];
        let mut calls = candidates.iter();
        let attempts = Cell::new(0u32);
        let (_, uuid) = assign_new_document_shard(
            4,
            || {
                attempts.set(attempts.get() + 1);
                calls.next().unwrap().to_string()
            },
            |_shard| attempts.get() >= 3,
        );
        assert_eq!(uuid, "ccc");
        assert_eq!(attempts.get(), 3);
    }
}
