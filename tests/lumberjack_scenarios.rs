//! End-to-end aggregation on simulated worlds: every rank is a thread running
//! the same code against a `LocalComm`.

use bytes::Bytes;
use lumberjack::prelude::*;
use lumberjack::PackError;
use lumberjack::lumberjack::INTERNAL_TAG;
use proptest::prelude::*;

fn tree(comm: LocalComm, limit: usize) -> Lumberjack {
    Lumberjack::new(Box::new(BinaryTreeCommunicator::new(comm, limit)), limit)
}

fn summary(lj: &Lumberjack) -> Vec<(String, usize, Vec<usize>)> {
    lj.messages()
        .iter()
        .map(|m| (m.text().to_owned(), m.rank_count(), m.ranks().to_vec()))
        .collect()
}

#[test]
fn e1_single_rank_coalesces() {
    let mut lj = Lumberjack::new(Topology::BinaryTree.build(NoComm, 5), 5);
    lj.enqueue("A");
    lj.enqueue("A");
    lj.enqueue("B");
    lj.push_fully().unwrap();
    assert_eq!(
        summary(&lj),
        vec![("A".into(), 2, vec![0]), ("B".into(), 1, vec![0])]
    );
}

#[test]
fn e2_two_ranks() {
    let out = LocalComm::run(2, |comm| {
        let rank = comm.rank();
        let mut lj = tree(comm, 5);
        lj.enqueue("X");
        if rank == 1 {
            lj.enqueue("Y");
        }
        lj.push_fully().unwrap();
        summary(&lj)
    });
    assert_eq!(
        out[0],
        vec![("X".into(), 2, vec![0, 1]), ("Y".into(), 1, vec![1])]
    );
    assert!(out[1].is_empty());
}

#[test]
fn e3_rank_cap() {
    let out = LocalComm::run(4, |comm| {
        let mut lj = tree(comm, 2);
        lj.enqueue("Z");
        lj.push_fully().unwrap();
        summary(&lj)
    });
    assert_eq!(out[0].len(), 1);
    let (text, count, ranks) = &out[0][0];
    assert_eq!(text, "Z");
    assert_eq!(*count, 4);
    assert_eq!(ranks.len(), 2);
}

#[test]
fn e4_corrupt_pack_is_dropped_and_reported() {
    let out = LocalComm::run(3, |comm| {
        let rank = comm.rank();
        if rank == 1 {
            // Hand-rolled round: a header that promises more than it carries.
            let mut pack = Vec::new();
            pack.extend_from_slice(&1u16.to_le_bytes());
            pack.extend_from_slice(&0u16.to_le_bytes());
            pack.extend_from_slice(&1u32.to_le_bytes());
            pack.extend_from_slice(&64u32.to_le_bytes());
            pack.extend_from_slice(&64u32.to_le_bytes());
            pack.extend_from_slice(b"short");
            comm.barrier().unwrap();
            comm.isend(0, CommTag::LUMBERJACK_PUSH, Bytes::from(pack))
                .unwrap()
                .wait()
                .unwrap();
            comm.barrier().unwrap();
            return Vec::new();
        }
        let mut lj = Lumberjack::new(Box::new(RootCommunicator::new(comm, 5)), 5);
        lj.enqueue_message("still delivered", "", 0, Level::Info, "");
        lj.push_fully().unwrap();
        lj.messages().to_vec()
    });
    let root = &out[0];
    assert_eq!(root.len(), 2);
    let warning = root.iter().find(|m| m.tag() == INTERNAL_TAG).unwrap();
    assert_eq!(warning.level(), Level::Warning);
    let good = root.iter().find(|m| m.text() == "still delivered").unwrap();
    assert_eq!(good.rank_count(), 2);
    assert_eq!(good.ranks(), &[0, 2]);
}

/// A pack for one "dup" message that claims rank 1 twice. Framing, header
/// and lengths are all consistent; only the rank data is impossible.
fn duplicate_rank_pack() -> Vec<u8> {
    let mut pack = lumberjack::wire::encode_messages(&[Message::from_text("dup", 1)]).to_vec();
    let bump = |bytes: &mut [u8]| {
        let v = u32::from_le_bytes(bytes.try_into().unwrap()) + 4;
        bytes.copy_from_slice(&v.to_le_bytes());
    };
    bump(&mut pack[8..12]);
    bump(&mut pack[12..16]);
    let fixed_at = pack.len() - 24 - 4;
    pack[fixed_at + 8..fixed_at + 16].copy_from_slice(&2u64.to_le_bytes());
    pack[fixed_at + 16..fixed_at + 20].copy_from_slice(&2u32.to_le_bytes());
    pack.extend_from_slice(&1u32.to_le_bytes());
    pack
}

#[test]
fn duplicate_ranks_in_a_pack_are_dropped_and_reported() {
    assert!(matches!(
        lumberjack::wire::decode_messages(&duplicate_rank_pack()),
        Err(PackError::InconsistentRanks { count: 2, tracked: 2 })
    ));
    let out = LocalComm::run(2, |comm| {
        if comm.rank() == 1 {
            comm.barrier().unwrap();
            comm.isend(0, CommTag::LUMBERJACK_PUSH, Bytes::from(duplicate_rank_pack()))
                .unwrap()
                .wait()
                .unwrap();
            comm.barrier().unwrap();
            return Vec::new();
        }
        let mut lj = Lumberjack::new(Box::new(RootCommunicator::new(comm, 5)), 5);
        lj.enqueue("dup");
        lj.push_fully().unwrap();
        lj.messages().to_vec()
    });
    let root = &out[0];
    assert_eq!(root.len(), 2);
    assert!(root.iter().any(|m| m.tag() == INTERNAL_TAG && m.level() == Level::Warning));
    let local = root.iter().find(|m| m.text() == "dup").unwrap();
    assert_eq!((local.rank_count(), local.ranks()), (1, &[0usize][..]));
}

#[test]
fn e6_root_gather_eight_ranks() {
    let out = LocalComm::run(8, |comm| {
        let rank = comm.rank();
        let mut lj = Lumberjack::new(Topology::Root.build(comm, 8), 8);
        assert_eq!(lj.is_output_node(), rank == 0);
        lj.enqueue("shared");
        lj.enqueue(format!("rank {rank}"));
        lj.push_fully().unwrap();
        summary(&lj)
    });
    let root = &out[0];
    assert_eq!(root.len(), 9);
    assert_eq!(root[0].0, "shared");
    assert_eq!(root[0].1, 8);
    let mut ranks = root[0].2.clone();
    ranks.sort_unstable();
    assert_eq!(ranks, (0..8).collect::<Vec<_>>());
    assert!(out[1..].iter().all(Vec::is_empty));
}

#[test]
fn flush_on_empty_state_is_a_no_op() {
    let out = LocalComm::run(5, |comm| {
        let mut lj = tree(comm, 5);
        lj.push_fully().unwrap();
        lj.push_fully().unwrap();
        lj.messages().len()
    });
    assert!(out.iter().all(|&n| n == 0));
}

#[test]
fn tree_needs_every_round() {
    // Rank 6 sits at depth 2 of a 7-rank tree: two pushes, not one.
    let out = LocalComm::run(7, |comm| {
        let rank = comm.rank();
        let mut lj = tree(comm, 5);
        assert_eq!(lj.is_output_node(), rank == 0);
        if rank == 6 {
            lj.enqueue("deep");
        }
        lj.push_once().unwrap();
        let after_one = lj.messages().len();
        lj.push_once().unwrap();
        (after_one, summary(&lj))
    });
    assert_eq!(out[0].0, 0);
    assert_eq!(out[0].1, vec![("deep".into(), 1, vec![6])]);
    assert_eq!(out[2].0, 1);
    assert!(out[2].1.is_empty());
}

#[test]
fn empty_combiner_list_loses_nothing() {
    let out = LocalComm::run(4, |comm| {
        let mut lj = tree(comm, 5);
        lj.clear_combiners();
        lj.enqueue("dup");
        lj.enqueue("dup");
        lj.push_fully().unwrap();
        lj.messages().len()
    });
    assert_eq!(out, vec![8, 0, 0, 0]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn coalescing_is_sound(
        size in 1usize..7,
        limit in 1usize..4,
        picks in prop::collection::vec(prop::collection::vec(0u8..4, 0..6), 7),
    ) {
        let per_rank = picks.clone();
        let out = LocalComm::run(size, move |comm| {
            let rank = comm.rank();
            let mut lj = tree(comm, limit);
            for p in &per_rank[rank] {
                lj.enqueue(format!("class {p}"));
            }
            lj.push_fully().unwrap();
            lj.messages().to_vec()
        });

        let mut expected = std::collections::BTreeMap::new();
        for rank_picks in &picks[..size] {
            for p in rank_picks {
                *expected.entry(format!("class {p}")).or_insert(0usize) += 1;
            }
        }

        let root = &out[0];
        prop_assert_eq!(root.len(), expected.len());
        for m in root {
            prop_assert_eq!(Some(&m.rank_count()), expected.get(m.text()));
            prop_assert!(m.ranks().len() <= limit);
            prop_assert!(m.rank_count() >= m.ranks().len());
            prop_assert!(m.validate_invariants().is_ok());
        }
        prop_assert!(out[1..].iter().all(Vec::is_empty));
    }
}
