use lumberjack::wire::{decode_messages, encode_messages};
use lumberjack::{Level, Message, PackError};
use proptest::prelude::*;

fn arb_level() -> impl Strategy<Value = Level> {
    prop::sample::select(Level::ALL.to_vec())
}

prop_compose! {
    fn arb_message()(
        text in ".{0,40}",
        tag in "[a-z]{0,8}",
        file in "[a-z_/]{0,16}\\.rs",
        line in 0u32..10_000,
        level in arb_level(),
        first in 0usize..1024,
        extra in prop::collection::btree_set(0usize..1024, 0..6),
        surplus in 0usize..50,
    ) -> Message {
        let mut m = Message::new(text, file, line, level, tag, first);
        let extra: Vec<usize> = extra.into_iter().filter(|&r| r != first).collect();
        m.add_ranks(&extra, extra.len() + surplus, 16);
        m
    }
}

proptest! {
    #[test]
    fn pack_roundtrip(msgs in prop::collection::vec(arb_message(), 0..12)) {
        let pack = encode_messages(&msgs);
        prop_assert_eq!(decode_messages(&pack).unwrap(), msgs);
    }

    #[test]
    fn truncated_packs_never_decode(
        msgs in prop::collection::vec(arb_message(), 1..6),
        cut in any::<prop::sample::Index>(),
    ) {
        let pack = encode_messages(&msgs);
        let keep = cut.index(pack.len() - 1) + 1;
        prop_assume!(keep < pack.len());
        prop_assert!(decode_messages(&pack[..keep]).is_err());
    }
}

#[test]
fn empty_pack_is_empty_list() {
    assert!(encode_messages(&[]).is_empty());
    assert_eq!(decode_messages(&[]).unwrap(), Vec::<Message>::new());
}

#[test]
fn appended_garbage_is_rejected() {
    let mut pack = encode_messages(&[Message::from_text("hi", 0)]).to_vec();
    pack.extend_from_slice(&[0xAB, 0xCD]);
    assert_eq!(decode_messages(&pack), Err(PackError::TrailingBytes(2)));
}
