//! Chunk boundaries never change what the SSE decoder produces.

use llm_fetch::streaming::{SseDecoder, SseEvent};
use proptest::prelude::*;

fn decode(chunks: &[&[u8]]) -> Vec<SseEvent> {
    let mut decoder = SseDecoder::new();
    let mut out = Vec::new();
    for chunk in chunks {
        out.extend(decoder.feed(chunk));
    }
    out.extend(decoder.finish());
    out
}

fn line_ending() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("\n"), Just("\r\n"), Just("\r")]
}

fn field_line() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 {}\":,é中]{0,24}".prop_map(|v| format!("data: {v}")),
        "[a-z]{1,8}".prop_map(|v| format!("event: {v}")),
        "[0-9]{1,4}".prop_map(|v| format!("id: {v}")),
        "[0-9]{1,5}".prop_map(|v| format!("retry: {v}")),
        "[a-z ]{0,10}".prop_map(|v| format!(":{v}")),
    ]
}

fn block() -> impl Strategy<Value = String> {
    (prop::collection::vec((field_line(), line_ending()), 1..5), line_ending()).prop_map(
        |(lines, blank)| {
            let mut out = String::new();
            for (line, end) in lines {
                out.push_str(&line);
                out.push_str(end);
            }
            out.push_str(blank);
            out
        },
    )
}

fn body() -> impl Strategy<Value = Vec<u8>> {
    (
        prop::collection::vec(block(), 0..6),
        "(data: [a-z]{0,6})?",
    )
        .prop_map(|(blocks, tail)| {
            let mut out = blocks.concat();
            out.push_str(&tail);
            out.into_bytes()
        })
}

proptest! {
    #[test]
    fn arbitrary_splits_decode_identically(
        body in body(),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
    ) {
        let whole = decode(&[body.as_slice()]);

        let mut points: Vec<usize> = cuts.iter().map(|i| i.index(body.len() + 1)).collect();
        points.sort_unstable();
        points.dedup();
        let mut chunks: Vec<&[u8]> = Vec::new();
        let mut start = 0;
        for point in points {
            chunks.push(&body[start..point]);
            start = point;
        }
        chunks.push(&body[start..]);

        prop_assert_eq!(decode(&chunks), whole);
    }

    #[test]
    fn byte_at_a_time_matches_whole(body in body()) {
        let whole = decode(&[body.as_slice()]);
        let singles: Vec<&[u8]> = body.chunks(1).collect();
        prop_assert_eq!(decode(&singles), whole);
    }
}
