use serde_json::json;

/// Formats a JSON value as a single SSE event, blank line included.
pub fn sse_frame(value: serde_json::Value) -> String {
    return format!("data: {}\n\n", value);
}

pub fn token_frame(token: &str) -> String {
    return sse_frame(json!({ "token": token }));
}

pub fn done_frame(sources: &[&str]) -> String {
    return sse_frame(json!({ "done": true, "sources": sources }));
}

/// The exchange used across end to end tests: "Hi", " there", then a
/// terminal frame citing `doc1.md`.
pub fn greeting_stream_fixture() -> String {
    return [
        token_frame("Hi"),
        token_frame(" there"),
        done_frame(&["doc1.md"]),
    ]
    .concat();
}

/// Splits a body into chunks of `size` bytes, ignoring UTF-8 boundaries, to
/// mimic arbitrary transport reads.
pub fn chunked(body: &str, size: usize) -> Vec<Vec<u8>> {
    return body
        .as_bytes()
        .chunks(size)
        .map(|chunk| return chunk.to_vec())
        .collect();
}
