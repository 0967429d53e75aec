// Search match highlighting
// Maps server-reported character offsets onto the tokens of the original
// content so a renderer can mark the words containing a hit.

/// One run of non-space characters, marked when a match offset lands in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub is_match: bool,
}

/// Partition `content` into space-separated tokens and mark every token that
/// contains at least one of `offsets`.
///
/// Offsets are zero-based Unicode-scalar positions into the original content
/// string (the server tokenizes the stored text, where indices count scalar
/// values). Token ranges are accumulated as `chars + 1` per token, the `+1`
/// standing for the single separating space, so a token covering
/// `[start, end)` is marked when some offset satisfies `start <= offset < end`.
/// A token is marked at most once no matter how many offsets fall inside it.
///
/// Splitting is on single spaces only. Runs of spaces produce empty tokens
/// that keep the arithmetic aligned; tabs and newlines stay inside tokens and
/// shift nothing. Joining the segment texts with single spaces reproduces
/// `content` exactly.
pub fn highlight(content: &str, offsets: &[usize]) -> Vec<Segment> {
    let mut start = 0usize;

    content
        .split(' ')
        .map(|token| {
            let end = start + token.chars().count();
            let is_match = offsets.iter().any(|&pos| pos >= start && pos < end);
            start = end + 1;

            Segment {
                text: token.to_string(),
                is_match,
            }
        })
        .collect()
}

/// Rebuild the original content from its segments
pub fn reconstruct(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
