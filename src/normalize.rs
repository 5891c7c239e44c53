/// Characters dropped from a native name besides whitespace: ASCII and
/// full-width parentheses.
const PARENTHESES: [char; 4] = ['(', ')', '（', '）'];

/// Canonicalize a native-script name into its matching key.
///
/// Whitespace (including the ideographic space) and parentheses are removed,
/// so `"甲 (乙)"`, `"甲(乙)"` and `" 甲（乙） "` all share the key `"甲乙"`.
/// An empty input yields an empty key; callers reject empty names upstream.
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && !PARENTHESES.contains(c))
        .collect()
}
