//! Short names for runs.

/// Name of the run with 1-based `ordinal`: "a" through "z", then "ba", "bb"
/// and so on. Ordinal 0 has no name.
pub fn run_name(ordinal: usize) -> String {
    if ordinal == 0 {
        return String::new();
    }
    let mut n = ordinal - 1;
    let mut letters = Vec::new();
    loop {
        letters.push(char::from(b'a' + u8::try_from(n % 26).unwrap_or(0)));
        n /= 26;
        if n == 0 {
            break;
        }
    }
    letters.iter().rev().collect()
}
