//! Static tables driving the transform rules.
//!
//! The keyboard table follows QWERTY locality. Look-alike substitutions are
//! kept separately so each rule can be toggled on its own.

/// Characters crates.io accepts in a package name.
pub fn is_registry_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// True if every character of `name` is in the registry charset.
pub fn is_registry_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_registry_char)
}

/// Separators a name may be split on or joined with.
pub const SEPARATORS: &[char] = &['-', '_', '.'];

/// QWERTY neighbours of each character.
pub fn keyboard_neighbors(c: char) -> &'static [char] {
    match c {
        '1' => &['2', 'q'],
        '2' => &['1', '3', 'q', 'w'],
        '3' => &['2', '4', 'w', 'e'],
        '4' => &['3', '5', 'e', 'r'],
        '5' => &['4', '6', 'r', 't'],
        '6' => &['5', '7', 't', 'y'],
        '7' => &['6', '8', 'y', 'u'],
        '8' => &['7', '9', 'u', 'i'],
        '9' => &['8', '0', 'i', 'o'],
        '0' => &['9', '-', 'o', 'p'],
        '-' => &['0', 'p'],
        'q' => &['1', '2', 'w', 'a'],
        'w' => &['2', '3', 'q', 'e', 'a', 's'],
        'e' => &['3', '4', 'w', 'r', 's', 'd'],
        'r' => &['4', '5', 'e', 't', 'd', 'f'],
        't' => &['5', '6', 'r', 'y', 'f', 'g'],
        'y' => &['6', '7', 't', 'u', 'g', 'h'],
        'u' => &['7', '8', 'y', 'i', 'h', 'j'],
        'i' => &['8', '9', 'u', 'o', 'j', 'k'],
        'o' => &['9', '0', 'i', 'p', 'k', 'l'],
        'p' => &['0', '-', 'o', 'l'],
        'a' => &['q', 'w', 's', 'z'],
        's' => &['w', 'e', 'a', 'd', 'z', 'x'],
        'd' => &['e', 'r', 's', 'f', 'x', 'c'],
        'f' => &['r', 't', 'd', 'g', 'c', 'v'],
        'g' => &['t', 'y', 'f', 'h', 'v', 'b'],
        'h' => &['y', 'u', 'g', 'j', 'b', 'n'],
        'j' => &['u', 'i', 'h', 'k', 'n', 'm'],
        'k' => &['i', 'o', 'j', 'l', 'm'],
        'l' => &['o', 'p', 'k'],
        'z' => &['a', 's', 'x'],
        'x' => &['z', 's', 'd', 'c'],
        'c' => &['x', 'd', 'f', 'v'],
        'v' => &['c', 'f', 'g', 'b'],
        'b' => &['v', 'g', 'h', 'n'],
        'n' => &['b', 'h', 'j', 'm'],
        'm' => &['n', 'j', 'k'],
        _ => &[],
    }
}

/// Look-alike substitutions as `(from, to)` pairs.
///
/// Multi-character entries cover kerning confusions such as `rn` for `m`.
pub const HOMOGLYPHS: &[(&str, &str)] = &[
    ("l", "1"),
    ("1", "l"),
    ("l", "i"),
    ("i", "l"),
    ("i", "1"),
    ("1", "i"),
    ("o", "0"),
    ("0", "o"),
    ("s", "5"),
    ("5", "s"),
    ("e", "3"),
    ("3", "e"),
    ("a", "4"),
    ("b", "6"),
    ("g", "9"),
    ("q", "9"),
    ("z", "2"),
    ("u", "v"),
    ("v", "u"),
    ("m", "rn"),
    ("rn", "m"),
    ("w", "vv"),
    ("vv", "w"),
    ("d", "cl"),
    ("cl", "d"),
    ("nn", "m"),
];

/// Decoy prefixes prepended to a target name.
pub const AFFIX_PREFIXES: &[&str] = &["rust-", "rust_", "rs-", "lib", "official-", "the-"];

/// Decoy suffixes appended to a target name.
pub const AFFIX_SUFFIXES: &[&str] = &[
    "-rs", "_rs", "rs", "-rust", "_rust", "-official", "-lib", "-core", "-sys", "-cli", "-utils",
    "-async", "-ng",
];

/// Strings used to join reordered words and numeral suffixes.
pub const JOINERS: &[&str] = &["", "-", "_"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_charset() {
        assert!(is_registry_name("serde_json"));
        assert!(is_registry_name("tokio-util"));
        assert!(!is_registry_name("foo.bar"));
        assert!(!is_registry_name("naïve"));
        assert!(!is_registry_name(""));
    }

    #[test]
    fn test_keyboard_table_is_symmetric() {
        for c in ('a'..='z').chain('0'..='9') {
            for &n in keyboard_neighbors(c) {
                assert!(
                    n == '-' || keyboard_neighbors(n).contains(&c),
                    "{} lists {} but not the reverse",
                    c,
                    n
                );
            }
        }
    }

    #[test]
    fn test_homoglyphs_never_identity() {
        for (from, to) in HOMOGLYPHS {
            assert_ne!(from, to);
            assert!(is_registry_name(from) && is_registry_name(to));
        }
    }
}
