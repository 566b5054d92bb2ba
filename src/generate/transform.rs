//! Typosquat name variants derived from a protection target.
//!
//! Each rule mimics one way a human (or a sloppy installer script) gets a
//! name wrong. Rules are applied at every valid position, and a variant
//! reachable by several rules is emitted once, tagged with the first rule
//! in [`RuleKind::TRANSFORMS`] order that produced it.

use crate::generate::tables::{
    is_registry_name, keyboard_neighbors, AFFIX_PREFIXES, AFFIX_SUFFIXES, HOMOGLYPHS, JOINERS,
    SEPARATORS,
};
use crate::types::{GeneratedVariant, RuleKind};
use std::collections::{BTreeSet, HashSet};
use tracing::trace;

/// Names shorter than this are not checked for omissions.
pub const MIN_OMISSION_LEN: usize = 5;

/// Word reordering is skipped for names with more delimited words than this.
pub const MAX_REORDER_WORDS: usize = 4;

/// Largest numeral appended by the affix rule.
pub const MAX_NUMERAL_SUFFIX: u32 = 99;

type NameIter<'a> = Box<dyn Iterator<Item = String> + 'a>;

/// Generator for transform-rule variants. Stateless; every call to
/// [`TransformGenerator::variants`] starts a fresh sequence.
#[derive(Debug, Clone)]
pub struct TransformGenerator {
    enabled: BTreeSet<RuleKind>,
}

impl Default for TransformGenerator {
    fn default() -> Self {
        Self {
            enabled: RuleKind::TRANSFORMS.into_iter().collect(),
        }
    }
}

impl TransformGenerator {
    /// Create a generator with every transform rule enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator with the given rules switched off.
    pub fn without(disabled: &[RuleKind]) -> Self {
        let mut generator = Self::default();
        for rule in disabled {
            generator.enabled.remove(rule);
        }
        generator
    }

    /// Create a generator running only the given rules.
    pub fn only(rules: &[RuleKind]) -> Self {
        Self {
            enabled: rules
                .iter()
                .copied()
                .filter(|r| *r != RuleKind::BitFlip)
                .collect(),
        }
    }

    pub fn is_enabled(&self, rule: RuleKind) -> bool {
        self.enabled.contains(&rule)
    }

    /// Lazily produce the distinct variants of `target`.
    pub fn variants<'a>(&self, target: &'a str) -> Variants<'a> {
        let rules: Vec<RuleKind> = RuleKind::TRANSFORMS
            .into_iter()
            .filter(|r| self.is_enabled(*r))
            .collect();

        Variants {
            target,
            rules: rules.into_iter(),
            current: None,
            seen: HashSet::new(),
        }
    }
}

/// Iterator over the variants of one target.
pub struct Variants<'a> {
    target: &'a str,
    rules: std::vec::IntoIter<RuleKind>,
    current: Option<(RuleKind, NameIter<'a>)>,
    seen: HashSet<String>,
}

impl Iterator for Variants<'_> {
    type Item = GeneratedVariant;

    fn next(&mut self) -> Option<GeneratedVariant> {
        loop {
            if let Some((rule, names)) = self.current.as_mut() {
                for name in names.by_ref() {
                    if name == self.target {
                        continue;
                    }
                    if !is_registry_name(&name) {
                        trace!("Skipping unencodable {} variant {:?}", rule, name);
                        continue;
                    }
                    if self.seen.insert(name.clone()) {
                        return Some(GeneratedVariant {
                            target_name: self.target.to_string(),
                            name,
                            rule: *rule,
                        });
                    }
                }
            }

            let rule = self.rules.next()?;
            self.current = Some((rule, rule_variants(rule, self.target)));
        }
    }
}

/// Raw, possibly repeating output of a single rule.
fn rule_variants(rule: RuleKind, target: &str) -> NameIter<'_> {
    let chars: Vec<char> = target.chars().collect();
    match rule {
        RuleKind::Omission => omissions(chars),
        RuleKind::Duplication => duplications(chars),
        RuleKind::Transposition => transpositions(chars),
        RuleKind::KeyboardTypo => keyboard_typos(chars),
        RuleKind::Homoglyph => homoglyphs(target),
        RuleKind::Separator => separators(chars),
        RuleKind::WordReorder => word_reorders(target),
        RuleKind::Plural => plurals(target),
        RuleKind::Affix => affixes(target),
        RuleKind::BitFlip => Box::new(std::iter::empty()),
    }
}

fn omissions<'a>(chars: Vec<char>) -> NameIter<'a> {
    if chars.len() < MIN_OMISSION_LEN {
        return Box::new(std::iter::empty());
    }
    Box::new((0..chars.len()).map(move |i| {
        chars
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, c)| *c)
            .collect()
    }))
}

fn duplications<'a>(chars: Vec<char>) -> NameIter<'a> {
    Box::new((0..chars.len()).map(move |i| {
        let mut out: String = chars[..=i].iter().collect();
        out.push(chars[i]);
        out.extend(&chars[i + 1..]);
        out
    }))
}

fn transpositions<'a>(chars: Vec<char>) -> NameIter<'a> {
    Box::new((0..chars.len().saturating_sub(1)).filter_map(move |i| {
        if chars[i] == chars[i + 1] {
            return None;
        }
        let mut swapped = chars.clone();
        swapped.swap(i, i + 1);
        Some(swapped.into_iter().collect())
    }))
}

fn keyboard_typos<'a>(chars: Vec<char>) -> NameIter<'a> {
    Box::new((0..chars.len()).flat_map(move |i| {
        let original = chars.clone();
        keyboard_neighbors(original[i].to_ascii_lowercase())
            .iter()
            .map(move |&n| {
                let mut typo = original.clone();
                typo[i] = n;
                typo.into_iter().collect::<String>()
            })
    }))
}

fn homoglyphs(target: &str) -> NameIter<'_> {
    Box::new(HOMOGLYPHS.iter().flat_map(move |&(from, to)| {
        target.match_indices(from).map(move |(at, _)| {
            let mut out = String::with_capacity(target.len() + to.len());
            out.push_str(&target[..at]);
            out.push_str(to);
            out.push_str(&target[at + from.len()..]);
            out
        })
    }))
}

fn separators<'a>(chars: Vec<char>) -> NameIter<'a> {
    let len = chars.len();
    let inserted = {
        let chars = chars.clone();
        (1..len).flat_map(move |i| {
            let chars = chars.clone();
            SEPARATORS.iter().map(move |&sep| {
                let mut out: String = chars[..i].iter().collect();
                out.push(sep);
                out.extend(&chars[i..]);
                out
            })
        })
    };

    let positions: Vec<usize> = (0..len).filter(|&i| SEPARATORS.contains(&chars[i])).collect();
    let removed = {
        let chars = chars.clone();
        positions.clone().into_iter().map(move |i| {
            chars
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, c)| *c)
                .collect::<String>()
        })
    };
    let swapped = positions.into_iter().flat_map(move |i| {
        let current = chars[i];
        let chars = chars.clone();
        SEPARATORS
            .iter()
            .filter(move |&&sep| sep != current)
            .map(move |&sep| {
                let mut out = chars.clone();
                out[i] = sep;
                out.into_iter().collect::<String>()
            })
    });

    Box::new(inserted.chain(removed).chain(swapped))
}

fn word_reorders(target: &str) -> NameIter<'_> {
    let words: Vec<&str> = target
        .split(|c: char| SEPARATORS.contains(&c))
        .filter(|w| !w.is_empty())
        .collect();
    if words.len() < 2 || words.len() > MAX_REORDER_WORDS {
        return Box::new(std::iter::empty());
    }

    Box::new(permutations(words.len()).into_iter().flat_map(move |order| {
        let words = words.clone();
        JOINERS.iter().map(move |&joiner| {
            order
                .iter()
                .map(|&i| words[i])
                .collect::<Vec<_>>()
                .join(joiner)
        })
    }))
}

fn plurals(target: &str) -> NameIter<'_> {
    let variant = match target.strip_suffix('s') {
        Some(singular) if !singular.is_empty() => singular.to_string(),
        Some(_) => return Box::new(std::iter::empty()),
        None => format!("{}s", target),
    };
    Box::new(std::iter::once(variant))
}

fn affixes(target: &str) -> NameIter<'_> {
    let prefixed = AFFIX_PREFIXES.iter().map(move |p| format!("{}{}", p, target));
    let suffixed = AFFIX_SUFFIXES.iter().map(move |s| format!("{}{}", target, s));
    let numbered = JOINERS.iter().flat_map(move |d| {
        (0..=MAX_NUMERAL_SUFFIX).map(move |n| format!("{}{}{}", target, d, n))
    });
    Box::new(prefixed.chain(suffixed).chain(numbered))
}

/// All orderings of `0..n`, identity first.
fn permutations(n: usize) -> Vec<Vec<usize>> {
    fn extend(prefix: &mut Vec<usize>, used: &mut [bool], out: &mut Vec<Vec<usize>>) {
        if prefix.len() == used.len() {
            out.push(prefix.clone());
            return;
        }
        for i in 0..used.len() {
            if !used[i] {
                used[i] = true;
                prefix.push(i);
                extend(prefix, used, out);
                prefix.pop();
                used[i] = false;
            }
        }
    }

    let mut out = Vec::new();
    extend(&mut Vec::with_capacity(n), &mut vec![false; n], &mut out);
    out
}
