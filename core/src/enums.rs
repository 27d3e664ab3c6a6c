//! Fuzzy mapping of enum type names onto the document's enum definitions.
//!
//! Property-level enum type names reported by the engine are often missing,
//! decorated (`CTRL>Eye Picker`) or simply wrong. The resolver tries a fixed
//! sequence of strategies, strictest first, and stops at the first success.
//! When a strategy finds more than one equally good definition it gives up
//! rather than guess.

use serde::{Deserialize, Serialize};
use vmscope_shared::EnumDef;

/// Strategy toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumStrategies {
    pub exact: bool,
    pub case_insensitive: bool,
    pub token_overlap: bool,
    pub substring: bool,
}

impl Default for EnumStrategies {
    fn default() -> Self {
        Self {
            exact: true,
            case_insensitive: true,
            token_overlap: true,
            substring: true,
        }
    }
}

/// Tuning for the matching heuristic (`[enum_matching]` in config.toml)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumMatchConfig {
    /// Leading category markers removed before comparison (`CTRL_Mood`)
    #[serde(default = "default_prefix_markers")]
    pub prefix_markers: Vec<String>,

    /// Everything up to the last separator is treated as a category (`CTRL>Mood`)
    #[serde(default = "default_category_separators")]
    pub category_separators: Vec<String>,

    /// Trailing words removed before comparison (`Mood Picker`)
    #[serde(default = "default_suffix_words")]
    pub suffix_words: Vec<String>,

    /// Tokens shorter than this are ignored
    #[serde(default = "default_min_token_len")]
    pub min_token_len: usize,

    /// Contained token must cover this share of the containing token
    #[serde(default = "default_containment_ratio")]
    pub containment_ratio: f64,

    /// Both tokens must be at least this long for containment to count
    #[serde(default = "default_min_containment_len")]
    pub min_containment_len: usize,

    pub strategies: EnumStrategies,
}

fn default_prefix_markers() -> Vec<String> {
    ["ctrl", "enum", "vm"].map(String::from).to_vec()
}

fn default_category_separators() -> Vec<String> {
    [">", "::", "|"].map(String::from).to_vec()
}

fn default_suffix_words() -> Vec<String> {
    ["picker", "selector", "select", "dropdown", "enum"]
        .map(String::from)
        .to_vec()
}

fn default_min_token_len() -> usize {
    3
}

fn default_containment_ratio() -> f64 {
    0.7
}

fn default_min_containment_len() -> usize {
    4
}

impl Default for EnumMatchConfig {
    fn default() -> Self {
        Self {
            prefix_markers: default_prefix_markers(),
            category_separators: default_category_separators(),
            suffix_words: default_suffix_words(),
            min_token_len: default_min_token_len(),
            containment_ratio: default_containment_ratio(),
            min_containment_len: default_min_containment_len(),
            strategies: EnumStrategies::default(),
        }
    }
}

/// Strategy that produced a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Exact,
    CaseInsensitive,
    TokenOverlap,
    Substring,
}

/// Outcome of scoring one candidate against every definition
enum Pick {
    None,
    Unique(usize),
    Ambiguous,
}

fn pick_best<S: PartialOrd + Copy>(scores: impl Iterator<Item = (usize, S)>) -> Pick {
    let mut best: Option<(usize, S)> = None;
    let mut tied = false;
    for (index, score) in scores {
        match best {
            Some((_, top)) if score < top => {}
            Some((_, top)) if score == top => tied = true,
            _ => {
                best = Some((index, score));
                tied = false;
            }
        }
    }
    match best {
        None => Pick::None,
        Some(_) if tied => Pick::Ambiguous,
        Some((index, _)) => Pick::Unique(index),
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnumResolver {
    config: EnumMatchConfig,
}

impl EnumResolver {
    pub fn new(config: EnumMatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EnumMatchConfig {
        &self.config
    }

    /// Resolve `candidates` (best first) to one of `defs`, or `None`
    pub fn resolve<'a>(&self, candidates: &[String], defs: &'a [EnumDef]) -> Option<&'a EnumDef> {
        self.resolve_with_strategy(candidates, defs).map(|(def, _)| def)
    }

    /// Like [`resolve`](Self::resolve), also reporting which strategy matched
    pub fn resolve_with_strategy<'a>(
        &self,
        candidates: &[String],
        defs: &'a [EnumDef],
    ) -> Option<(&'a EnumDef, MatchStrategy)> {
        let candidates: Vec<&str> = candidates
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        if candidates.is_empty() || defs.is_empty() {
            return None;
        }
        let strategies = self.config.strategies;

        if strategies.exact {
            for candidate in &candidates {
                if let Some(def) = defs.iter().find(|def| def.name == *candidate) {
                    return Some((def, MatchStrategy::Exact));
                }
            }
        }

        if strategies.case_insensitive {
            for candidate in &candidates {
                if let Some(def) = defs.iter().find(|def| def.name.eq_ignore_ascii_case(candidate)) {
                    return Some((def, MatchStrategy::CaseInsensitive));
                }
            }
        }

        if strategies.token_overlap {
            if let Some(def) = self.by_token_overlap(&candidates, defs) {
                return Some((def, MatchStrategy::TokenOverlap));
            }
        }

        if strategies.substring {
            if let Some(def) = self.by_substring(&candidates, defs) {
                return Some((def, MatchStrategy::Substring));
            }
        }

        tracing::trace!("enums: no definition matches {:?}", candidates);
        None
    }

    fn by_token_overlap<'a>(&self, candidates: &[&str], defs: &'a [EnumDef]) -> Option<&'a EnumDef> {
        let def_tokens: Vec<Vec<String>> = defs
            .iter()
            .map(|def| self.tokens(&self.strip_decorations(&def.name)))
            .collect();

        for candidate in candidates {
            let tokens = self.tokens(&self.strip_decorations(candidate));
            if tokens.is_empty() {
                continue;
            }
            let scores = def_tokens.iter().enumerate().filter_map(|(index, theirs)| {
                let overlap = tokens
                    .iter()
                    .filter(|ours| theirs.iter().any(|t| self.tokens_match(ours, t)))
                    .count();
                (overlap > 0).then_some((index, overlap))
            });
            match pick_best(scores) {
                Pick::Unique(index) => return Some(&defs[index]),
                Pick::Ambiguous => {
                    tracing::debug!("enums: token overlap for `{}` is ambiguous", candidate);
                    return None;
                }
                Pick::None => {}
            }
        }
        None
    }

    fn by_substring<'a>(&self, candidates: &[&str], defs: &'a [EnumDef]) -> Option<&'a EnumDef> {
        let def_keys: Vec<String> = defs
            .iter()
            .map(|def| compact(&self.strip_decorations(&def.name)))
            .collect();

        for candidate in candidates {
            let key = compact(&self.strip_decorations(candidate));
            if key.is_empty() {
                continue;
            }
            let scores = def_keys.iter().enumerate().filter_map(|(index, theirs)| {
                if theirs.is_empty() || !(theirs.contains(&key) || key.contains(theirs.as_str())) {
                    return None;
                }
                let (short, long) = if key.len() <= theirs.len() {
                    (key.len(), theirs.len())
                } else {
                    (theirs.len(), key.len())
                };
                Some((index, short as f64 / long as f64))
            });
            match pick_best(scores) {
                Pick::Unique(index) => return Some(&defs[index]),
                Pick::Ambiguous => {
                    tracing::debug!("enums: substring match for `{}` is ambiguous", candidate);
                    return None;
                }
                Pick::None => {}
            }
        }
        None
    }

    /// Remove category prefixes and picker-style suffixes
    pub fn strip_decorations(&self, name: &str) -> String {
        let mut rest = name.trim();

        for separator in &self.config.category_separators {
            if separator.is_empty() {
                continue;
            }
            if let Some(position) = rest.rfind(separator.as_str()) {
                rest = rest[position + separator.len()..].trim();
            }
        }

        for marker in &self.config.prefix_markers {
            let lower = rest.to_ascii_lowercase();
            if marker.is_empty() || !lower.starts_with(&marker.to_ascii_lowercase()) {
                continue;
            }
            let after = &rest[marker.len()..];
            // Only strip a marker that is followed by a delimiter
            if after.starts_with(|c: char| !c.is_alphanumeric()) {
                rest = after.trim_start_matches(|c: char| !c.is_alphanumeric());
            }
        }

        let mut words: Vec<&str> = split_words(rest).collect();
        while words.len() > 1
            && words.last().is_some_and(|last| {
                self.config
                    .suffix_words
                    .iter()
                    .any(|suffix| suffix.eq_ignore_ascii_case(last))
            })
        {
            words.pop();
        }

        if words.is_empty() {
            name.trim().to_string()
        } else {
            words.join(" ")
        }
    }

    fn tokens(&self, name: &str) -> Vec<String> {
        split_words(name)
            .filter(|word| word.chars().count() >= self.config.min_token_len)
            .map(str::to_lowercase)
            .collect()
    }

    fn tokens_match(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
        short.len() >= self.config.min_containment_len
            && long.len() >= self.config.min_containment_len
            && long.contains(short)
            && short.len() as f64 >= self.config.containment_ratio * long.len() as f64
    }
}

fn split_words(name: &str) -> impl Iterator<Item = &str> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
}

/// Lowercase with delimiters removed
fn compact(name: &str) -> String {
    split_words(name).map(str::to_lowercase).collect()
}
