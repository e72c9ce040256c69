use std::cmp::Ordering;

use icu_collator::{Collator, CollatorOptions, Strength};
use icu_locid::locale;

use crate::error::{FuseError, FuseResult};

/// Locale-aware string comparison for part names.
///
/// Part names mix Latin identifiers with CJK display names; a plain byte or
/// code-point sort orders the CJK names arbitrarily. The collator pins the
/// ordering to the Chinese (pinyin) collation the source data was authored
/// against, so sibling order is stable across platforms.
pub struct NameCollator {
    collator: Collator,
}

impl NameCollator {
    pub fn new() -> FuseResult<Self> {
        let mut options = CollatorOptions::new();
        options.strength = Some(Strength::Tertiary);
        let collator = Collator::try_new(&locale!("zh").into(), options)
            .map_err(|e| FuseError::validation(format!("collator init: {e}")))?;
        Ok(Self { collator })
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.collator.compare(a, b)
    }
}
