//! Page range resolution
//!
//! Turns page-selection requests (custom ranges, quick selectors, range text)
//! into validated, 1-indexed page lists. Everything here is pure: the same
//! request against the same page count always yields the same answer.

use serde::{Deserialize, Serialize};

use crate::error::RangeError;

/// Number of pages covered by the First/Last quick selectors
pub const QUICK_SELECT_SPAN: u32 = 5;

/// Inclusive, 1-indexed page range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

/// Check `start..=end` against a document of `total` pages
pub fn validate(start: u32, end: u32, total: u32) -> Result<(), RangeError> {
    if start < 1 {
        return Err(RangeError::StartBelowOne { start });
    }
    if end > total {
        return Err(RangeError::EndBeyondDocument { end, total });
    }
    if start > end {
        return Err(RangeError::StartAfterEnd { start, end });
    }
    Ok(())
}

impl PageRange {
    /// Build a range that is known to fit a document of `total` pages
    pub fn new(start: u32, end: u32, total: u32) -> Result<Self, RangeError> {
        validate(start, end, total)?;
        Ok(Self { start, end })
    }

    /// Re-check this range against a (possibly different) document
    pub fn validate(&self, total: u32) -> Result<(), RangeError> {
        validate(self.start, self.end, total)
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }

    pub fn len(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn label(&self) -> String {
        if self.start == self.end {
            format!("Page {}", self.start)
        } else {
            format!("Pages {}-{}", self.start, self.end)
        }
    }
}

impl From<(u32, u32)> for PageRange {
    fn from((start, end): (u32, u32)) -> Self {
        Self { start, end }
    }
}

/// One-click selections offered next to the custom range input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickSelect {
    All,
    First,
    Last,
    Odd,
    Even,
}

impl QuickSelect {
    fn name(self) -> &'static str {
        match self {
            QuickSelect::All => "All",
            QuickSelect::First => "First",
            QuickSelect::Last => "Last",
            QuickSelect::Odd => "Odd",
            QuickSelect::Even => "Even",
        }
    }

    /// Resolve the selector against a document of `total` pages
    pub fn resolve(self, total: u32) -> Result<Selection, RangeError> {
        if total == 0 {
            return Err(RangeError::EmptyDocument);
        }

        let span = QUICK_SELECT_SPAN.min(total);
        let (start, end, step, label) = match self {
            QuickSelect::All => (1, total, 1, "All Pages".to_string()),
            QuickSelect::First => (1, span, 1, format!("First {} Pages", span)),
            QuickSelect::Last => (
                total.saturating_sub(QUICK_SELECT_SPAN - 1).max(1),
                total,
                1,
                format!("Last {} Pages", span),
            ),
            QuickSelect::Odd => (1, total, 2, "Odd Pages".to_string()),
            QuickSelect::Even => {
                if total < 2 {
                    return Err(RangeError::NothingSelected {
                        selector: self.name(),
                        total,
                    });
                }
                (2, total, 2, "Even Pages".to_string())
            }
        };

        Ok(Selection {
            range: PageRange::new(start, end, total)?,
            step,
            label,
        })
    }
}

/// A resolved selection: a validated range walked with a fixed stride
///
/// Plain ranges use a stride of 1; the odd/even selectors keep the range
/// they cover and walk it every second page, so `pages()` is always the
/// explicit list that gets extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    range: PageRange,
    step: u32,
    label: String,
}

impl Selection {
    /// Custom `start..=end` selection
    pub fn custom(start: u32, end: u32, total: u32) -> Result<Self, RangeError> {
        let range = PageRange::new(start, end, total)?;
        Ok(Self::from(range))
    }

    pub fn range(&self) -> PageRange {
        self.range
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pages(&self) -> Vec<u32> {
        self.range.pages().step_by(self.step.max(1) as usize).collect()
    }

    pub fn page_count(&self) -> u32 {
        (self.range.len() + self.step.max(1) - 1) / self.step.max(1)
    }

    pub fn validate(&self, total: u32) -> Result<(), RangeError> {
        self.range.validate(total)
    }
}

impl From<PageRange> for Selection {
    fn from(range: PageRange) -> Self {
        Self {
            label: range.label(),
            range,
            step: 1,
        }
    }
}

/// Parse page range text like "1-3, 5, 8-10" into ordered ranges
///
/// Order is kept and overlapping or repeated ranges are allowed: each range
/// becomes its own output document when splitting.
pub fn parse_ranges(input: &str, total: u32) -> Result<Vec<PageRange>, RangeError> {
    let mut ranges = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (parse_page(start)?, parse_page(end)?),
            None => {
                let page = parse_page(part)?;
                (page, page)
            }
        };

        ranges.push(PageRange::new(start, end, total)?);
    }

    if ranges.is_empty() {
        return Err(RangeError::Syntax("Page range cannot be empty".into()));
    }

    Ok(ranges)
}

fn parse_page(text: &str) -> Result<u32, RangeError> {
    let text = text.trim();
    text.parse()
        .map_err(|_| RangeError::Syntax(format!("Invalid page number: {}", text)))
}
