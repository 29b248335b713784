use crate::models::{NormalizedToken, OcrTextRegion};

const SEPARATORS: [char; 6] = ['-', '.', ',', ':', '/', '_'];

/// Cleans raw recognized strings into the canonical form the locator matches against.
pub struct TextNormalizer;

impl TextNormalizer {
    /// One token per region, in input order. Never fails.
    pub fn normalize(regions: &[OcrTextRegion]) -> Vec<NormalizedToken<'_>> {
        let tokens: Vec<NormalizedToken<'_>> = regions
            .iter()
            .map(|region| NormalizedToken {
                text: Self::normalize_text(&region.text),
                source: region,
            })
            .collect();

        log::debug!(
            "normalized {} regions ({} non-empty)",
            tokens.len(),
            tokens.iter().filter(|t| !t.is_empty()).count()
        );
        tokens
    }

    /// Trims, uppercases, collapses whitespace and repeated separators.
    /// Letter/digit confusions are left for the grammar-constrained fields.
    pub fn normalize_text(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut pending_space = false;

        for c in text.chars().flat_map(char::to_uppercase) {
            let c = match c {
                '«' => {
                    Self::push(&mut out, '<', &mut pending_space);
                    '<'
                }
                '‹' => '<',
                '\u{2013}' | '\u{2014}' => '-',
                other => other,
            };

            if c.is_whitespace() || c.is_control() {
                pending_space = !out.is_empty();
                continue;
            }
            if SEPARATORS.contains(&c) && !pending_space && out.ends_with(c) {
                continue;
            }
            Self::push(&mut out, c, &mut pending_space);
        }

        out
    }

    fn push(out: &mut String, c: char, pending_space: &mut bool) {
        if *pending_space {
            out.push(' ');
            *pending_space = false;
        }
        out.push(c);
    }
}
