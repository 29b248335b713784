// OCR confusion correction, applied only where a field grammar fixes the
// expected character class of every position.

use std::collections::HashMap;

use lazy_static::lazy_static;

/// Expected character class at one position of a fixed-shape code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Letter,
    Digit,
    Alnum,
    /// Letter or the MRZ filler `<`
    Filler,
    Literal(char),
}

impl CharClass {
    /// Shape alphabet: `L` letter, `D` digit, `A` alphanumeric, `F` letter or `<`,
    /// anything else is a literal.
    pub fn from_shape(c: char) -> CharClass {
        match c {
            'L' => CharClass::Letter,
            'D' => CharClass::Digit,
            'A' => CharClass::Alnum,
            'F' => CharClass::Filler,
            other => CharClass::Literal(other),
        }
    }

    pub fn accepts(self, c: char) -> bool {
        match self {
            CharClass::Letter => c.is_ascii_uppercase(),
            CharClass::Digit => c.is_ascii_digit(),
            CharClass::Alnum => c.is_ascii_uppercase() || c.is_ascii_digit(),
            CharClass::Filler => c.is_ascii_uppercase() || c == '<',
            CharClass::Literal(l) => c == l,
        }
    }
}

lazy_static! {
    // Letters the recognizer emits where a digit was printed
    static ref LETTER_TO_DIGIT: HashMap<char, char> = {
        let mut m = HashMap::new();
        m.insert('O', '0');
        m.insert('Q', '0');
        m.insert('D', '0');
        m.insert('U', '0');
        m.insert('I', '1');
        m.insert('L', '1');
        m.insert('T', '1');
        m.insert('Z', '2');
        m.insert('A', '4');
        m.insert('S', '5');
        m.insert('G', '6');
        m.insert('B', '8');
        m
    };

    // Digits the recognizer emits where a letter was printed
    static ref DIGIT_TO_LETTER: HashMap<char, char> = {
        let mut m = HashMap::new();
        m.insert('0', 'O');
        m.insert('1', 'I');
        m.insert('2', 'Z');
        m.insert('4', 'A');
        m.insert('5', 'S');
        m.insert('6', 'G');
        m.insert('8', 'B');
        m
    };
}

/// Maps `c` into `class` through the confusion table, if it can be.
pub fn correct_char(c: char, class: CharClass) -> Option<char> {
    if class.accepts(c) {
        return Some(c);
    }
    let corrected = match class {
        CharClass::Digit => LETTER_TO_DIGIT.get(&c).copied(),
        CharClass::Letter | CharClass::Filler => DIGIT_TO_LETTER.get(&c).copied(),
        CharClass::Alnum | CharClass::Literal(_) => None,
    };
    corrected.filter(|fixed| class.accepts(*fixed))
}

/// Corrects `text` position by position against `shape`.
/// Returns `None` when lengths differ or some position cannot be satisfied.
pub fn correct_to_shape(text: &str, shape: &str) -> Option<String> {
    if text.chars().count() != shape.chars().count() {
        return None;
    }
    text.chars()
        .zip(shape.chars())
        .map(|(c, s)| correct_char(c, CharClass::from_shape(s)))
        .collect()
}

/// Corrects every character of an MRZ slice to one class; unfixable characters are kept.
pub fn correct_run(text: &str, class: CharClass) -> String {
    text.chars()
        .map(|c| correct_char(c, class).unwrap_or(c))
        .collect()
}

/// Text accepted by a field grammar. Only grammar matching constructs it, so
/// confusion correction never reaches free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarChecked(String);

impl GrammarChecked {
    pub(crate) fn new(text: String) -> Self {
        GrammarChecked(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Free text copied verbatim from a normalized token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeText(String);

impl FreeText {
    pub(crate) fn new(text: impl Into<String>) -> Self {
        FreeText(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}
