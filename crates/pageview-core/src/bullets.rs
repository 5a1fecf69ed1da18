//! List bullets: plain bullets, numbered labels and checkboxes.
//!
//! A list line starts with its bullet. Plain bullets are the text `"• "`,
//! numbered labels are text like `"1. "` or `"a. "`, and checkboxes are an
//! icon object followed by a space.

use std::fmt;

/// Bullet character shown for unordered items.
pub const BULLET_CHAR: char = '\u{2022}';

/// State of a checkbox item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckState {
    /// Open task, `[ ]`.
    Unchecked,
    /// Done, `[*]`.
    Checked,
    /// Cancelled, `[x]`.
    XChecked,
    /// Moved forward, `[>]`.
    Migrated,
    /// Moved backward, `[<]`.
    Transmigrated,
}

impl CheckState {
    /// All states.
    pub const ALL: [CheckState; 5] = [
        CheckState::Unchecked,
        CheckState::Checked,
        CheckState::XChecked,
        CheckState::Migrated,
        CheckState::Transmigrated,
    ];

    /// Name used in `bullet` and `style` attributes, e.g. `"checked-box"`.
    pub fn name(self) -> &'static str {
        match self {
            CheckState::Unchecked => "unchecked-box",
            CheckState::Checked => "checked-box",
            CheckState::XChecked => "xchecked-box",
            CheckState::Migrated => "migrated-box",
            CheckState::Transmigrated => "transmigrated-box",
        }
    }

    /// Icon name, e.g. `"zim-checked-box"`.
    pub fn stock(self) -> &'static str {
        match self {
            CheckState::Unchecked => "zim-unchecked-box",
            CheckState::Checked => "zim-checked-box",
            CheckState::XChecked => "zim-xchecked-box",
            CheckState::Migrated => "zim-migrated-box",
            CheckState::Transmigrated => "zim-transmigrated-box",
        }
    }

    /// Parse a state from its attribute name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Parse a state from its icon name.
    pub fn from_stock(stock: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.stock() == stock)
    }
}

/// Label of a numbered item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Numeral {
    /// `1.`, `2.`, ...
    Number(u32),
    /// `a.`, `b.`, ...
    Lower(char),
    /// `A.`, `B.`, ...
    Upper(char),
}

impl Numeral {
    /// Parse a label without the trailing dot, e.g. `"12"` or `"c"`.
    pub fn parse(label: &str) -> Option<Self> {
        if !label.is_empty() && label.chars().all(|c| c.is_ascii_digit()) {
            return label.parse().ok().map(Numeral::Number);
        }
        let mut chars = label.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_lowercase() => Some(Numeral::Lower(c)),
            (Some(c), None) if c.is_ascii_uppercase() => Some(Numeral::Upper(c)),
            _ => None,
        }
    }

    /// The following label; `None` after `z` or `Z`.
    pub fn next(self) -> Option<Self> {
        match self {
            Numeral::Number(n) => n.checked_add(1).map(Numeral::Number),
            Numeral::Lower('z') | Numeral::Upper('Z') => None,
            Numeral::Lower(c) => char::from_u32(c as u32 + 1).map(Numeral::Lower),
            Numeral::Upper(c) => char::from_u32(c as u32 + 1).map(Numeral::Upper),
        }
    }

    /// First label of the same style: `1`, `a` or `A`.
    pub fn first(self) -> Self {
        match self {
            Numeral::Number(_) => Numeral::Number(1),
            Numeral::Lower(_) => Numeral::Lower('a'),
            Numeral::Upper(_) => Numeral::Upper('A'),
        }
    }

    /// Whether this is a numeric label.
    pub fn is_numeric(self) -> bool {
        matches!(self, Numeral::Number(_))
    }

    /// Label text without the dot.
    pub fn label(self) -> String {
        match self {
            Numeral::Number(n) => n.to_string(),
            Numeral::Lower(c) | Numeral::Upper(c) => c.to_string(),
        }
    }
}

/// Bullet of a list item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bullet {
    /// Unordered item.
    Bullet,
    /// Numbered item.
    Numbered(Numeral),
    /// Checkbox item.
    Checkbox(CheckState),
}

/// Run type of a bullet; lines of different run types never share a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulletClass {
    /// `•` items.
    Bullet,
    /// Numbered and lettered items.
    Numbered,
    /// Checkbox items.
    Checkbox,
}

impl Bullet {
    /// Run type of this bullet.
    pub fn class(self) -> BulletClass {
        match self {
            Bullet::Bullet => BulletClass::Bullet,
            Bullet::Numbered(_) => BulletClass::Numbered,
            Bullet::Checkbox(_) => BulletClass::Checkbox,
        }
    }

    /// Whether this is a checkbox.
    pub fn is_checkbox(self) -> bool {
        matches!(self, Bullet::Checkbox(_))
    }

    /// Whether this is a numbered label.
    pub fn is_numbered(self) -> bool {
        matches!(self, Bullet::Numbered(_))
    }

    /// List style stored on the list-item tag.
    pub fn list_style(self) -> ListStyle {
        match self {
            Bullet::Bullet => ListStyle::BulletList,
            Bullet::Numbered(_) => ListStyle::NumberedList,
            Bullet::Checkbox(state) => ListStyle::Checkbox(state),
        }
    }

    /// Value of the `bullet` attribute in a structural tree: `*`, the
    /// label with dot, or the checkbox name.
    pub fn attrib_value(self) -> String {
        match self {
            Bullet::Bullet => "*".to_string(),
            Bullet::Numbered(n) => format!("{}.", n.label()),
            Bullet::Checkbox(state) => state.name().to_string(),
        }
    }

    /// Parse the `bullet` attribute of a structural tree.
    pub fn from_attrib_value(value: &str) -> Option<Self> {
        if value == "*" {
            return Some(Bullet::Bullet);
        }
        if let Some(state) = CheckState::from_name(value) {
            return Some(Bullet::Checkbox(state));
        }
        Numeral::parse(value.strip_suffix('.').unwrap_or(value)).map(Bullet::Numbered)
    }

    /// Text inserted in the buffer for this bullet; `None` for checkboxes,
    /// which are inserted as icon objects.
    pub fn text(self) -> Option<String> {
        match self {
            Bullet::Bullet => Some(format!("{} ", BULLET_CHAR)),
            Bullet::Numbered(n) => Some(format!("{}. ", n.label())),
            Bullet::Checkbox(_) => None,
        }
    }
}

impl fmt::Display for Bullet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.attrib_value())
    }
}

/// Style of a list-item tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListStyle {
    /// `bullet-list`
    BulletList,
    /// `numbered-list`
    NumberedList,
    /// One of the checkbox names, e.g. `unchecked-box`.
    Checkbox(CheckState),
}

impl ListStyle {
    /// Attribute value.
    pub fn name(self) -> &'static str {
        match self {
            ListStyle::BulletList => "bullet-list",
            ListStyle::NumberedList => "numbered-list",
            ListStyle::Checkbox(state) => state.name(),
        }
    }

    /// Parse an attribute value.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bullet-list" => Some(ListStyle::BulletList),
            "numbered-list" => Some(ListStyle::NumberedList),
            other => CheckState::from_name(other).map(ListStyle::Checkbox),
        }
    }
}

/// Parse a numbered label at the start of `text`, e.g. `"12. foo"`.
///
/// Returns the label and the number of characters including the dot and a
/// single following space.
pub fn parse_numbered_prefix(text: &str) -> Option<(Numeral, usize)> {
    let dot = text.find('.')?;
    let label = &text[..dot];
    if label.is_empty() || label.chars().count() > 9 {
        return None;
    }
    let numeral = Numeral::parse(label)?;
    if !text[dot + 1..].starts_with(' ') {
        return None;
    }
    Some((numeral, label.chars().count() + 2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1", Some(Numeral::Number(2)))]
    #[case("9", Some(Numeral::Number(10)))]
    #[case("a", Some(Numeral::Lower('b')))]
    #[case("Y", Some(Numeral::Upper('Z')))]
    #[case("z", None)]
    #[case("Z", None)]
    fn test_next_numeral(#[case] label: &str, #[case] expected: Option<Numeral>) {
        assert_eq!(Numeral::parse(label).unwrap().next(), expected);
    }

    #[test]
    fn test_parse_numbered_prefix() {
        assert_eq!(
            parse_numbered_prefix("12. foo"),
            Some((Numeral::Number(12), 4))
        );
        assert_eq!(parse_numbered_prefix("a. foo"), Some((Numeral::Lower('a'), 3)));
        assert_eq!(parse_numbered_prefix("12.foo"), None);
        assert_eq!(parse_numbered_prefix("ab. foo"), None);
        assert_eq!(parse_numbered_prefix("Test 123. foo"), None);
    }

    #[test]
    fn test_attrib_values() {
        for value in ["*", "1.", "a.", "B.", "unchecked-box", "migrated-box"] {
            let bullet = Bullet::from_attrib_value(value).unwrap();
            assert_eq!(bullet.attrib_value(), value);
        }
        assert_eq!(Bullet::from_attrib_value("foo"), None);
        assert_eq!(Bullet::Bullet.text().as_deref(), Some("\u{2022} "));
        assert_eq!(
            Bullet::Numbered(Numeral::Number(3)).text().as_deref(),
            Some("3. ")
        );
        assert_eq!(Bullet::Checkbox(CheckState::Checked).text(), None);
    }
}
