// Raw key name -> text edit translation for manual capture.
//
// Key names follow the lowercase naming used by OS keyboard hooks:
// single characters for printable keys, words for the rest ("space", "enter").

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Insert(char),
    Backspace,
    Ignore,
}

const SHIFTED_DIGITS: [(char, char); 10] = [
    ('1', '!'),
    ('2', '@'),
    ('3', '#'),
    ('4', '$'),
    ('5', '%'),
    ('6', '^'),
    ('7', '&'),
    ('8', '*'),
    ('9', '('),
    ('0', ')'),
];

const SHIFTED_PUNCT: [(char, char); 11] = [
    ('-', '_'),
    ('=', '+'),
    ('[', '{'),
    (']', '}'),
    ('\\', '|'),
    (';', ':'),
    ('\'', '"'),
    (',', '<'),
    ('.', '>'),
    ('/', '?'),
    ('`', '~'),
];

fn shifted(table: &[(char, char)], c: char) -> Option<char> {
    table.iter().find(|(k, _)| *k == c).map(|(_, v)| *v)
}

pub fn translate_key(name: &str, shift: bool) -> KeyAction {
    match name {
        "space" => return KeyAction::Insert(' '),
        "enter" | "return" => return KeyAction::Insert('\n'),
        "tab" => return KeyAction::Insert('\t'),
        "backspace" => return KeyAction::Backspace,
        _ => {}
    }

    let mut chars = name.chars();
    let (Some(c), None) = (chars.next(), chars.next()) else {
        return KeyAction::Ignore;
    };

    if c.is_ascii_alphabetic() {
        let c = if shift {
            c.to_ascii_uppercase()
        } else {
            c.to_ascii_lowercase()
        };
        return KeyAction::Insert(c);
    }

    if c.is_ascii_digit() {
        let c = if shift {
            shifted(&SHIFTED_DIGITS, c).unwrap_or(c)
        } else {
            c
        };
        return KeyAction::Insert(c);
    }

    if SHIFTED_PUNCT.iter().any(|(k, _)| *k == c) {
        let c = if shift {
            shifted(&SHIFTED_PUNCT, c).unwrap_or(c)
        } else {
            c
        };
        return KeyAction::Insert(c);
    }

    KeyAction::Ignore
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_follow_shift() {
        assert_eq!(translate_key("a", false), KeyAction::Insert('a'));
        assert_eq!(translate_key("a", true), KeyAction::Insert('A'));
        assert_eq!(translate_key("Q", false), KeyAction::Insert('q'));
    }

    #[test]
    fn digits_and_punctuation_use_shift_table() {
        assert_eq!(translate_key("1", true), KeyAction::Insert('!'));
        assert_eq!(translate_key("0", true), KeyAction::Insert(')'));
        assert_eq!(translate_key("7", false), KeyAction::Insert('7'));
        assert_eq!(translate_key("/", true), KeyAction::Insert('?'));
        assert_eq!(translate_key("'", true), KeyAction::Insert('"'));
        assert_eq!(translate_key("`", true), KeyAction::Insert('~'));
        assert_eq!(translate_key(";", false), KeyAction::Insert(';'));
    }

    #[test]
    fn control_keys() {
        assert_eq!(translate_key("space", false), KeyAction::Insert(' '));
        assert_eq!(translate_key("enter", true), KeyAction::Insert('\n'));
        assert_eq!(translate_key("tab", false), KeyAction::Insert('\t'));
        assert_eq!(translate_key("backspace", false), KeyAction::Backspace);
        assert_eq!(translate_key("shift", true), KeyAction::Ignore);
        assert_eq!(translate_key("f5", false), KeyAction::Ignore);
    }
}
