pub fn has_disallowed_chars(value: &str) -> bool {
    value.chars().any(is_disallowed_char)
}

pub fn is_usable_stem(value: &str) -> bool {
    !value.is_empty() && !matches!(value, "." | "..")
}

fn is_disallowed_char(ch: char) -> bool {
    matches!(ch, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
        || ch == '\0'
        || ch.is_control()
}
