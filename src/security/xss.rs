//! XSS protection for user-supplied chat text
//!
//! Every character that could open markup, attributes, URLs or CSS is
//! replaced by an entity. Entities this module produces are passed through
//! untouched, so sanitizing twice yields the same text as sanitizing once.

/// Characters escaped and their replacement entities
const ENTITIES: &[(char, &str)] = &[
    ('<', "&lt;"),
    ('>', "&gt;"),
    ('&', "&amp;"),
    ('"', "&quot;"),
    ('\'', "&apos;"),
    ('=', "&#x3D;"),
    ('%', "&#x25;"),
    (':', "&#x3A;"),
    (';', "&#x3B;"),
    ('#', "&#x23;"),
    ('@', "&#x40;"),
    ('{', "&#x7B;"),
    ('}', "&#x7D;"),
    ('[', "&#x5B;"),
    (']', "&#x5D;"),
    ('(', "&#x28;"),
    (')', "&#x29;"),
    ('?', "&#x3F;"),
    ('+', "&#x2B;"),
    ('-', "&#x2D;"),
];

fn entity_for(c: char) -> Option<&'static str> {
    ENTITIES.iter().find(|(ch, _)| *ch == c).map(|(_, entity)| *entity)
}

/// Length of a known entity at the start of `rest`, if any
fn known_entity_len(rest: &str) -> Option<usize> {
    ENTITIES
        .iter()
        .map(|(_, entity)| *entity)
        .find(|entity| rest.starts_with(entity))
        .map(str::len)
}

/// Escape user input for storage and echo
pub fn sanitize_input(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut index = 0;

    while let Some(c) = input[index..].chars().next() {
        if c == '&' {
            if let Some(len) = known_entity_len(&input[index..]) {
                result.push_str(&input[index..index + len]);
                index += len;
                continue;
            }
        }

        match entity_for(c) {
            Some(entity) => result.push_str(entity),
            None => result.push(c),
        }
        index += c.len_utf8();
    }

    result
}
