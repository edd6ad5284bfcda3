//! AMQP topic-pattern matching.

/// Returns true if `routing_key` matches the binding `pattern`.
///
/// Patterns follow AMQP topic grammar over dot-separated segments:
/// `*` substitutes exactly one segment, `#` substitutes zero or more.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    segments_match(&pattern, &key)
}

fn segments_match(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => {
            segments_match(rest, key) || (!key.is_empty() && segments_match(pattern, &key[1..]))
        }
        Some((&"*", rest)) => !key.is_empty() && segments_match(rest, &key[1..]),
        Some((segment, rest)) => {
            key.first() == Some(segment) && segments_match(rest, &key[1..])
        }
    }
}
