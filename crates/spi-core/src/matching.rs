//! Service name matching against free-form output lines.

/// Returns the services mentioned in `line_lower`, in the order of `services`.
///
/// A name counts only at a word boundary (so `file` does not match inside
/// `profile`), and an occurrence nested inside the occurrence of a longer
/// service (`indexer` inside `indexer-queue`) is discarded. The bold markdown
/// form `**name**` is covered by the boundary rule.
pub fn mentioned_services<'a, I>(line_lower: &str, services: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let services: Vec<&'a str> = services.into_iter().collect();
    let mut spans: Vec<(usize, usize, usize)> = Vec::new();

    for (idx, name) in services.iter().enumerate() {
        if name.is_empty() {
            continue;
        }
        for (start, _) in line_lower.match_indices(name) {
            let end = start + name.len();
            if is_boundary(line_lower, start, end) {
                spans.push((start, end, idx));
            }
        }
    }

    let kept: Vec<usize> = spans
        .iter()
        .filter(|(start, end, _)| {
            !spans.iter().any(|(s, e, _)| {
                (s <= start && end <= e) && (e - s) > (end - start)
            })
        })
        .map(|(_, _, idx)| *idx)
        .collect();

    services
        .iter()
        .enumerate()
        .filter(|(idx, _)| kept.contains(idx))
        .map(|(_, name)| *name)
        .collect()
}

/// True when `service` is mentioned in `line_lower` under [`mentioned_services`] rules.
pub fn mentions<'a, I>(line_lower: &str, service: &str, services: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    mentioned_services(line_lower, services).contains(&service)
}

fn is_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}
