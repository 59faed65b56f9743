/// Shortens `label` to at most `max_chars` characters, marking the cut with an
/// ellipsis.
pub fn truncate_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        return label.to_owned();
    }
    if max_chars == 0 {
        return String::new();
    }

    let mut truncated: String = label.chars().take(max_chars - 1).collect();
    truncated.push('…');
    truncated
}

pub fn format_weight(weight: f64) -> String {
    if weight.abs() >= 100.0 {
        format!("{weight:+.0}")
    } else {
        format!("{weight:+.3}")
    }
}

pub fn format_pct(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// Renders a prompt token with control characters made visible.
pub fn display_token(token: &str) -> String {
    token
        .chars()
        .flat_map(|ch| match ch {
            '\n' => vec!['⏎'],
            '\t' => vec!['⇥'],
            ' ' => vec!['·'],
            other => vec![other],
        })
        .collect()
}
