use std::fmt::Write as _;

use client_core::QueryState;
use shared::domain::BreachRecord;

pub const MAX_ROWS: usize = 20;
const DATA_CLASSES_SHOWN: usize = 3;

pub fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn flags(record: &BreachRecord) -> Vec<&'static str> {
    [
        (record.is_verified, "verified"),
        (record.is_fabricated, "fabricated"),
        (record.is_sensitive, "sensitive"),
        (record.is_retired, "retired"),
        (record.is_spam_list, "spam list"),
        (record.is_malware, "malware"),
        (record.is_subscription_free, "subscription free"),
    ]
    .into_iter()
    .filter_map(|(set, label)| set.then_some(label))
    .collect()
}

pub fn render_state(state: &QueryState, max_rows: usize) -> String {
    let visible = state.visible_records();
    let mut out = String::new();

    let _ = write!(
        out,
        "== {} of {} breaches | filter: {}",
        visible.len(),
        state.all_records().len(),
        state.filter_mode()
    );
    if !state.search_query().is_empty() {
        let _ = write!(out, " | search: \"{}\"", state.search_query());
    }
    out.push_str(" ==\n");

    for record in visible.iter().take(max_rows) {
        let _ = writeln!(
            out,
            "  {} ({}) {}  {} accounts{}",
            record.title,
            if record.domain.is_empty() { "-" } else { record.domain.as_str() },
            record.breach_date,
            group_digits(record.pwn_count),
            if record.is_verified { "" } else { "  [unverified]" }
        );
        if !record.data_classes.is_empty() {
            let _ = writeln!(
                out,
                "      {}",
                record.data_class_summary(DATA_CLASSES_SHOWN)
            );
        }
    }
    if visible.len() > max_rows {
        let _ = writeln!(out, "  ... {} more; narrow with `search`", visible.len() - max_rows);
    }

    if state.is_loading() {
        out.push_str("loading...\n");
    } else if let Some(error) = state.error() {
        let _ = writeln!(out, "error: {error} (type `retry`)");
    } else if state.is_paged() && !state.is_exhausted() {
        out.push_str("more available (type `more`)\n");
    } else if visible.is_empty() && !state.all_records().is_empty() {
        out.push_str("no breaches match the current search and filter\n");
    }
    out
}

pub fn render_detail(record: &BreachRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} [{}]", record.title, record.name);
    let _ = writeln!(out, "  domain:      {}", record.domain);
    let _ = writeln!(out, "  breached:    {}", record.breach_date);
    let _ = writeln!(out, "  added:       {}", record.added_date);
    let _ = writeln!(out, "  modified:    {}", record.modified_date);
    let _ = writeln!(out, "  accounts:    {}", group_digits(record.pwn_count));
    let _ = writeln!(out, "  data:        {}", record.data_classes.join(", "));
    let _ = writeln!(out, "  flags:       {}", flags(record).join(", "));
    let _ = writeln!(out, "  logo:        {}", record.logo_path);
    let _ = writeln!(out, "  {}", record.description);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_thousands() {
        assert_eq!(group_digits(0), "0");
        assert_eq!(group_digits(999), "999");
        assert_eq!(group_digits(1_000), "1,000");
        assert_eq!(group_digits(152_445_165), "152,445,165");
    }

    #[test]
    fn empty_state_renders_header_only() {
        let rendered = render_state(&QueryState::default(), MAX_ROWS);
        assert_eq!(rendered, "== 0 of 0 breaches | filter: all ==\n");
    }
}
