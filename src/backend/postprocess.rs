//! Deterministic cleanup of VLM-generated Markdown.
//!
//! Vision models follow the prompt most of the time, not all of the time.
//! The passes below repair the recurring slips without touching content:
//!
//! 1. Strip an outer ```` ```markdown ```` fence around the whole answer
//! 2. Normalise line endings and drop trailing whitespace
//! 3. Drop invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 4. Remove "Page N of M" footer lines copied from the print layout
//! 5. Insert a missing GFM separator row under a table's header
//! 6. Collapse runs of blank lines to a single blank line
//! 7. End with exactly one newline
//!
//! Order matters: fences go first so line-based passes see clean input, and
//! blank-line collapsing runs after footer removal leaves gaps behind.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup pass to one page of raw VLM output.
pub fn clean_page(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = normalise_lines(&s);
    let s = remove_invisible_chars(&s);
    let s = remove_page_footers(&s);
    let s = repair_table_headers(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\n(.*)\n```\s*$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

fn normalise_lines(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'], "")
}

static RE_PAGE_FOOTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:-\s*)?(?:page|p\.)\s*\d+\s*(?:(?:of|/)\s*\d+)?\s*(?:-\s*)?$").unwrap()
});

fn remove_page_footers(input: &str) -> String {
    input
        .lines()
        .filter(|line| !RE_PAGE_FOOTER.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_table_row(line: &str) -> bool {
    let t = line.trim();
    t.len() > 2 && t.starts_with('|') && t.ends_with('|')
}

fn is_separator_row(line: &str) -> bool {
    let t = line.trim();
    t.starts_with('|') && t.contains('-') && t.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

/// A table whose first row is not followed by a separator row gets one.
fn repair_table_headers(input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 4);
    let mut prev_was_table = false;

    for (i, line) in lines.iter().enumerate() {
        out.push((*line).to_string());
        let is_row = is_table_row(line);
        let starts_table = is_row && !prev_was_table && !is_separator_row(line);
        if starts_table {
            let next = lines.get(i + 1).copied().unwrap_or("");
            if is_table_row(next) && !is_separator_row(next) {
                let cols = line.trim().matches('|').count().saturating_sub(1).max(1);
                let mut sep = String::from("|");
                for _ in 0..cols {
                    sep.push_str(" --- |");
                }
                out.push(sep);
            }
        }
        prev_was_table = is_row;
    }

    out.join("\n")
}

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n").into_owned()
}

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{trimmed}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outer_fence_is_stripped() {
        assert_eq!(strip_outer_fence("```markdown\n# A\nb\n```"), "# A\nb");
        assert_eq!(strip_outer_fence("```\n# A\n```\n"), "# A");
        assert_eq!(strip_outer_fence("# A\n```rust\nx\n```"), "# A\n```rust\nx\n```");
    }

    #[test]
    fn page_footers_are_removed() {
        let input = "Intro\nPage 3 of 12\n- 4 -\np. 5\nPage break ahead";
        let out = remove_page_footers(input);
        assert_eq!(out, "Intro\n- 4 -\nPage break ahead");
    }

    #[test]
    fn missing_table_separator_is_inserted() {
        let out = repair_table_headers("| Sheet | Total |\n| Q1 | 10 |\n| Q2 | 12 |");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "| --- | --- |");
    }

    #[test]
    fn well_formed_table_is_untouched() {
        let input = "| A | B |\n|:--|--:|\n| 1 | 2 |";
        assert_eq!(repair_table_headers(input), input);
    }

    #[test]
    fn clean_page_full_run() {
        let raw = "```markdown\n# Budget\r\n\r\n\r\n\r\n| Item | Cost |  \n| Paper | 3 |\nPage 1 of 2\u{200B}\n```";
        let out = clean_page(raw);
        assert_eq!(out, "# Budget\n\n| Item | Cost |\n| --- | --- |\n| Paper | 3 |\n");
    }

    #[test]
    fn empty_input_becomes_single_newline() {
        assert_eq!(clean_page("   \n\n"), "\n");
    }
}
