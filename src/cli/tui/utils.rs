//! Shared utilities for TUI views

use ratatui::text::Line;

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncate_at = max_len.saturating_sub(3);
        let truncated: String = s.chars().take(truncate_at).collect();
        format!("{}...", truncated)
    }
}

/// Truncate from the left, keeping the end of a path visible
pub fn truncate_start(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        s.to_string()
    } else {
        let keep = max_len.saturating_sub(3);
        let tail: String = s.chars().skip(count - keep).collect();
        format!("...{}", tail)
    }
}

/// First row to show so that `cursor_row` is inside a window of `height`
/// rows, starting from the preferred `scroll`.
pub fn visible_offset(scroll: usize, cursor_row: usize, height: usize) -> usize {
    if height == 0 {
        return scroll;
    }
    if cursor_row < scroll {
        cursor_row
    } else if cursor_row >= scroll + height {
        cursor_row + 1 - height
    } else {
        scroll
    }
}

/// Terminal cells taken by `s`; wide characters count twice
pub fn display_width(s: &str) -> usize {
    Line::raw(s).width()
}

/// Characters of `line` to skip so the cursor before character `col` stays
/// inside a pane `width` cells wide
pub fn horizontal_offset(line: &str, col: usize, width: usize) -> usize {
    if width == 0 {
        return 0;
    }
    let before: Vec<char> = line.chars().take(col).collect();
    let mut skip = 0;
    while skip < before.len() && display_width(&before[skip..].iter().collect::<String>()) >= width {
        skip += 1;
    }
    skip
}
