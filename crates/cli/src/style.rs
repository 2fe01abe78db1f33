//! Terminal styling for sync reports.

use console::{style, Style};

fn marked(mark: &str, color: Style, msg: &str) -> String {
    format!("{} {}", color.apply_to(mark), msg)
}

pub fn success(msg: &str) -> String {
    marked("✓", Style::new().green(), msg)
}

pub fn error(msg: &str) -> String {
    marked("✗", Style::new().red(), msg)
}

pub fn warn(msg: &str) -> String {
    marked("⚠", Style::new().yellow(), msg)
}

/// `==> name`, used above each phase report and summary block.
pub fn title(name: &str) -> String {
    format!("{} {}", style("==>").cyan().bold(), style(name).bold())
}

pub fn dim(msg: &str) -> String {
    style(msg).dim().to_string()
}

/// First twelve characters of a commit id.
pub fn abbrev(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

/// Abbreviated commit id, dimmed.
pub fn short_id(id: &str) -> String {
    dim(abbrev(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev() {
        assert_eq!(abbrev("0123456789abcdef0123"), "0123456789ab");
        assert_eq!(abbrev("abc"), "abc");
    }

    #[test]
    fn test_title_contains_name() {
        console::set_colors_enabled(false);
        assert_eq!(title("Syncing changes from #4"), "==> Syncing changes from #4");
    }
}
