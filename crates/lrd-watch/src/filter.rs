//! Entry skip policy shared by both detection strategies.

/// Whether a file name belongs to something editors produce as a side effect:
/// hidden files (`.foo`), emacs-style lock/autosave files (`#foo`), and
/// backup files (`foo~`).
///
/// Only the entry's own name is inspected; parent directory names do not
/// affect the decision.
pub(crate) fn is_ignored_name(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('#') || name.ends_with('~')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_files_are_ignored() {
        assert!(is_ignored_name(".gitignore"));
        assert!(is_ignored_name(".index.html.swp"));
    }

    #[test]
    fn lock_and_backup_files_are_ignored() {
        assert!(is_ignored_name("#index.html#"));
        assert!(is_ignored_name("index.html~"));
    }

    #[test]
    fn regular_names_pass() {
        assert!(!is_ignored_name("index.html"));
        assert!(!is_ignored_name("style.css"));
        assert!(!is_ignored_name("notes~backup.txt"));
        assert!(!is_ignored_name("c#.md"));
    }
}
