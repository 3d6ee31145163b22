//! Small shared helpers

/// Split a comma-delimited string into trimmed, non-empty entries.
pub fn csv_to_list(src: &str) -> Vec<String> {
    src.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_to_list() {
        assert_eq!(csv_to_list("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(csv_to_list(" admin , developer "), vec!["admin", "developer"]);
        assert_eq!(csv_to_list("single"), vec!["single"]);
    }

    #[test]
    fn test_csv_to_list_drops_empty_entries() {
        assert_eq!(csv_to_list("a,,b,"), vec!["a", "b"]);
        assert!(csv_to_list("").is_empty());
        assert!(csv_to_list(" , ").is_empty());
    }
}
