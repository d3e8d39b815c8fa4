use serde::{Deserialize, Serialize};

/// Label that "means" no category when entered by the user.
pub const OTHER_CATEGORY: &str = "Other";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "Name")]
    pub name: String,
}

impl Category {
    /// Category names are unique per user, compared case-insensitively.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }
}

/// Returns true if `name` should be stored without a category.
pub fn is_uncategorized_name(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(OTHER_CATEGORY)
}

/// Body for `POST /categories`.
#[derive(Debug, Clone, Serialize)]
pub struct NewCategory {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_name_ignores_case_and_whitespace() {
        let c = Category { id: 1, name: "Groceries".to_string() };
        assert!(c.matches_name("groceries"));
        assert!(c.matches_name("  GROCERIES "));
        assert!(!c.matches_name("Grocery"));
    }

    #[test]
    fn test_is_uncategorized_name() {
        assert!(is_uncategorized_name(""));
        assert!(is_uncategorized_name("   "));
        assert!(is_uncategorized_name("other"));
        assert!(is_uncategorized_name("OTHER"));
        assert!(!is_uncategorized_name("Others"));
    }

    #[test]
    fn test_parse_server_category() {
        let c: Category =
            serde_json::from_str(r#"{"ID":4,"UserID":1,"Name":"Rent","CreatedAt":"2025-01-01T00:00:00Z"}"#)
                .unwrap();
        assert_eq!(c, Category { id: 4, name: "Rent".to_string() });
    }
}
