use std::str::FromStr;

use super::error::TypeError;

pub type FormData = Vec<(String, String)>;

/// Decoded query-string parameters. Keys may repeat (`?tags=a&tags=b`).
#[derive(Debug, Clone, Default)]
pub struct Form {
    inner: FormData,
}

impl Form {
    pub fn from_pairs(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.inner
            .iter()
            .filter(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.to_owned())
            .collect()
    }

    pub fn get_number<T>(&self, key: &str) -> Result<Option<T>, TypeError>
    where
        T: FromStr,
    {
        match self.get_str(key) {
            Some("") | None => Ok(None),
            Some(v) => v
                .trim()
                .parse()
                .map(Some)
                .map_err(|_e| TypeError::new(key, "A valid number is required.")),
        }
    }

    /// `1` switches a filter on, any other number leaves it off.
    pub fn get_flag(&self, key: &str) -> Result<bool, TypeError> {
        Ok(self.get_number::<i64>(key)? == Some(1))
    }
}

/// `LIKE` pattern (matched case-insensitively by callers) for values that start with `prefix`, with the
/// pattern metacharacters in `prefix` matched literally.
pub fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> Form {
        Form::from_pairs(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn repeated_keys_are_collected() {
        let form = form(&[("tags", "breakfast"), ("author", "3"), ("tags", "lunch")]);

        assert_eq!(form.get_all("tags"), vec!["breakfast", "lunch"]);
        assert_eq!(form.get_number::<i32>("author").unwrap(), Some(3));
    }

    #[test]
    fn bad_numbers_name_the_key() {
        let error = form(&[("author", "abc")]).get_number::<i32>("author").unwrap_err();

        assert_eq!(error.to_string(), "author (A valid number is required.)");
    }

    #[test]
    fn flags_only_turn_on_with_one() {
        let form = form(&[("is_favorited", "1"), ("is_in_shopping_cart", "0")]);

        assert!(form.get_flag("is_favorited").unwrap());
        assert!(!form.get_flag("is_in_shopping_cart").unwrap());
        assert!(!form.get_flag("missing").unwrap());
    }

    #[test]
    fn prefix_pattern_escapes_wildcards() {
        assert_eq!(prefix_pattern("to"), "to%");
        assert_eq!(prefix_pattern("50%_"), "50\\%\\_%");
    }
}
