use strsim::normalized_levenshtein;

/// Fuzzy matcher for schema identifiers
pub struct FuzzyMatcher {
    /// Similarity threshold (0.0-1.0) a candidate must reach to count as a match
    pub similarity_threshold: f64,
    /// Whether to normalize identifiers before comparison
    pub normalize: bool,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
            normalize: true,
        }
    }
}

impl FuzzyMatcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            similarity_threshold: threshold,
            normalize: true,
        }
    }

    /// Normalize an identifier for fuzzy matching
    /// - Strips quoting (backticks, double quotes, brackets)
    /// - Converts to lowercase
    pub fn normalize_identifier(&self, s: &str) -> String {
        if !self.normalize {
            return s.to_string();
        }

        s.trim()
            .chars()
            .filter(|c| !matches!(c, '`' | '"' | '[' | ']'))
            .collect::<String>()
            .to_lowercase()
    }

    /// Edit-distance similarity between 0.0 and 1.0 (higher = more similar)
    pub fn similarity(&self, s1: &str, s2: &str) -> f64 {
        let norm1 = self.normalize_identifier(s1);
        let norm2 = self.normalize_identifier(s2);
        normalized_levenshtein(&norm1, &norm2)
    }

    pub fn is_match(&self, s1: &str, s2: &str) -> bool {
        self.similarity(s1, s2) >= self.similarity_threshold
    }

    /// Find the best candidate for `target`.
    ///
    /// Ranking is strictly descending by score; on equal scores the candidate
    /// enumerated first wins. Returns `(candidate, score)` when the best score
    /// reaches the threshold.
    pub fn find_best_match<'a, I>(&self, target: &str, candidates: I) -> Option<(&'a str, f64)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut best: Option<(&'a str, f64)> = None;

        for candidate in candidates {
            let score = self.similarity(target, candidate);
            if score < self.similarity_threshold {
                continue;
            }
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((candidate, score)),
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_identifier() {
        let matcher = FuzzyMatcher::default();

        assert_eq!(matcher.normalize_identifier("`Employee_Name`"), "employee_name");
        assert_eq!(matcher.normalize_identifier(" \"HRDatabase\" "), "hrdatabase");
    }

    #[test]
    fn test_similarity() {
        let matcher = FuzzyMatcher::default();

        let similarity = matcher.similarity("hrdatabase_emplyee", "hrdatabase_employee");
        assert!(similarity > 0.9);
        assert_eq!(matcher.similarity("Name", "name"), 1.0);
    }

    #[test]
    fn test_is_match() {
        let matcher = FuzzyMatcher::new(0.6);

        assert!(matcher.is_match("employee_nme", "employee_name"));
        assert!(!matcher.is_match("salary", "hrdatabase_teammanagement"));
    }

    #[test]
    fn test_find_best_match_prefers_highest_score() {
        let matcher = FuzzyMatcher::default();
        let candidates = ["hrdatabase_attendancerecords", "hrdatabase_employee", "hrdatabase_employees"];

        let (best, _) = matcher
            .find_best_match("hrdatabase_emplyee", candidates.iter().copied())
            .unwrap();
        assert_eq!(best, "hrdatabase_employee");
    }

    #[test]
    fn test_find_best_match_tie_keeps_first() {
        let matcher = FuzzyMatcher::default();
        // Both candidates are one edit away from the target
        let candidates = ["name_a", "name_b"];

        let (best, _) = matcher.find_best_match("name_c", candidates.iter().copied()).unwrap();
        assert_eq!(best, "name_a");
    }

    #[test]
    fn test_find_best_match_below_threshold() {
        let matcher = FuzzyMatcher::default();
        assert!(matcher
            .find_best_match("xyz", ["hrdatabase_employee"].iter().copied())
            .is_none());
    }
}
