use indexmap::IndexMap;

/// Infer the domains a scope touches from a keyword table.
///
/// A domain matches when any of its keywords occurs as a substring of the
/// lower-cased scope. There is no word-boundary check, so `"api"` also fires
/// on `"rapid"`; existing keyword lists rely on this looseness. Output order
/// follows the table's insertion order.
pub fn infer_domains(scope: &str, domain_keywords: &IndexMap<String, Vec<String>>) -> Vec<String> {
    let scope_lower = scope.to_lowercase();

    domain_keywords
        .iter()
        .filter(|(_, keywords)| {
            keywords
                .iter()
                .filter(|kw| !kw.is_empty())
                .any(|kw| scope_lower.contains(&kw.to_lowercase()))
        })
        .map(|(domain, _)| domain.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gremlin_core::PatternCatalog;

    fn table(entries: &[(&str, &[&str])]) -> IndexMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(d, kws)| (d.to_string(), kws.iter().map(|k| k.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_matches_payments_for_checkout() {
        let keywords = table(&[
            ("auth", &["login", "token"]),
            ("payments", &["checkout", "stripe"]),
        ]);
        assert_eq!(infer_domains("checkout flow with Stripe", &keywords), vec!["payments"]);
    }

    #[test]
    fn test_case_insensitive() {
        let keywords = PatternCatalog::builtin().unwrap().domain_keywords();
        for scope in [
            "checkout flow with Stripe",
            "User login with JWT token refresh",
            "image upload to S3 behind a CDN cache",
            "nothing relevant here",
        ] {
            assert_eq!(
                infer_domains(scope, &keywords),
                infer_domains(&scope.to_uppercase(), &keywords)
            );
        }
    }

    #[test]
    fn test_order_follows_table_not_scope() {
        let keywords = table(&[
            ("auth", &["login"]),
            ("database", &["postgres"]),
            ("payments", &["checkout"]),
        ]);
        let domains = infer_domains("checkout writes to postgres after login", &keywords);
        assert_eq!(domains, vec!["auth", "database", "payments"]);
    }

    #[test]
    fn test_substring_inside_word_matches() {
        let keywords = table(&[("api", &["api"])]);
        assert_eq!(infer_domains("rapid prototyping", &keywords), vec!["api"]);
    }

    #[test]
    fn test_upper_case_keywords_still_match() {
        let keywords = table(&[("payments", &["Stripe"])]);
        assert_eq!(infer_domains("stripe webhooks", &keywords), vec!["payments"]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(infer_domains("anything", &IndexMap::new()).is_empty());
        let keywords = table(&[("auth", &["", "login"])]);
        assert!(infer_domains("", &keywords).is_empty());
    }
}
