//! Small shared helpers.

/// Truncate a string to at most `max` characters, appending an ellipsis
/// when anything was cut. Safe on multi-byte input (char boundary aware).
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max).collect();
    format!("{}...", cut)
}

/// Likely name variations for an email address, used when matching
/// meeting-note assignments to the user.
///
/// Example: "sarah.chen@acme.com" → ["sarah.chen", "sarah", "chen", "sarah chen"]
pub fn user_name_variants(email: &str) -> Vec<String> {
    if email.is_empty() {
        return Vec::new();
    }
    let local = email.split('@').next().unwrap_or("").to_lowercase();
    if local.is_empty() {
        return Vec::new();
    }

    let mut names = vec![local.clone()];
    if local.contains('.') {
        let parts: Vec<&str> = local.split('.').filter(|p| !p.is_empty()).collect();
        names.extend(parts.iter().map(|p| p.to_string()));
        names.push(parts.join(" "));
    }
    names
}

/// Display name portion of a "Name <addr>" sender header, trimmed.
pub fn sender_display(sender: &str) -> String {
    sender.split('<').next().unwrap_or(sender).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("hello world", 5), "hello...");
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        // Must not panic on non-ASCII boundaries.
        assert_eq!(truncate_chars("héllo wörld", 6), "héllo ...");
    }

    #[test]
    fn test_user_name_variants() {
        let names = user_name_variants("sarah.chen@acme.com");
        assert!(names.contains(&"sarah.chen".to_string()));
        assert!(names.contains(&"sarah".to_string()));
        assert!(names.contains(&"chen".to_string()));
        assert!(names.contains(&"sarah chen".to_string()));
    }

    #[test]
    fn test_user_name_variants_empty() {
        assert!(user_name_variants("").is_empty());
    }

    #[test]
    fn test_sender_display() {
        assert_eq!(sender_display("Sarah Chen <sarah@acme.com>"), "Sarah Chen");
        assert_eq!(sender_display("sarah@acme.com"), "sarah@acme.com");
    }
}
