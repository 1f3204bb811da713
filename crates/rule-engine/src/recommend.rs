/// Maximum number of optimization actions returned
pub const MAX_RECOMMENDATIONS: usize = 3;

/// Map rule warnings to concrete improvement actions.
///
/// Matching is by keyword; the first matching keyword wins for a warning.
/// Duplicates are dropped and at most three actions are returned.
pub fn recommend_actions<S: AsRef<str>>(reasons: &[S]) -> Vec<String> {
    let mut actions: Vec<String> = Vec::new();

    for reason in reasons {
        let reason = reason.as_ref().to_lowercase();
        let action = if reason.contains("receivables") || reason.contains("customer payments") {
            Some("Improve customer payment collection cycle")
        } else if reason.contains("emi") {
            Some("Explore loan restructuring or EMI reduction")
        } else if reason.contains("cash") {
            Some("Reduce discretionary operating expenses")
        } else {
            None
        };

        if let Some(action) = action {
            if !actions.iter().any(|a| a == action) {
                actions.push(action.to_string());
            }
        }
    }

    actions.truncate(MAX_RECOMMENDATIONS);
    actions
}
