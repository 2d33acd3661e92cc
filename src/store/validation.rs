use super::StoreState;
use crate::errors::{AppError, AppResult};
use crate::support::is_valid_url;

/// The identity-bearing fields of a dashboard about to be stored.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate<'a> {
    pub name: &'a str,
    pub url: &'a str,
    pub lists: Option<&'a [String]>,
}

/// Checks required fields, URL syntax and uniqueness against every stored
/// dashboard except `exclude_id`.
pub(crate) fn validate_dashboard(
    state: &StoreState,
    candidate: Candidate<'_>,
    exclude_id: Option<&str>,
) -> AppResult<()> {
    let name = candidate.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Dashboard name is required".to_string()));
    }
    let url = candidate.url.trim();
    if url.is_empty() {
        return Err(AppError::Validation("Dashboard URL is required".to_string()));
    }
    if !is_valid_url(url) {
        return Err(AppError::Validation(format!("Invalid URL format: '{}'", url)));
    }

    let folded_name = name.to_lowercase();
    let others = state
        .dashboards
        .iter()
        .filter(|(id, _)| Some(id.as_str()) != exclude_id);
    for (_, existing) in others.clone() {
        if existing.name.to_lowercase() == folded_name {
            return Err(AppError::Validation(format!(
                "Dashboard name \"{}\" already exists",
                name
            )));
        }
    }
    for (_, existing) in others {
        if existing.url == url {
            return Err(AppError::Validation(format!(
                "Dashboard URL \"{}\" already exists",
                url
            )));
        }
    }

    if let Some(lists) = candidate.lists {
        validate_list_names(lists)?;
    }
    Ok(())
}

pub(crate) fn validate_list_names(lists: &[String]) -> AppResult<()> {
    if lists.iter().any(|list_name| list_name.trim().is_empty()) {
        return Err(AppError::Validation(
            "All list names must be non-empty strings".to_string(),
        ));
    }
    Ok(())
}

/// Trims a list name argument and rejects blanks.
pub(crate) fn require_list_name(raw: &str) -> AppResult<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("List name cannot be empty".to_string()));
    }
    Ok(trimmed)
}

/// Trims labels and collapses duplicates, keeping the first occurrence.
pub(crate) fn dedupe_lists<I>(lists: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for list_name in lists {
        let list_name = list_name.trim();
        if !out.iter().any(|existing| existing == list_name) {
            out.push(list_name.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dashboard, DEFAULT_STATUS};
    use serde_json::Map;

    fn state_with(name: &str, url: &str) -> StoreState {
        let mut state = StoreState::default();
        state.dashboards.insert(
            "existing".to_string(),
            Dashboard {
                id: "existing".to_string(),
                name: name.to_string(),
                url: url.to_string(),
                lists: Vec::new(),
                description: String::new(),
                selected: false,
                status: DEFAULT_STATUS.to_string(),
                created_at: "t0".to_string(),
                updated_at: "t0".to_string(),
                last_captured: None,
                capture_count: 0,
                metadata: Map::new(),
            },
        );
        state
    }

    fn candidate<'a>(name: &'a str, url: &'a str) -> Candidate<'a> {
        Candidate { name, url, lists: None }
    }

    #[test]
    fn rejects_blank_required_fields_and_bad_urls() {
        let state = StoreState::default();
        let error = validate_dashboard(&state, candidate("  ", "http://x/1"), None).expect_err("blank name");
        assert!(error.to_string().contains("name is required"));
        let error = validate_dashboard(&state, candidate("A", " "), None).expect_err("blank url");
        assert!(error.to_string().contains("URL is required"));
        let error = validate_dashboard(&state, candidate("A", "not a url"), None).expect_err("bad url");
        assert!(error.to_string().contains("Invalid URL"));
    }

    #[test]
    fn name_collision_is_case_insensitive_and_url_collision_is_exact() {
        let state = state_with("Sales", "http://x/1");
        let error = validate_dashboard(&state, candidate(" sales ", "http://x/2"), None).expect_err("dup name");
        assert!(error.is_validation());
        assert!(error.to_string().contains("already exists"));

        let error = validate_dashboard(&state, candidate("Other", "http://x/1"), None).expect_err("dup url");
        assert!(error.to_string().contains("URL \"http://x/1\""));

        validate_dashboard(&state, candidate("Other", "http://X/1"), None).expect("url differs by case");
    }

    #[test]
    fn excluded_record_does_not_collide_with_itself() {
        let state = state_with("Sales", "http://x/1");
        validate_dashboard(&state, candidate("SALES", "http://x/1"), Some("existing")).expect("self excluded");
    }

    #[test]
    fn list_entries_must_be_non_blank() {
        let state = StoreState::default();
        let lists = vec!["Ops".to_string(), " ".to_string()];
        let error = validate_dashboard(
            &state,
            Candidate { name: "A", url: "http://x/1", lists: Some(lists.as_slice()) },
            None,
        )
        .expect_err("blank list");
        assert!(error.to_string().contains("non-empty"));
    }

    #[test]
    fn dedupe_keeps_first_occurrence_order() {
        let lists = ["b", "a", "b", "c", "a"].map(String::from);
        assert_eq!(dedupe_lists(lists), vec!["b", "a", "c"]);
    }

    #[test]
    fn dedupe_trims_before_comparing() {
        let lists = [" Ops", "Ops ", "Finance", " Finance "].map(String::from);
        assert_eq!(dedupe_lists(lists), vec!["Ops", "Finance"]);
    }

    #[test]
    fn require_list_name_trims() {
        assert_eq!(require_list_name("  Ops ").expect("trimmed"), "Ops");
        assert!(require_list_name("   ").is_err());
    }
}
