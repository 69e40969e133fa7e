//! Deterministic classification of ticket input and issue references.
//!
//! Patterns overlap (a Jira key can appear inside a GitHub URL, a GitLab
//! shorthand looks like a GitHub one), so rules are evaluated in a fixed
//! priority order and the first match wins.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::{IssueContext, IssuePattern, IssueType, TicketSource};

const ATLASSIAN_HOST: &str = "atlassian.net";
const GITHUB_HOST: &str = "github.com";

static JIRA_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z]+-\d+)").expect("jira key regex"));
static GITHUB_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"github\.com/([^/]+)/([^/]+)/(issues|pull)/(\d+)").expect("github url regex")
});
static GITHUB_SHORTHAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^/]+)/([^#]+)#(\d+)").expect("github shorthand regex"));
static GITLAB_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"gitlab\.com/([^/]+)/([^/]+)/-/(issues|merge_requests)/(\d+)")
        .expect("gitlab url regex")
});
static GITLAB_SELF_HOSTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"gitlab\.[^/]+/([^/]+)/([^/]+)/-/(issues|merge_requests)/(\d+)")
        .expect("gitlab self-hosted regex")
});
static GITLAB_SHORTHAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^/]+)/([^!#]+)[!#](\d+)").expect("gitlab shorthand regex"));

/// Infer where the ticket input came from.
///
/// A ticket file always wins over ticket text.
pub fn detect_ticket_source(text: Option<&str>, has_file: bool) -> TicketSource {
    if has_file {
        return TicketSource::File;
    }
    let Some(text) = text.filter(|t| !t.is_empty()) else {
        return TicketSource::Raw;
    };
    if JIRA_KEY_RE.is_match(text) || text.contains(ATLASSIAN_HOST) {
        return TicketSource::Jira;
    }
    if text.contains(GITHUB_HOST) || GITHUB_SHORTHAND_RE.is_match(text) {
        return TicketSource::Github;
    }
    TicketSource::Raw
}

/// Detect a Jira, GitHub or GitLab issue reference in free text.
pub fn detect_issue_context(text: Option<&str>) -> IssueContext {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return IssueContext::none();
    };

    if text.contains(ATLASSIAN_HOST) {
        return IssueContext::matched(IssueType::Jira, None, IssuePattern::AtlassianUrl);
    }

    if let Some(caps) = JIRA_KEY_RE.captures(text) {
        return IssueContext::matched(
            IssueType::Jira,
            Some(caps[1].to_string()),
            IssuePattern::JiraKey,
        );
    }

    if let Some(caps) = GITHUB_URL_RE.captures(text) {
        return IssueContext::matched(
            IssueType::Github,
            Some(format!("{}/{}#{}", &caps[1], &caps[2], &caps[4])),
            IssuePattern::GithubUrl,
        );
    }

    if GITHUB_SHORTHAND_RE.is_match(text) {
        return IssueContext::matched(
            IssueType::Github,
            Some(text.to_string()),
            IssuePattern::GithubShorthand,
        );
    }

    if let Some(caps) = GITLAB_URL_RE.captures(text) {
        return IssueContext::matched(
            IssueType::Gitlab,
            Some(format!("{}/{}!{}", &caps[1], &caps[2], &caps[4])),
            IssuePattern::GitlabUrl,
        );
    }

    if let Some(caps) = GITLAB_SELF_HOSTED_RE.captures(text) {
        return IssueContext::matched(
            IssueType::Gitlab,
            Some(format!("{}/{}!{}", &caps[1], &caps[2], &caps[4])),
            IssuePattern::GitlabSelfHostedUrl,
        );
    }

    // `#` alone is GitHub's shorthand, already handled above.
    if text.contains('!') && GITLAB_SHORTHAND_RE.is_match(text) {
        return IssueContext::matched(
            IssueType::Gitlab,
            Some(text.to_string()),
            IssuePattern::GitlabShorthand,
        );
    }

    IssueContext::none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(text: &str) -> IssueContext {
        detect_issue_context(Some(text))
    }

    #[test]
    fn ticket_source_rules() {
        assert_eq!(detect_ticket_source(Some("ABC-123"), false), TicketSource::Jira);
        assert_eq!(
            detect_ticket_source(Some("https://foo.atlassian.net/browse/xyz"), false),
            TicketSource::Jira
        );
        assert_eq!(detect_ticket_source(Some("org/repo#99"), false), TicketSource::Github);
        assert_eq!(
            detect_ticket_source(Some("https://github.com/org/repo/issues/9"), false),
            TicketSource::Github
        );
        assert_eq!(detect_ticket_source(Some("plain text"), false), TicketSource::Raw);
        assert_eq!(detect_ticket_source(Some(""), false), TicketSource::Raw);
        assert_eq!(detect_ticket_source(None, false), TicketSource::Raw);
    }

    #[test]
    fn ticket_file_overrides_text() {
        assert_eq!(detect_ticket_source(None, true), TicketSource::File);
        assert_eq!(detect_ticket_source(Some("ABC-123"), true), TicketSource::File);
    }

    #[test]
    fn jira_key_anywhere_in_text() {
        let ctx = issue("Please review PROJ-456 for context");
        assert!(ctx.is_issue);
        assert_eq!(ctx.issue_type, Some(IssueType::Jira));
        assert_eq!(ctx.issue_id.as_deref(), Some("PROJ-456"));
        assert_eq!(ctx.detected_pattern, Some(IssuePattern::JiraKey));
    }

    #[test]
    fn atlassian_url_beats_jira_key() {
        let ctx = issue("https://mycompany.atlassian.net/browse/ISSUE-789");
        assert_eq!(ctx.issue_type, Some(IssueType::Jira));
        assert_eq!(ctx.issue_id, None);
        assert_eq!(ctx.detected_pattern, Some(IssuePattern::AtlassianUrl));
    }

    #[test]
    fn lowercase_key_is_not_an_issue() {
        assert!(!issue("abc-123").is_issue);
    }

    #[test]
    fn jira_wins_over_github_url() {
        let ctx = issue("Fix ABC-123 see https://github.com/org/repo/issues/1");
        assert_eq!(ctx.issue_type, Some(IssueType::Jira));
        assert_eq!(ctx.issue_id.as_deref(), Some("ABC-123"));
    }

    #[test]
    fn github_issue_and_pull_urls() {
        let ctx = issue("https://github.com/owner/repo/issues/42");
        assert_eq!(ctx.issue_id.as_deref(), Some("owner/repo#42"));
        assert_eq!(ctx.detected_pattern, Some(IssuePattern::GithubUrl));

        let ctx = issue("https://github.com/owner/repo/pull/789");
        assert_eq!(ctx.issue_type, Some(IssueType::Github));
        assert_eq!(ctx.issue_id.as_deref(), Some("owner/repo#789"));
    }

    #[test]
    fn github_shorthand_keeps_raw_text() {
        let ctx = issue("owner/repo#99");
        assert_eq!(ctx.issue_type, Some(IssueType::Github));
        assert_eq!(ctx.issue_id.as_deref(), Some("owner/repo#99"));
        assert_eq!(ctx.detected_pattern, Some(IssuePattern::GithubShorthand));
    }

    #[test]
    fn partial_references_do_not_match() {
        assert!(!issue("github.com/owner").is_issue);
        assert!(!issue("owner/repo").is_issue);
        assert!(!issue("This is just plain text without any issues").is_issue);
    }

    #[test]
    fn gitlab_urls_use_bang_separator() {
        let ctx = issue("https://gitlab.com/owner/repo/-/issues/42");
        assert_eq!(ctx.issue_type, Some(IssueType::Gitlab));
        assert_eq!(ctx.issue_id.as_deref(), Some("owner/repo!42"));
        assert_eq!(ctx.detected_pattern, Some(IssuePattern::GitlabUrl));

        let ctx = issue("https://gitlab.com/owner/project/-/merge_requests/123");
        assert_eq!(ctx.issue_id.as_deref(), Some("owner/project!123"));
    }

    #[test]
    fn gitlab_self_hosted_url() {
        let ctx = issue("https://gitlab.mycompany.com/team/project/-/issues/99");
        assert_eq!(ctx.issue_type, Some(IssueType::Gitlab));
        assert_eq!(ctx.issue_id.as_deref(), Some("team/project!99"));
        assert_eq!(ctx.detected_pattern, Some(IssuePattern::GitlabSelfHostedUrl));
    }

    #[test]
    fn gitlab_shorthand_requires_bang() {
        let ctx = issue("owner/repo!456");
        assert_eq!(ctx.issue_type, Some(IssueType::Gitlab));
        assert_eq!(ctx.issue_id.as_deref(), Some("owner/repo!456"));
        assert_eq!(ctx.detected_pattern, Some(IssuePattern::GitlabShorthand));
    }

    #[test]
    fn empty_and_blank_text_are_not_issues() {
        assert_eq!(detect_issue_context(None), IssueContext::none());
        assert!(!issue("").is_issue);
        assert!(!issue("   ").is_issue);
    }
}
