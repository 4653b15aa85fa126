//! Publish strategy selection and outcome classification.
//!
//! A publish attempt runs through an ordered chain of API targets. Each
//! attempt either succeeds, fails in a way where the next target might
//! still work, or fails in a way that dooms every target equally.

use outbox_linkedin::{LinkedInError, PublishTarget};
use outbox_store::Organization;

/// Result of a single strategy attempt.
#[derive(Debug)]
pub enum StrategyOutcome {
    /// The platform accepted the post; carries the platform post id.
    Success(String),
    /// This target failed but a different target might succeed.
    Retryable(LinkedInError),
    /// Credentials or quota problem; no other target can do better.
    Fatal(LinkedInError),
}

/// Ordered targets to attempt for a publication.
///
/// Posting as the organization uses exactly one target: if the page
/// credentials are wrong there is no meaningful fallback to posting as
/// a member. Member posts fall back from the current Posts API to the
/// legacy UGC API.
pub fn strategy_chain(post_as_organization: bool, org: &Organization) -> Vec<PublishTarget> {
    if post_as_organization && org.organization_id.is_some() {
        vec![PublishTarget::OrganizationPosts]
    } else {
        vec![PublishTarget::MemberPosts, PublishTarget::MemberUgc]
    }
}

/// Classifies a gateway result into a strategy outcome.
pub fn outcome_of(result: Result<String, LinkedInError>) -> StrategyOutcome {
    match result {
        Ok(post_id) => StrategyOutcome::Success(post_id),
        Err(err) => match err {
            LinkedInError::AuthExpired
            | LinkedInError::PermissionDenied(_)
            | LinkedInError::RateLimited
            | LinkedInError::Misconfigured(_) => StrategyOutcome::Fatal(err),
            LinkedInError::PostNotFound(_)
            | LinkedInError::TokenExchange(_)
            | LinkedInError::Platform(_)
            | LinkedInError::Http(_)
            | LinkedInError::InvalidResponse(_) => StrategyOutcome::Retryable(err),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org(organization_id: Option<&str>) -> Organization {
        Organization {
            id: "org-1".to_string(),
            name: "Test Org".to_string(),
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "https://example.test/cb".to_string(),
            organization_id: organization_id.map(String::from),
            access_token: Some("token".to_string()),
            member_id: Some("member".to_string()),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn member_chain_falls_back_to_ugc() {
        let chain = strategy_chain(false, &org(Some("123")));
        assert_eq!(
            chain,
            vec![PublishTarget::MemberPosts, PublishTarget::MemberUgc]
        );
    }

    #[test]
    fn organization_chain_is_single_target() {
        let chain = strategy_chain(true, &org(Some("123")));
        assert_eq!(chain, vec![PublishTarget::OrganizationPosts]);
    }

    #[test]
    fn organization_request_without_page_id_posts_as_member() {
        let chain = strategy_chain(true, &org(None));
        assert_eq!(
            chain,
            vec![PublishTarget::MemberPosts, PublishTarget::MemberUgc]
        );
    }

    #[test]
    fn auth_failures_are_fatal() {
        assert!(matches!(
            outcome_of(Err(LinkedInError::AuthExpired)),
            StrategyOutcome::Fatal(_)
        ));
        assert!(matches!(
            outcome_of(Err(LinkedInError::RateLimited)),
            StrategyOutcome::Fatal(_)
        ));
        assert!(matches!(
            outcome_of(Err(LinkedInError::PermissionDenied("nope".into()))),
            StrategyOutcome::Fatal(_)
        ));
    }

    #[test]
    fn platform_failures_are_retryable() {
        assert!(matches!(
            outcome_of(Err(LinkedInError::Platform("500".into()))),
            StrategyOutcome::Retryable(_)
        ));
        assert!(matches!(
            outcome_of(Err(LinkedInError::InvalidResponse("no id".into()))),
            StrategyOutcome::Retryable(_)
        ));
    }

    #[test]
    fn success_carries_post_id() {
        match outcome_of(Ok("urn:li:share:1".into())) {
            StrategyOutcome::Success(id) => assert_eq!(id, "urn:li:share:1"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
