//! LinkedIn REST client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::{
    AuthContext, DeleteOutcome, DraftPost, Gateway, LinkedInError, PublishTarget, TokenGrant,
};

const RESTLI_VERSION: &str = "2.0.0";
const API_VERSION: &str = "202401";

/// Client for the LinkedIn REST APIs.
pub struct LinkedInClient {
    http: Client,
    api_base: String,
    auth_base: String,
}

impl LinkedInClient {
    /// Create a client against the production endpoints.
    pub fn new() -> Result<Self, LinkedInError> {
        Self::with_base_urls("https://api.linkedin.com", "https://www.linkedin.com")
    }

    /// Create a client against custom endpoints. Used by tests.
    pub fn with_base_urls(
        api_base: impl Into<String>,
        auth_base: impl Into<String>,
    ) -> Result<Self, LinkedInError> {
        // Outbound calls must never hang a job indefinitely.
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.into(),
            auth_base: auth_base.into(),
        })
    }

    /// Exchange an OAuth authorization code for an access token and the
    /// member identity behind it.
    pub async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
        code: &str,
    ) -> Result<TokenGrant, LinkedInError> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        #[derive(Deserialize)]
        struct UserInfo {
            sub: String,
        }

        let response = self
            .http
            .post(format!("{}/oauth/v2/accessToken", self.auth_base))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LinkedInError::TokenExchange(format!("{status}: {body}")));
        }
        let token: TokenResponse = response.json().await?;

        let response = self
            .http
            .get(format!("{}/v2/userinfo", self.api_base))
            .bearer_auth(&token.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LinkedInError::TokenExchange(format!(
                "userinfo failed {status}: {body}"
            )));
        }
        let info: UserInfo = response.json().await?;

        debug!(member_id = %info.sub, "exchanged authorization code");
        Ok(TokenGrant {
            access_token: token.access_token,
            member_id: info.sub,
        })
    }

    /// Build the authorization URL a user visits to connect an account.
    pub fn authorization_url(&self, client_id: &str, redirect_uri: &str, state: &str) -> String {
        let scope = "openid profile email w_member_social";
        format!(
            "{}/oauth/v2/authorization?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            self.auth_base,
            client_id,
            encode_component(redirect_uri),
            encode_component(scope),
            state,
        )
    }

    /// Register an upload slot for a feed image. Returns the upload URL
    /// and the asset URN to reference from the post.
    async fn register_upload(
        &self,
        access_token: &str,
        owner_urn: &str,
    ) -> Result<(String, String), LinkedInError> {
        let body = json!({
            "registerUploadRequest": {
                "recipes": ["urn:li:digitalmediaRecipe:feedshare-image"],
                "owner": owner_urn,
                "serviceRelationships": [{
                    "relationshipType": "OWNER",
                    "identifier": "urn:li:userGeneratedContent"
                }]
            }
        });

        let response = self
            .http
            .post(format!(
                "{}/v2/assets?action=registerUpload",
                self.api_base
            ))
            .bearer_auth(access_token)
            .header("X-Restli-Protocol-Version", RESTLI_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_failure(response).await);
        }

        let value: serde_json::Value = response.json().await?;
        let upload_url = value
            .pointer(
                "/value/uploadMechanism/com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest/uploadUrl",
            )
            .and_then(|v| v.as_str())
            .ok_or_else(|| LinkedInError::InvalidResponse("missing uploadUrl".to_string()))?
            .to_string();
        let asset = value
            .pointer("/value/asset")
            .and_then(|v| v.as_str())
            .ok_or_else(|| LinkedInError::InvalidResponse("missing asset urn".to_string()))?
            .to_string();

        Ok((upload_url, asset))
    }

    /// Upload an image buffer and return its asset URN.
    async fn upload_image(
        &self,
        access_token: &str,
        owner_urn: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<String, LinkedInError> {
        let (upload_url, asset) = self.register_upload(access_token, owner_urn).await?;

        let response = self
            .http
            .put(&upload_url)
            .header("Content-Type", mime.to_string())
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_failure(response).await);
        }
        Ok(asset)
    }

    /// Download a remote image and upload it as an asset.
    async fn upload_image_from_url(
        &self,
        access_token: &str,
        owner_urn: &str,
        image_url: &str,
    ) -> Result<String, LinkedInError> {
        let response = self.http.get(image_url).send().await?;
        if !response.status().is_success() {
            return Err(LinkedInError::Platform(format!(
                "image fetch failed ({}): {}",
                response.status(),
                image_url
            )));
        }
        let mime = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = response.bytes().await?.to_vec();

        self.upload_image(access_token, owner_urn, bytes, &mime)
            .await
    }

    /// Upload every image in the draft, best-effort. Each upload is
    /// independent; a failed asset is logged and skipped rather than
    /// failing the whole publish.
    async fn collect_assets(
        &self,
        access_token: &str,
        owner_urn: &str,
        draft: &DraftPost,
    ) -> Vec<(String, String)> {
        let mut assets = Vec::new();

        for image in &draft.images {
            match self
                .upload_image(access_token, owner_urn, image.bytes.clone(), &image.mime)
                .await
            {
                Ok(urn) => assets.push((urn, image.name.clone())),
                Err(e) => {
                    warn!(name = %image.name, error = %e, "image upload failed, skipping asset")
                }
            }
        }

        for url in &draft.image_urls {
            match self
                .upload_image_from_url(access_token, owner_urn, url)
                .await
            {
                Ok(urn) => assets.push((urn, "Image".to_string())),
                Err(e) => warn!(url = %url, error = %e, "image upload failed, skipping asset"),
            }
        }

        assets
    }

    /// Publish through the Posts API as the given author URN.
    async fn publish_posts_api(
        &self,
        access_token: &str,
        author_urn: &str,
        draft: &DraftPost,
    ) -> Result<String, LinkedInError> {
        let assets = self.collect_assets(access_token, author_urn, draft).await;

        let mut body = json!({
            "author": author_urn,
            "commentary": draft.message,
            "visibility": "PUBLIC",
            "distribution": {
                "feedDistribution": "MAIN_FEED",
                "targetEntities": [],
                "thirdPartyDistributionChannels": []
            },
            "lifecycleState": "PUBLISHED",
            "isReshareDisabledByAuthor": false
        });
        if !assets.is_empty() {
            body["content"] = json!({
                "media": assets.iter().map(|(urn, _)| json!({ "id": urn })).collect::<Vec<_>>()
            });
        }

        let response = self
            .http
            .post(format!("{}/v2/posts", self.api_base))
            .bearer_auth(access_token)
            .header("X-Restli-Protocol-Version", RESTLI_VERSION)
            .header("LinkedIn-Version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_failure(response).await);
        }

        // The Posts API returns the new id in a header; some responses
        // also carry it in the body.
        let header_id = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(id) = header_id {
            return Ok(id);
        }

        let value: serde_json::Value = response.json().await.unwrap_or_default();
        value
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| LinkedInError::InvalidResponse("missing post id".to_string()))
    }

    /// Publish through the UGC API as the member.
    async fn publish_ugc_api(
        &self,
        access_token: &str,
        author_urn: &str,
        draft: &DraftPost,
    ) -> Result<String, LinkedInError> {
        let assets = self.collect_assets(access_token, author_urn, draft).await;

        let mut share_content = json!({
            "shareCommentary": { "text": draft.message },
            "shareMediaCategory": "NONE"
        });
        if !assets.is_empty() {
            share_content["shareMediaCategory"] = json!("IMAGE");
            share_content["media"] = json!(
                assets
                    .iter()
                    .map(|(urn, title)| json!({
                        "status": "READY",
                        "description": { "text": "Uploaded image" },
                        "media": urn,
                        "title": { "text": title }
                    }))
                    .collect::<Vec<_>>()
            );
        }

        let body = json!({
            "author": author_urn,
            "lifecycleState": "PUBLISHED",
            "specificContent": { "com.linkedin.ugc.ShareContent": share_content },
            "visibility": { "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC" }
        });

        let response = self
            .http
            .post(format!("{}/v2/ugcPosts", self.api_base))
            .bearer_auth(access_token)
            .header("X-Restli-Protocol-Version", RESTLI_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_failure(response).await);
        }

        let value: serde_json::Value = response.json().await?;
        value
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| LinkedInError::InvalidResponse("missing post id".to_string()))
    }
}

#[async_trait]
impl Gateway for LinkedInClient {
    async fn publish(
        &self,
        auth: &AuthContext,
        target: PublishTarget,
        draft: &DraftPost,
    ) -> Result<String, LinkedInError> {
        let member_urn = || {
            auth.member_id
                .as_deref()
                .map(|id| format!("urn:li:person:{id}"))
                .ok_or_else(|| {
                    LinkedInError::Misconfigured("no member identity on this account".to_string())
                })
        };

        match target {
            PublishTarget::MemberPosts => {
                let author = member_urn()?;
                self.publish_posts_api(&auth.access_token, &author, draft)
                    .await
            }
            PublishTarget::MemberUgc => {
                let author = member_urn()?;
                self.publish_ugc_api(&auth.access_token, &author, draft)
                    .await
            }
            PublishTarget::OrganizationPosts => {
                let org_id = auth.organization_id.as_deref().ok_or_else(|| {
                    LinkedInError::Misconfigured(
                        "no organization page configured for this account".to_string(),
                    )
                })?;
                let author = format!("urn:li:organization:{org_id}");
                self.publish_posts_api(&auth.access_token, &author, draft)
                    .await
            }
        }
    }

    async fn delete_post(
        &self,
        access_token: &str,
        post_id: &str,
    ) -> Result<DeleteOutcome, LinkedInError> {
        let urn = normalize_post_id(post_id);
        let url = format!("{}/v2/shares/{}", self.api_base, encode_component(&urn));

        debug!(post_id = %urn, "deleting post");
        let response = self
            .http
            .delete(&url)
            .bearer_auth(access_token)
            .header("X-Restli-Protocol-Version", RESTLI_VERSION)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(DeleteOutcome {
                method: "shares_api",
                already_deleted: false,
            }),
            StatusCode::NOT_FOUND => Ok(DeleteOutcome {
                method: "shares_api",
                already_deleted: true,
            }),
            _ => Err(classify_failure(response).await),
        }
    }
}

/// Normalize a bare numeric post id into the canonical share URN.
pub fn normalize_post_id(post_id: &str) -> String {
    if !post_id.is_empty() && post_id.bytes().all(|b| b.is_ascii_digit()) {
        format!("urn:li:share:{post_id}")
    } else {
        post_id.to_string()
    }
}

/// Map a non-success response to the error taxonomy.
async fn classify_failure(response: reqwest::Response) -> LinkedInError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify_status(status, body)
}

fn classify_status(status: StatusCode, body: String) -> LinkedInError {
    match status {
        StatusCode::UNAUTHORIZED => LinkedInError::AuthExpired,
        StatusCode::FORBIDDEN => LinkedInError::PermissionDenied(body),
        StatusCode::TOO_MANY_REQUESTS => LinkedInError::RateLimited,
        StatusCode::NOT_FOUND => LinkedInError::PostNotFound(body),
        _ => LinkedInError::Platform(format!("{status}: {body}")),
    }
}

/// Percent-encode the characters LinkedIn URN path segments contain.
fn encode_component(s: &str) -> String {
    s.replace('%', "%25")
        .replace(':', "%3A")
        .replace('/', "%2F")
        .replace(' ', "%20")
        .replace('&', "%26")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_become_share_urns() {
        assert_eq!(normalize_post_id("7123456789"), "urn:li:share:7123456789");
        assert_eq!(
            normalize_post_id("urn:li:share:7123456789"),
            "urn:li:share:7123456789"
        );
        assert_eq!(
            normalize_post_id("urn:li:ugcPost:99"),
            "urn:li:ugcPost:99"
        );
        assert_eq!(normalize_post_id(""), "");
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, String::new()),
            LinkedInError::AuthExpired
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, String::new()),
            LinkedInError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            LinkedInError::RateLimited
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, String::new()),
            LinkedInError::PostNotFound(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::UPGRADE_REQUIRED, String::new()),
            LinkedInError::Platform(_)
        ));
    }

    #[test]
    fn urn_encoding() {
        assert_eq!(
            encode_component("urn:li:share:123"),
            "urn%3Ali%3Ashare%3A123"
        );
    }

    #[test]
    fn authorization_url_carries_state() {
        let client = LinkedInClient::new().unwrap();
        let url = client.authorization_url("cid", "https://app.example/cb", "org-1");
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("state=org-1"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapp.example%2Fcb"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn digit_ids_always_become_share_urns(id in "[0-9]{1,19}") {
                prop_assert_eq!(normalize_post_id(&id), format!("urn:li:share:{id}"));
            }

            #[test]
            fn non_numeric_ids_pass_through(id in "[a-zA-Z:][a-zA-Z0-9:]{0,30}") {
                prop_assert_eq!(normalize_post_id(&id), id);
            }

            #[test]
            fn normalization_is_idempotent(id in "[a-zA-Z0-9:]{0,30}") {
                let once = normalize_post_id(&id);
                prop_assert_eq!(normalize_post_id(&once), once.clone());
            }
        }
    }
}
