//! Avatar download from the FRC events API
//!
//! Walks the paginated `/{year}/avatars` endpoint and turns every team that is
//! still pending and has a non-empty `encodedAvatar` into an [`EncodedAvatar`].

use async_trait::async_trait;
use base64::Engine;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::avatar::EncodedAvatar;
use crate::models::{PendingSet, TeamNumber};

/// Default events API root.
pub const DEFAULT_API_URL: &str = "https://frc-api.firstinspires.org/v2.0";

/// Error raised while downloading avatars.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// Network or HTTP client failure
    #[error("Request for avatars page {page} failed: {source}")]
    Transport {
        page: u32,
        #[source]
        source: reqwest::Error,
    },
    /// HTTP client could not be built
    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// The API key can't be used in an Authorization header
    #[error("API key is not usable as a header value: {0}")]
    Credentials(#[from] header::InvalidHeaderValue),
    /// Response body wasn't an avatars page
    #[error("Failed to parse avatars page {page}: {source}")]
    Parse {
        page: u32,
        #[source]
        source: serde_json::Error,
    },
    /// `encodedAvatar` wasn't valid base64
    #[error("Avatar for team {team} is not valid base64: {source}")]
    InvalidBase64 {
        team: TeamNumber,
        #[source]
        source: base64::DecodeError,
    },
}

/// One page of the avatars listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarPage {
    pub teams: Vec<TeamAvatar>,
    pub page_total: u32,
}

/// A team entry on an avatars page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamAvatar {
    pub team_number: TeamNumber,
    /// Base64 image, absent or empty when the team has no avatar yet
    #[serde(default)]
    pub encoded_avatar: Option<String>,
}

/// Source of avatar pages.
///
/// [`FrcApiClient`] is the real implementation; anything that can hand out
/// pages by number works.
#[async_trait]
pub trait AvatarPages: Send + Sync {
    /// Fetch page `page` (1-based) of the avatars listing for `year`.
    async fn fetch_page(&self, year: i32, page: u32) -> Result<AvatarPage, FetchError>;
}

/// HTTP client for the events API.
pub struct FrcApiClient {
    client: Client,
    base_url: String,
}

impl FrcApiClient {
    /// Create a client authenticating with the raw bytes of the API key file.
    pub fn new(base_url: impl Into<String>, api_key: &[u8]) -> Result<Self, FetchError> {
        let token = base64::engine::general_purpose::STANDARD.encode(api_key);
        let mut auth = header::HeaderValue::from_str(&format!("Basic {}", token))?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let client = Client::builder().default_headers(headers).build().map_err(FetchError::Client)?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn avatars_url(&self, year: i32) -> String {
        format!("{}/{}/avatars", self.base_url, year)
    }
}

#[async_trait]
impl AvatarPages for FrcApiClient {
    async fn fetch_page(&self, year: i32, page: u32) -> Result<AvatarPage, FetchError> {
        let response = self
            .client
            .get(self.avatars_url(year))
            .query(&[("page", page)])
            .send()
            .await
            .map_err(|source| FetchError::Transport { page, source })?;

        // The body is parsed regardless; an error body fails to parse below.
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            error!(page, "events API returned 401 Unauthorized, check the API key");
        } else if !status.is_success() {
            warn!(page, %status, "events API returned an error status");
        }

        let body = response.text().await.map_err(|source| FetchError::Transport { page, source })?;
        serde_json::from_str(&body).map_err(|source| FetchError::Parse { page, source })
    }
}

/// Download every pending team's avatar.
///
/// Teams that get an avatar are taken out of `pending`; teams with a missing
/// or empty `encodedAvatar`, and teams that aren't pending, are left alone.
/// Pages are requested one at a time until the server's `pageTotal` is reached.
pub async fn download_avatars<P: AvatarPages + ?Sized>(
    pages: &P,
    year: i32,
    pending: &mut PendingSet,
) -> Result<Vec<EncodedAvatar>, FetchError> {
    let mut avatars = Vec::new();
    let mut page = 1;

    loop {
        let listing = pages.fetch_page(year, page).await?;
        let page_total = listing.page_total;
        take_page_avatars(listing, pending, &mut avatars)?;
        info!("Downloaded page {}/{}", page, page_total);

        if page >= page_total {
            break;
        }
        page += 1;
    }

    Ok(avatars)
}

fn take_page_avatars(
    listing: AvatarPage,
    pending: &mut PendingSet,
    avatars: &mut Vec<EncodedAvatar>,
) -> Result<(), FetchError> {
    for team in listing.teams {
        let Some(encoded) = team.encoded_avatar.filter(|s| !s.is_empty()) else {
            continue;
        };
        if !pending.contains(team.team_number) {
            continue;
        }

        let data = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|source| FetchError::InvalidBase64 { team: team.team_number, source })?;
        pending.take(team.team_number);
        let avatar = EncodedAvatar::new(team.team_number, data);
        debug!(team = team.team_number, bytes = avatar.data().len(), "downloaded avatar");
        avatars.push(avatar);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::RenderAvatar;
    use std::sync::Mutex;
    use wiremock::matchers::{header as header_is, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry(team: TeamNumber, avatar: Option<&str>) -> TeamAvatar {
        TeamAvatar { team_number: team, encoded_avatar: avatar.map(str::to_string) }
    }

    /// Serves canned pages and records which pages were asked for.
    struct StaticPages {
        pages: Vec<AvatarPage>,
        requested: Mutex<Vec<u32>>,
    }

    impl StaticPages {
        fn new(pages: Vec<AvatarPage>) -> Self {
            Self { pages, requested: Mutex::new(Vec::new()) }
        }

        fn requested(&self) -> Vec<u32> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AvatarPages for StaticPages {
        async fn fetch_page(&self, _year: i32, page: u32) -> Result<AvatarPage, FetchError> {
            self.requested.lock().unwrap().push(page);
            Ok(self.pages[(page - 1) as usize].clone())
        }
    }

    #[tokio::test]
    async fn test_walks_all_pages() {
        let pages = StaticPages::new(vec![
            AvatarPage { teams: vec![entry(1, Some("AQID"))], page_total: 3 },
            AvatarPage { teams: vec![entry(2, Some("BAUG"))], page_total: 3 },
            AvatarPage { teams: vec![entry(3, Some("BwgJ"))], page_total: 3 },
        ]);
        let mut pending: PendingSet = [1, 2, 3].into_iter().collect();

        let avatars = download_avatars(&pages, 2024, &mut pending).await.unwrap();

        assert_eq!(pages.requested(), vec![1, 2, 3]);
        let teams: Vec<TeamNumber> = avatars.iter().map(|a| a.team_number()).collect();
        assert_eq!(teams, vec![1, 2, 3]);
        assert_eq!(avatars[0].data(), &[1, 2, 3]);
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_filters_unknown_and_empty_avatars() {
        let pages = StaticPages::new(vec![AvatarPage {
            teams: vec![
                entry(1, None),
                entry(2, Some("")),
                entry(3, Some("AQID")),
                entry(4, Some("AQID")),
            ],
            page_total: 1,
        }]);
        let mut pending: PendingSet = [1, 2, 3].into_iter().collect();

        let avatars = download_avatars(&pages, 2024, &mut pending).await.unwrap();

        assert_eq!(avatars.len(), 1);
        assert_eq!(avatars[0].team_number(), 3);
        assert!(pending.contains(1));
        assert!(pending.contains(2));
        assert!(!pending.contains(3));
    }

    #[tokio::test]
    async fn test_duplicate_entries_yield_one_avatar() {
        let pages = StaticPages::new(vec![
            AvatarPage { teams: vec![entry(5, Some("AQID"))], page_total: 2 },
            AvatarPage { teams: vec![entry(5, Some("BAUG"))], page_total: 2 },
        ]);
        let mut pending: PendingSet = [5].into_iter().collect();

        let avatars = download_avatars(&pages, 2024, &mut pending).await.unwrap();
        assert_eq!(avatars.len(), 1);
        assert_eq!(avatars[0].data(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_zero_page_total_fetches_first_page_only() {
        let pages = StaticPages::new(vec![AvatarPage { teams: vec![], page_total: 0 }]);
        let mut pending: PendingSet = [1].into_iter().collect();

        let avatars = download_avatars(&pages, 2024, &mut pending).await.unwrap();
        assert!(avatars.is_empty());
        assert_eq!(pages.requested(), vec![1]);
    }

    #[tokio::test]
    async fn test_invalid_base64_is_fatal() {
        let pages = StaticPages::new(vec![AvatarPage { teams: vec![entry(9, Some("!!!"))], page_total: 1 }]);
        let mut pending: PendingSet = [9].into_iter().collect();

        let err = download_avatars(&pages, 2024, &mut pending).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidBase64 { team: 9, .. }));
    }

    #[tokio::test]
    async fn test_client_sends_auth_and_parses_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2024/avatars"))
            .and(query_param("page", "1"))
            // base64("user:token")
            .and(header_is("Authorization", "Basic dXNlcjp0b2tlbg=="))
            .and(header_is("Accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "teams": [
                    {"teamNumber": 254, "encodedAvatar": "AQID"},
                    {"teamNumber": 1678, "encodedAvatar": null}
                ],
                "teamCountTotal": 2,
                "pageTotal": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = FrcApiClient::new(format!("{}/", server.uri()), b"user:token").unwrap();
        let page = client.fetch_page(2024, 1).await.unwrap();

        assert_eq!(page.page_total, 1);
        assert_eq!(page.teams, vec![entry(254, Some("AQID")), entry(1678, None)]);
    }

    #[tokio::test]
    async fn test_unauthorized_body_fails_to_parse() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2024/avatars"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let client = FrcApiClient::new(server.uri(), b"bad").unwrap();
        let mut pending: PendingSet = [1].into_iter().collect();

        let err = download_avatars(&client, 2024, &mut pending).await.unwrap_err();
        assert!(matches!(err, FetchError::Parse { page: 1, .. }));
        assert!(pending.contains(1));
    }
}
