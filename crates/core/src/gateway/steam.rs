use reqwest::{Method, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::decode_json;
use crate::{
    config::AppConfig,
    error::{HttpError, SyncError},
    http::RetryingClient,
    models::{AchievementSummary, OwnedGame},
};

const SERVICE: &str = "steam";
const OWNED_GAMES_PATH: &str = "IPlayerService/GetOwnedGames/v0001/";
const PLAYER_ACHIEVEMENTS_PATH: &str = "ISteamUserStats/GetPlayerAchievements/v0001/";

/// Raw `playerstats` payload from `GetPlayerAchievements`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerAchievements {
    /// Whether Steam could answer the query.
    #[serde(default)]
    pub success: bool,
    /// Error text Steam attaches to unsuccessful queries.
    #[serde(default)]
    pub error: Option<String>,
    /// Per-achievement state; absent for games without an achievement schema.
    #[serde(default)]
    pub achievements: Option<Vec<AchievementEntry>>,
}

/// One achievement and whether it is unlocked.
#[derive(Debug, Clone, Deserialize)]
pub struct AchievementEntry {
    /// Stable API name.
    #[serde(default)]
    pub apiname: String,
    /// `1` when unlocked.
    #[serde(default)]
    pub achieved: u8,
}

#[derive(Debug, Deserialize)]
struct OwnedGamesEnvelope {
    response: OwnedGamesBody,
}

#[derive(Debug, Deserialize)]
struct OwnedGamesBody {
    #[serde(default)]
    game_count: Option<u64>,
    #[serde(default)]
    games: Option<Vec<OwnedGame>>,
}

#[derive(Debug, Deserialize)]
struct PlayerStatsEnvelope {
    playerstats: PlayerAchievements,
}

/// Read-only access to the Steam Web API for one user.
#[derive(Clone)]
pub struct SteamGateway {
    client: RetryingClient,
    api_key: String,
    steam_id: String,
    base_url: String,
    include_played_free_games: bool,
}

impl SteamGateway {
    /// Build a gateway from configuration.
    pub fn new(config: &AppConfig) -> Result<Self, SyncError> {
        let client = RetryingClient::builder()
            .policy(config.retry_policy())
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Build a gateway around an existing client.
    pub fn with_client(client: RetryingClient, config: &AppConfig) -> Self {
        Self {
            client,
            api_key: config.steam_api_key.clone(),
            steam_id: config.steam_user_id.clone(),
            base_url: config.steam_api_base.trim_end_matches('/').to_string(),
            include_played_free_games: config.include_played_free_games,
        }
    }

    /// Fetch every game in the user's library, with app info.
    pub async fn fetch_owned_games(&self) -> Result<Vec<OwnedGame>, SyncError> {
        let mut params = vec![
            ("key", self.api_key.as_str()),
            ("steamid", self.steam_id.as_str()),
            ("include_appinfo", "true"),
        ];
        if self.include_played_free_games {
            params.push(("include_played_free_games", "true"));
        }

        info!("fetching owned games from steam");
        let response = self.get(OWNED_GAMES_PATH, &params).await?;
        let envelope: OwnedGamesEnvelope = decode_json(SERVICE, response).await?;

        let games = match envelope.response.games {
            Some(games) => games,
            None => {
                warn!(
                    game_count = envelope.response.game_count.unwrap_or(0),
                    "steam returned no game list; is the profile private?"
                );
                Vec::new()
            }
        };
        info!(count = games.len(), "fetched owned games");
        Ok(games)
    }

    /// Fetch the raw achievement state for one app.
    pub async fn fetch_achievements(&self, appid: u32) -> Result<PlayerAchievements, SyncError> {
        let appid = appid.to_string();
        let params = [
            ("key", self.api_key.as_str()),
            ("steamid", self.steam_id.as_str()),
            ("appid", appid.as_str()),
        ];
        let url = self.url(PLAYER_ACHIEVEMENTS_PATH, &params)?;
        let response = self
            .client
            .send_accepting(Method::GET, url, None, is_final_achievement_status)
            .await?;
        let status = response.status();
        let envelope: PlayerStatsEnvelope = decode_json(SERVICE, response).await?;
        if !status.is_success() {
            debug!(appid = %appid, %status, "steam answered achievement query with an error payload");
        }
        Ok(envelope.playerstats)
    }

    /// Fetch and summarize achievements, falling back to the unknown sentinel on failure.
    pub async fn achievement_summary(&self, game: &OwnedGame) -> AchievementSummary {
        info!(game = %game.name, appid = game.appid, "querying achievement counts");
        match self.fetch_achievements(game.appid).await {
            Ok(payload) => summarize_achievements(&payload, &game.name),
            Err(err) => {
                warn!(game = %game.name, error = %err, "achievement query failed");
                AchievementSummary::UNKNOWN
            }
        }
    }

    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Response, SyncError> {
        let url = self.url(path, params)?;
        Ok(self.client.send(Method::GET, url, None).await?)
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, HttpError> {
        Url::parse_with_params(&format!("{}/{}", self.base_url, path), params)
            .map_err(|err| HttpError::InvalidRequest(err.to_string()))
    }
}

/// Steam reports apps without stats as a 4xx carrying a `playerstats` body.
/// Those are answers, not outages; rate limiting still goes through the retry loop.
fn is_final_achievement_status(status: StatusCode) -> bool {
    status.is_success() || (status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS)
}

/// Count defined and unlocked achievements.
///
/// Unsuccessful queries and payloads without an achievement list map to
/// [`AchievementSummary::UNKNOWN`] so "no schema" stays distinct from "none earned".
pub fn summarize_achievements(payload: &PlayerAchievements, game_name: &str) -> AchievementSummary {
    if !payload.success {
        info!(
            game = %game_name,
            reason = payload.error.as_deref().unwrap_or("unsuccessful query"),
            "no achievement info"
        );
        return AchievementSummary::UNKNOWN;
    }

    let Some(achievements) = payload.achievements.as_ref() else {
        info!(game = %game_name, "no achievements for game");
        return AchievementSummary::UNKNOWN;
    };

    let total = achievements.len() as i64;
    let achieved = achievements
        .iter()
        .filter(|entry| entry.achieved != 0)
        .count() as i64;
    info!(game = %game_name, total, achieved, "achievement count complete");
    AchievementSummary::new(total, achieved)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use serde_json::json;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    fn config(server: &MockServer, include_free: bool) -> AppConfig {
        AppConfig {
            steam_api_key: "steam-key".to_string(),
            steam_user_id: "7656".to_string(),
            notion_token: "token".to_string(),
            notion_database_id: Some("db".to_string()),
            include_played_free_games: include_free,
            enable_item_update: false,
            enable_filter: false,
            max_retries: 2,
            retry_delay: Duration::from_millis(1),
            request_timeout: Duration::from_secs(5),
            steam_api_base: server.uri(),
            notion_api_base: server.uri(),
        }
    }

    fn payload(value: serde_json::Value) -> PlayerAchievements {
        serde_json::from_value(value).expect("player achievements")
    }

    #[test]
    fn unsuccessful_query_is_unknown() {
        let summary = summarize_achievements(
            &payload(json!({"success": false, "error": "Requested app has no stats"})),
            "Spacewar",
        );
        assert_eq!(summary, AchievementSummary::UNKNOWN);
    }

    #[test]
    fn missing_list_is_unknown() {
        let summary = summarize_achievements(&payload(json!({"success": true})), "Spacewar");
        assert_eq!(summary, AchievementSummary::UNKNOWN);
    }

    #[test]
    fn counts_total_and_achieved() {
        let summary = summarize_achievements(
            &payload(json!({
                "success": true,
                "achievements": [
                    {"apiname": "A", "achieved": 1},
                    {"apiname": "B", "achieved": 0},
                    {"apiname": "C", "achieved": 1}
                ]
            })),
            "Portal",
        );
        assert_eq!(summary, AchievementSummary::new(3, 2));
    }

    #[test]
    fn empty_list_is_zero_not_unknown() {
        let summary =
            summarize_achievements(&payload(json!({"success": true, "achievements": []})), "X");
        assert_eq!(summary, AchievementSummary::new(0, 0));
    }

    #[tokio::test]
    async fn fetches_owned_games_with_expected_params() -> Result<(), SyncError> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/IPlayerService/GetOwnedGames/v0001/"))
            .and(query_param("key", "steam-key"))
            .and(query_param("steamid", "7656"))
            .and(query_param("include_appinfo", "true"))
            .and(query_param("include_played_free_games", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {
                    "game_count": 2,
                    "games": [
                        {"appid": 10, "name": "Counter-Strike", "playtime_forever": 400,
                         "rtime_last_played": 1600000000, "img_icon_url": "aaa"},
                        {"appid": 20, "name": "Team Fortress Classic", "playtime_forever": 0,
                         "img_icon_url": "bbb"}
                    ]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = SteamGateway::new(&config(&server, true))?;
        let games = gateway.fetch_owned_games().await?;

        assert_eq!(games.len(), 2);
        assert_eq!(games[0].name, "Counter-Strike");
        assert_eq!(games[0].last_played(), 1_600_000_000);
        assert_eq!(games[1].rtime_last_played, None);
        Ok(())
    }

    #[tokio::test]
    async fn free_games_flag_is_omitted_when_disabled() -> Result<(), SyncError> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/IPlayerService/GetOwnedGames/v0001/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": {}})))
            .mount(&server)
            .await;

        let gateway = SteamGateway::new(&config(&server, false))?;
        let games = gateway.fetch_owned_games().await?;
        assert!(games.is_empty());

        let requests = server.received_requests().await.unwrap();
        assert!(!requests[0]
            .url
            .query_pairs()
            .any(|(key, _)| key == "include_played_free_games"));
        Ok(())
    }

    #[tokio::test]
    async fn malformed_owned_games_is_a_decode_error() -> Result<(), SyncError> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
            .mount(&server)
            .await;

        let gateway = SteamGateway::new(&config(&server, false))?;
        let err = gateway.fetch_owned_games().await.expect_err("no response key");
        assert!(matches!(err, SyncError::Decode { service: "steam", .. }));
        Ok(())
    }

    #[tokio::test]
    async fn no_stats_answer_is_final_and_decoded() -> Result<(), SyncError> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ISteamUserStats/GetPlayerAchievements/v0001/"))
            .and(query_param("appid", "30"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "playerstats": {"error": "Requested app has no stats", "success": false}
            })))
            .expect(2)
            .mount(&server)
            .await;

        let mut config = config(&server, false);
        config.max_retries = 20;
        config.retry_delay = Duration::from_millis(50);
        let gateway = SteamGateway::new(&config)?;

        let started = Instant::now();
        let payload = gateway.fetch_achievements(30).await?;
        assert!(!payload.success);
        assert_eq!(payload.error.as_deref(), Some("Requested app has no stats"));
        assert!(started.elapsed() < Duration::from_millis(50));

        let game = OwnedGame {
            appid: 30,
            name: "Day of Defeat".to_string(),
            playtime_forever: 12,
            rtime_last_played: None,
            img_icon_url: String::new(),
        };
        let started = Instant::now();
        assert_eq!(
            gateway.achievement_summary(&game).await,
            AchievementSummary::UNKNOWN
        );
        assert!(started.elapsed() < Duration::from_millis(50));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn achievement_summary_falls_back_on_outage() -> Result<(), SyncError> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ISteamUserStats/GetPlayerAchievements/v0001/"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let gateway = SteamGateway::new(&config(&server, false))?;
        let game = OwnedGame {
            appid: 40,
            name: "Deathmatch Classic".to_string(),
            playtime_forever: 12,
            rtime_last_played: None,
            img_icon_url: String::new(),
        };
        let summary = gateway.achievement_summary(&game).await;
        assert!(summary.is_unknown());
        Ok(())
    }

    #[test]
    fn only_rate_limits_and_server_errors_are_retried() {
        assert!(is_final_achievement_status(StatusCode::OK));
        assert!(is_final_achievement_status(StatusCode::BAD_REQUEST));
        assert!(is_final_achievement_status(StatusCode::FORBIDDEN));
        assert!(!is_final_achievement_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_final_achievement_status(StatusCode::BAD_GATEWAY));
    }

    #[tokio::test]
    async fn achievement_summary_counts_remote_payload() -> Result<(), SyncError> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ISteamUserStats/GetPlayerAchievements/v0001/"))
            .and(query_param("appid", "400"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "playerstats": {
                    "steamID": "7656",
                    "gameName": "Portal",
                    "success": true,
                    "achievements": [
                        {"apiname": "PORTAL_GET_PORTALGUNS", "achieved": 1, "unlocktime": 1},
                        {"apiname": "PORTAL_BEAT_GAME", "achieved": 0, "unlocktime": 0}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let gateway = SteamGateway::new(&config(&server, false))?;
        let game = OwnedGame {
            appid: 400,
            name: "Portal".to_string(),
            playtime_forever: 300,
            rtime_last_played: Some(1_650_000_000),
            img_icon_url: String::new(),
        };
        assert_eq!(
            gateway.achievement_summary(&game).await,
            AchievementSummary::new(2, 1)
        );
        Ok(())
    }
}
