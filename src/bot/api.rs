use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::header;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/* API contains the logic for calling the external hosting panel.
 * The panel owns user accounts and servers; the bot only consumes it.
 * Every call carries the static API key and is bounded by a timeout.
 * Used by the registration gateway and the deployment orchestrator only.
 */

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Request error: {0}")]
    RequestError(reqwest::Error),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(request_error: reqwest::Error) -> ApiError {
        ApiError::RequestError(request_error)
    }
}

// The panel hands out ids as numbers or strings depending on the endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteId {
    Number(i64),
    Text(String),
}

impl RemoteId {
    // Reads back an id cached as a string
    pub fn parse(raw: &str) -> RemoteId {
        match raw.parse::<i64>() {
            Ok(number) => RemoteId::Number(number),
            Err(_) => RemoteId::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteId::Number(number) => write!(f, "{number}"),
            RemoteId::Text(text) => write!(f, "{text}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteUser {
    pub id: RemoteId,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Node {
    pub id: RemoteId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployRequest {
    pub name: String,
    pub gb: u32,
    pub cores: u32,
    #[serde(rename = "userId")]
    pub user_id: RemoteId,
    #[serde(rename = "nodeId")]
    pub node_id: RemoteId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Provisioned {
    pub success: bool,
    pub ssh: Option<String>,
}

/* Response bodies */
#[derive(Deserialize)]
struct CreateUserResponse {
    #[serde(default)]
    success: bool,
    user: Option<RemoteUser>,
}

#[derive(Deserialize)]
struct UserList {
    #[serde(default)]
    users: Vec<RemoteUser>,
}

#[derive(Deserialize)]
struct NodeList {
    #[serde(default)]
    nodes: Vec<Node>,
}

#[derive(Deserialize)]
struct ServerInfo {
    ssh: Option<String>,
}

#[derive(Deserialize)]
struct DeployResponse {
    #[serde(default)]
    success: bool,
    ssh: Option<String>,
    server: Option<ServerInfo>,
}

impl From<DeployResponse> for Provisioned {
    fn from(response: DeployResponse) -> Provisioned {
        let ssh = response
            .ssh
            .or_else(|| response.server.and_then(|server| server.ssh));
        Provisioned {
            success: response.success,
            ssh,
        }
    }
}

#[async_trait]
pub trait PanelApi: Send + Sync {
    // Base URL users log in at
    fn base_url(&self) -> &str;

    // Some(id) if the account was created, None if the panel refused it
    async fn create_user(&self, user: &NewUser) -> Result<Option<RemoteId>, ApiError>;

    async fn list_users(&self) -> Result<Vec<RemoteUser>, ApiError>;

    async fn list_nodes(&self) -> Result<Vec<Node>, ApiError>;

    async fn deploy_server(&self, request: &DeployRequest) -> Result<Provisioned, ApiError>;
}

pub struct PanelClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl PanelClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<PanelClient, ApiError> {
        let mut h = header::HeaderMap::new();
        h.insert(
            "Accept",
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(h)
            .timeout(timeout)
            .build()?;

        Ok(PanelClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{path}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let request = self
            .client
            .get(self.url(path))
            .query(&[("x-api-key", &self.api_key)]);
        self.send(request).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = self
            .client
            .post(self.url(path))
            .query(&[("x-api-key", &self.api_key)])
            .json(body);
        self.send(request).await
    }

    // Sends a request and decodes its JSON body, whatever the status code
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, ApiError>((status, body))
        };

        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ApiError::Timeout(self.timeout))??;

        decode_body(status.as_u16(), &body)
    }
}

fn decode_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body)
        .map_err(|err| ApiError::UnexpectedResponse(format!("status {status}: {err}")))
}

#[async_trait]
impl PanelApi for PanelClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn create_user(&self, user: &NewUser) -> Result<Option<RemoteId>, ApiError> {
        let response: CreateUserResponse = self.post("users/new", user).await?;
        if !response.success {
            return Ok(None);
        }

        match response.user {
            Some(user) => Ok(Some(user.id)),
            None => Err(ApiError::UnexpectedResponse(
                "account created without a user id".to_string(),
            )),
        }
    }

    async fn list_users(&self) -> Result<Vec<RemoteUser>, ApiError> {
        let response: UserList = self.get("list/users").await?;
        Ok(response.users)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ApiError> {
        let response: NodeList = self.get("list/nodes").await?;
        Ok(response.nodes)
    }

    async fn deploy_server(&self, request: &DeployRequest) -> Result<Provisioned, ApiError> {
        let response: DeployResponse = self.post("servers/deploy", request).await?;
        Ok(response.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_id_parse_and_display() {
        assert_eq!(RemoteId::parse("17"), RemoteId::Number(17));
        assert_eq!(
            RemoteId::parse("usr_9a"),
            RemoteId::Text("usr_9a".to_string())
        );
        assert_eq!(RemoteId::Number(17).to_string(), "17");
        assert_eq!(RemoteId::Text("usr_9a".to_string()).to_string(), "usr_9a");
    }

    #[test]
    fn test_decode_user_list_with_mixed_ids() {
        let body = r#"{"users":[{"id":3,"username":"alice"},{"id":"b-4","username":"bob"}]}"#;
        let list: UserList = decode_body(200, body).unwrap();
        assert_eq!(list.users[0].id, RemoteId::Number(3));
        assert_eq!(list.users[1].id, RemoteId::Text("b-4".to_string()));
        assert_eq!(list.users[1].username.as_deref(), Some("bob"));
    }

    #[test]
    fn test_decode_missing_lists_are_empty() {
        let users: UserList = decode_body(200, "{}").unwrap();
        let nodes: NodeList = decode_body(200, "{}").unwrap();
        assert!(users.users.is_empty());
        assert!(nodes.nodes.is_empty());
    }

    #[test]
    fn test_decode_refused_create_user() {
        let response: CreateUserResponse =
            decode_body(409, r#"{"success":false,"message":"exists"}"#).unwrap();
        assert!(!response.success);
        assert!(response.user.is_none());
    }

    #[test]
    fn test_decode_garbage_body() {
        let res: Result<UserList, ApiError> = decode_body(502, "<html>Bad Gateway</html>");
        assert!(matches!(res, Err(ApiError::UnexpectedResponse(_))));
    }

    #[test]
    fn test_deploy_response_ssh_locations() {
        let flat: DeployResponse =
            decode_body(200, r#"{"success":true,"ssh":"ssh root@1.2.3.4"}"#).unwrap();
        let nested: DeployResponse =
            decode_body(200, r#"{"success":true,"server":{"ssh":"ssh root@5.6.7.8"}}"#).unwrap();
        let failed: DeployResponse = decode_body(200, r#"{"success":false}"#).unwrap();

        assert_eq!(
            Provisioned::from(flat).ssh.as_deref(),
            Some("ssh root@1.2.3.4")
        );
        assert_eq!(
            Provisioned::from(nested).ssh.as_deref(),
            Some("ssh root@5.6.7.8")
        );
        assert!(!Provisioned::from(failed).success);
    }

    #[test]
    fn test_deploy_request_wire_names() {
        let request = DeployRequest {
            name: "alice".to_string(),
            gb: 2,
            cores: 1,
            user_id: RemoteId::Number(3),
            node_id: RemoteId::Text("n1".to_string()),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name":"alice","gb":2,"cores":1,"userId":3,"nodeId":"n1"})
        );
    }

    #[test]
    fn test_client_trims_base_url() {
        let client =
            PanelClient::new("https://panel.example.com/", "key", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "https://panel.example.com");
        assert_eq!(
            client.url("list/nodes"),
            "https://panel.example.com/api/v1/list/nodes"
        );
    }
}
