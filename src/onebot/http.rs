//! OneBot HTTP API client.
//!
//! Each action is a `POST {base}/{action}` with a JSON body; the reply is the
//! standard `{status, retcode, data}` envelope.

use super::api::{BotApi, GroupMemberInfo};
use super::message::Message;
use crate::error::{TreePassError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    retcode: i64,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    message: String,
    #[serde(default)]
    wording: String,
}

/// [`BotApi`] over the OneBot HTTP API.
#[derive(Clone)]
pub struct HttpBotApi {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpBotApi {
    pub fn new(client: reqwest::Client, base_url: &str, access_token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    /// Call an action and return its `data` payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the response is not valid JSON, or
    /// the action reports a failure.
    pub async fn call(&self, action: &str, params: Value) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, action);
        let mut request = self.client.post(&url).json(&params);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| TreePassError::Network(format!("{} request failed: {}", action, e)))?;

        if !resp.status().is_success() {
            return Err(TreePassError::OneBotApi(format!(
                "{} returned HTTP {}",
                action,
                resp.status()
            )));
        }

        let body = resp
            .json::<ApiResponse>()
            .await
            .map_err(|e| TreePassError::OneBotApi(format!("{} invalid response: {}", action, e)))?;

        // `async` means the client queued the action; nothing comes back.
        match body.status.as_str() {
            "ok" | "async" => {
                debug!(action, retcode = body.retcode, "action completed");
                Ok(body.data)
            }
            _ => {
                let reason = if body.wording.is_empty() { body.message } else { body.wording };
                Err(TreePassError::OneBotApi(format!(
                    "{} failed (retcode {}): {}",
                    action, body.retcode, reason
                )))
            }
        }
    }
}

fn message_id(data: &Value) -> i64 {
    data.get("message_id").and_then(Value::as_i64).unwrap_or_default()
}

#[async_trait]
impl BotApi for HttpBotApi {
    async fn send_group_msg(&self, group_id: u64, message: &Message) -> Result<i64> {
        info!(group_id, content = %message, "send group message");
        let data = self
            .call("send_group_msg", json!({ "group_id": group_id, "message": message }))
            .await?;
        Ok(message_id(&data))
    }

    async fn send_private_msg(&self, user_id: u64, message: &Message) -> Result<i64> {
        info!(user_id, content = %message, "send private message");
        let data = self
            .call("send_private_msg", json!({ "user_id": user_id, "message": message }))
            .await?;
        Ok(message_id(&data))
    }

    async fn delete_msg(&self, message_id: i64) -> Result<()> {
        info!(message_id, "recall message");
        self.call("delete_msg", json!({ "message_id": message_id })).await?;
        Ok(())
    }

    async fn set_group_kick(&self, group_id: u64, user_id: u64, reject_add_request: bool) -> Result<()> {
        info!(group_id, user_id, "kick group member");
        self.call(
            "set_group_kick",
            json!({
                "group_id": group_id,
                "user_id": user_id,
                "reject_add_request": reject_add_request,
            }),
        )
        .await?;
        Ok(())
    }

    async fn set_group_add_request(
        &self,
        flag: &str,
        sub_type: &str,
        approve: bool,
        reason: Option<&str>,
    ) -> Result<()> {
        let mut params = json!({
            "flag": flag,
            "sub_type": sub_type,
            "type": sub_type,
            "approve": approve,
        });
        if let Some(reason) = reason {
            params["reason"] = Value::String(reason.to_string());
        }
        self.call("set_group_add_request", params).await?;
        Ok(())
    }

    async fn get_group_member_info(&self, group_id: u64, user_id: u64) -> Result<Option<GroupMemberInfo>> {
        let data = self
            .call(
                "get_group_member_info",
                json!({ "group_id": group_id, "user_id": user_id, "no_cache": true }),
            )
            .await?;
        if data.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(data)?))
    }

    async fn get_group_member_list(&self, group_id: u64) -> Result<Vec<GroupMemberInfo>> {
        let data = self
            .call("get_group_member_list", json!({ "group_id": group_id }))
            .await?;
        if data.is_null() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_value(data)?)
    }

    async fn get_forward_msg(&self, forward_id: &str) -> Result<Option<Vec<Message>>> {
        let data = self
            .call("get_forward_msg", json!({ "id": forward_id, "message_id": forward_id }))
            .await?;

        let Some(nodes) = data.get("messages").and_then(Value::as_array) else {
            return Ok(None);
        };

        // NapCat puts node content under `message`, go-cqhttp under `content`.
        let messages = nodes
            .iter()
            .filter_map(|node| node.get("message").or_else(|| node.get("content")))
            .filter_map(|content| serde_json::from_value::<Message>(content.clone()).ok())
            .collect();
        Ok(Some(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onebot::event::GroupRole;
    use mockito::Matcher;

    fn api_for(server: &mockito::ServerGuard, token: Option<&str>) -> HttpBotApi {
        HttpBotApi::new(reqwest::Client::new(), &server.url(), token.map(str::to_string))
    }

    #[tokio::test]
    async fn test_send_group_msg() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/send_group_msg")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(json!({
                "group_id": 555,
                "message": [{"type": "text", "data": {"text": "hi"}}]
            })))
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"ok","retcode":0,"data":{"message_id":4242}}"#)
            .create_async()
            .await;

        let api = api_for(&server, Some("secret"));
        let id = api.send_group_msg(555, &Message::new().text("hi")).await.unwrap();

        assert_eq!(id, 4242);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_action() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/set_group_kick")
            .with_body(r#"{"status":"failed","retcode":102,"data":null,"message":"no permission"}"#)
            .create_async()
            .await;

        let api = api_for(&server, None);
        let result = api.set_group_kick(1, 2, false).await;

        match result {
            Err(TreePassError::OneBotApi(msg)) => {
                assert!(msg.contains("102"));
                assert!(msg.contains("no permission"));
            }
            other => panic!("Expected OneBotApi error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/delete_msg")
            .with_status(401)
            .create_async()
            .await;

        let api = api_for(&server, None);
        assert!(matches!(api.delete_msg(1).await, Err(TreePassError::OneBotApi(_))));
    }

    #[tokio::test]
    async fn test_get_group_member_list() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/get_group_member_list")
            .with_body(
                json!({
                    "status": "ok",
                    "retcode": 0,
                    "data": [
                        {"group_id": 1, "user_id": 10, "nickname": "owner", "role": "owner"},
                        {"group_id": 1, "user_id": 11, "nickname": "bob", "card": "Bobby", "role": "member"}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let api = api_for(&server, None);
        let members = api.get_group_member_list(1).await.unwrap();

        assert_eq!(members.len(), 2);
        assert_eq!(members[0].role, GroupRole::Owner);
        assert_eq!(members[1].display_name(), "Bobby");
    }

    #[tokio::test]
    async fn test_get_group_member_info_missing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/get_group_member_info")
            .with_body(r#"{"status":"ok","retcode":0,"data":null}"#)
            .create_async()
            .await;

        let api = api_for(&server, None);
        assert!(api.get_group_member_info(1, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_forward_msg() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/get_forward_msg")
            .with_body(
                json!({
                    "status": "ok",
                    "retcode": 0,
                    "data": {"messages": [
                        {"message": [{"type": "text", "data": {"text": "visit example.com"}}]},
                        {"content": [{"type": "text", "data": {"text": "second"}}]}
                    ]}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let api = api_for(&server, None);
        let messages = api.get_forward_msg("abc").await.unwrap().unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text_content(), "visit example.com");
        assert_eq!(messages[1].text_content(), "second");
    }
}
