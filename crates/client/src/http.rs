use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tripmate_domain::messages::MessageKind;
use tripmate_domain::ports::BoxFuture;
use tripmate_domain::profiles::{ChatView, MessageView};
use url::Url;

use crate::api::ChatApi;
use crate::error::{ClientError, ClientResult};

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct MarkReadResponse {
    marked: usize,
}

/// `ChatApi` over the service's JSON endpoints with a bearer credential.
#[derive(Clone, Debug)]
pub struct HttpChatApi {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl HttpChatApi {
    pub fn new(http: reqwest::Client, base_url: Url, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url,
            token: token.into(),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Validation("server url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> ClientResult<T> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthenticated);
        }

        let body = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => (envelope.error.code, envelope.error.message),
            Err(_) => ("unknown".to_string(), body),
        };
        tracing::debug!(status = status.as_u16(), %code, "chat api request failed");
        Err(ClientError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }
}

impl ChatApi for HttpChatApi {
    fn list_chats(&self) -> BoxFuture<'_, ClientResult<Vec<ChatView>>> {
        Box::pin(async move {
            let url = self.endpoint(&["chats", "user"])?;
            self.execute(self.http.get(url)).await
        })
    }

    fn open_private_chat(&self, user_id: &str) -> BoxFuture<'_, ClientResult<ChatView>> {
        let user_id = user_id.to_string();
        Box::pin(async move {
            let url = self.endpoint(&["chats", "private", &user_id])?;
            self.execute(self.http.post(url)).await
        })
    }

    fn open_group_chat(&self, trip_id: &str) -> BoxFuture<'_, ClientResult<ChatView>> {
        let trip_id = trip_id.to_string();
        Box::pin(async move {
            let url = self.endpoint(&["chats", "group", &trip_id])?;
            self.execute(self.http.post(url)).await
        })
    }

    fn history(&self, chat_id: &str) -> BoxFuture<'_, ClientResult<Vec<MessageView>>> {
        let chat_id = chat_id.to_string();
        Box::pin(async move {
            let url = self.endpoint(&["chats", &chat_id, "messages"])?;
            self.execute(self.http.get(url)).await
        })
    }

    fn send_message(
        &self,
        chat_id: &str,
        content: &str,
        kind: MessageKind,
    ) -> BoxFuture<'_, ClientResult<MessageView>> {
        let chat_id = chat_id.to_string();
        let payload = json!({ "content": content, "type": kind });
        Box::pin(async move {
            let url = self.endpoint(&["chats", &chat_id, "messages"])?;
            self.execute(self.http.post(url).json(&payload)).await
        })
    }

    fn mark_read(&self, chat_id: &str) -> BoxFuture<'_, ClientResult<usize>> {
        let chat_id = chat_id.to_string();
        Box::pin(async move {
            let url = self.endpoint(&["chats", &chat_id, "read"])?;
            let response: MarkReadResponse = self.execute(self.http.put(url)).await?;
            Ok(response.marked)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_joined_under_the_base_path() {
        let api = HttpChatApi::new(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:3000/api/").expect("url"),
            "token",
        );
        let url = api.endpoint(&["chats", "c 1", "messages"]).expect("endpoint");
        assert_eq!(url.as_str(), "http://127.0.0.1:3000/api/chats/c%201/messages");
    }
}
