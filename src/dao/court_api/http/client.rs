use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};

use crate::dao::{
    court_api::CourtApi,
    credentials::Credentials,
    models::{
        ChatMessage, ConversationScope, Court, CourtId, OutgoingMessage, PingSource,
        PresenceStatus,
    },
    transport::TransportResult,
};

use super::{
    config::HttpConfig,
    error::{HttpDaoError, HttpResult},
    models::{
        CheckInBody, CourtsResponse, EmptyBody, ErrorResponse, MessagesResponse, PingBody,
        SendMessageBody, SentMessageResponse, history_path,
    },
};

const COURTS: &str = "api/courts";
const CHECK_IN: &str = "api/presence/checkin";
const CHECK_OUT: &str = "api/presence/checkout";
const PRESENCE_STATUS: &str = "api/presence/status";
const PRESENCE_PING: &str = "api/presence/ping";
const SEND_MESSAGE: &str = "api/chat/send";

/// [`CourtApi`] implementation speaking JSON over HTTP.
#[derive(Clone)]
pub struct HttpCourtApi {
    client: Client,
    base_url: Arc<str>,
    credentials: Credentials,
}

impl HttpCourtApi {
    /// Build the HTTP client. No request is issued until the first operation.
    pub fn new(config: &HttpConfig, credentials: Credentials) -> HttpResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| HttpDaoError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::<str>::from(config.normalized_base_url()),
            credentials,
        })
    }

    /// Shared reqwest client, reused by the event stream.
    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match self.credentials.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T>(&self, path: &str) -> HttpResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, path)
            .send()
            .await
            .map_err(|source| HttpDaoError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        decode(path, response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> HttpResult<T>
    where
        B: ?Sized + Serialize,
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::POST, path)
            .json(body)
            .send()
            .await
            .map_err(|source| HttpDaoError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        decode(path, response).await
    }

    async fn post_unit<B>(&self, path: &str, body: &B) -> HttpResult<()>
    where
        B: ?Sized + Serialize,
    {
        let response = self
            .request(Method::POST, path)
            .json(body)
            .send()
            .await
            .map_err(|source| HttpDaoError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        ensure_success(path, response).await.map(|_| ())
    }
}

/// Map non-success statuses to typed errors, keeping the server's error message.
pub(super) async fn ensure_success(path: &str, response: Response) -> HttpResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(HttpDaoError::Unauthorized {
            path: path.to_string(),
        });
    }

    let message = response
        .json::<ErrorResponse>()
        .await
        .ok()
        .and_then(|body| body.error);
    Err(HttpDaoError::RequestStatus {
        path: path.to_string(),
        status,
        message,
    })
}

async fn decode<T>(path: &str, response: Response) -> HttpResult<T>
where
    T: DeserializeOwned,
{
    let response = ensure_success(path, response).await?;
    response
        .json::<T>()
        .await
        .map_err(|source| HttpDaoError::DecodeResponse {
            path: path.to_string(),
            source,
        })
}

impl CourtApi for HttpCourtApi {
    fn list_courts(&self) -> BoxFuture<'static, TransportResult<Vec<Court>>> {
        let api = self.clone();
        Box::pin(async move {
            let payload = api.get_json::<CourtsResponse>(COURTS).await?;
            Ok(payload.courts)
        })
    }

    fn check_in(&self, court_id: CourtId) -> BoxFuture<'static, TransportResult<()>> {
        let api = self.clone();
        Box::pin(async move {
            api.post_unit(CHECK_IN, &CheckInBody { court_id })
                .await
                .map_err(Into::into)
        })
    }

    fn check_out(&self) -> BoxFuture<'static, TransportResult<()>> {
        let api = self.clone();
        Box::pin(async move {
            api.post_unit(CHECK_OUT, &EmptyBody {})
                .await
                .map_err(Into::into)
        })
    }

    fn presence_status(&self) -> BoxFuture<'static, TransportResult<PresenceStatus>> {
        let api = self.clone();
        Box::pin(async move {
            api.get_json::<PresenceStatus>(PRESENCE_STATUS)
                .await
                .map_err(Into::into)
        })
    }

    fn presence_ping(
        &self,
        court_id: CourtId,
        source: PingSource,
    ) -> BoxFuture<'static, TransportResult<PresenceStatus>> {
        let api = self.clone();
        Box::pin(async move {
            let body = PingBody {
                court_id,
                source: source.as_str(),
            };
            api.post_json::<_, PresenceStatus>(PRESENCE_PING, &body)
                .await
                .map_err(Into::into)
        })
    }

    fn conversation_messages(
        &self,
        scope: ConversationScope,
    ) -> BoxFuture<'static, TransportResult<Vec<ChatMessage>>> {
        let api = self.clone();
        Box::pin(async move {
            let path = history_path(scope);
            let payload = api.get_json::<MessagesResponse>(&path).await?;
            Ok(payload.messages)
        })
    }

    fn send_message(
        &self,
        message: OutgoingMessage,
    ) -> BoxFuture<'static, TransportResult<ChatMessage>> {
        let api = self.clone();
        Box::pin(async move {
            let body = SendMessageBody::from(message);
            let payload = api
                .post_json::<_, SentMessageResponse>(SEND_MESSAGE, &body)
                .await?;
            Ok(payload.message)
        })
    }
}
