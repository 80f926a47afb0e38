//! Request/reply micro-service registration.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::HashMap;
use std::fmt;

use async_nats::Client;
use async_nats::service::{self, Service, ServiceExt};
use bytes::Bytes;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{error, info};

const MCP_KEY: &str = "MCP";
const USER_MANAGEMENT: &str = "User management";

/// How an endpoint answers its requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// Replies with the request payload.
    Echo,

    /// Replies with a service error.
    Reject {
        /// Error code, e.g. 400.
        code: usize,

        /// Error description.
        status: String,
    },
}

impl Reply {
    /// The response to a request carrying `payload`.
    ///
    /// # Errors
    ///
    /// `Reply::Reject` always answers with its service error.
    pub fn respond(&self, payload: &Bytes) -> Result<Bytes, service::error::Error> {
        match self {
            Self::Echo => Ok(payload.clone()),
            Self::Reject { code, status } => Err(service::error::Error {
                code: *code,
                status: status.clone(),
            }),
        }
    }
}

/// One endpoint of a service.
#[derive(Clone, Debug)]
pub struct EndpointDefinition {
    /// Endpoint name.
    pub name: String,

    /// Subject the endpoint listens on.
    pub subject: String,

    /// Metadata advertised for the endpoint.
    pub metadata: HashMap<String, String>,

    /// How requests are answered.
    pub reply: Reply,
}

impl EndpointDefinition {
    fn user(name: &str, description: &str, reply: Reply) -> Self {
        Self {
            name: name.to_string(),
            subject: format!("User.{name}"),
            metadata: HashMap::from([
                ("description".to_string(), description.to_string()),
                (MCP_KEY.to_string(), USER_MANAGEMENT.to_string()),
            ]),
            reply,
        }
    }
}

/// A service and its endpoints.
#[derive(Clone, Debug)]
pub struct ServiceDefinition {
    /// Service name.
    pub name: String,

    /// Semantic version.
    pub version: String,

    /// Free-form description.
    pub description: String,

    /// Metadata advertised for the service.
    pub metadata: HashMap<String, String>,

    /// Endpoints to register.
    pub endpoints: Vec<EndpointDefinition>,
}

impl ServiceDefinition {
    /// The `UserSV` user management service.
    ///
    /// `login` rejects every request with `400 Bad Request`; `logout`, `check`
    /// and `create` echo the request back.
    #[must_use]
    pub fn user_service() -> Self {
        Self {
            name: "UserSV".to_string(),
            version: "1.0.0".to_string(),
            description: "User management service".to_string(),
            metadata: HashMap::from([(MCP_KEY.to_string(), USER_MANAGEMENT.to_string())]),
            endpoints: vec![
                EndpointDefinition::user(
                    "login",
                    "Sign in",
                    Reply::Reject {
                        code: 400,
                        status: "Bad Request".to_string(),
                    },
                ),
                EndpointDefinition::user("logout", "Sign out", Reply::Echo),
                EndpointDefinition::user("check", "Check", Reply::Echo),
                EndpointDefinition::user("create", "Create", Reply::Echo),
            ],
        }
    }
}

/// A registered service serving its endpoints.
pub struct RunningService {
    name: String,
    service: Service,
    tasks: Vec<JoinHandle<()>>,
}

impl fmt::Debug for RunningService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningService")
            .field("name", &self.name)
            .field("endpoints", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl RunningService {
    /// Service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops serving and deregisters the service.
    ///
    /// # Errors
    ///
    /// Returns `Error::Stop` if the service cannot be stopped cleanly.
    pub async fn stop(self) -> Result<(), Error> {
        for task in &self.tasks {
            task.abort();
        }
        self.service.stop().await.map_err(Error::Stop)?;

        info!(service = %self.name, "service stopped");
        Ok(())
    }
}

/// Registers `definition` and spawns one task per endpoint to serve it.
///
/// # Errors
///
/// Returns `Error::Start` if the service cannot be registered and
/// `Error::Endpoint` if one of its endpoints cannot be added.
pub async fn start(client: &Client, definition: ServiceDefinition) -> Result<RunningService, Error> {
    let service = client
        .service_builder()
        .description(&definition.description)
        .metadata(definition.metadata.clone())
        .start(definition.name.as_str(), definition.version.as_str())
        .await
        .map_err(Error::Start)?;

    info!(service = %definition.name, version = %definition.version, "service registered");

    let mut tasks = Vec::with_capacity(definition.endpoints.len());
    for endpoint_definition in definition.endpoints {
        let mut endpoint = service
            .endpoint_builder()
            .name(&endpoint_definition.name)
            .metadata(endpoint_definition.metadata.clone())
            .add(endpoint_definition.subject.as_str())
            .await
            .map_err(|e| Error::Endpoint(endpoint_definition.name.clone(), e))?;

        info!(
            endpoint = %endpoint_definition.name,
            subject = %endpoint_definition.subject,
            "endpoint added"
        );

        tasks.push(tokio::spawn(async move {
            while let Some(request) = endpoint.next().await {
                info!(
                    endpoint = %endpoint_definition.name,
                    subject = %request.message.subject,
                    payload = %String::from_utf8_lossy(&request.message.payload),
                    "received request"
                );

                let response = endpoint_definition.reply.respond(&request.message.payload);
                if let Err(e) = request.respond(response).await {
                    error!(endpoint = %endpoint_definition.name, "failed to respond: {e}");
                }
            }
        }));
    }

    Ok(RunningService {
        name: definition.name,
        service,
        tasks,
    })
}
