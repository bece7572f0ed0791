//! Contact form delivery through a transactional email relay

use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ContactConfig;
use crate::error::{Error, Result};
use crate::notify::Notifier;

const RELAY_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactMessage {
    pub name: String,
    /// Email or phone the visitor wants to be reached at
    pub contact: String,
    pub service: String,
    pub message: String,
}

impl ContactMessage {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("name", &self.name),
            ("contact", &self.contact),
            ("service", &self.service),
            ("message", &self.message),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(Error::MissingField(field.to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct TemplateParams<'a> {
    user_nombre: &'a str,
    user_contacto: &'a str,
    user_servicio: &'a str,
    user_mensaje: &'a str,
}

#[derive(Debug, Serialize, PartialEq)]
struct RelayRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: TemplateParams<'a>,
}

pub struct EmailRelay {
    http_client: HttpClient,
    config: ContactConfig,
    notifier: Notifier,
}

impl EmailRelay {
    pub fn new(config: &ContactConfig, notifier: Notifier) -> Result<Self> {
        let missing = [
            ("contact.endpoint", &config.endpoint),
            ("contact.service_id", &config.service_id),
            ("contact.template_id", &config.template_id),
            ("contact.public_key", &config.public_key),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty());
        if let Some((key, _)) = missing {
            return Err(Error::ConfigError(format!(
                "{} is not set. Run `folio config set {} <value>`.",
                key, key
            )));
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(RELAY_TIMEOUT_SECS))
            .build()
            .map_err(Error::NetworkError)?;

        Ok(Self {
            http_client,
            config: config.clone(),
            notifier,
        })
    }

    fn request<'a>(&'a self, message: &'a ContactMessage) -> RelayRequest<'a> {
        RelayRequest {
            service_id: &self.config.service_id,
            template_id: &self.config.template_id,
            user_id: &self.config.public_key,
            template_params: TemplateParams {
                user_nombre: &message.name,
                user_contacto: &message.contact,
                user_servicio: &message.service,
                user_mensaje: &message.message,
            },
        }
    }

    /// Validate and send; the outcome is also reported to the notifier
    pub async fn send(&self, message: &ContactMessage) -> Result<()> {
        let result = self.deliver(message).await;
        self.notifier.report(
            &result,
            |_| "Message sent. I'll get back to you soon.".to_string(),
            "Could not send message",
        );
        result
    }

    async fn deliver(&self, message: &ContactMessage) -> Result<()> {
        message.validate()?;
        debug!(endpoint = %self.config.endpoint, "Sending contact message");

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .json(&self.request(message))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Backend {
                status: status.as_u16(),
                message: if body.trim().is_empty() {
                    status.to_string()
                } else {
                    body
                },
            });
        }
        info!(service = %message.service, "Contact message delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingSink;
    use serde_json::json;
    use std::sync::Arc;

    fn config() -> ContactConfig {
        ContactConfig {
            endpoint: "http://127.0.0.1:9/send".to_string(),
            service_id: "service_x".to_string(),
            template_id: "template_y".to_string(),
            public_key: "pk_z".to_string(),
        }
    }

    fn message() -> ContactMessage {
        ContactMessage {
            name: "Marta".to_string(),
            contact: "marta@example.com".to_string(),
            service: "Desarrollo Web".to_string(),
            message: "Necesito una tienda online".to_string(),
        }
    }

    #[test]
    fn test_payload_shape() {
        let relay = EmailRelay::new(&config(), Notifier::new()).unwrap();
        let msg = message();
        let body = serde_json::to_value(relay.request(&msg)).unwrap();
        assert_eq!(
            body,
            json!({
                "service_id": "service_x",
                "template_id": "template_y",
                "user_id": "pk_z",
                "template_params": {
                    "user_nombre": "Marta",
                    "user_contacto": "marta@example.com",
                    "user_servicio": "Desarrollo Web",
                    "user_mensaje": "Necesito una tienda online"
                }
            })
        );
    }

    #[test]
    fn test_unconfigured_relay() {
        let mut cfg = config();
        cfg.template_id = " ".to_string();
        let err = EmailRelay::new(&cfg, Notifier::new()).err().unwrap();
        assert!(matches!(err, Error::ConfigError(ref m) if m.contains("contact.template_id")));
    }

    #[test]
    fn test_every_field_required() {
        assert!(message().validate().is_ok());
        let mut msg = message();
        msg.contact.clear();
        assert!(matches!(msg.validate(), Err(Error::MissingField(f)) if f == "contact"));
    }

    #[tokio::test]
    async fn test_invalid_message_reported_without_sending() {
        let sink = Arc::new(RecordingSink::new());
        let relay = EmailRelay::new(&config(), Notifier::new().with_sink(sink.clone())).unwrap();
        let msg = ContactMessage {
            message: String::new(),
            ..message()
        };

        assert!(matches!(relay.send(&msg).await, Err(Error::MissingField(_))));
        assert_eq!(
            sink.messages(),
            vec!["Could not send message: Field 'message' is required"]
        );
    }
}
