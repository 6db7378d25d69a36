//! Reply decoding.
//!
//! Every reply carries a numeric status in its first `<code>` element.
//! Callers check the code before decoding method-specific content.

use hvgate_types::Person;

use crate::crypto::b64_decode;
use crate::envelope::Method;
use crate::error::{Error, Result};
use crate::session::{AppInstance, Session};
use crate::xml::Element;

/// Status code for success.
pub const CODE_OK: u32 = 0;

/// Status code for an expired or invalidated session.
pub const CODE_SESSION_EXPIRED: u32 = 65;

/// A parsed reply.
#[derive(Debug, Clone)]
pub struct Reply {
    code: u32,
    root: Element,
    body: String,
}

impl Reply {
    /// Parse a reply body and extract its status code.
    pub fn parse(body: &[u8]) -> Result<Reply> {
        let text = std::str::from_utf8(body)
            .map_err(|e| Error::protocol(format!("reply is not UTF-8: {}", e)))?;
        let root = Element::parse(text)?;
        let code_text = root
            .find_text("code")
            .ok_or_else(|| Error::protocol("reply is missing <code>"))?;
        let code = code_text
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::protocol(format!("non-numeric reply code: {:?}", code_text)))?;
        Ok(Reply {
            code,
            root,
            body: text.to_string(),
        })
    }

    /// Status code.
    pub fn code(&self) -> u32 {
        self.code
    }

    /// Whether the code is [`CODE_OK`].
    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }

    /// Whether the code is [`CODE_SESSION_EXPIRED`].
    pub fn is_session_expired(&self) -> bool {
        self.code == CODE_SESSION_EXPIRED
    }

    /// Parsed document.
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Raw reply text.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Consume the reply, returning the raw text.
    pub fn into_body(self) -> String {
        self.body
    }

    /// Turn a non-zero code into [`Error::Service`].
    pub fn into_ok(self) -> Result<Reply> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(Error::Service {
                code: self.code,
                body: self.body,
            })
        }
    }

    fn required_text(&self, method: Method, element: &str) -> Result<&str> {
        self.root
            .find_text(element)
            .ok_or_else(|| Error::missing_element(method.name(), element))
    }

    /// Decode a NewApplicationCreationInfo reply.
    pub fn app_instance(&self) -> Result<AppInstance> {
        let method = Method::NewApplicationCreationInfo;
        let app_id = self.required_text(method, "app-id")?;
        let secret = b64_decode(self.required_text(method, "shared-secret")?)?;
        let token = self.required_text(method, "app-token")?;
        if app_id.is_empty() {
            return Err(Error::protocol("NewApplicationCreationInfo reply has an empty <app-id>"));
        }
        Ok(AppInstance::new(app_id, secret, token))
    }

    /// Decode a CreateAuthenticatedSessionToken reply.
    pub fn session(&self) -> Result<Session> {
        let method = Method::CreateAuthenticatedSessionToken;
        let token = self.required_text(method, "token")?;
        let secret = b64_decode(self.required_text(method, "shared-secret")?)?;
        if token.is_empty() {
            return Err(Error::auth("session grant has an empty token"));
        }
        if secret.is_empty() {
            return Err(Error::auth("session grant has an empty shared secret"));
        }
        Ok(Session::new(token, secret))
    }

    /// Decode a GetAuthorizedPeople reply, in document order.
    pub fn persons(&self) -> Result<Vec<Person>> {
        let method = Method::GetAuthorizedPeople;
        self.root
            .find_all("person-info")
            .into_iter()
            .map(|info| {
                let person_id = info
                    .find_text("person-id")
                    .ok_or_else(|| Error::missing_element(method.name(), "person-id"))?;
                let record = info
                    .find("record")
                    .ok_or_else(|| Error::missing_element(method.name(), "record"))?;
                let record_id = record
                    .attr("id")
                    .ok_or_else(|| Error::protocol("GetAuthorizedPeople <record> has no id"))?;
                let display_name = match record.text() {
                    "" => info.find_text("name").unwrap_or_default(),
                    name => name,
                };
                Ok(Person::new(person_id, record_id, display_name))
            })
            .collect()
    }
}
