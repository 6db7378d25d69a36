//! The session client.
//!
//! A [`Client`] owns one application instance, the current session and the
//! list of persons the session may act for. Record operations go through a
//! single signing path that recovers from an expired session exactly once.
//!
//! # Concurrency
//!
//! The session lives behind one async mutex. A request holds it only while
//! signing, releases it for the network round trip, and takes it again only
//! if the reply says the session expired. The refresh then runs with the
//! mutex held, so concurrent callers queue behind it. Each session carries a
//! generation number: a caller that finds the generation has moved on since
//! it signed knows someone else already refreshed and simply retries.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hvgate_core::{AppInstance, Client, DataXml, HttpsTransport};
//! use hvgate_types::record_types;
//!
//! # async fn example() -> hvgate_core::Result<()> {
//! let transport = Arc::new(HttpsTransport::new()?);
//! let app = AppInstance::new("APP1", b"secret".to_vec(), "TOK1");
//! let client = Client::open(transport, "platform.example.com", app).await?;
//!
//! client.select_person(0usize).await?;
//! let data = DataXml::new("<heart-rate><value>72</value></heart-rate>")?;
//! client.put_things(record_types::HEART_RATE, &data).await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::{Arc, Mutex as StdMutex};

use bytes::Bytes;
use hvgate_types::{Person, RecordType};
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::clock::MessageClock;
use crate::envelope::{self, Info, Method, PLATFORM_PATH, SigningContext};
use crate::error::{Error, ErrorKind, Result, UsageError};
use crate::observation::{DataXml, Observation};
use crate::response::{CODE_OK, CODE_SESSION_EXPIRED, Reply};
use crate::session::{AppInstance, Session};
use crate::transport::Transport;

/// Lifecycle state of a [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
    /// Creating a session and fetching persons.
    Handshaking,
    /// Session granted, persons not yet fetched.
    Authenticated,
    /// Ready for record operations.
    Ready,
    /// Replacing an expired session.
    Refreshing,
    /// A refresh did not recover the session. Record operations are
    /// refused until [`Client::handshake`] succeeds.
    Failed,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientState::Handshaking => "handshaking",
            ClientState::Authenticated => "authenticated",
            ClientState::Ready => "ready",
            ClientState::Refreshing => "refreshing",
            ClientState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How to pick the current person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonSelector {
    /// Position in [`Client::persons`].
    Index(usize),
    /// Display name or person id.
    Name(String),
}

impl From<usize> for PersonSelector {
    fn from(index: usize) -> Self {
        PersonSelector::Index(index)
    }
}

impl From<&str> for PersonSelector {
    fn from(name: &str) -> Self {
        PersonSelector::Name(name.to_string())
    }
}

impl From<String> for PersonSelector {
    fn from(name: String) -> Self {
        PersonSelector::Name(name)
    }
}

impl fmt::Display for PersonSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersonSelector::Index(index) => write!(f, "#{}", index),
            PersonSelector::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Default)]
struct SessionSlot {
    session: Option<Session>,
    generation: u64,
}

#[derive(Debug, Default)]
struct People {
    persons: Vec<Person>,
    current: Option<usize>,
}

/// Authenticated client for one application instance.
pub struct Client {
    transport: Arc<dyn Transport>,
    host: String,
    app: AppInstance,
    clock: MessageClock,
    slot: Mutex<SessionSlot>,
    people: RwLock<People>,
    state: StdMutex<ClientState>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.host)
            .field("app", &self.app)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client and run the session handshake.
    ///
    /// On success the client is [`ClientState::Ready`], holds a session and
    /// at least one person, and no person is selected yet.
    pub async fn open(
        transport: Arc<dyn Transport>,
        host: impl Into<String>,
        app: AppInstance,
    ) -> Result<Client> {
        let client = Client {
            transport,
            host: host.into(),
            app,
            clock: MessageClock::new(),
            slot: Mutex::new(SessionSlot::default()),
            people: RwLock::new(People::default()),
            state: StdMutex::new(ClientState::Handshaking),
        };
        client.handshake().await?;
        Ok(client)
    }

    /// Service host this client talks to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Application instance id.
    pub fn app_id(&self) -> &str {
        &self.app.app_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClientState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: ClientState) {
        let mut current = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *current != state {
            debug!("Client state {} -> {}", *current, state);
            *current = state;
        }
    }

    /// Persons the session may act for, in service order.
    pub async fn persons(&self) -> Vec<Person> {
        self.people.read().await.persons.clone()
    }

    /// The selected person, if any.
    pub async fn current_person(&self) -> Option<Person> {
        let people = self.people.read().await;
        people.current.and_then(|i| people.persons.get(i).cloned())
    }

    /// When the current session was granted.
    pub async fn session_created_at(&self) -> Option<OffsetDateTime> {
        self.slot.lock().await.session.as_ref().map(|s| s.created_at)
    }

    /// Select the person subsequent record operations act for.
    pub async fn select_person(&self, selector: impl Into<PersonSelector>) -> Result<Person> {
        let selector = selector.into();
        let mut people = self.people.write().await;
        let index = match &selector {
            PersonSelector::Index(index) => {
                if *index >= people.persons.len() {
                    return Err(UsageError::PersonIndexOutOfRange {
                        index: *index,
                        len: people.persons.len(),
                    }
                    .into());
                }
                *index
            }
            PersonSelector::Name(name) => people
                .persons
                .iter()
                .position(|p| p.display_name == *name || p.person_id == *name)
                .ok_or_else(|| UsageError::UnknownPerson(name.clone()))?,
        };
        people.current = Some(index);
        let person = people.persons[index].clone();
        info!("Selected person {}", person);
        Ok(person)
    }

    /// Run the two-step handshake: create a session, then fetch persons.
    ///
    /// If fetching persons reports an expired session, a new session is
    /// created and persons are fetched once more. The person selection is
    /// cleared.
    pub async fn handshake(&self) -> Result<()> {
        let previous = self.state();
        let mut slot = self.slot.lock().await;
        self.set_state(ClientState::Handshaking);

        match self.run_handshake(&mut slot).await {
            Ok(count) => {
                self.set_state(ClientState::Ready);
                info!(
                    "Session established for app {} ({} person(s))",
                    self.app.app_id, count
                );
                Ok(())
            }
            Err(err) => {
                if err.kind() == ErrorKind::Transport {
                    self.set_state(previous);
                } else {
                    self.set_state(ClientState::Failed);
                }
                Err(err)
            }
        }
    }

    async fn run_handshake(&self, slot: &mut SessionSlot) -> Result<usize> {
        self.install_session(slot).await?;
        self.set_state(ClientState::Authenticated);

        let mut reply = self.request_people(slot).await?;
        if reply.is_session_expired() {
            warn!("Session expired while fetching persons, creating a new one");
            self.install_session(slot).await?;
            reply = self.request_people(slot).await?;
            if reply.is_session_expired() {
                return Err(Error::auth("session refresh failed"));
            }
        }

        let persons = reply.into_ok()?.persons()?;
        if persons.is_empty() {
            return Err(Error::auth("no authorized persons"));
        }
        let count = persons.len();
        let mut people = self.people.write().await;
        people.persons = persons;
        people.current = None;
        Ok(count)
    }

    async fn install_session(&self, slot: &mut SessionSlot) -> Result<()> {
        let session = self.create_session().await?;
        slot.session = Some(session);
        slot.generation += 1;
        debug!("Installed session generation {}", slot.generation);
        Ok(())
    }

    async fn create_session(&self) -> Result<Session> {
        let signing_time = self.clock.next_string();
        let msg_time = self.clock.next_string();
        let body = envelope::session_token_request(
            &self.app.app_id,
            &self.app.shared_secret,
            &signing_time,
            &msg_time,
        )?;
        let reply = post_request(self.transport.as_ref(), &self.host, body).await?;
        if !reply.is_ok() {
            return Err(Error::auth(format!(
                "{} rejected with code {}",
                Method::CreateAuthenticatedSessionToken,
                reply.code()
            )));
        }
        reply.session()
    }

    async fn request_people(&self, slot: &SessionSlot) -> Result<Reply> {
        let session = slot
            .session
            .as_ref()
            .ok_or_else(|| Error::auth("no session"))?;
        let body = self.sign(session, Method::GetAuthorizedPeople, &Info::empty(), None)?;
        post_request(self.transport.as_ref(), &self.host, body).await
    }

    fn sign(
        &self,
        session: &Session,
        method: Method,
        info: &Info,
        person: Option<&Person>,
    ) -> Result<String> {
        let ctx = SigningContext {
            auth_token: &session.auth_token,
            session_secret: &session.session_secret,
            person,
        };
        envelope::signed(method, &ctx, &self.clock.next_string(), info)
    }

    async fn require_person(&self) -> Result<Person> {
        self.current_person()
            .await
            .ok_or_else(|| UsageError::NoPersonSelected.into())
    }

    /// Read all records of `record_type` for the current person.
    ///
    /// Returns the raw reply body.
    pub async fn get_things(&self, record_type: RecordType) -> Result<String> {
        let person = self.require_person().await?;
        let info = Info::get_things(record_type);
        let reply = self
            .signed_request(Method::GetThings, &info, &person)
            .await?;
        Ok(reply.into_body())
    }

    /// Write one record of `record_type` for the current person.
    ///
    /// Returns the raw reply body.
    pub async fn put_things(&self, record_type: RecordType, data_xml: &DataXml) -> Result<String> {
        let person = self.require_person().await?;
        let info = Info::put_things(record_type, data_xml.clone());
        let reply = self
            .signed_request(Method::PutThings, &info, &person)
            .await?;
        Ok(reply.into_body())
    }

    /// Write an observation for the current person.
    pub async fn put_observation(&self, observation: &Observation) -> Result<String> {
        self.put_things(observation.record_type, &observation.data_xml)
            .await
    }

    async fn signed_request(&self, method: Method, info: &Info, person: &Person) -> Result<Reply> {
        if self.state() == ClientState::Failed {
            return Err(Error::auth(format!(
                "{} refused: session failed, handshake required",
                method
            )));
        }
        let (reply, generation) = self.attempt(method, info, person).await?;
        match reply.code() {
            CODE_OK => return Ok(reply),
            CODE_SESSION_EXPIRED => {
                warn!("Session expired during {}, refreshing", method);
            }
            _ => return reply.into_ok(),
        }

        self.refresh_after_expiry(generation).await?;

        let (reply, _) = self.attempt(method, info, person).await?;
        if reply.is_session_expired() {
            self.set_state(ClientState::Failed);
            return Err(Error::auth("session refresh failed"));
        }
        reply.into_ok()
    }

    async fn attempt(&self, method: Method, info: &Info, person: &Person) -> Result<(Reply, u64)> {
        let (body, generation) = {
            let slot = self.slot.lock().await;
            let session = slot
                .session
                .as_ref()
                .ok_or_else(|| Error::auth("no session"))?;
            let body = self.sign(session, method, info, Some(person))?;
            (body, slot.generation)
        };
        debug!("{} for record {} (session generation {})", method, person.record_id, generation);
        let reply = post_request(self.transport.as_ref(), &self.host, body).await?;
        Ok((reply, generation))
    }

    async fn refresh_after_expiry(&self, seen_generation: u64) -> Result<()> {
        let mut slot = self.slot.lock().await;
        if slot.generation != seen_generation {
            debug!(
                "Session already refreshed (generation {} -> {})",
                seen_generation, slot.generation
            );
            return Ok(());
        }

        self.set_state(ClientState::Refreshing);
        match self.install_session(&mut slot).await {
            Ok(()) => {
                self.set_state(ClientState::Ready);
                info!("Session refreshed for app {}", self.app.app_id);
                Ok(())
            }
            Err(err) => {
                if err.kind() == ErrorKind::Transport {
                    self.set_state(ClientState::Ready);
                } else {
                    self.set_state(ClientState::Failed);
                }
                Err(err)
            }
        }
    }
}

/// POST a finished request body and parse the reply.
///
/// Any HTTP status other than 200 is a transport error.
pub(crate) async fn post_request(
    transport: &dyn Transport,
    host: &str,
    body: String,
) -> Result<Reply> {
    let response = transport
        .post(host, PLATFORM_PATH, Bytes::from(body))
        .await?;
    if !response.is_ok() {
        return Err(Error::http_status(response.status));
    }
    Reply::parse(&response.body)
}
