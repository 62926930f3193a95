use crate::model::peer::PeerId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

const WELCOME: &str = "bienvenida";
const PEER_JOINED: &str = "nuevo_usuario";
const PEER_LEFT: &str = "usuario_salio";

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("envelope is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("envelope is not a JSON object")]
    NotAnObject,

    #[error("envelope carries no kind tag")]
    MissingTag,

    #[error("envelope carries {0} kind tags")]
    ConflictingTags(usize),

    #[error("unknown system event type '{0}'")]
    UnknownSystemEvent(String),

    #[error("invalid {tag} envelope: {source}")]
    InvalidBody {
        tag: &'static str,
        source: serde_json::Error,
    },
}

/// One message unit on the relay connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Chat(ChatMessage),
    System(SystemEvent),
    Signal(SignalMessage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub text: String,
    pub sender_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemEvent {
    /// Sent by the relay to a fresh connection only.
    Welcome { id: PeerId },
    PeerJoined { id: PeerId, name: String },
    PeerLeft { id: PeerId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Offer,
    Answer,
    Candidate,
}

/// Call-signaling message addressed from one participant to another.
/// `payload` is kept as raw JSON; the receiving session decides how to read it.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalMessage {
    pub from: PeerId,
    pub to: PeerId,
    pub kind: SignalKind,
    pub payload: Value,
    pub sender_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Chat,
    System,
    Signal,
}

impl Tag {
    const ALL: [Tag; 3] = [Tag::Chat, Tag::System, Tag::Signal];

    fn key(self) -> &'static str {
        match self {
            Tag::Chat => "chat",
            Tag::System => "sistema",
            Tag::Signal => "webrtc",
        }
    }

    fn is_set(self, object: &Map<String, Value>) -> bool {
        matches!(object.get(self.key()), Some(Value::Bool(true)))
    }
}

#[derive(Serialize, Deserialize)]
struct ChatBody {
    #[serde(rename = "texto")]
    text: String,
    #[serde(rename = "nombre")]
    name: String,
}

#[derive(Serialize, Deserialize)]
struct SystemBody {
    #[serde(rename = "tipo")]
    kind: String,
    id: PeerId,
    #[serde(rename = "nombre", default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct SignalBody {
    #[serde(rename = "de")]
    from: PeerId,
    #[serde(rename = "para")]
    to: PeerId,
    #[serde(rename = "tipo")]
    kind: SignalKind,
    #[serde(rename = "contenido", default)]
    payload: Value,
    #[serde(rename = "nombreRemoto", default)]
    sender_name: String,
}

impl Envelope {
    pub fn chat(text: impl Into<String>, sender_name: impl Into<String>) -> Self {
        Envelope::Chat(ChatMessage {
            text: text.into(),
            sender_name: sender_name.into(),
        })
    }

    pub fn welcome(id: PeerId) -> Self {
        Envelope::System(SystemEvent::Welcome { id })
    }

    pub fn peer_joined(id: PeerId, name: impl Into<String>) -> Self {
        Envelope::System(SystemEvent::PeerJoined {
            id,
            name: name.into(),
        })
    }

    pub fn peer_left(id: PeerId) -> Self {
        Envelope::System(SystemEvent::PeerLeft { id })
    }

    pub fn signal(
        from: PeerId,
        to: PeerId,
        kind: SignalKind,
        payload: Value,
        sender_name: impl Into<String>,
    ) -> Self {
        Envelope::Signal(SignalMessage {
            from,
            to,
            kind,
            payload,
            sender_name: sender_name.into(),
        })
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Envelope::Chat(_) => "chat",
            Envelope::System(SystemEvent::Welcome { .. }) => "welcome",
            Envelope::System(SystemEvent::PeerJoined { .. }) => "peer-joined",
            Envelope::System(SystemEvent::PeerLeft { .. }) => "peer-left",
            Envelope::Signal(msg) => match msg.kind {
                SignalKind::Offer => "offer",
                SignalKind::Answer => "answer",
                SignalKind::Candidate => "candidate",
            },
        }
    }

    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Exactly one of the `chat`/`sistema`/`webrtc` tags must be `true`.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        let Value::Object(object) = &value else {
            return Err(EnvelopeError::NotAnObject);
        };

        let tags: Vec<Tag> = Tag::ALL
            .into_iter()
            .filter(|tag| tag.is_set(object))
            .collect();

        let tag = match tags.as_slice() {
            [] => return Err(EnvelopeError::MissingTag),
            [tag] => *tag,
            many => return Err(EnvelopeError::ConflictingTags(many.len())),
        };

        let invalid = |source: serde_json::Error| EnvelopeError::InvalidBody {
            tag: tag.key(),
            source,
        };

        match tag {
            Tag::Chat => {
                let body: ChatBody = serde_json::from_value(value).map_err(invalid)?;
                Ok(Envelope::chat(body.text, body.name))
            }
            Tag::System => {
                let body: SystemBody = serde_json::from_value(value).map_err(invalid)?;
                match body.kind.as_str() {
                    WELCOME => Ok(Envelope::welcome(body.id)),
                    PEER_JOINED => Ok(Envelope::peer_joined(
                        body.id,
                        body.name.unwrap_or_default(),
                    )),
                    PEER_LEFT => Ok(Envelope::peer_left(body.id)),
                    _ => Err(EnvelopeError::UnknownSystemEvent(body.kind)),
                }
            }
            Tag::Signal => {
                let body: SignalBody = serde_json::from_value(value).map_err(invalid)?;
                Ok(Envelope::signal(
                    body.from,
                    body.to,
                    body.kind,
                    body.payload,
                    body.sender_name,
                ))
            }
        }
    }

    pub fn to_value(&self) -> Result<Value, EnvelopeError> {
        let (tag, body) = match self {
            Envelope::Chat(msg) => (
                Tag::Chat,
                serde_json::to_value(ChatBody {
                    text: msg.text.clone(),
                    name: msg.sender_name.clone(),
                })?,
            ),
            Envelope::System(event) => {
                let body = match event {
                    SystemEvent::Welcome { id } => SystemBody {
                        kind: WELCOME.to_owned(),
                        id: id.clone(),
                        name: None,
                    },
                    SystemEvent::PeerJoined { id, name } => SystemBody {
                        kind: PEER_JOINED.to_owned(),
                        id: id.clone(),
                        name: Some(name.clone()),
                    },
                    SystemEvent::PeerLeft { id } => SystemBody {
                        kind: PEER_LEFT.to_owned(),
                        id: id.clone(),
                        name: None,
                    },
                };
                (Tag::System, serde_json::to_value(body)?)
            }
            Envelope::Signal(msg) => (
                Tag::Signal,
                serde_json::to_value(SignalBody {
                    from: msg.from.clone(),
                    to: msg.to.clone(),
                    kind: msg.kind,
                    payload: msg.payload.clone(),
                    sender_name: msg.sender_name.clone(),
                })?,
            ),
        };

        let Value::Object(mut object) = body else {
            return Err(EnvelopeError::NotAnObject);
        };
        object.insert(tag.key().to_owned(), Value::Bool(true));
        Ok(Value::Object(object))
    }

    pub fn encode(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(&self.to_value()?)?)
    }
}
