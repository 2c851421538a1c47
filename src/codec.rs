// State Codec
//
// Every blob starts with a `Header { version, kind }` so a blob written for
// one purpose is never read back as another.
//
// Sessions and tallies reference agents. Encoding is two passes: first each
// referenced agent is replaced by an `AgentProxy` carrying its durable id,
// then the agent-free record is emitted. Decoding resolves the proxies through
// the `IdentityCache`. Agent internals are written only by `encode_agent`,
// when the agent itself is being saved.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::agents::{Agent, IdentityCache, IdentityError, Strategy, StrategyRegistry};
use crate::db::AgentId;
use crate::game::{Board, Ply, Session, SlotAgents, Tally};

pub const FORMAT_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlobKind {
    Agent,
    Session,
    Tally,
    Scalar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Header {
    version: u8,
    kind: BlobKind,
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("serialization failed: {0}")]
    Serialize(#[from] bincode::error::EncodeError),
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed blob: {0}")]
    Malformed(#[from] bincode::error::DecodeError),
    #[error("blob has {0} trailing bytes")]
    Trailing(usize),
    #[error("blob format version {found}, expected {expected}")]
    Version { found: u8, expected: u8 },
    #[error("blob holds {found:?}, expected {expected:?}")]
    Kind { found: BlobKind, expected: BlobKind },
    #[error("unknown strategy kind '{0}'")]
    UnknownStrategy(String),
    #[error("invalid {0}")]
    Invalid(&'static str),
}

fn seal<T: Serialize>(kind: BlobKind, value: &T) -> Result<Vec<u8>, EncodeError> {
    let config = bincode::config::standard();
    let header = Header {
        version: FORMAT_VERSION,
        kind,
    };
    let mut bytes = bincode::serde::encode_to_vec(header, config)?;
    bytes.extend(bincode::serde::encode_to_vec(value, config)?);
    Ok(bytes)
}

fn open<T: DeserializeOwned>(expected: BlobKind, bytes: &[u8]) -> Result<T, DecodeError> {
    let config = bincode::config::standard();
    let (header, read): (Header, usize) = bincode::serde::decode_from_slice(bytes, config)?;
    if header.version != FORMAT_VERSION {
        return Err(DecodeError::Version {
            found: header.version,
            expected: FORMAT_VERSION,
        });
    }
    if header.kind != expected {
        return Err(DecodeError::Kind {
            found: header.kind,
            expected,
        });
    }

    let body = &bytes[read..];
    let (value, used) = bincode::serde::decode_from_slice(body, config)?;
    if used != body.len() {
        return Err(DecodeError::Trailing(body.len() - used));
    }
    Ok(value)
}

// === Agents (direct persistence target) ===

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct AgentRecord {
    kind: String,
    state: Vec<u8>,
}

/// Blob for the `agents.state` column
pub fn encode_strategy(strategy: &dyn Strategy) -> Result<Vec<u8>, EncodeError> {
    let record = AgentRecord {
        kind: strategy.kind().to_string(),
        state: strategy.save_state()?,
    };
    seal(BlobKind::Agent, &record)
}

pub fn encode_agent(agent: &Agent) -> Result<Vec<u8>, EncodeError> {
    agent.with_strategy(encode_strategy)
}

pub fn decode_agent(
    name: &str,
    bytes: &[u8],
    registry: &StrategyRegistry,
) -> Result<Agent, DecodeError> {
    let record: AgentRecord = open(BlobKind::Agent, bytes)?;
    let strategy = registry
        .restore(&record.kind, &record.state)
        .ok_or_else(|| DecodeError::UnknownStrategy(record.kind.clone()))??;
    Ok(Agent::new(name, strategy))
}

// === Values referencing agents ===

/// Stand-in for an agent reference; `None` is a human slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProxy(pub Option<AgentId>);

#[derive(Serialize, Deserialize)]
struct Envelope<R> {
    agents: [AgentProxy; 2],
    record: R,
}

/// Value whose agent references are persisted as proxies
pub trait Persist: Sized {
    const KIND: BlobKind;
    type Record: Serialize + DeserializeOwned;

    fn agent_refs(&self) -> &SlotAgents;
    fn to_record(&self) -> Self::Record;
    fn from_record(record: Self::Record, agents: SlotAgents) -> Result<Self, DecodeError>;
}

#[derive(Serialize, Deserialize)]
pub struct SessionRecord {
    board: u32,
    history: Vec<Ply>,
}

impl Persist for Session {
    const KIND: BlobKind = BlobKind::Session;
    type Record = SessionRecord;

    fn agent_refs(&self) -> &SlotAgents {
        self.agents()
    }

    fn to_record(&self) -> SessionRecord {
        SessionRecord {
            board: self.board().encoded(),
            history: self.history().to_vec(),
        }
    }

    fn from_record(record: SessionRecord, agents: SlotAgents) -> Result<Self, DecodeError> {
        let board = Board::from_encoded(record.board).ok_or(DecodeError::Invalid("board"))?;
        Session::from_parts(board, agents, record.history).ok_or(DecodeError::Invalid("move history"))
    }
}

#[derive(Serialize, Deserialize)]
pub struct TallyRecord {
    p1_wins: u64,
    p2_wins: u64,
    draws: u64,
}

impl Persist for Tally {
    const KIND: BlobKind = BlobKind::Tally;
    type Record = TallyRecord;

    fn agent_refs(&self) -> &SlotAgents {
        self.agents()
    }

    fn to_record(&self) -> TallyRecord {
        TallyRecord {
            p1_wins: self.p1_wins,
            p2_wins: self.p2_wins,
            draws: self.draws,
        }
    }

    fn from_record(record: TallyRecord, agents: SlotAgents) -> Result<Self, DecodeError> {
        Ok(Tally::from_parts(agents, record.p1_wins, record.p2_wins, record.draws))
    }
}

pub struct StateCodec {
    cache: Arc<IdentityCache>,
}

impl StateCodec {
    pub fn new(cache: Arc<IdentityCache>) -> Self {
        Self { cache }
    }

    pub fn encode<T: Persist>(&self, value: &T) -> Result<Vec<u8>, EncodeError> {
        // Pass 1: agents -> proxies
        let mut agents = [AgentProxy(None); 2];
        for (proxy, agent) in agents.iter_mut().zip(value.agent_refs()) {
            if let Some(agent) = agent {
                *proxy = AgentProxy(Some(self.cache.get_id(agent)?));
            }
        }

        // Pass 2: agent-free payload
        let envelope = Envelope {
            agents,
            record: value.to_record(),
        };
        seal(T::KIND, &envelope)
    }

    pub fn decode<T: Persist>(&self, bytes: &[u8]) -> Result<T, DecodeError> {
        let envelope: Envelope<T::Record> = open(T::KIND, bytes)?;

        let mut agents: SlotAgents = [None, None];
        for (slot, proxy) in agents.iter_mut().zip(envelope.agents) {
            // An agent whose own state is gone leaves its slot empty; the
            // referencing record is still restored
            if let AgentProxy(Some(id)) = proxy {
                *slot = self.cache.get(id);
                if slot.is_none() {
                    tracing::warn!(%id, kind = ?T::KIND, "referenced agent unresolved, slot left empty");
                }
            }
        }

        T::from_record(envelope.record, agents)
    }
}

// === Process-wide scalars ===

pub fn encode_scalar<T: Serialize>(value: &T) -> Result<Vec<u8>, EncodeError> {
    seal(BlobKind::Scalar, value)
}

pub fn decode_scalar<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DecodeError> {
    open(BlobKind::Scalar, bytes)
}
