//! Session module - live agents and their legs
//!
//! - `AgentSession`: one agent's identity, open legs and dispatch entry point
//! - `SessionRegistry`: agent id to live session, with idle eviction
//! - agent id minting and validation

mod agent;
mod agent_id;
mod registry;

pub use agent::{
    AgentRecord, AgentSession, LegCommand, LegId, LegReceiver, AGENT_ID_KEY, NAME_KEY,
};
pub use agent_id::{generate_agent_id, is_valid_agent_id, validate_agent_id, AGENT_ID_PREFIX};
pub use registry::SessionRegistry;
