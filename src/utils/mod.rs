mod agent_state;
pub mod constants;

pub use agent_state::AgentState;
