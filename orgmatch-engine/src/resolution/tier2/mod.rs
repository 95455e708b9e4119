// Tier 2: Oracle Escalation
//
// Modules in this tier talk to the (untrusted, slow, fallible) judgment
// oracle. The escalator is the only caller; adapters never validate and
// validation never does I/O.
//
// Contract: escalator.judge(query, candidate, breakdown, context) → AiJudgment
//           (never an error; failures become the fallback judgment)

pub mod ai_escalator;  // Gate, bounded calls, fallback, blend, usage
pub mod http_oracle;   // reqwest + governor adapter
pub mod oracle;        // JudgmentOracle trait, request shapes, DisabledOracle
pub mod validation;    // Strict JSON → AiJudgment / ChoiceJudgment boundary

pub use ai_escalator::{AiEscalator, OracleUsage};
pub use http_oracle::HttpJudgmentOracle;
pub use oracle::{
    ChoiceRequest, DisabledOracle, JudgmentOracle, MatchJudgmentRequest, OracleResponse,
};
