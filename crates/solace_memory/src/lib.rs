pub mod similarity;
pub mod store;

#[cfg(test)]
mod tests;

pub use similarity::token_set_ratio;
pub use store::{
    ConversationSnapshot, EvidenceRow, FreqEntry, InsightRow, MemoryRow, MessageRow, NewInsight,
    NewMemory, NewSignal, SignalRow, SqliteStore,
};
