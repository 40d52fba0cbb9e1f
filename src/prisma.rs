//! PRISMA 2020 audit trail: stage counters and the per-record screening log.

pub mod flow;
pub mod screening;

pub use flow::{FlowDocument, FlowStage, FlowSummary, PrismaFlow};
pub use screening::{ScreeningDecision, ScreeningEntry, ScreeningLog, ScreeningStatistics};
