pub mod audit_flow;
pub mod handler;
pub mod test_flow;

pub use audit_flow::{AuditAggregator, AuditFlow};
pub use handler::JobHandler;
pub use test_flow::TestFlow;
