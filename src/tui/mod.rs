pub mod dashboard;

pub use dashboard::{anchor_offset, body_lines, run_dashboard, BodyLine, LineTone};
