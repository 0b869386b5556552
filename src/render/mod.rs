pub mod fallback;
pub mod form;
pub mod projector;
pub mod scroll;

pub use fallback::{is_fallback_result, real_results};
pub use form::{follow_up_visible, question_views, QuestionView};
pub use projector::{
    project, ErrorPanel, GatePanel, HeaderView, HistoryEntryView, ProgressView,
    ProjectionContext, RenderFrame, ResultView, SearchBatchView, SectionBody, SectionId,
    SectionView, ViewState,
};
pub use scroll::{
    AutoScroll, ScrollAction, ScrollTarget, DEFAULT_SCROLL_DELAY, DEFAULT_SCROLL_THROTTLE,
};
