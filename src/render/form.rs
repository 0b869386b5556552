use crate::api::FormQuestionCatalog;
use crate::automation::session::{QuestionState, SessionSnapshot};
use crate::shared::ids::QuestionId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub id: QuestionId,
    pub question: String,
    pub answer: Option<String>,
    pub status: String,
    pub source: Option<String>,
    pub user_edited: bool,
    pub follow_up: Option<Box<QuestionView>>,
}

/// The primary answer that reveals `question_id`'s follow-up. Triggers
/// recorded on the session win over the catalog, which wins over the
/// follow-up attached to the streamed answer.
pub fn follow_up_trigger<'a>(
    snapshot: &'a SessionSnapshot,
    catalog: Option<&'a FormQuestionCatalog>,
    question_id: &QuestionId,
) -> Option<&'a str> {
    snapshot
        .follow_up_triggers
        .get(question_id)
        .map(String::as_str)
        .or_else(|| catalog?.follow_up_trigger(question_id))
        .or_else(|| {
            snapshot
                .activity
                .question(question_id)?
                .follow_up
                .as_ref()?
                .condition
                .as_deref()
        })
}

pub fn follow_up_visible(primary_answer: Option<&str>, trigger: Option<&str>) -> bool {
    match (primary_answer, trigger) {
        (Some(answer), Some(trigger)) => answer.trim() == trigger.trim(),
        _ => false,
    }
}

/// Primary questions in arrival order, each carrying its follow-up only
/// while the primary answer equals the trigger.
pub fn question_views(
    snapshot: &SessionSnapshot,
    catalog: Option<&FormQuestionCatalog>,
) -> Vec<QuestionView> {
    snapshot
        .activity
        .questions
        .iter()
        .filter(|question| !question.id.is_follow_up())
        .map(|question| {
            let trigger = follow_up_trigger(snapshot, catalog, &question.id);
            let follow_up = if follow_up_visible(question.answer.as_deref(), trigger) {
                let follow_up_id = question.id.follow_up_id();
                let prompt = question
                    .follow_up
                    .as_ref()
                    .and_then(|spec| spec.question.clone())
                    .or_else(|| {
                        catalog?
                            .question(&question.id)?
                            .follow_up
                            .as_ref()?
                            .question
                            .clone()
                    });
                Some(Box::new(match snapshot.activity.question(&follow_up_id) {
                    Some(state) => view(state, prompt),
                    None => QuestionView {
                        id: follow_up_id,
                        question: prompt.unwrap_or_else(|| "Follow-up question".to_string()),
                        answer: None,
                        status: "waiting".to_string(),
                        source: None,
                        user_edited: false,
                        follow_up: None,
                    },
                }))
            } else {
                None
            };
            let prompt = catalog
                .and_then(|catalog| catalog.question(&question.id))
                .and_then(|q| q.question.clone());
            QuestionView {
                follow_up,
                ..view(question, prompt)
            }
        })
        .collect()
}

fn view(state: &QuestionState, fallback_prompt: Option<String>) -> QuestionView {
    QuestionView {
        id: state.id.clone(),
        question: state
            .question
            .clone()
            .or(fallback_prompt)
            .unwrap_or_else(|| state.id.to_string()),
        answer: state.answer.clone(),
        status: state.status.clone(),
        source: state.source.clone(),
        user_edited: state.user_edited,
        follow_up: None,
    }
}
