use authflow::api::StreamEndpoint;
use authflow::automation::{
    display_name, progress_percent, step_at, step_for_content, total_steps, workflow_steps,
    ContentKey,
};

#[test]
fn workflow_has_coverage_then_form_steps() {
    assert_eq!(total_steps(), 2);
    let ids: Vec<u32> = workflow_steps().iter().map(|step| step.id).collect();
    assert_eq!(ids, vec![1, 2]);

    let coverage = step_at(1).expect("step 1");
    assert_eq!(coverage.content_key, ContentKey::Coverage);
    assert_eq!(coverage.endpoint, StreamEndpoint::CoverageSearch);
    assert_eq!(coverage.title, "Policy Research & Coverage Analysis");

    let form = step_at(2).expect("step 2");
    assert_eq!(form.content_key, ContentKey::Form);
    assert_eq!(form.endpoint, StreamEndpoint::QuestionProcessing);
}

#[test]
fn out_of_range_steps_are_absent() {
    assert!(step_at(0).is_none());
    assert!(step_at(3).is_none());
    assert_eq!(display_name(0), "Unknown");
    assert_eq!(display_name(7), "Unknown");
    assert_eq!(display_name(2), "Form Completion");
}

#[test]
fn progress_rounds_and_is_monotonic() {
    assert_eq!(progress_percent(0, 2), 0);
    assert_eq!(progress_percent(1, 2), 50);
    assert_eq!(progress_percent(2, 2), 100);
    assert_eq!(progress_percent(1, 3), 33);
    assert_eq!(progress_percent(2, 3), 67);
    assert_eq!(progress_percent(5, 2), 100);
    assert_eq!(progress_percent(1, 0), 0);

    let series: Vec<u32> = (0..=7).map(|n| progress_percent(n, 7)).collect();
    assert!(series.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn steps_are_found_by_content_key() {
    assert_eq!(step_for_content(ContentKey::Coverage).map(|s| s.id), Some(1));
    assert_eq!(step_for_content(ContentKey::Form).map(|s| s.id), Some(2));
    assert!(step_for_content(ContentKey::Screening).is_none());
}
