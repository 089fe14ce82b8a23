use crate::gitlab::{MergeRequestAction, PipelineRecord};

/// Picks the pipelines made redundant by `action`, newest first.
///
/// Terminal pipelines are never selected. On `update` the newest active
/// pipeline is kept; every other action selects all active pipelines.
pub fn select_redundant(
    pipelines: &[PipelineRecord],
    action: &MergeRequestAction,
) -> Vec<PipelineRecord> {
    let mut active: Vec<PipelineRecord> = pipelines
        .iter()
        .filter(|pipeline| !pipeline.status.is_terminal())
        .cloned()
        .collect();

    active.sort_by(|a, b| b.id.cmp(&a.id));

    if action.keeps_newest() {
        active.into_iter().skip(1).collect()
    } else {
        active
    }
}
