use sentiment_core::pipeline::{PipelineMode, PipelineSummary};

pub fn summary_text(mode: PipelineMode, summary: &PipelineSummary) -> String {
    let mut line = format!(
        "{}: {} handles, {} posts",
        mode.label(),
        summary.handles,
        summary.posts
    );
    if !summary.empty_handles.is_empty() {
        line.push_str(&format!(
            " (no posts for: {})",
            summary.empty_handles.join(", ")
        ));
    }
    if mode != PipelineMode::Collect {
        let labels: Vec<String> = summary
            .labels
            .iter()
            .map(|(label, n)| format!("{}={}", label, n))
            .collect();
        line.push_str(&format!(
            ", classified {} [{}]",
            summary.classified,
            labels.join(" ")
        ));
    }
    line
}

pub fn summary_json(mode: PipelineMode, summary: &PipelineSummary) -> serde_json::Result<String> {
    let mut value = serde_json::json!({
        "status": "ok",
        "mode": mode.label(),
    });
    if let (Some(obj), serde_json::Value::Object(fields)) =
        (value.as_object_mut(), serde_json::to_value(summary)?)
    {
        obj.extend(fields);
    }
    serde_json::to_string_pretty(&value)
}
