use serde_json::Value;

/// A prompt loaded once at startup as a static resource (spec.md §9: "treat
/// templates as static resources... parameterize with a small
/// variable-binding type. Hot-reload is not required."). Substitution is a
/// plain `{{field}}` replace over the rendered input JSON's top-level keys,
/// deliberately simpler than a Jinja-like engine.
pub struct PromptTemplate {
    pub name: &'static str,
    pub body: &'static str,
}

impl PromptTemplate {
    pub const fn new(name: &'static str, body: &'static str) -> Self {
        Self { name, body }
    }

    pub fn render(&self, input: &Value) -> String {
        let mut rendered = self.body.to_string();
        if let Value::Object(fields) = input {
            for (key, value) in fields {
                let needle = format!("{{{{{key}}}}}");
                let replacement = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                rendered = rendered.replace(&needle, &replacement);
            }
        }
        rendered
    }
}

pub const CONTEXT_ANALYZER: PromptTemplate = PromptTemplate::new(
    "context_analyzer",
    "Analyze the research query and return domain, secondary_domains, key_concepts, \
     goal_type, region, time_constraints, language, complexity (1-5) and \
     information_needs as JSON.\n\nQuery: {{query}}",
);

pub const OBJECTIVE_DECOMPOSER: PromptTemplate = PromptTemplate::new(
    "objective_decomposer",
    "Decompose the objective into a list of tasks with title, description, \
     task_type, priority, estimated_steps and depends_on (by task title). \
     Return JSON {\"tasks\": [...] }.\n\nQuery: {{query}}\nContext: {{context_analysis}}",
);

pub const TASK_ANALYZER: PromptTemplate = PromptTemplate::new(
    "task_analyzer",
    "Plan 3 to 7 executable steps for this task. Return JSON \
     {\"steps\": [{\"title\":.., \"description\":.., \"step_type\":.., \"agent_name\":..}]}.\n\n\
     Task: {{task_title}}\nDescription: {{task_description}}",
);

pub const RESEARCH: PromptTemplate = PromptTemplate::new(
    "research",
    "Research the following step and return JSON {\"output\": .., \"sources\": [..]}.\n\n\
     Step: {{step_title}}\nInput: {{input_data}}",
);

pub const PROCESSING: PromptTemplate = PromptTemplate::new(
    "processing",
    "Perform the following processing step and return JSON {\"output\": ..}.\n\n\
     Step: {{step_title}}\nInput: {{input_data}}",
);

pub const QUALITY_EVALUATOR: PromptTemplate = PromptTemplate::new(
    "quality_evaluator",
    "Evaluate the output for correctness and completeness. Return JSON \
     {\"score\": 0-10, \"quality_level\": .., \"feedback\": .., \
     \"improvement_suggestions\": [..]}.\n\nOutput: {{output}}",
);

pub const SYNTHESIS: PromptTemplate = PromptTemplate::new(
    "synthesis",
    "Synthesize a final report from the completed task outputs below. Return JSON \
     {\"report\": .., \"sources\": [..]}.\n\nOutputs: {{task_outputs}}",
);

pub const ERROR_DIAGNOSIS: PromptTemplate = PromptTemplate::new(
    "error_diagnosis",
    "Diagnose the following workflow error and suggest a recovery action. Return JSON \
     {\"diagnosis\": .., \"suggested_action\": ..}.\n\nError: {{error}}",
);
