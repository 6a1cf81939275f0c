use serde_json::Value;
use taskflow_core::State;

use crate::deps::NodeDeps;
use crate::error::{NodeError, Result};

/// spec.md §4.2: `research`/`processing` set `step.output_data` and
/// transition the step to COMPLETED. `current_step` deliberately still
/// points at the just-completed step afterwards — `quality_evaluator` reads
/// it via `State::current_step`, and only once quality passes does
/// [`advance_past_current_step`] move the task on. This is a resolved
/// ambiguity (see DESIGN.md): the alternative reading, where research/
/// processing themselves advance past the step, would make
/// quality_evaluator's "improve" retry loop re-execute the wrong step.
pub async fn complete_current_step_output(state: &mut State, deps: &NodeDeps, output_data: Value) -> Result<()> {
    let task_id = current_task_id(state)?;
    let step_id = current_step_id(state)?;

    let task = task_mut(state, &task_id)?;
    let step = step_mut(task, &step_id)?;
    step.complete(output_data);
    deps.store.upsert_step(step).await?;

    task.touch_heartbeat();
    deps.store.upsert_task(state.objective.task_by_id(&task_id).expect("present")).await?;
    Ok(())
}

/// Once `quality_evaluator` passes the current step, advances `current_step`
/// to the next PENDING step (flipping it READY), or completes the task,
/// recomputes dependents, and clears `current_task`/`current_step`.
pub async fn advance_past_current_step(state: &mut State, deps: &NodeDeps) -> Result<()> {
    let task_id = current_task_id(state)?;

    let task = task_mut(state, &task_id)?;
    if let Some(next) = task.next_pending_step() {
        let next_id = next.step_id.clone();
        step_mut(task, &next_id)?.mark_ready();
        state.current_step = Some(next_id);
        deps.store.upsert_task(state.objective.task_by_id(&task_id).expect("present")).await?;
        return Ok(());
    }

    if task.all_steps_done() {
        let summary = task.result_summary.clone();
        task.complete(summary);
        deps.store.upsert_task(state.objective.task_by_id(&task_id).expect("present")).await?;
        state.objective.promote_ready_dependents(&task_id);
        deps.store.upsert_objective(&state.objective).await?;
        state.current_task = None;
        state.current_step = None;
    }
    Ok(())
}

/// `quality_evaluator`'s "fail" path: discards the task's plan and makes it
/// READY again so `task_analyzer` can replan it from scratch.
pub async fn restart_task_for_replan(state: &mut State, deps: &NodeDeps) -> Result<()> {
    let task_id = current_task_id(state)?;
    let task = task_mut(state, &task_id)?;
    task.steps.clear();
    task.mark_ready();
    deps.store.upsert_task(state.objective.task_by_id(&task_id).expect("present")).await?;
    state.current_step = None;
    Ok(())
}

fn current_task_id(state: &State) -> Result<String> {
    state.current_task.clone().ok_or_else(|| {
        NodeError::Core(taskflow_core::CoreError::WorkflowStateError("no current_task set".to_string()))
    })
}

fn current_step_id(state: &State) -> Result<String> {
    state.current_step.clone().ok_or_else(|| {
        NodeError::Core(taskflow_core::CoreError::WorkflowStateError("no current_step set".to_string()))
    })
}

fn task_mut<'a>(state: &'a mut State, task_id: &str) -> Result<&'a mut taskflow_core::Task> {
    state
        .objective
        .task_by_id_mut(task_id)
        .ok_or_else(|| NodeError::Core(taskflow_core::CoreError::NotFound(format!("task '{task_id}'"))))
}

fn step_mut<'a>(task: &'a mut taskflow_core::Task, step_id: &str) -> Result<&'a mut taskflow_core::Step> {
    task.step_by_id_mut(step_id)
        .ok_or_else(|| NodeError::Core(taskflow_core::CoreError::NotFound(format!("step '{step_id}'"))))
}
