// SPDX-License-Identifier: MIT

//! Execution planning from the input/output wiring
//!
//! Step `b` depends on step `a` when one of `b`'s inputs is an output id of
//! `a`. Ties between ready steps go to the lower stored index, so a workflow
//! that is already in a valid order plans to exactly that order.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::cell::CellId;
use crate::error::RunError;
use crate::workflow::types::Workflow;

/// Step indices in a valid execution order.
///
/// Fails on output ids produced by two steps, on inputs that neither a step
/// nor `available` provides, and on dependency cycles.
pub fn plan(workflow: &Workflow, available: &HashSet<CellId>) -> Result<Vec<usize>, RunError> {
    let mut producers: HashMap<CellId, usize> = HashMap::new();
    for (index, step) in workflow.steps.iter().enumerate() {
        for cell_id in step.outputs.values() {
            if producers.insert(*cell_id, index).is_some() {
                return Err(RunError::DuplicateOutput { cell_id: *cell_id });
            }
        }
    }

    let count = workflow.steps.len();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut in_degree = vec![0usize; count];

    for (index, step) in workflow.steps.iter().enumerate() {
        let mut upstream = BTreeSet::new();
        for (param, cell_id) in &step.inputs {
            match producers.get(cell_id) {
                Some(&producer) => {
                    upstream.insert(producer);
                }
                None if available.contains(cell_id) => {}
                None => {
                    return Err(RunError::UnresolvedInput {
                        step_id: step.step_id,
                        param: param.clone(),
                        cell_id: *cell_id,
                    })
                }
            }
        }
        for producer in upstream {
            dependents[producer].push(index);
            in_degree[index] += 1;
        }
    }

    let mut ready: BTreeSet<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(count);
    while let Some(index) = ready.pop_first() {
        order.push(index);
        for &next in &dependents[index] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    if order.len() < count {
        let stuck = (0..count)
            .filter(|&i| in_degree[i] > 0)
            .map(|i| workflow.steps[i].step_id)
            .collect();
        return Err(RunError::CycleDetected(stuck));
    }
    Ok(order)
}
