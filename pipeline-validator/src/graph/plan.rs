// Execution plan
// Ordered batches of stages and jobs that may run in parallel

use serde::Serialize;

/// Job batches of one stage; matrix jobs appear as their instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagePlan {
    pub name: String,
    pub job_batches: Vec<Vec<String>>,
}

/// A job instance with the stage it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedJob {
    pub stage: String,
    pub job: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    /// Stages grouped into batches; a batch starts once every earlier batch finished
    pub stage_batches: Vec<Vec<String>>,
    /// Per-stage job batches, in document order
    pub stages: Vec<StagePlan>,
}

impl ExecutionPlan {
    pub fn stage(&self, name: &str) -> Option<&StagePlan> {
        self.stages.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn job_batches(&self, stage: &str) -> Option<&[Vec<String>]> {
        self.stage(stage).map(|s| s.job_batches.as_slice())
    }

    /// Flattened `{stage, job}` batches. Stages sharing a batch run side by
    /// side, so their k-th job batches are merged.
    pub fn batches(&self) -> Vec<Vec<PlannedJob>> {
        let mut flattened = Vec::new();

        for stage_batch in &self.stage_batches {
            let plans: Vec<&StagePlan> = stage_batch.iter().filter_map(|name| self.stage(name)).collect();
            let depth = plans.iter().map(|p| p.job_batches.len()).max().unwrap_or(0);

            for k in 0..depth {
                let batch: Vec<PlannedJob> = plans
                    .iter()
                    .filter_map(|plan| plan.job_batches.get(k).map(|jobs| (plan, jobs)))
                    .flat_map(|(plan, jobs)| {
                        jobs.iter().map(|job| PlannedJob {
                            stage: plan.name.clone(),
                            job: job.clone(),
                        })
                    })
                    .collect();
                flattened.push(batch);
            }
        }

        flattened
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
